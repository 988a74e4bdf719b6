//! Bot assembly for herald.
//!
//! Wires the dispatch core to a store, a configuration file, and the set of
//! built-in plugins, and exposes the public surface the host application
//! uses: `load_command`, `find_command`, `find_command_with_scope`, `run`.

// Re-exports so hosts only need this crate.
pub use herald_command as command;
pub use herald_store as store;
pub use herald_types as types;

pub mod bot;
pub mod config;
pub mod plugins;

pub use bot::Bot;
pub use config::BotConfig;
