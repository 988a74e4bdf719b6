//! Built-in plugins.
//!
//! Each module exports `plugin() -> Plugin`: the store-management commands
//! (`env`, `alias`, `with`, `perm`) plus the `echo` debugging commands.
//! Feature plugins with real business logic live outside the core and use
//! the same contract.

use herald_command::Plugin;

pub mod alias;
pub mod echo;
pub mod env;
pub mod perm;
pub mod scope;

/// Every built-in plugin, in load order.
pub fn builtins() -> Vec<Plugin> {
    vec![
        env::plugin(),
        alias::plugin(),
        scope::plugin(),
        perm::plugin(),
        echo::plugin(),
    ]
}
