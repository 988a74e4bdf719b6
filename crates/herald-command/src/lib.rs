//! Command dispatch core for herald.
//!
//! Turns one raw text line into a validated, permission-checked invocation
//! of a registered handler:
//!
//! - [`tokenizer`] -- shell-like lexer: quoting, `$VAR` substitution, and the
//!   `--name value` named/positional split.
//! - [`rules`] -- declarative argument rules, the shorthand micro-format, and
//!   type coercion.
//! - [`registry`] -- the command tree: plugin-declared specs, alias wiring,
//!   auto-generated `?`/`help` children, dotted-path lookup.
//! - [`binder`] -- per-rule argument binding against the caller's tokens and
//!   permission level.
//! - [`pipeline`] -- the per-message state machine: alias substitution, scope
//!   fallback, permission gating, handler invocation, error rendering.
//! - [`plugin`] -- the plugin contract (factory + config schema).

pub mod binder;
pub mod error;
pub mod pipeline;
pub mod plugin;
pub mod registry;
pub mod rules;
pub mod tokenizer;

pub use binder::BindContext;
pub use error::CmdError;
pub use pipeline::{DispatchConfig, Dispatcher, EnvCache};
pub use plugin::{BotHandle, ConfigKind, ConfigSchema, Plugin, PluginConfig};
pub use registry::{CommandInfo, CommandSpec, NodeId, Registry};
pub use rules::{ArgRule, ArgSliceExt, ArgType, ArgValue, PermGuard};
pub use tokenizer::{TokenFlags, split_named, tokenize};
