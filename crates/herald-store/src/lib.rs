//! Persistent-store abstraction for herald.
//!
//! The bot keeps four independent per-caller tables in external storage:
//! environment variables, permission levels, command aliases, and the
//! ordered scope ("with") list retried on lookup failure. The dispatch core
//! only ever talks to this narrow trait; the real database behind it is an
//! external collaborator.
//!
//! Every method is a single atomic read or update of one caller's entry in
//! one table. Nothing in the core depends on cross-call consistency.

use std::collections::HashMap;

use herald_types::{CallerId, Result};

mod memory;

pub use memory::MemoryStore;

/// Narrow interface to the bot's persistent storage.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // -- Environment variables --

    /// All environment variables of one caller (empty map if none).
    async fn env_all(&self, caller: CallerId) -> Result<HashMap<String, String>>;

    /// Set one environment variable.
    async fn env_set(&self, caller: CallerId, name: &str, value: &str) -> Result<()>;

    /// Remove one environment variable. Returns whether it existed.
    async fn env_unset(&self, caller: CallerId, name: &str) -> Result<bool>;

    // -- Permission levels --

    /// The caller's stored permission level, if any was ever assigned.
    async fn perm_level(&self, caller: CallerId) -> Result<Option<i64>>;

    /// Assign a permission level.
    async fn perm_set(&self, caller: CallerId, level: i64) -> Result<()>;

    // -- Command aliases --

    /// Look up the replacement for one alias of one caller.
    async fn alias_lookup(&self, caller: CallerId, alias: &str) -> Result<Option<String>>;

    /// All aliases of one caller (empty map if none).
    async fn alias_all(&self, caller: CallerId) -> Result<HashMap<String, String>>;

    /// Define (or redefine) an alias.
    async fn alias_set(&self, caller: CallerId, alias: &str, command: &str) -> Result<()>;

    /// Remove an alias. Returns whether it existed.
    async fn alias_unset(&self, caller: CallerId, alias: &str) -> Result<bool>;

    // -- Scope ("with") lists --

    /// The caller's ordered list of scope prefixes (empty if none).
    async fn scope_list(&self, caller: CallerId) -> Result<Vec<String>>;

    /// Append a scope prefix if not already present.
    async fn scope_add(&self, caller: CallerId, prefix: &str) -> Result<()>;

    /// Remove a scope prefix. Returns whether it was present.
    async fn scope_remove(&self, caller: CallerId, prefix: &str) -> Result<bool>;
}
