//! In-memory store implementation.
//!
//! Useful for unit tests and ephemeral bots. All four tables live in plain
//! maps behind one `tokio::sync::RwLock`; every trait method takes the lock
//! exactly once, which gives the same atomic single-document semantics the
//! real database provides.

use std::collections::{BTreeMap, HashMap};

use tokio::sync::RwLock;

use herald_types::{CallerId, Result};

use crate::Store;

#[derive(Debug, Default)]
struct Tables {
    env: BTreeMap<CallerId, HashMap<String, String>>,
    perm: BTreeMap<CallerId, i64>,
    alias: BTreeMap<CallerId, HashMap<String, String>>,
    scope: BTreeMap<CallerId, Vec<String>>,
}

/// A fully in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn env_all(&self, caller: CallerId) -> Result<HashMap<String, String>> {
        let tables = self.tables.read().await;
        Ok(tables.env.get(&caller).cloned().unwrap_or_default())
    }

    async fn env_set(&self, caller: CallerId, name: &str, value: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .env
            .entry(caller)
            .or_default()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn env_unset(&self, caller: CallerId, name: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .env
            .get_mut(&caller)
            .is_some_and(|vars| vars.remove(name).is_some()))
    }

    async fn perm_level(&self, caller: CallerId) -> Result<Option<i64>> {
        let tables = self.tables.read().await;
        Ok(tables.perm.get(&caller).copied())
    }

    async fn perm_set(&self, caller: CallerId, level: i64) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.perm.insert(caller, level);
        Ok(())
    }

    async fn alias_lookup(&self, caller: CallerId, alias: &str) -> Result<Option<String>> {
        let tables = self.tables.read().await;
        Ok(tables
            .alias
            .get(&caller)
            .and_then(|aliases| aliases.get(alias).cloned()))
    }

    async fn alias_all(&self, caller: CallerId) -> Result<HashMap<String, String>> {
        let tables = self.tables.read().await;
        Ok(tables.alias.get(&caller).cloned().unwrap_or_default())
    }

    async fn alias_set(&self, caller: CallerId, alias: &str, command: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .alias
            .entry(caller)
            .or_default()
            .insert(alias.to_string(), command.to_string());
        Ok(())
    }

    async fn alias_unset(&self, caller: CallerId, alias: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .alias
            .get_mut(&caller)
            .is_some_and(|aliases| aliases.remove(alias).is_some()))
    }

    async fn scope_list(&self, caller: CallerId) -> Result<Vec<String>> {
        let tables = self.tables.read().await;
        Ok(tables.scope.get(&caller).cloned().unwrap_or_default())
    }

    async fn scope_add(&self, caller: CallerId, prefix: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        let list = tables.scope.entry(caller).or_default();
        if !list.iter().any(|p| p == prefix) {
            list.push(prefix.to_string());
        }
        Ok(())
    }

    async fn scope_remove(&self, caller: CallerId, prefix: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let Some(list) = tables.scope.get_mut(&caller) else {
            return Ok(false);
        };
        let before = list.len();
        list.retain(|p| p != prefix);
        Ok(list.len() != before)
    }
}
