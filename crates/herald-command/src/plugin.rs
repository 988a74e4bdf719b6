//! The plugin contract.
//!
//! A plugin is a name, a config schema declaring the configuration keys it
//! recognizes, and a build function producing its command tree from the bot
//! handle and its validated config. The loader isolates faults per plugin:
//! a failing schema check or build is logged and skipped, and the rest of
//! the batch continues.

use std::fmt;
use std::sync::Arc;

use herald_store::Store;
use herald_types::{HeraldError, Result};

use crate::pipeline::EnvCache;
use crate::registry::CommandSpec;

/// Value kinds a plugin config key may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKind {
    Str,
    Bool,
    Int,
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigKind::Str => "string",
            ConfigKind::Bool => "boolean",
            ConfigKind::Int => "integer",
        })
    }
}

/// The configuration keys one plugin recognizes.
#[derive(Debug, Clone, Default)]
pub struct ConfigSchema {
    keys: Vec<(String, ConfigKind)>,
}

impl ConfigSchema {
    /// A schema recognizing no keys at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare one recognized key.
    pub fn key(mut self, name: impl Into<String>, kind: ConfigKind) -> Self {
        self.keys.push((name.into(), kind));
        self
    }

    /// Check a raw config table against this schema. Unknown keys and kind
    /// mismatches fail the plugin's load.
    pub fn validate(&self, table: &toml::Table) -> Result<PluginConfig> {
        for (name, value) in table {
            let Some((_, kind)) = self.keys.iter().find(|(k, _)| k == name) else {
                return Err(HeraldError::Config(format!(
                    "{name}: unrecognized config key"
                )));
            };
            let ok = match kind {
                ConfigKind::Str => value.is_str(),
                ConfigKind::Bool => value.is_bool(),
                ConfigKind::Int => value.is_integer(),
            };
            if !ok {
                return Err(HeraldError::Config(format!("{name}: expected {kind}")));
            }
        }
        Ok(PluginConfig {
            table: table.clone(),
        })
    }
}

/// A plugin's validated configuration.
#[derive(Debug, Clone, Default)]
pub struct PluginConfig {
    table: toml::Table,
}

impl PluginConfig {
    /// An empty config (for plugins with no `[plugins.<name>]` table).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.table.get(name).and_then(toml::Value::as_str)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.table.get(name).and_then(toml::Value::as_bool)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.table.get(name).and_then(toml::Value::as_integer)
    }
}

/// What a plugin's build function gets to work with.
#[derive(Clone)]
pub struct BotHandle {
    /// The bot's persistent store.
    pub store: Arc<dyn Store>,
    /// The per-caller env cache, so env-writing commands can invalidate it.
    pub env_cache: EnvCache,
}

/// One loadable plugin.
pub struct Plugin {
    /// Registration name; also selects the `[plugins.<name>]` config table.
    pub name: &'static str,
    /// The configuration keys this plugin recognizes.
    pub schema: ConfigSchema,
    /// Build the plugin's command tree.
    pub build: fn(&BotHandle, &PluginConfig) -> Result<CommandSpec>,
}
