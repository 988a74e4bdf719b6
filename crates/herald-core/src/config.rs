//! Bot configuration, loaded from a TOML file.
//!
//! ```toml
//! [commands]
//! error-prefix = "[!] "
//!
//! [plugins.pixiv]
//! proxy = "http://127.0.0.1:7890"
//! ```
//!
//! Per-plugin tables are kept raw here; each plugin validates its own table
//! against its declared schema at load time.

use std::path::Path;

use serde::Deserialize;

use herald_types::Result;

/// Top-level bot configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub commands: CommandsConfig,
    /// Raw per-plugin config tables, keyed by plugin name.
    #[serde(default)]
    pub plugins: toml::Table,
}

/// The `[commands]` table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandsConfig {
    /// Prepended to every user-facing error reply.
    #[serde(rename = "error-prefix", default)]
    pub error_prefix: Option<String>,
}

impl BotConfig {
    /// Parse a configuration from TOML source.
    pub fn from_toml(src: &str) -> Result<Self> {
        Ok(toml::from_str(src)?)
    }

    /// Load a configuration file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    /// The raw config table of one plugin, if present.
    pub fn plugin_table(&self, name: &str) -> Option<&toml::Table> {
        self.plugins.get(name).and_then(toml::Value::as_table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_prefix() {
        let cfg = BotConfig::default();
        assert_eq!(cfg.commands.error_prefix, None);
        assert!(cfg.plugins.is_empty());
    }

    #[test]
    fn parses_error_prefix() {
        let cfg = BotConfig::from_toml("[commands]\n\"error-prefix\" = \"[!] \"").unwrap();
        assert_eq!(cfg.commands.error_prefix.as_deref(), Some("[!] "));
    }

    #[test]
    fn parses_plugin_tables() {
        let cfg = BotConfig::from_toml(
            "[plugins.pixiv]\nproxy = \"http://p\"\n\n[plugins.echo]\nshout = true",
        )
        .unwrap();
        let pixiv = cfg.plugin_table("pixiv").unwrap();
        assert_eq!(pixiv.get("proxy").and_then(|v| v.as_str()), Some("http://p"));
        assert!(cfg.plugin_table("absent").is_none());
    }

    #[test]
    fn empty_source_is_default() {
        let cfg = BotConfig::from_toml("").unwrap();
        assert_eq!(cfg.commands.error_prefix, None);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(BotConfig::from_toml("[[[nope").is_err());
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("herald.toml");
        std::fs::write(&path, "[commands]\n\"error-prefix\" = \"! \"").unwrap();
        let cfg = BotConfig::load(&path).unwrap();
        assert_eq!(cfg.commands.error_prefix.as_deref(), Some("! "));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = BotConfig::load(Path::new("/no/such/herald.toml")).unwrap_err();
        assert!(format!("{err}").contains("I/O error"));
    }
}
