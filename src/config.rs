//! Project configuration (`ember.toml`), loaded with `serde`/`toml` alongside
//! this crate's other `serde`+`sha2` content-addressing machinery. This
//! module is the first place in the crate a config file is actually
//! deserialized.
//!
//! Precedence, highest to lowest: CLI flag > `ember.toml` > `CC`/`CFLAGS`
//! environment variables > built-in default.

use std::path::Path;

use serde::Deserialize;

/// The `[build]` table of `ember.toml`. Every field is optional — an absent
/// key simply falls through to the next precedence level.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildConfig {
    pub cc: Option<String>,
    pub cflags: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub build: BuildConfig,
}

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// An empty config — every field falls through to env/default.
    pub fn empty() -> Self {
        Config::default()
    }

    /// Load `ember.toml` from `dir` if it exists; a missing file is not an
    /// error (most projects have no config at all), but a malformed one is.
    pub fn load_from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join("ember.toml");
        if !path.exists() {
            return Ok(Config::empty());
        }
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError {
            message: format!("could not read '{}': {e}", path.display()),
        })?;
        toml::from_str(&text).map_err(|e| ConfigError {
            message: format!("could not parse '{}': {e}", path.display()),
        })
    }

    /// Resolve the effective compiler command, applying the full
    /// CLI > file > env > default precedence chain.
    pub fn resolve_cc(&self, cli_flag: Option<&str>) -> String {
        cli_flag
            .map(str::to_string)
            .or_else(|| self.build.cc.clone())
            .or_else(|| std::env::var("CC").ok())
            .unwrap_or_else(|| "cc".to_string())
    }

    /// Resolve the effective extra compiler flags, same precedence chain.
    pub fn resolve_cflags(&self, cli_flag: Option<&str>) -> String {
        cli_flag
            .map(str::to_string)
            .or_else(|| self.build.cflags.clone())
            .or_else(|| std::env::var("CFLAGS").ok())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_an_empty_config() {
        let dir = std::env::temp_dir();
        let config = Config::load_from_dir(&dir.join("nonexistent-ember-config-dir")).unwrap();
        assert!(config.build.cc.is_none());
    }

    #[test]
    fn cli_flag_beats_file_value() {
        let config = Config {
            build: BuildConfig {
                cc: Some("clang".into()),
                cflags: None,
            },
        };
        assert_eq!(config.resolve_cc(Some("gcc")), "gcc");
        assert_eq!(config.resolve_cc(None), "clang");
    }

    #[test]
    fn default_cc_is_plain_cc_when_nothing_else_is_set() {
        std::env::remove_var("CC");
        let config = Config::empty();
        assert_eq!(config.resolve_cc(None), "cc");
    }
}
