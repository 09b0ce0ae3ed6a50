// src/config.rs

//! Tool configuration (`urpm.toml`)
//!
//! Every key is optional; missing keys fall back to the built-in defaults
//! below and a missing file is equivalent to an empty one.
//!
//! ```toml
//! [paths]
//! media_file = "/etc/urpmi/media.toml"
//! cache_dir = "/var/cache/urpmi"
//!
//! [catalog]
//! prefer_synthesis = true
//! fingerprint = "xxh128"
//! workers = 4
//!
//! [retrieval]
//! timeout_secs = 300
//!
//! [resolver]
//! strict = false
//! precedence = "installed-first"
//! min_update_ratio = 0.0
//! locales = ["en", "fr"]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::hash::{FreshnessCheck, HashAlgorithm};
use crate::resolver::policy::ResolvePolicy;

/// Default location of the tool configuration
pub const DEFAULT_CONFIG_PATH: &str = "/etc/urpmi/urpm.toml";

/// Configuration and registry errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("medium \"{0}\" already exists")]
    DuplicateMedium(String),

    #[error("medium \"{medium}\" already used hdlist {path}")]
    DuplicateCatalog { path: PathBuf, medium: String },

    #[error("unable to use name \"{0}\" for unnamed medium because it is already used")]
    UnnamedMediumTaken(String),

    #[error("trying to {action} inexistent medium \"{name}\"")]
    MediumNotFound { name: String, action: &'static str },

    #[error("too many mount points for removable media (at most {max})")]
    TooManyMountPoints { max: usize },

    #[error("invalid origin \"{origin}\": {reason}")]
    InvalidOrigin { origin: String, reason: String },

    #[error("syntax error in config file at line {line} ({path}): {message}")]
    Syntax {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("unable to write config file [{path}]: {reason}")]
    Write { path: PathBuf, reason: String },

    #[error("unable to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convert a TOML parse failure into a line-numbered syntax error
pub(crate) fn syntax_error(path: &Path, text: &str, err: &toml::de::Error) -> ConfigError {
    let line = err
        .span()
        .map(|span| text[..span.start.min(text.len())].matches('\n').count() + 1)
        .unwrap_or(0);
    ConfigError::Syntax {
        path: path.to_path_buf(),
        line,
        message: err.message().to_string(),
    }
}

/// Top-level tool configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub resolver: ResolvePolicy,
}

/// File-system locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Persisted media registry
    #[serde(default = "default_media_file")]
    pub media_file: PathBuf,

    /// Synthesis cache
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Retrieved catalogs of remote media
    #[serde(default = "default_catalog_dir")]
    pub catalog_dir: PathBuf,

    /// `depslist.ordered` artifact
    #[serde(default = "default_depslist")]
    pub depslist: PathBuf,
}

fn default_media_file() -> PathBuf {
    PathBuf::from("/etc/urpmi/media.toml")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("/var/cache/urpmi")
}

fn default_catalog_dir() -> PathBuf {
    PathBuf::from("/var/lib/urpmi")
}

fn default_depslist() -> PathBuf {
    PathBuf::from("/var/lib/urpmi/depslist.ordered")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            media_file: default_media_file(),
            cache_dir: default_cache_dir(),
            catalog_dir: default_catalog_dir(),
            depslist: default_depslist(),
        }
    }
}

/// Catalog loading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Load through the synthesis cache instead of parsing full catalogs
    #[serde(default = "default_true")]
    pub prefer_synthesis: bool,

    #[serde(default)]
    pub fingerprint: HashAlgorithm,

    #[serde(default)]
    pub freshness: FreshnessCheck,

    /// Parallel catalog loads
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_true() -> bool {
    true
}

fn default_workers() -> usize {
    4
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            prefer_synthesis: true,
            fingerprint: HashAlgorithm::default(),
            freshness: FreshnessCheck::default(),
            workers: default_workers(),
        }
    }
}

/// Catalog retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    300
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
        }
    }
}

impl Config {
    /// Serialize to TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Write {
            path: PathBuf::from(DEFAULT_CONFIG_PATH),
            reason: e.to_string(),
        })
    }
}

/// Parse configuration text; `path` is only used in error messages
pub fn parse_config_string(text: &str, path: &Path) -> Result<Config, ConfigError> {
    toml::from_str(text).map_err(|e| syntax_error(path, text, &e))
}

/// Load the configuration file, falling back to defaults when it does not exist
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        debug!("no config file at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_config_string(&text, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::policy::Precedence;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config_string("", Path::new("urpm.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.catalog.prefer_synthesis);
        assert_eq!(config.catalog.workers, 4);
        assert_eq!(config.retrieval.timeout_secs, 300);
        assert_eq!(config.paths.cache_dir, PathBuf::from("/var/cache/urpmi"));
    }

    #[test]
    fn test_partial_config() {
        let text = r#"
[catalog]
prefer_synthesis = false
fingerprint = "sha256"

[resolver]
strict = true
precedence = "obsoletes-first"
locales = ["fr"]
"#;
        let config = parse_config_string(text, Path::new("urpm.toml")).unwrap();
        assert!(!config.catalog.prefer_synthesis);
        assert_eq!(config.catalog.fingerprint, HashAlgorithm::Sha256);
        assert!(config.resolver.strict);
        assert_eq!(config.resolver.precedence, Precedence::ObsoletesFirst);
        assert_eq!(config.resolver.locales, vec!["fr"]);
    }

    #[test]
    fn test_syntax_error_has_line() {
        let text = "[catalog]\nworkers = 2\nprefer_synthesis = maybe\n";
        let err = parse_config_string(text, Path::new("urpm.toml")).unwrap_err();
        match err {
            ConfigError::Syntax { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_to_toml_parses_back() {
        let config = Config::default();
        let text = config.to_toml().unwrap();
        let parsed = parse_config_string(&text, Path::new("urpm.toml")).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("urpm.toml")).unwrap();
        assert_eq!(config, Config::default());
    }
}
