// src/medium/config.rs

//! Persisted media registry (`media.toml`)
//!
//! ```toml
//! max_mount_points = 1
//!
//! [[medium]]
//! name = "main"
//! origin = "/mnt/mirror/main"
//! with = "media_info/hdlist.cz"
//! catalog_path = "/mnt/mirror/main/media_info/hdlist.cz"
//! update = false
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::config::{syntax_error, ConfigError};
use crate::lock::FileLock;

use super::registry::DEFAULT_MAX_MOUNT_POINTS;
use super::{Medium, MediumRegistry};

#[derive(Debug, Serialize, Deserialize)]
struct MediaFile {
    #[serde(default = "default_max_mount_points")]
    max_mount_points: usize,

    #[serde(default, rename = "medium")]
    media: Vec<Medium>,
}

fn default_max_mount_points() -> usize {
    DEFAULT_MAX_MOUNT_POINTS
}

/// Parse registry text; `path` is only used in error messages
pub fn parse_registry(
    text: &str,
    path: &Path,
    catalog_dir: impl Into<PathBuf>,
) -> Result<MediumRegistry, ConfigError> {
    let file: MediaFile = toml::from_str(text).map_err(|e| syntax_error(path, text, &e))?;

    let mut registry = MediumRegistry::new(catalog_dir).with_max_mount_points(file.max_mount_points);
    for medium in file.media {
        registry.insert_loaded(medium)?;
    }
    Ok(registry)
}

/// Load the registry, starting empty when the file does not exist yet
pub fn load_registry(
    path: &Path,
    catalog_dir: impl Into<PathBuf>,
) -> Result<MediumRegistry, ConfigError> {
    if !path.exists() {
        debug!("no media file at {}, starting empty", path.display());
        return Ok(MediumRegistry::new(catalog_dir));
    }

    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    let registry = parse_registry(&text, path, catalog_dir)?;
    debug!("read {} media from {}", registry.len(), path.display());
    Ok(registry)
}

/// Serialize the registry to TOML
pub fn registry_to_toml(registry: &MediumRegistry) -> Result<String, toml::ser::Error> {
    let file = MediaFile {
        max_mount_points: registry.max_mount_points(),
        media: registry.media().to_vec(),
    };
    toml::to_string_pretty(&file)
}

/// Write the registry back atomically
///
/// The file is replaced by renaming a fully written temporary file while
/// holding `<path>.lock`.
pub fn save_registry(registry: &MediumRegistry, path: &Path) -> Result<(), ConfigError> {
    let fail = |reason: String| ConfigError::Write {
        path: path.to_path_buf(),
        reason,
    };

    let text = registry_to_toml(registry).map_err(|e| fail(e.to_string()))?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| fail(e.to_string()))?;

    let mut lock_name = path.as_os_str().to_owned();
    lock_name.push(".lock");
    let _lock = FileLock::acquire(PathBuf::from(lock_name)).map_err(|e| fail(e.to_string()))?;

    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| fail(e.to_string()))?;
    tmp.write_all(text.as_bytes())
        .map_err(|e| fail(e.to_string()))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| fail(e.to_string()))?;
    tmp.persist(path).map_err(|e| fail(e.error.to_string()))?;

    info!("write config file [{}]", path.display());
    Ok(())
}
