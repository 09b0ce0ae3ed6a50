// src/medium/mod.rs

//! Medium Registry
//!
//! A medium is a configured package source: a local directory, a remote
//! mirror or a removable device, together with the catalog describing it.
//! The registry owns the set of media, enforces name and catalog uniqueness
//! and answers which media are active for a given request.

pub mod config;
pub mod registry;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ConfigError;

pub use registry::MediumRegistry;

/// Relative catalog path used when a medium is added without `with`
pub const DEFAULT_CATALOG: &str = "media_info/hdlist.cz";

/// A configured medium
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medium {
    pub name: String,
    /// Origin URL or path (`file://`, `http://`, `ftp://`, `removable://`, bare path)
    pub origin: String,
    /// Catalog location relative to the origin
    #[serde(rename = "with")]
    pub with_path: String,
    /// Local path the catalog is read from
    pub catalog_path: PathBuf,
    #[serde(default)]
    pub removable: bool,
    #[serde(default)]
    pub update: bool,
    #[serde(default)]
    pub ignored: bool,
    #[serde(default = "default_selected")]
    pub selected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_point: Option<PathBuf>,
    /// The catalog already is a synthesis; no full catalog exists
    #[serde(default)]
    pub synthesis_only: bool,
    /// An empty catalog is not an error
    #[serde(default)]
    pub allow_empty: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub modified: bool,
}

fn default_selected() -> bool {
    true
}

impl Medium {
    pub fn is_removable(&self) -> bool {
        self.removable
    }

    pub fn is_update(&self) -> bool {
        self.update
    }

    pub fn is_ignored(&self) -> bool {
        self.ignored
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Where the catalog is fetched from, when the origin is not local
    pub fn remote_catalog_url(&self) -> Option<String> {
        match Origin::parse(&self.origin).ok()? {
            Origin::Remote(url) => base_url(&url).join(&self.with_path).ok().map(String::from),
            _ => None,
        }
    }
}

/// Options for adding a medium
#[derive(Debug, Clone, Default)]
pub struct MediumOptions {
    /// Catalog path relative to the origin (`with <path>`)
    pub with_path: Option<String>,
    pub update: bool,
    pub ignored: bool,
    pub synthesis_only: bool,
    pub allow_empty: bool,
    /// Mount point of a removable medium; defaults to the origin path
    pub mount_point: Option<PathBuf>,
}

/// Parsed medium origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Local directory (`file://` or a bare path)
    Local(PathBuf),
    /// Device path of a removable medium (`removable://`)
    Removable(PathBuf),
    /// Remote mirror (`http://`, `https://`, `ftp://`)
    Remote(Url),
}

impl Origin {
    pub fn parse(origin: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidOrigin {
            origin: origin.to_string(),
            reason: reason.to_string(),
        };

        if origin.trim().is_empty() {
            return Err(invalid("empty origin"));
        }

        if let Some(path) = origin.strip_prefix("removable://") {
            if path.is_empty() {
                return Err(invalid("missing device path"));
            }
            return Ok(Origin::Removable(absolute(path)));
        }

        if !origin.contains("://") {
            return Ok(Origin::Local(PathBuf::from(origin)));
        }

        let url = Url::parse(origin).map_err(|e| invalid(&e.to_string()))?;
        match url.scheme() {
            "file" => url
                .to_file_path()
                .map(Origin::Local)
                .map_err(|_| invalid("not a local path")),
            "http" | "https" | "ftp" => Ok(Origin::Remote(url)),
            other => Err(invalid(&format!("unsupported scheme '{other}'"))),
        }
    }

    pub fn is_removable(&self) -> bool {
        matches!(self, Origin::Removable(_))
    }

    /// Local directory backing this origin, if any
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            Origin::Local(path) | Origin::Removable(path) => Some(path),
            Origin::Remote(_) => None,
        }
    }

    /// Name used for a medium added without one: the last path component
    /// of the origin, or the host name for a bare remote root
    pub fn derived_name(&self) -> Option<String> {
        let last_component = |path: &Path| {
            path.components()
                .filter_map(|c| match c {
                    std::path::Component::Normal(s) => s.to_str().map(str::to_string),
                    _ => None,
                })
                .next_back()
        };

        match self {
            Origin::Local(path) | Origin::Removable(path) => last_component(path),
            Origin::Remote(url) => url
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
                .map(str::to_string)
                .or_else(|| url.host_str().map(str::to_string)),
        }
    }
}

fn absolute(path: &str) -> PathBuf {
    if path.starts_with('/') {
        PathBuf::from(path)
    } else {
        PathBuf::from("/").join(path)
    }
}

/// Directory URL, so that joining a relative catalog path keeps the last segment
fn base_url(url: &Url) -> Url {
    let mut base = url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}
