// src/catalog/mod.rs

//! Catalog Store
//!
//! A medium publishes its packages as a catalog: either a full catalog
//! (`hdlist`) carrying descriptions and complete file lists, or a synthesis
//! carrying only what dependency resolution needs. The store parses either
//! form into shared [`PackageRecord`]s, derives and caches syntheses on disk
//! and keeps per-medium bookkeeping (record counts, dirty flags).

pub mod format;
pub mod record;
pub mod store;
pub mod synthesis;

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::compression::CompressionError;
use crate::hash::Fingerprint;

pub use record::{Capability, PackageRecord, RecordRef};
pub use store::{CatalogStore, StoreOptions};

/// Errors raised while loading or deriving catalogs
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("unable to read catalog of medium \"{medium}\" at {path}: {source}")]
    Unreadable {
        medium: String,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unable to decompress catalog of medium \"{medium}\": {source}")]
    Compression {
        medium: String,
        source: CompressionError,
    },

    #[error("unable to parse correctly [{value}] on value in medium \"{medium}\" line {line}: {reason}")]
    Malformed {
        medium: String,
        line: usize,
        value: String,
        reason: String,
    },

    #[error("no headers found in medium \"{medium}\"")]
    NoHeadersFound { medium: String },

    #[error("unable to build synthesis file for medium \"{medium}\": {reason}")]
    SynthesisBuildFailed { medium: String, reason: String },

    #[error("medium \"{medium}\" has no full catalog")]
    NoFullCatalog { medium: String },
}

/// Records of one medium together with where they came from
#[derive(Debug, Clone)]
pub struct CatalogData {
    pub medium: String,
    pub records: Vec<RecordRef>,
    /// Source fingerprint recorded in a synthesis header
    pub source: Option<Fingerprint>,
}

impl CatalogData {
    pub fn new(medium: impl Into<String>, records: Vec<PackageRecord>) -> Self {
        Self {
            medium: medium.into(),
            records: records.into_iter().map(Arc::new).collect(),
            source: None,
        }
    }
}

/// A loaded catalog, dispatched on its form at load time
#[derive(Debug, Clone)]
pub enum Catalog {
    Full(CatalogData),
    Synthesis(CatalogData),
}

impl Catalog {
    fn data(&self) -> &CatalogData {
        match self {
            Catalog::Full(data) | Catalog::Synthesis(data) => data,
        }
    }

    pub fn medium(&self) -> &str {
        &self.data().medium
    }

    pub fn records(&self) -> &[RecordRef] {
        &self.data().records
    }

    pub fn source(&self) -> Option<&Fingerprint> {
        self.data().source.as_ref()
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    pub fn is_full(&self) -> bool {
        matches!(self, Catalog::Full(_))
    }

    /// Look up a record by `name-version-release.arch`
    pub fn find(&self, fullname: &str) -> Option<&RecordRef> {
        self.records().iter().find(|r| r.fullname() == fullname)
    }
}
