// src/lib.rs

//! urpm catalog and dependency resolution engine
//!
//! Package media are configured in a registry, their catalogs are loaded
//! (through an on-disk synthesis cache) into an index of capabilities, and
//! the resolver expands a request into an ordered install/remove plan for
//! an external installer.
//!
//! # Architecture
//!
//! - Medium registry: configured media and their flags, persisted as TOML
//! - Catalog store: parsing, synthesis derivation and caching, parallel loads
//! - Capability index: immutable snapshots shared as `Arc<CapabilityIndex>`
//! - Resolver: greedy closure with obsoletes, pruning and SCC ordering
//! - Session: explicit init from configuration, explicit flush on exit

pub mod catalog;
pub mod compression;
pub mod config;
pub mod depslist;
mod error;
pub mod hash;
pub mod index;
pub mod lock;
pub mod medium;
pub mod query;
pub mod resolver;
pub mod retrieval;
pub mod session;
pub mod version;

pub use catalog::{
    Capability, Catalog, CatalogData, CatalogError, CatalogStore, PackageRecord, RecordRef,
    StoreOptions,
};
pub use config::{load_config, Config, ConfigError, DEFAULT_CONFIG_PATH};
pub use depslist::{update_depslist, Depslist, DepslistReport};
pub use error::{Error, Result};
pub use hash::{Fingerprint, FreshnessCheck, HashAlgorithm};
pub use index::{CapabilityIndex, IndexError};
pub use medium::{Medium, MediumOptions, MediumRegistry, Origin};
pub use query::{what_provides, Query, QueryField, QueryMatch};
pub use resolver::{
    Action, InstalledSet, Outcome, Precedence, Reason, Request, Resolution, ResolutionPlan,
    ResolveError, ResolvePolicy, Resolver, Selection,
};
pub use retrieval::{fetch_with_timeout, LocalRetriever, RetrievalError, Retriever};
pub use session::Session;
pub use version::{RpmVersion, VersionConstraint, VersionError};
