// src/error.rs

//! Crate-level error type
//!
//! Each component owns a `thiserror` enum; [`Error`] aggregates them so that
//! session-level operations can use a single `Result`.

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::hash::HashError;
use crate::index::IndexError;
use crate::resolver::ResolveError;
use crate::retrieval::RetrievalError;
use crate::version::VersionError;

/// Errors surfaced by session-level operations
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error("I/O error on {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    #[error("no full media list was found")]
    NoFullMedia,
}

pub type Result<T> = std::result::Result<T, Error>;
