// src/retrieval.rs

//! Catalog retrieval
//!
//! Fetching a medium's catalog is delegated to a [`Retriever`]. The crate
//! ships [`LocalRetriever`] for filesystem origins (plain paths, `file://`
//! and mounted `removable://` media); network transports plug in through the
//! same trait. Every fetch is atomic: the destination is either replaced
//! whole or left untouched.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use crate::medium::Origin;

/// Retrieval failures, reported as-is to the caller
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("retrieval of {origin} failed: {detail}")]
    Failed { origin: String, detail: String },

    #[error("retrieval of {origin} timed out after {}s", .timeout.as_secs())]
    Timeout { origin: String, timeout: Duration },

    #[error("no retriever for {origin}")]
    UnsupportedScheme { origin: String },
}

/// Fetches `origin` into `dest`
pub trait Retriever: Send + Sync {
    fn fetch(&self, origin: &str, dest: &Path) -> Result<(), RetrievalError>;
}

/// Copies catalogs from the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalRetriever;

impl Retriever for LocalRetriever {
    fn fetch(&self, origin: &str, dest: &Path) -> Result<(), RetrievalError> {
        let source = local_source(origin)?;
        debug!("copying {} to {}", source.display(), dest.display());
        copy_atomic(&source, dest).map_err(|e| RetrievalError::Failed {
            origin: origin.to_string(),
            detail: e.to_string(),
        })
    }
}

fn local_source(origin: &str) -> Result<PathBuf, RetrievalError> {
    let unsupported = || RetrievalError::UnsupportedScheme {
        origin: origin.to_string(),
    };
    let parsed = Origin::parse(origin).map_err(|_| unsupported())?;
    parsed.local_path().map(Path::to_path_buf).ok_or_else(unsupported)
}

/// Copy through a temporary file in the destination directory
fn copy_atomic(source: &Path, dest: &Path) -> io::Result<()> {
    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut input = File::open(source)?;
    let mut temp = NamedTempFile::new_in(parent)?;
    io::copy(&mut input, temp.as_file_mut())?;
    temp.as_file().sync_all()?;
    temp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

/// Run `retriever.fetch` with a deadline
///
/// On timeout the fetch keeps running in the background; since fetches are
/// atomic it can at worst complete later.
pub fn fetch_with_timeout(
    retriever: Arc<dyn Retriever>,
    origin: &str,
    dest: &Path,
    timeout: Duration,
) -> Result<(), RetrievalError> {
    let (sender, receiver) = mpsc::channel();
    let (job_origin, job_dest) = (origin.to_string(), dest.to_path_buf());

    thread::Builder::new()
        .name("urpm-fetch".to_string())
        .spawn(move || {
            let _ = sender.send(retriever.fetch(&job_origin, &job_dest));
        })
        .map_err(|e| RetrievalError::Failed {
            origin: origin.to_string(),
            detail: e.to_string(),
        })?;

    match receiver.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            warn!("retrieval of {} timed out", origin);
            Err(RetrievalError::Timeout {
                origin: origin.to_string(),
                timeout,
            })
        }
        Err(RecvTimeoutError::Disconnected) => Err(RetrievalError::Failed {
            origin: origin.to_string(),
            detail: "retrieval thread exited without a result".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct SlowRetriever;

    impl Retriever for SlowRetriever {
        fn fetch(&self, _origin: &str, _dest: &Path) -> Result<(), RetrievalError> {
            thread::sleep(Duration::from_millis(500));
            Ok(())
        }
    }

    #[test]
    fn test_local_copy() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("hdlist.cz");
        fs::write(&source, b"catalog").unwrap();
        let dest = dir.path().join("cache/out.cz");

        LocalRetriever
            .fetch(source.to_str().unwrap(), &dest)
            .unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"catalog");

        let url = format!("file://{}", source.display());
        fs::write(&source, b"changed").unwrap();
        LocalRetriever.fetch(&url, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"changed");
    }

    #[test]
    fn test_failure_leaves_destination_untouched() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("out.cz");
        fs::write(&dest, b"previous").unwrap();

        let missing = dir.path().join("missing.cz");
        let err = LocalRetriever
            .fetch(missing.to_str().unwrap(), &dest)
            .unwrap_err();
        assert!(matches!(err, RetrievalError::Failed { .. }));
        assert_eq!(fs::read(&dest).unwrap(), b"previous");

        let err = LocalRetriever
            .fetch("http://example.org/media/hdlist.cz", &dest)
            .unwrap_err();
        assert!(matches!(err, RetrievalError::UnsupportedScheme { .. }));
    }

    #[test]
    fn test_timeout() {
        let dir = TempDir::new().unwrap();
        let err = fetch_with_timeout(
            Arc::new(SlowRetriever),
            "slow://origin",
            &dir.path().join("x"),
            Duration::from_millis(20),
        )
        .unwrap_err();
        assert!(matches!(err, RetrievalError::Timeout { .. }));

        let ok = fetch_with_timeout(
            Arc::new(SlowRetriever),
            "slow://origin",
            &dir.path().join("x"),
            Duration::from_secs(5),
        );
        assert!(ok.is_ok());
    }
}
