// src/hash.rs

//! Hashing and source fingerprints for catalog cache invalidation
//!
//! Two algorithms are supported:
//! - **SHA-256**: cryptographic, matches checksums published by mirrors
//! - **XXH128**: non-cryptographic, very fast, the default for fingerprints
//!
//! A [`Fingerprint`] records what a synthesis was derived from (size, mtime
//! and content digest of the source catalog). A cached synthesis is only
//! reused while the recorded fingerprint matches the current source.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;
use std::time::UNIX_EPOCH;
use thiserror::Error;
use xxhash_rust::xxh3::Xxh3;

/// Hash algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-256 (256-bit cryptographic hash)
    Sha256,

    /// XXH128 (128-bit non-cryptographic hash)
    #[default]
    Xxh128,
}

impl HashAlgorithm {
    /// Get the hash output length as a hex string
    #[inline]
    pub const fn hex_len(&self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Xxh128 => 32,
        }
    }

    /// Get the algorithm name as a string
    #[inline]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Xxh128 => "xxh128",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Self::Sha256),
            "xxh128" | "xxhash" | "xxh3" => Ok(Self::Xxh128),
            _ => Err(HashError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Hash computation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashError {
    #[error("unknown hash algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("invalid hash length: expected {expected}, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("invalid hex in hash: {0}")]
    InvalidHex(String),

    #[error("malformed fingerprint: {0}")]
    MalformedFingerprint(String),
}

/// A hash value with its algorithm
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HashValue {
    pub algorithm: HashAlgorithm,
    /// The hash value as a lowercase hex string
    pub value: String,
}

impl HashValue {
    /// Create a new hash value, validating length and hex digits
    pub fn new(algorithm: HashAlgorithm, value: impl Into<String>) -> Result<Self, HashError> {
        let value = value.into();
        let expected = algorithm.hex_len();

        if value.len() != expected {
            return Err(HashError::InvalidLength {
                expected,
                got: value.len(),
            });
        }

        if hex::decode(&value).is_err() {
            return Err(HashError::InvalidHex(value));
        }

        Ok(Self {
            algorithm,
            value: value.to_lowercase(),
        })
    }

    /// Parse a prefixed hash string (e.g., "xxh128:abc123...")
    pub fn parse_prefixed(s: &str) -> Result<Self, HashError> {
        let (algo, hash) = s
            .split_once(':')
            .ok_or_else(|| HashError::MalformedFingerprint(s.to_string()))?;
        Self::new(algo.parse()?, hash)
    }

    /// Format as a prefixed string (e.g., "xxh128:abc123...")
    pub fn to_prefixed_string(&self) -> String {
        format!("{}:{}", self.algorithm.name(), self.value)
    }
}

impl fmt::Display for HashValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Streaming hasher over either algorithm
pub struct Hasher {
    algorithm: HashAlgorithm,
    state: HasherState,
}

enum HasherState {
    Sha256(Sha256),
    Xxh128(Box<Xxh3>),
}

impl Hasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        let state = match algorithm {
            HashAlgorithm::Sha256 => HasherState::Sha256(Sha256::new()),
            HashAlgorithm::Xxh128 => HasherState::Xxh128(Box::new(Xxh3::new())),
        };
        Self { algorithm, state }
    }

    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            HasherState::Sha256(hasher) => hasher.update(data),
            HasherState::Xxh128(hasher) => hasher.update(data),
        }
    }

    pub fn finalize(self) -> HashValue {
        let value = match self.state {
            HasherState::Sha256(hasher) => format!("{:x}", hasher.finalize()),
            HasherState::Xxh128(hasher) => format!("{:032x}", hasher.digest128()),
        };
        HashValue {
            algorithm: self.algorithm,
            value,
        }
    }
}

/// Compute the hash of a byte slice
pub fn hash_bytes(algorithm: HashAlgorithm, data: &[u8]) -> HashValue {
    let mut hasher = Hasher::new(algorithm);
    hasher.update(data);
    hasher.finalize()
}

/// Compute the hash of data from a reader
pub fn hash_reader<R: Read>(algorithm: HashAlgorithm, reader: &mut R) -> io::Result<HashValue> {
    let mut hasher = Hasher::new(algorithm);
    let mut buffer = [0u8; 8192];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hasher.finalize())
}

/// How a recorded fingerprint is compared with the current source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FreshnessCheck {
    /// Size and modification time must match
    Metadata,
    /// Size and content digest must match (mtime is ignored)
    #[default]
    Content,
}

/// Identity of a source catalog at the time a synthesis was derived from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub size: u64,
    pub mtime_secs: u64,
    pub mtime_nanos: u32,
    pub digest: HashValue,
}

impl Fingerprint {
    /// Fingerprint a file on disk
    pub fn of_file(path: &Path, algorithm: HashAlgorithm) -> io::Result<Self> {
        let mut file = File::open(path)?;
        let meta = file.metadata()?;
        let mtime = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let digest = hash_reader(algorithm, &mut file)?;

        Ok(Self {
            size: meta.len(),
            mtime_secs: mtime.as_secs(),
            mtime_nanos: mtime.subsec_nanos(),
            digest,
        })
    }

    /// Check whether `current` still describes the source this fingerprint was taken from
    pub fn is_fresh(&self, current: &Fingerprint, check: FreshnessCheck) -> bool {
        if self.size != current.size {
            return false;
        }
        match check {
            FreshnessCheck::Metadata => {
                self.mtime_secs == current.mtime_secs && self.mtime_nanos == current.mtime_nanos
            }
            FreshnessCheck::Content => self.digest == current.digest,
        }
    }

    /// Encode as the `@`-separated fields used in synthesis headers
    pub fn to_fields(&self) -> String {
        format!(
            "{}@{}.{:09}@{}",
            self.size,
            self.mtime_secs,
            self.mtime_nanos,
            self.digest.to_prefixed_string()
        )
    }

    /// Decode from `size`, `secs.nanos` and `algo:hex` fields
    pub fn from_fields(size: &str, mtime: &str, digest: &str) -> Result<Self, HashError> {
        let malformed = || HashError::MalformedFingerprint(format!("{size}@{mtime}@{digest}"));

        let size = size.parse().map_err(|_| malformed())?;
        let (secs, nanos) = mtime.split_once('.').ok_or_else(malformed)?;

        Ok(Self {
            size,
            mtime_secs: secs.parse().map_err(|_| malformed())?,
            mtime_nanos: nanos.parse().map_err(|_| malformed())?,
            digest: HashValue::parse_prefixed(digest)?,
        })
    }
}
