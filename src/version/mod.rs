// src/version/mod.rs

//! Version handling and constraint satisfaction for package dependencies
//!
//! This module provides version parsing and comparison for RPM-style versions,
//! including support for epoch:version-release format and the sense-flag
//! constraints found in catalog capabilities (`libfoo[>= 1.2-3]`).

use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Errors raised while parsing versions or constraints
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("Invalid epoch in version '{version}'")]
    InvalidEpoch { version: String },

    #[error("Empty version component in '{0}'")]
    EmptyVersion(String),

    #[error("Unknown constraint operator in '{0}'")]
    UnknownOperator(String),
}

/// A parsed RPM version with epoch, version, and release components
#[derive(Debug, Clone)]
pub struct RpmVersion {
    pub epoch: u64,
    pub version: String,
    pub release: Option<String>,
}

impl RpmVersion {
    /// Parse an RPM version string
    ///
    /// Format: [epoch:]version[-release]
    /// Examples:
    /// - "1.2.3" → epoch=0, version="1.2.3", release=None
    /// - "2:1.2.3" → epoch=2, version="1.2.3", release=None
    /// - "1.2.3-4mdk" → epoch=0, version="1.2.3", release=Some("4mdk")
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let s = s.trim();
        let (epoch_str, rest) = match s.split_once(':') {
            Some((e, r)) => (e, r),
            None => ("0", s),
        };

        let epoch = if epoch_str.is_empty() {
            0
        } else {
            epoch_str
                .parse::<u64>()
                .map_err(|_| VersionError::InvalidEpoch {
                    version: s.to_string(),
                })?
        };

        // Release is everything after the last dash; versions never contain one
        let (version, release) = match rest.rsplit_once('-') {
            Some((v, r)) if !r.is_empty() => (v.to_string(), Some(r.to_string())),
            Some((v, _)) => (v.to_string(), None),
            None => (rest.to_string(), None),
        };

        if version.is_empty() {
            return Err(VersionError::EmptyVersion(s.to_string()));
        }

        Ok(Self {
            epoch,
            version,
            release,
        })
    }

    /// Build a version from already separated components
    pub fn from_parts(epoch: u64, version: &str, release: &str) -> Self {
        Self {
            epoch,
            version: version.to_string(),
            release: (!release.is_empty()).then(|| release.to_string()),
        }
    }

    /// Compare two versions the way dependency matching does: a missing
    /// release on either side matches any release.
    pub fn compare_loose(&self, other: &RpmVersion) -> Ordering {
        match self.epoch.cmp(&other.epoch) {
            Ordering::Equal => {}
            ord => return ord,
        }

        match rpmvercmp(&self.version, &other.version) {
            Ordering::Equal => {}
            ord => return ord,
        }

        match (&self.release, &other.release) {
            (Some(a), Some(b)) => rpmvercmp(a, b),
            _ => Ordering::Equal,
        }
    }

    /// Total comparison used for ordering candidates
    pub fn compare(&self, other: &RpmVersion) -> Ordering {
        match self.compare_loose(other) {
            Ordering::Equal => {}
            ord => return ord,
        }

        // A version with a release sorts after the same version without one
        match (&self.release, &other.release) {
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            _ => Ordering::Equal,
        }
    }
}

impl fmt::Display for RpmVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.version)?;
        if let Some(ref release) = self.release {
            write!(f, "-{}", release)?;
        }
        Ok(())
    }
}

impl PartialEq for RpmVersion {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for RpmVersion {}

impl Ord for RpmVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for RpmVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare two version (or release) strings segment by segment.
///
/// Numeric segments compare numerically, alphabetic segments lexically, and
/// a numeric segment is always newer than an alphabetic one. `~` sorts before
/// everything (pre-releases), `^` sorts after the base version but before
/// any further segment.
pub fn rpmvercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let mut one = a.as_bytes();
    let mut two = b.as_bytes();

    while !one.is_empty() || !two.is_empty() {
        one = skip_separators(one);
        two = skip_separators(two);

        if one.first() == Some(&b'~') || two.first() == Some(&b'~') {
            if one.first() != Some(&b'~') {
                return Ordering::Greater;
            }
            if two.first() != Some(&b'~') {
                return Ordering::Less;
            }
            one = &one[1..];
            two = &two[1..];
            continue;
        }

        if one.first() == Some(&b'^') || two.first() == Some(&b'^') {
            if one.is_empty() {
                return Ordering::Less;
            }
            if two.is_empty() {
                return Ordering::Greater;
            }
            if one[0] != b'^' {
                return Ordering::Greater;
            }
            if two[0] != b'^' {
                return Ordering::Less;
            }
            one = &one[1..];
            two = &two[1..];
            continue;
        }

        if one.is_empty() || two.is_empty() {
            break;
        }

        let numeric = one[0].is_ascii_digit();
        let (seg_one, rest_one) = split_segment(one, numeric);
        let (seg_two, rest_two) = split_segment(two, numeric);

        // Segments of different kinds: numeric is newer
        if seg_two.is_empty() {
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let ord = if numeric {
            let seg_one = trim_leading_zeros(seg_one);
            let seg_two = trim_leading_zeros(seg_two);
            seg_one
                .len()
                .cmp(&seg_two.len())
                .then_with(|| seg_one.cmp(seg_two))
        } else {
            seg_one.cmp(seg_two)
        };

        if ord != Ordering::Equal {
            return ord;
        }

        one = rest_one;
        two = rest_two;
    }

    match (one.is_empty(), two.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        _ => Ordering::Greater,
    }
}

fn skip_separators(s: &[u8]) -> &[u8] {
    let start = s
        .iter()
        .position(|c| c.is_ascii_alphanumeric() || *c == b'~' || *c == b'^')
        .unwrap_or(s.len());
    &s[start..]
}

fn split_segment(s: &[u8], numeric: bool) -> (&[u8], &[u8]) {
    let end = s
        .iter()
        .position(|c| {
            if numeric {
                !c.is_ascii_digit()
            } else {
                !c.is_ascii_alphabetic()
            }
        })
        .unwrap_or(s.len());
    s.split_at(end)
}

fn trim_leading_zeros(s: &[u8]) -> &[u8] {
    let start = s.iter().position(|c| *c != b'0').unwrap_or(s.len());
    &s[start..]
}

/// Version constraint operators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// Any version is acceptable
    Any,
    /// Exact version match
    Exact(RpmVersion),
    /// Greater than
    GreaterThan(RpmVersion),
    /// Greater than or equal
    GreaterOrEqual(RpmVersion),
    /// Less than
    LessThan(RpmVersion),
    /// Less than or equal
    LessOrEqual(RpmVersion),
}

impl VersionConstraint {
    /// Parse a version constraint string
    ///
    /// Examples:
    /// - ">= 1.2.3" → GreaterOrEqual(1.2.3)
    /// - "< 2.0.0" → LessThan(2.0.0)
    /// - "== 1.5.0-2mdk" → Exact(1.5.0-2mdk)
    /// - "*" or "" → Any
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let s = s.trim();

        if s.is_empty() || s == "*" {
            return Ok(VersionConstraint::Any);
        }

        if let Some(rest) = s.strip_prefix(">=") {
            Ok(VersionConstraint::GreaterOrEqual(RpmVersion::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix("<=") {
            Ok(VersionConstraint::LessOrEqual(RpmVersion::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix("==") {
            Ok(VersionConstraint::Exact(RpmVersion::parse(rest)?))
        } else if s.starts_with("!=") {
            Err(VersionError::UnknownOperator(s.to_string()))
        } else if let Some(rest) = s.strip_prefix('>') {
            Ok(VersionConstraint::GreaterThan(RpmVersion::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix('<') {
            Ok(VersionConstraint::LessThan(RpmVersion::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix('=') {
            Ok(VersionConstraint::Exact(RpmVersion::parse(rest)?))
        } else {
            // No operator means exact match
            Ok(VersionConstraint::Exact(RpmVersion::parse(s)?))
        }
    }

    /// Check if a version satisfies this constraint
    pub fn satisfies(&self, version: &RpmVersion) -> bool {
        match self {
            VersionConstraint::Any => true,
            VersionConstraint::Exact(v) => version.compare_loose(v) == Ordering::Equal,
            VersionConstraint::GreaterThan(v) => version.compare_loose(v) == Ordering::Greater,
            VersionConstraint::GreaterOrEqual(v) => version.compare_loose(v) != Ordering::Less,
            VersionConstraint::LessThan(v) => version.compare_loose(v) == Ordering::Less,
            VersionConstraint::LessOrEqual(v) => version.compare_loose(v) != Ordering::Greater,
        }
    }

    /// Check if the version ranges of two constraints intersect.
    ///
    /// This is how a versioned provide is matched against a versioned
    /// requirement; an unversioned side always overlaps.
    pub fn overlaps(&self, other: &VersionConstraint) -> bool {
        let (Some((va, a_less, a_eq, a_greater)), Some((vb, b_less, b_eq, b_greater))) =
            (self.bounds(), other.bounds())
        else {
            return true;
        };

        match va.compare_loose(vb) {
            Ordering::Less => a_greater || b_less,
            Ordering::Greater => a_less || b_greater,
            Ordering::Equal => (a_eq && b_eq) || (a_less && b_less) || (a_greater && b_greater),
        }
    }

    /// The version and (less, equal, greater) sense flags, None for Any
    fn bounds(&self) -> Option<(&RpmVersion, bool, bool, bool)> {
        match self {
            VersionConstraint::Any => None,
            VersionConstraint::Exact(v) => Some((v, false, true, false)),
            VersionConstraint::GreaterThan(v) => Some((v, false, false, true)),
            VersionConstraint::GreaterOrEqual(v) => Some((v, false, true, true)),
            VersionConstraint::LessThan(v) => Some((v, true, false, false)),
            VersionConstraint::LessOrEqual(v) => Some((v, true, true, false)),
        }
    }

    /// The version this constraint is anchored on, if any
    pub fn version(&self) -> Option<&RpmVersion> {
        self.bounds().map(|(v, ..)| v)
    }

    pub fn is_any(&self) -> bool {
        matches!(self, VersionConstraint::Any)
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Any => write!(f, "*"),
            VersionConstraint::Exact(v) => write!(f, "== {}", v),
            VersionConstraint::GreaterThan(v) => write!(f, "> {}", v),
            VersionConstraint::GreaterOrEqual(v) => write!(f, ">= {}", v),
            VersionConstraint::LessThan(v) => write!(f, "< {}", v),
            VersionConstraint::LessOrEqual(v) => write!(f, "<= {}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> RpmVersion {
        RpmVersion::parse(s).unwrap()
    }

    #[test]
    fn test_rpm_version_parse_simple() {
        let v = RpmVersion::parse("1.2.3").unwrap();
        assert_eq!(v.epoch, 0);
        assert_eq!(v.version, "1.2.3");
        assert_eq!(v.release, None);
    }

    #[test]
    fn test_rpm_version_parse_full() {
        let v = RpmVersion::parse("1:2.3.4-5mdk").unwrap();
        assert_eq!(v.epoch, 1);
        assert_eq!(v.version, "2.3.4");
        assert_eq!(v.release, Some("5mdk".to_string()));
    }

    #[test]
    fn test_rpm_version_parse_empty_epoch() {
        let v = RpmVersion::parse(":1.02.208-2").unwrap();
        assert_eq!(v.epoch, 0);
        assert_eq!(v.version, "1.02.208");
    }

    #[test]
    fn test_rpm_version_parse_errors() {
        assert!(matches!(
            RpmVersion::parse("x:1.0"),
            Err(VersionError::InvalidEpoch { .. })
        ));
        assert!(matches!(
            RpmVersion::parse("-1"),
            Err(VersionError::EmptyVersion(_))
        ));
    }

    #[test]
    fn test_rpmvercmp_segments() {
        assert_eq!(rpmvercmp("1.0", "1.0"), Ordering::Equal);
        assert_eq!(rpmvercmp("1.0", "1.0.1"), Ordering::Less);
        assert_eq!(rpmvercmp("2.10", "2.9"), Ordering::Greater);
        assert_eq!(rpmvercmp("1.001", "1.1"), Ordering::Equal);
        assert_eq!(rpmvercmp("1.0a", "1.0"), Ordering::Greater);
        assert_eq!(rpmvercmp("1a", "1.1"), Ordering::Less);
        assert_eq!(rpmvercmp("5mdk", "12mdk"), Ordering::Less);
    }

    #[test]
    fn test_rpmvercmp_tilde_and_caret() {
        assert_eq!(rpmvercmp("1.0~rc1", "1.0"), Ordering::Less);
        assert_eq!(rpmvercmp("1.0~rc1", "1.0~rc2"), Ordering::Less);
        assert_eq!(rpmvercmp("1.0^git1", "1.0"), Ordering::Greater);
        assert_eq!(rpmvercmp("1.0^git1", "1.0.1"), Ordering::Less);
    }

    #[test]
    fn test_rpm_version_compare_epochs() {
        assert!(v("1:1.0.0") > v("0:2.0.0"));
    }

    #[test]
    fn test_rpm_version_compare_releases() {
        assert!(v("1.2.3-1mdk") < v("1.2.3-2mdk"));
        assert!(v("1.2.3") < v("1.2.3-1"));
        assert_eq!(v("1.2.3").compare_loose(&v("1.2.3-7")), Ordering::Equal);
    }

    #[test]
    fn test_version_constraint_parse() {
        assert_eq!(
            VersionConstraint::parse(">= 1.2").unwrap(),
            VersionConstraint::GreaterOrEqual(v("1.2"))
        );
        assert_eq!(
            VersionConstraint::parse("== 1.2-3").unwrap(),
            VersionConstraint::Exact(v("1.2-3"))
        );
        assert_eq!(VersionConstraint::parse("*").unwrap(), VersionConstraint::Any);
        assert!(VersionConstraint::parse("!= 1.0").is_err());
    }

    #[test]
    fn test_version_constraint_satisfies_ignores_missing_release() {
        let c = VersionConstraint::parse(">= 1.2").unwrap();
        assert!(c.satisfies(&v("1.2-1mdk")));
        assert!(c.satisfies(&v("1.3")));
        assert!(!c.satisfies(&v("1.1-9")));
    }

    #[test]
    fn test_version_constraint_overlaps() {
        let provide = VersionConstraint::parse("== 2.0-1").unwrap();
        assert!(provide.overlaps(&VersionConstraint::parse(">= 1.0").unwrap()));
        assert!(!provide.overlaps(&VersionConstraint::parse("< 2.0").unwrap()));
        assert!(provide.overlaps(&VersionConstraint::parse("<= 2.0").unwrap()));
        assert!(provide.overlaps(&VersionConstraint::Any));

        let lower = VersionConstraint::parse("< 1.0").unwrap();
        let upper = VersionConstraint::parse("> 2.0").unwrap();
        assert!(!lower.overlaps(&upper));
        assert!(upper.overlaps(&VersionConstraint::parse(">= 1.0").unwrap()));
    }

    #[test]
    fn test_version_constraint_display() {
        assert_eq!(
            VersionConstraint::parse(">=1.2.0").unwrap().to_string(),
            ">= 1.2.0"
        );
        assert_eq!(
            VersionConstraint::parse("2:1.0-1").unwrap().to_string(),
            "== 2:1.0-1"
        );
    }
}
