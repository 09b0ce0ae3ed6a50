// src/catalog/record.rs

//! Package records and capabilities as found in media catalogs

use std::fmt;
use std::sync::Arc;

use crate::version::{RpmVersion, VersionConstraint, VersionError};

/// A named capability with an optional version range
///
/// Catalogs write capabilities as `name[>= 1.0-1]`; on the command line the
/// same capability is spelled `name >= 1.0-1`. Both forms are accepted by
/// [`Capability::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    pub name: String,
    pub constraint: VersionConstraint,
}

impl Capability {
    /// A capability matching any version of `name`
    pub fn unversioned(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint: VersionConstraint::Any,
        }
    }

    pub fn new(name: impl Into<String>, constraint: VersionConstraint) -> Self {
        Self {
            name: name.into(),
            constraint,
        }
    }

    /// Parse either the bracketed catalog form or the spaced command-line form
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(VersionError::EmptyVersion(s.to_string()));
        }

        if let Some(stripped) = s.strip_suffix(']')
            && let Some((name, range)) = stripped.split_once('[')
        {
            return Ok(Self::new(name, VersionConstraint::parse(range)?));
        }

        match s.split_once(char::is_whitespace) {
            Some((name, range)) => Ok(Self::new(name, VersionConstraint::parse(range)?)),
            None => Ok(Self::unversioned(s)),
        }
    }

    /// File capabilities are absolute paths
    pub fn is_file(&self) -> bool {
        self.name.starts_with('/')
    }

    /// `rpmlib(...)` capabilities are provided by rpm itself
    pub fn is_rpmlib(&self) -> bool {
        self.name.starts_with("rpmlib(")
    }

    /// Does the provided capability `provide` satisfy this requirement?
    pub fn is_satisfied_by(&self, provide: &Capability) -> bool {
        self.name == provide.name && self.constraint.overlaps(&provide.constraint)
    }

    /// Render in the command-line form (`name >= 1.0`)
    pub fn to_display_string(&self) -> String {
        if self.constraint.is_any() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.constraint)
        }
    }
}

impl fmt::Display for Capability {
    /// Catalog form (`name[>= 1.0]`)
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.constraint.is_any() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}[{}]", self.name, self.constraint)
        }
    }
}

/// Sort capabilities by their catalog form and drop duplicates
pub fn normalize_capabilities(caps: &mut Vec<Capability>) {
    caps.sort_by_cached_key(|c| c.to_string());
    caps.dedup_by(|a, b| a.to_string() == b.to_string());
}

/// One package as described by a catalog
///
/// Records are immutable once loaded and shared as `Arc<PackageRecord>`
/// between the catalog, the index and resolution plans.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackageRecord {
    pub name: String,
    pub epoch: u64,
    pub version: String,
    pub release: String,
    pub arch: String,
    pub size: u64,
    pub group: String,
    pub summary: String,
    pub description: String,
    pub provides: Vec<Capability>,
    pub requires: Vec<Capability>,
    pub conflicts: Vec<Capability>,
    pub obsoletes: Vec<Capability>,
    pub files: Vec<String>,
    /// `files` only holds the files other packages depend on (synthesis form)
    pub partial_files: bool,
    /// Name of the medium this record was loaded from
    pub medium: String,
}

impl PackageRecord {
    /// `name-version-release.arch`, the identity of a record within a medium
    pub fn fullname(&self) -> String {
        format!("{}-{}-{}.{}", self.name, self.version, self.release, self.arch)
    }

    /// File name of the package on its medium
    pub fn filename(&self) -> String {
        format!("{}.rpm", self.fullname())
    }

    pub fn evr(&self) -> RpmVersion {
        RpmVersion::from_parts(self.epoch, &self.version, &self.release)
    }

    /// The implicit `name == epoch:version-release` provide
    pub fn self_provide(&self) -> Capability {
        Capability::new(self.name.clone(), VersionConstraint::Exact(self.evr()))
    }

    /// Does this package satisfy `requirement`, through its own name, an
    /// explicit provide or a listed file?
    pub fn satisfies(&self, requirement: &Capability) -> bool {
        if requirement.is_file() && self.files.iter().any(|f| *f == requirement.name) {
            return true;
        }
        requirement.is_satisfied_by(&self.self_provide())
            || self.provides.iter().any(|p| requirement.is_satisfied_by(p))
    }

    /// Is the complete file list of this package known?
    pub fn has_file_list(&self) -> bool {
        !self.partial_files && !self.files.is_empty()
    }

    /// Does any entry of `caps` match this package? Used for conflicts and obsoletes.
    pub fn matched_by(&self, caps: &[Capability]) -> bool {
        caps.iter().any(|c| self.satisfies(c))
    }
}

impl fmt::Display for PackageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fullname())
    }
}

/// Split `name-version-release.arch` into its four components
pub fn split_fullname(fullname: &str) -> Option<(&str, &str, &str, &str)> {
    let (nvr, arch) = fullname.rsplit_once('.')?;
    let (nv, release) = nvr.rsplit_once('-')?;
    let (name, version) = nv.rsplit_once('-')?;
    if name.is_empty() || version.is_empty() || release.is_empty() || arch.is_empty() {
        return None;
    }
    Some((name, version, release, arch))
}

/// Shared handle to an immutable record
pub type RecordRef = Arc<PackageRecord>;

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, version: &str) -> PackageRecord {
        PackageRecord {
            name: name.to_string(),
            version: version.to_string(),
            release: "1mdk".to_string(),
            arch: "i586".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_capability_parse_forms() {
        let bracketed = Capability::parse("libbar[>= 1.2-3mdk]").unwrap();
        let spaced = Capability::parse("libbar >= 1.2-3mdk").unwrap();
        assert_eq!(bracketed, spaced);
        assert_eq!(bracketed.to_string(), "libbar[>= 1.2-3mdk]");
        assert_eq!(spaced.to_display_string(), "libbar >= 1.2-3mdk");

        let plain = Capability::parse("/bin/sh").unwrap();
        assert!(plain.is_file());
        assert!(plain.constraint.is_any());
        assert_eq!(plain.to_string(), "/bin/sh");

        assert!(Capability::parse("rpmlib(PayloadIsLzma)").unwrap().is_rpmlib());
        assert!(Capability::parse("foo[!= 1]").is_err());
    }

    #[test]
    fn test_capability_star_range_is_any() {
        let cap = Capability::parse("foo[*]").unwrap();
        assert!(cap.constraint.is_any());
    }

    #[test]
    fn test_record_satisfies_self_provide() {
        let rec = record("bar", "2.0");
        assert!(rec.satisfies(&Capability::parse("bar").unwrap()));
        assert!(rec.satisfies(&Capability::parse("bar >= 1.5").unwrap()));
        assert!(!rec.satisfies(&Capability::parse("bar < 2.0").unwrap()));
        assert!(!rec.satisfies(&Capability::parse("baz").unwrap()));
    }

    #[test]
    fn test_record_satisfies_provides_and_files() {
        let mut rec = record("bash", "5.1");
        rec.provides.push(Capability::parse("sh[== 5.1]").unwrap());
        rec.files.push("/bin/bash".to_string());

        assert!(rec.satisfies(&Capability::parse("sh >= 4").unwrap()));
        assert!(rec.satisfies(&Capability::parse("/bin/bash").unwrap()));
        assert!(!rec.satisfies(&Capability::parse("/bin/zsh").unwrap()));
    }

    #[test]
    fn test_fullname_split() {
        let rec = record("perl-URPM", "3.07");
        assert_eq!(rec.fullname(), "perl-URPM-3.07-1mdk.i586");
        assert_eq!(
            split_fullname("perl-URPM-3.07-1mdk.i586"),
            Some(("perl-URPM", "3.07", "1mdk", "i586"))
        );
        assert_eq!(split_fullname("noversion.i586"), None);
    }

    #[test]
    fn test_normalize_capabilities() {
        let mut caps = vec![
            Capability::parse("b").unwrap(),
            Capability::parse("a[>= 1]").unwrap(),
            Capability::parse("b").unwrap(),
        ];
        normalize_capabilities(&mut caps);
        let rendered: Vec<String> = caps.iter().map(|c| c.to_string()).collect();
        assert_eq!(rendered, vec!["a[>= 1]", "b"]);
    }
}
