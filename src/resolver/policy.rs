// src/resolver/policy.rs

//! Resolution policy knobs
//!
//! Defaults come from the `[resolver]` section of the tool configuration
//! and can be overridden per request.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::catalog::PackageRecord;

use super::installed::InstalledSet;

/// Whether an installed package that a planned package obsoletes may still
/// satisfy requirements
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Precedence {
    /// The installed package counts until the obsoletes are applied
    #[default]
    InstalledFirst,
    /// Obsoleted packages never satisfy requirements
    ObsoletesFirst,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvePolicy {
    /// Fail the whole request on the first unresolvable, conflicting or
    /// ambiguous branch
    #[serde(default)]
    pub strict: bool,

    #[serde(default)]
    pub precedence: Precedence,

    /// Auto-selected upgrades touching a smaller share of the installed
    /// package's files are skipped
    #[serde(default)]
    pub min_update_ratio: f64,

    /// Selected locale languages (`fr`, `pt_BR`)
    #[serde(default)]
    pub locales: Vec<String>,

    /// Remove installed packages conflicting with the plan instead of
    /// reporting a conflict
    #[serde(default)]
    pub remove_conflicting_installed: bool,

    /// Answer every choice set with its first candidate
    #[serde(default)]
    pub auto_choose: bool,
}

impl Default for ResolvePolicy {
    fn default() -> Self {
        Self {
            strict: false,
            precedence: Precedence::default(),
            min_update_ratio: 0.0,
            locales: Vec::new(),
            remove_conflicting_installed: false,
            auto_choose: false,
        }
    }
}

static LOCALES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^locales-([A-Za-z]{2,3}(?:_[A-Za-z]{2})?(?:@[A-Za-z]+)?)$").unwrap()
});

impl ResolvePolicy {
    /// Locale language a package requires that is neither installed nor selected
    pub fn unselected_locale(
        &self,
        record: &PackageRecord,
        installed: &InstalledSet,
    ) -> Option<String> {
        record.requires.iter().find_map(|req| {
            let lang = LOCALES_RE.captures(&req.name)?.get(1)?.as_str();
            let selected = self.locales.iter().any(|l| l == lang)
                || !installed.find_by_name(&req.name).is_empty();
            (!selected).then(|| lang.to_string())
        })
    }

    /// Is replacing `installed` by `candidate` worth it?
    ///
    /// The share of the installed package's files that the candidate also
    /// ships; unknown file lists always qualify.
    pub fn update_ratio_ok(&self, installed: &PackageRecord, candidate: &PackageRecord) -> bool {
        update_ratio(installed, candidate) >= self.min_update_ratio
    }
}

/// Share of `installed`'s files also present in `candidate`, 1.0 when either
/// file list is unknown or partial
pub fn update_ratio(installed: &PackageRecord, candidate: &PackageRecord) -> f64 {
    if !installed.has_file_list() || !candidate.has_file_list() {
        return 1.0;
    }
    let touched = installed
        .files
        .iter()
        .filter(|f| candidate.files.contains(f))
        .count();
    touched as f64 / installed.files.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Capability;
    use std::str::FromStr;

    fn record(name: &str, files: &[&str], requires: &[&str]) -> PackageRecord {
        PackageRecord {
            name: name.to_string(),
            version: "1".to_string(),
            release: "1".to_string(),
            arch: "noarch".to_string(),
            files: files.iter().map(|f| f.to_string()).collect(),
            requires: requires.iter().map(|r| Capability::parse(r).unwrap()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_precedence_strings() {
        assert_eq!(Precedence::ObsoletesFirst.to_string(), "obsoletes-first");
        assert_eq!(
            Precedence::from_str("installed-first").unwrap(),
            Precedence::InstalledFirst
        );
        assert!(Precedence::from_str("whatever").is_err());
    }

    #[test]
    fn test_update_ratio() {
        let old = record("k", &["/a", "/b", "/c", "/d"], &[]);
        let new = record("k", &["/a", "/e"], &[]);
        assert!((update_ratio(&old, &new) - 0.25).abs() < f64::EPSILON);
        assert_eq!(update_ratio(&old, &record("k", &[], &[])), 1.0);

        let policy = ResolvePolicy {
            min_update_ratio: 0.5,
            ..Default::default()
        };
        assert!(!policy.update_ratio_ok(&old, &new));
        assert!(ResolvePolicy::default().update_ratio_ok(&old, &new));

        let synthesis = PackageRecord {
            partial_files: true,
            ..new.clone()
        };
        assert_eq!(update_ratio(&old, &synthesis), 1.0);
        assert!(policy.update_ratio_ok(&old, &synthesis));
    }

    #[test]
    fn test_unselected_locale() {
        let pkg = record("drakx-fr", &[], &["locales-fr", "glibc"]);
        let policy = ResolvePolicy::default();
        let installed = InstalledSet::default();
        assert_eq!(policy.unselected_locale(&pkg, &installed), Some("fr".to_string()));

        let with_fr = ResolvePolicy {
            locales: vec!["fr".to_string()],
            ..Default::default()
        };
        assert_eq!(with_fr.unselected_locale(&pkg, &installed), None);

        let installed = InstalledSet::from_records([record("locales-fr", &[], &[])]);
        assert_eq!(policy.unselected_locale(&pkg, &installed), None);
    }
}
