// src/query.rs

//! Catalog queries
//!
//! Searches over an index snapshot in the manner of `urpmf` (which field of
//! which package matches a pattern) and `urpmq` (which packages provide or
//! contain something).

use regex::{Regex, RegexBuilder};
use strum_macros::{Display, EnumString};
use tracing::info;

use crate::catalog::{Capability, RecordRef};
use crate::index::CapabilityIndex;

/// Record field a query looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum QueryField {
    Name,
    Summary,
    Group,
    Provides,
    Requires,
    Conflicts,
    Obsoletes,
    Files,
}

/// One matching package with the field values that matched
#[derive(Debug, Clone)]
pub struct QueryMatch {
    pub package: RecordRef,
    pub matched: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Query {
    field: QueryField,
    pattern: Regex,
}

impl Query {
    /// Match `pattern` as a substring, or as a regular expression with `regex`
    pub fn new(
        field: QueryField,
        pattern: &str,
        regex: bool,
        case_insensitive: bool,
    ) -> Result<Self, regex::Error> {
        let source = if regex {
            pattern.to_string()
        } else {
            regex::escape(pattern)
        };
        let pattern = RegexBuilder::new(&source)
            .case_insensitive(case_insensitive)
            .build()?;
        Ok(Self { field, pattern })
    }

    pub fn field(&self) -> QueryField {
        self.field
    }

    /// Matches sorted by package full name
    ///
    /// File queries use the file index when one is attached and fall back
    /// to the file lists carried by the records otherwise.
    pub fn run(&self, index: &CapabilityIndex) -> Vec<QueryMatch> {
        let mut matches: Vec<QueryMatch> = Vec::new();

        if self.field == QueryField::Files
            && let Some(files) = index.file_index()
        {
            for (path, owners) in files.search(|p| self.pattern.is_match(p)) {
                for owner in owners {
                    push_match(&mut matches, owner, path.to_string());
                }
            }
        } else {
            for package in index.packages() {
                for value in self.values(package) {
                    if self.pattern.is_match(&value) {
                        push_match(&mut matches, package, value);
                    }
                }
            }
        }

        matches.sort_by_key(|m| m.package.fullname());
        matches
    }

    fn values(&self, package: &RecordRef) -> Vec<String> {
        let caps = |list: &[Capability]| -> Vec<String> {
            list.iter().map(Capability::to_display_string).collect()
        };
        match self.field {
            QueryField::Name => vec![package.name.clone()],
            QueryField::Summary => vec![package.summary.clone()],
            QueryField::Group => vec![package.group.clone()],
            QueryField::Provides => caps(&package.provides),
            QueryField::Requires => caps(&package.requires),
            QueryField::Conflicts => caps(&package.conflicts),
            QueryField::Obsoletes => caps(&package.obsoletes),
            QueryField::Files => package.files.clone(),
        }
    }
}

fn push_match(matches: &mut Vec<QueryMatch>, package: &RecordRef, value: String) {
    let fullname = package.fullname();
    match matches
        .iter_mut()
        .find(|m| m.package.medium == package.medium && m.package.fullname() == fullname)
    {
        Some(existing) => existing.matched.push(value),
        None => matches.push(QueryMatch {
            package: RecordRef::clone(package),
            matched: vec![value],
        }),
    }
}

/// Packages providing `capability` (`name`, `name >= 1.0` or `/path`)
pub fn what_provides(index: &CapabilityIndex, capability: &Capability) -> Vec<RecordRef> {
    let mut providers = index.find_providers(capability);
    providers.sort_by_key(|p| p.fullname());
    if providers.len() > 1 {
        let names: Vec<String> = providers.iter().map(|p| p.fullname()).collect();
        info!(
            "The following packages contain {}: {}",
            capability.to_display_string(),
            names.join(" ")
        );
    }
    providers
}
