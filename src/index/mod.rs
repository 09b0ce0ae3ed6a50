// src/index/mod.rs

//! Dependency Index
//!
//! Reverse lookups over the records of the active media: capability name to
//! providing packages and package name to candidates. The index shares
//! records with the catalogs (`Arc`) instead of owning them. Each medium's
//! contribution is tracked separately so that one medium can be re-indexed
//! without touching the others.
//!
//! Resolution works from an immutable snapshot (`Arc<CapabilityIndex>`);
//! rebuilding publishes a new snapshot.

pub mod files;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::catalog::{Capability, Catalog, RecordRef};
use crate::version::VersionConstraint;

pub use files::FileIndex;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("multiple packages contain {capability}: {}", candidates.join(", "))]
    Ambiguous {
        capability: String,
        candidates: Vec<String>,
    },
}

#[derive(Debug, Clone)]
struct Provide {
    record: RecordRef,
    constraint: VersionConstraint,
}

#[derive(Debug, Clone, Default)]
pub struct CapabilityIndex {
    provides: HashMap<String, Vec<Provide>>,
    names: HashMap<String, Vec<RecordRef>>,
    /// Records per medium, in indexing order
    media: Vec<(String, Vec<RecordRef>)>,
    files: Option<Arc<FileIndex>>,
}

impl CapabilityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the records of `catalogs`, in order
    pub fn build<'a>(catalogs: impl IntoIterator<Item = &'a Catalog>) -> Self {
        let mut index = Self::new();
        for catalog in catalogs {
            index.insert_medium(catalog);
        }
        debug!(
            "indexed {} packages, {} capabilities from {} media",
            index.len(),
            index.provides.len(),
            index.media.len()
        );
        index
    }

    /// Replace the contribution of the catalog's medium
    pub fn update_medium(&mut self, catalog: &Catalog) {
        self.remove_medium(catalog.medium());
        self.insert_medium(catalog);
    }

    /// Drop every entry contributed by `medium`; false if it was not indexed
    pub fn remove_medium(&mut self, medium: &str) -> bool {
        let Some(pos) = self.media.iter().position(|(name, _)| name == medium) else {
            return false;
        };
        let (_, records) = self.media.remove(pos);

        for record in &records {
            for name in provide_names(record) {
                if let Some(entries) = self.provides.get_mut(&name) {
                    entries.retain(|p| p.record.medium != medium);
                    if entries.is_empty() {
                        self.provides.remove(&name);
                    }
                }
            }
            if let Some(entries) = self.names.get_mut(&record.name) {
                entries.retain(|r| r.medium != medium);
                if entries.is_empty() {
                    self.names.remove(&record.name);
                }
            }
        }
        true
    }

    fn insert_medium(&mut self, catalog: &Catalog) {
        for record in catalog.records() {
            let own = record.self_provide();
            self.provides.entry(own.name).or_default().push(Provide {
                record: Arc::clone(record),
                constraint: own.constraint,
            });
            for cap in &record.provides {
                self.provides
                    .entry(cap.name.clone())
                    .or_default()
                    .push(Provide {
                        record: Arc::clone(record),
                        constraint: cap.constraint.clone(),
                    });
            }
            self.names
                .entry(record.name.clone())
                .or_default()
                .push(Arc::clone(record));
        }
        self.media
            .push((catalog.medium().to_string(), catalog.records().to_vec()));
    }

    /// Attach a file index built from full catalogs
    pub fn attach_files(&mut self, files: FileIndex) {
        self.files = Some(Arc::new(files));
    }

    pub fn file_index(&self) -> Option<&FileIndex> {
        self.files.as_deref()
    }

    /// Packages providing `capability`, honoring version ranges
    ///
    /// File capabilities are also looked up in the attached file index.
    pub fn find_providers(&self, capability: &Capability) -> Vec<RecordRef> {
        let mut found: Vec<RecordRef> = Vec::new();
        let mut push = |record: &RecordRef| {
            // file index records come from full catalogs, not from the indexed ones
            let same = |r: &RecordRef| {
                Arc::ptr_eq(r, record)
                    || (r.medium == record.medium && r.fullname() == record.fullname())
            };
            if !found.iter().any(same) {
                found.push(Arc::clone(record));
            }
        };

        if let Some(entries) = self.provides.get(&capability.name) {
            for entry in entries {
                if capability.constraint.overlaps(&entry.constraint) {
                    push(&entry.record);
                }
            }
        }

        if capability.is_file()
            && let Some(files) = &self.files
        {
            for record in files.lookup(&capability.name) {
                push(record);
            }
        }

        found
    }

    /// Exactly one package providing `capability`
    ///
    /// Several distinct packages qualifying is an [`IndexError::Ambiguous`];
    /// the same package on several media counts once.
    pub fn find_unique_provider(
        &self,
        capability: &Capability,
    ) -> Result<Option<RecordRef>, IndexError> {
        let providers = self.find_providers(capability);
        let distinct: BTreeSet<String> = providers.iter().map(|r| r.fullname()).collect();

        if distinct.len() > 1 {
            return Err(IndexError::Ambiguous {
                capability: capability.to_display_string(),
                candidates: distinct.into_iter().collect(),
            });
        }
        Ok(providers.into_iter().next())
    }

    /// All packages named `name`, on every indexed medium
    pub fn find_by_name(&self, name: &str) -> Vec<RecordRef> {
        self.names.get(name).cloned().unwrap_or_default()
    }

    /// Packages containing `path`, from the file index or from file
    /// provides kept in syntheses
    pub fn find_by_file(&self, path: &str) -> Vec<RecordRef> {
        self.find_providers(&Capability::unversioned(path))
    }

    /// Capabilities provided by more than one package name
    pub fn ambiguous_capabilities(&self) -> Vec<(String, Vec<String>)> {
        let mut out: Vec<(String, Vec<String>)> = self
            .provides
            .iter()
            .filter_map(|(cap, entries)| {
                let names: BTreeSet<&str> =
                    entries.iter().map(|p| p.record.name.as_str()).collect();
                (names.len() > 1).then(|| {
                    (
                        cap.clone(),
                        names.into_iter().map(str::to_string).collect(),
                    )
                })
            })
            .collect();
        out.sort();
        out
    }

    /// Every indexed record, medium by medium
    pub fn packages(&self) -> impl Iterator<Item = &RecordRef> {
        self.media.iter().flat_map(|(_, records)| records.iter())
    }

    /// Indexed media, in order
    pub fn media(&self) -> impl Iterator<Item = &str> {
        self.media.iter().map(|(name, _)| name.as_str())
    }

    /// All capability names, sorted
    pub fn capability_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.provides.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.media.iter().map(|(_, records)| records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn provide_names(record: &RecordRef) -> BTreeSet<String> {
    std::iter::once(record.name.clone())
        .chain(record.provides.iter().map(|c| c.name.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::format::parse_catalog;
    use crate::catalog::CatalogData;

    fn synthesis(medium: &str, text: &str) -> Catalog {
        Catalog::Synthesis(CatalogData::new(
            medium,
            parse_catalog(text, medium).unwrap().records,
        ))
    }

    fn cap(s: &str) -> Capability {
        Capability::parse(s).unwrap()
    }

    const MAIN: &str = "\
@provides@libbar.so.1@webserver
@info@bar-1.0-1mdk.i586@0@100@System
@provides@webserver[== 2.4]@/usr/sbin/httpd
@info@apache-2.4-1mdk.i586@0@100@System
";

    const UPDATES: &str = "\
@provides@libbar.so.1
@info@bar-2.0-1mdk.i586@0@100@System
";

    #[test]
    fn test_providers_and_names() {
        let main = synthesis("main", MAIN);
        let updates = synthesis("updates", UPDATES);
        let index = CapabilityIndex::build([&main, &updates]);

        assert_eq!(index.len(), 3);
        assert_eq!(index.find_by_name("bar").len(), 2);
        assert_eq!(index.find_providers(&cap("libbar.so.1")).len(), 2);
        assert_eq!(index.find_providers(&cap("bar >= 2.0")).len(), 1);
        assert!(index.find_providers(&cap("nothing")).is_empty());

        // versioned requirement against versioned and unversioned provides
        let web = index.find_providers(&cap("webserver >= 2.0"));
        let names: Vec<&str> = web.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["bar", "apache"]);
        assert_eq!(index.find_providers(&cap("webserver < 2.0")).len(), 1);
    }

    #[test]
    fn test_unique_provider() {
        let main = synthesis("main", MAIN);
        let index = CapabilityIndex::build([&main]);

        let found = index.find_unique_provider(&cap("/usr/sbin/httpd")).unwrap();
        assert_eq!(found.unwrap().name, "apache");
        assert!(index.find_unique_provider(&cap("missing")).unwrap().is_none());

        let err = index.find_unique_provider(&cap("webserver")).unwrap_err();
        let IndexError::Ambiguous { candidates, .. } = err;
        assert_eq!(candidates, vec!["apache-2.4-1mdk.i586", "bar-1.0-1mdk.i586"]);
    }

    #[test]
    fn test_update_medium_replaces_contribution() {
        let main = synthesis("main", MAIN);
        let updates = synthesis("updates", UPDATES);
        let mut index = CapabilityIndex::build([&main, &updates]);

        let newer = synthesis(
            "updates",
            "@provides@libbar.so.2\n@info@bar-3.0-1mdk.i586@0@100@System\n",
        );
        index.update_medium(&newer);

        assert_eq!(index.find_providers(&cap("libbar.so.1")).len(), 1);
        assert_eq!(index.find_providers(&cap("libbar.so.2")).len(), 1);
        let versions: Vec<String> = index
            .find_by_name("bar")
            .iter()
            .map(|r| r.version.clone())
            .collect();
        assert_eq!(versions, vec!["1.0", "3.0"]);

        assert!(index.remove_medium("updates"));
        assert!(!index.remove_medium("updates"));
        assert!(index.find_providers(&cap("libbar.so.2")).is_empty());
        assert_eq!(index.media().collect::<Vec<_>>(), vec!["main"]);
    }

    #[test]
    fn test_file_lookup_prefers_attached_index() {
        let full = Catalog::Full(CatalogData::new(
            "main",
            parse_catalog(
                "@files@/usr/bin/baz\n@info@baz-1.0-1mdk.i586@0@10@Tools\n",
                "main",
            )
            .unwrap()
            .records,
        ));
        let mut index = CapabilityIndex::build([&full]);
        assert!(index.find_by_file("/usr/bin/baz").is_empty());

        index.attach_files(FileIndex::build([&full]));
        assert_eq!(index.find_by_file("/usr/bin/baz")[0].name, "baz");
    }

    #[test]
    fn test_ambiguous_capabilities() {
        let main = synthesis("main", MAIN);
        let index = CapabilityIndex::build([&main]);
        let ambiguous = index.ambiguous_capabilities();
        assert_eq!(
            ambiguous,
            vec![(
                "webserver".to_string(),
                vec!["apache".to_string(), "bar".to_string()]
            )]
        );
    }
}
