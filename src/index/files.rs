// src/index/files.rs

//! Path to package lookup over full catalogs
//!
//! Only full catalogs carry complete file lists, so the file index is built
//! on demand from them and attached to a capability index snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::catalog::{Catalog, RecordRef};

#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    paths: HashMap<String, Vec<RecordRef>>,
}

impl FileIndex {
    /// Index every file of every full catalog; syntheses are skipped
    pub fn build<'a>(catalogs: impl IntoIterator<Item = &'a Catalog>) -> Self {
        let mut paths: HashMap<String, Vec<RecordRef>> = HashMap::new();
        let mut media = 0;

        for catalog in catalogs.into_iter().filter(|c| c.is_full()) {
            media += 1;
            for record in catalog.records() {
                for file in &record.files {
                    let owners = paths.entry(file.clone()).or_default();
                    if !owners.iter().any(|r| Arc::ptr_eq(r, record)) {
                        owners.push(Arc::clone(record));
                    }
                }
            }
        }

        debug!("file index: {} paths from {} full catalogs", paths.len(), media);
        Self { paths }
    }

    /// Packages listing `path`
    pub fn lookup(&self, path: &str) -> &[RecordRef] {
        self.paths.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Paths matching `predicate`, sorted
    pub fn search(&self, mut predicate: impl FnMut(&str) -> bool) -> Vec<(&str, &[RecordRef])> {
        let mut hits: Vec<(&str, &[RecordRef])> = self
            .paths
            .iter()
            .filter(|(path, _)| predicate(path.as_str()))
            .map(|(path, owners)| (path.as_str(), owners.as_slice()))
            .collect();
        hits.sort_by(|a, b| a.0.cmp(b.0));
        hits
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::format::parse_catalog;
    use crate::catalog::CatalogData;

    fn catalog(full: bool) -> Catalog {
        let text = "@files@/usr/bin/baz@/etc/baz.conf\n@info@baz-1.0-1mdk.i586@0@10@Tools\n";
        let data = CatalogData::new("main", parse_catalog(text, "main").unwrap().records);
        if full {
            Catalog::Full(data)
        } else {
            Catalog::Synthesis(data)
        }
    }

    #[test]
    fn test_lookup_full_catalogs_only() {
        let full = catalog(true);
        let synth = catalog(false);

        let index = FileIndex::build([&full]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup("/usr/bin/baz")[0].name, "baz");
        assert!(index.lookup("/usr/bin/none").is_empty());

        assert!(FileIndex::build([&synth]).is_empty());
    }

    #[test]
    fn test_search_sorted() {
        let full = catalog(true);
        let index = FileIndex::build([&full]);
        let hits = index.search(|p| p.contains("baz"));
        let paths: Vec<&str> = hits.iter().map(|(p, _)| *p).collect();
        assert_eq!(paths, vec!["/etc/baz.conf", "/usr/bin/baz"]);
    }
}
