// src/resolver/installed.rs

//! Snapshot of the installed-package database
//!
//! The installer collaborator supplies it, either as records or as a file in
//! catalog format (one block per installed package).

use std::collections::HashMap;
use std::path::Path;

use crate::catalog::format::parse_catalog;
use crate::catalog::{Capability, CatalogError, RecordRef};

/// Medium name given to records of the installed set
pub const INSTALLED_MEDIUM: &str = "@installed";

#[derive(Debug, Clone, Default)]
pub struct InstalledSet {
    packages: Vec<RecordRef>,
    by_name: HashMap<String, Vec<usize>>,
}

impl InstalledSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<I, R>(records: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<RecordRef>,
    {
        let mut set = Self::new();
        for record in records {
            set.insert(record.into());
        }
        set
    }

    /// Read an installed-package list in catalog format
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read(path).map_err(|e| CatalogError::Unreadable {
            medium: INSTALLED_MEDIUM.to_string(),
            path: path.to_path_buf(),
            source: e,
        })?;
        let plain =
            crate::compression::decompress_auto(&raw).map_err(|e| CatalogError::Compression {
                medium: INSTALLED_MEDIUM.to_string(),
                source: e,
            })?;
        let parsed = parse_catalog(&String::from_utf8_lossy(&plain), INSTALLED_MEDIUM)?;
        Ok(Self::from_records(parsed.records))
    }

    pub fn insert(&mut self, record: RecordRef) {
        self.by_name
            .entry(record.name.clone())
            .or_default()
            .push(self.packages.len());
        self.packages.push(record);
    }

    /// Installed packages named `name` (several for multi-version packages)
    pub fn find_by_name(&self, name: &str) -> Vec<&RecordRef> {
        self.by_name
            .get(name)
            .map(|idx| idx.iter().map(|&i| &self.packages[i]).collect())
            .unwrap_or_default()
    }

    /// Installed packages satisfying `capability`
    pub fn providers(&self, capability: &Capability) -> Vec<&RecordRef> {
        self.packages
            .iter()
            .filter(|p| p.satisfies(capability))
            .collect()
    }

    pub fn contains(&self, fullname: &str) -> bool {
        self.packages.iter().any(|p| p.fullname() == fullname)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecordRef> {
        self.packages.iter()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_installed_list() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "@provides@sh\n@files@/bin/bash\n@info@bash-5.1-1mdk.i586@0@900@Shells\n\
             @info@kernel-5.10-1mdk.i586@0@100@System\n\
             @info@kernel-5.15-1mdk.i586@0@100@System\n"
        )
        .unwrap();

        let installed = InstalledSet::load(file.path()).unwrap();
        assert_eq!(installed.len(), 3);
        assert_eq!(installed.find_by_name("kernel").len(), 2);
        assert!(installed.contains("bash-5.1-1mdk.i586"));
        assert_eq!(installed.providers(&Capability::parse("sh").unwrap()).len(), 1);
        assert_eq!(
            installed.providers(&Capability::parse("/bin/bash").unwrap()).len(),
            1
        );
        assert!(installed.providers(&Capability::parse("zsh").unwrap()).is_empty());
        assert_eq!(installed.iter().next().unwrap().medium, INSTALLED_MEDIUM);
    }
}
