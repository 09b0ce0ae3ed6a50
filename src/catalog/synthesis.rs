// src/catalog/synthesis.rs

//! Deriving a synthesis from a full catalog
//!
//! A synthesis keeps what dependency resolution needs: identity, size,
//! group, summary and the four capability sets. File lists are reduced to
//! files some package in the catalog depends on, and those files are folded
//! into the owning package's provides.

use std::collections::BTreeSet;

use tracing::debug;

use super::record::{normalize_capabilities, Capability, PackageRecord};

/// Files named by any requires, conflicts or obsoletes entry of `records`
pub fn referenced_files<'a>(records: impl IntoIterator<Item = &'a PackageRecord>) -> BTreeSet<String> {
    records
        .into_iter()
        .flat_map(|r| r.requires.iter().chain(&r.conflicts).chain(&r.obsoletes))
        .filter(|c| c.is_file())
        .map(|c| c.name.clone())
        .collect()
}

/// Reduce full records to their synthesis form
pub fn derive_synthesis<'a, I>(records: I) -> Vec<PackageRecord>
where
    I: IntoIterator<Item = &'a PackageRecord>,
    I::IntoIter: Clone,
{
    let records = records.into_iter();
    let referenced = referenced_files(records.clone());
    debug!("keeping only files referenced in provides ({} files)", referenced.len());

    records
        .map(|full| {
            let files: Vec<String> = full
                .files
                .iter()
                .filter(|f| referenced.contains(*f))
                .cloned()
                .collect();

            let mut provides = full.provides.clone();
            provides.extend(files.iter().map(Capability::unversioned));
            normalize_capabilities(&mut provides);

            PackageRecord {
                provides,
                files,
                partial_files: true,
                description: String::new(),
                ..full.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::format::parse_catalog;

    const FULL: &str = "\
@provides@libfoo.so.1
@summary@Foo library
@description@long text
@files@/usr/lib/libfoo.so.1@/usr/share/doc/foo/README
@info@foo-1.0-1mdk.i586@0@1000@System/Libraries
@requires@/usr/lib/libfoo.so.1@/bin/sh
@conflicts@/etc/old.conf
@files@/usr/bin/app@/etc/old.conf
@info@app-2.0-1mdk.i586@0@2000@Applications
";

    #[test]
    fn test_referenced_files() {
        let parsed = parse_catalog(FULL, "m").unwrap();
        let refs = referenced_files(&parsed.records);
        let refs: Vec<&str> = refs.iter().map(String::as_str).collect();
        assert_eq!(refs, vec!["/bin/sh", "/etc/old.conf", "/usr/lib/libfoo.so.1"]);
    }

    #[test]
    fn test_derive_keeps_referenced_files_as_provides() {
        let parsed = parse_catalog(FULL, "m").unwrap();
        let synth = derive_synthesis(&parsed.records);
        assert_eq!(synth.len(), 2);

        let foo = &synth[0];
        assert_eq!(foo.files, vec!["/usr/lib/libfoo.so.1"]);
        assert!(!foo.has_file_list());
        assert!(foo.description.is_empty());
        assert_eq!(foo.summary, "Foo library");
        let provides: Vec<String> = foo.provides.iter().map(|c| c.to_string()).collect();
        assert_eq!(provides, vec!["/usr/lib/libfoo.so.1", "libfoo.so.1"]);

        let app = &synth[1];
        assert_eq!(app.files, vec!["/etc/old.conf"]);
        assert!(app.satisfies(&Capability::parse("/etc/old.conf").unwrap()));
        assert!(!app.satisfies(&Capability::parse("/usr/bin/app").unwrap()));
    }
}
