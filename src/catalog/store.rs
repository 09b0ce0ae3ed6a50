// src/catalog/store.rs

//! Loading catalogs and maintaining the synthesis cache
//!
//! # Cache layout
//!
//! - `<cache>/synthesis.hdlist.<medium>.cz`: gzip synthesis with a
//!   fingerprint header naming the source it was derived from
//! - `<cache>/.<medium>.lock`: advisory lock held during a rebuild
//!
//! A cached synthesis is used while its fingerprint matches the source
//! catalog and rebuilt on the next load otherwise. Rebuilds of one medium
//! are serialized inside the process by a per-medium mutex and across
//! processes by the lock file; the new synthesis is renamed into place so
//! readers never see a partial file.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rayon::prelude::*;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::compression::{self, CompressionFormat};
use crate::hash::{FreshnessCheck, Fingerprint, HashAlgorithm};
use crate::lock::FileLock;
use crate::medium::Medium;

use super::format::{parse_catalog, write_catalog};
use super::synthesis::derive_synthesis;
use super::{Catalog, CatalogData, CatalogError, PackageRecord};

const SYNTHESIS_PREFIX: &str = "synthesis.hdlist.";
const SYNTHESIS_SUFFIX: &str = ".cz";

/// How the store reads and caches catalogs
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub cache_dir: PathBuf,
    /// Go through the synthesis cache instead of parsing full catalogs
    pub prefer_synthesis: bool,
    pub algorithm: HashAlgorithm,
    pub freshness: FreshnessCheck,
}

impl StoreOptions {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            prefer_synthesis: true,
            algorithm: HashAlgorithm::default(),
            freshness: FreshnessCheck::default(),
        }
    }
}

/// Per-medium catalog loader with an on-disk synthesis cache
#[derive(Debug)]
pub struct CatalogStore {
    options: StoreOptions,
    /// Records found by the last successful load of each medium
    counts: Mutex<BTreeMap<String, usize>>,
    /// Media whose synthesis was rebuilt since the last `take_dirty`
    dirty: Mutex<BTreeSet<String>>,
    rebuilds: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CatalogStore {
    pub fn new(options: StoreOptions) -> Self {
        Self {
            options,
            counts: Mutex::new(BTreeMap::new()),
            dirty: Mutex::new(BTreeSet::new()),
            rebuilds: Mutex::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Cached synthesis location of a medium
    pub fn synthesis_path(&self, medium: &str) -> PathBuf {
        self.options
            .cache_dir
            .join(format!("{SYNTHESIS_PREFIX}{medium}{SYNTHESIS_SUFFIX}"))
    }

    fn lock_path(&self, medium: &str) -> PathBuf {
        self.options.cache_dir.join(format!(".{medium}.lock"))
    }

    /// Load the catalog of `medium`
    ///
    /// With `prefer_synthesis` the cached synthesis is used when fresh and
    /// rebuilt otherwise; without it the full catalog is parsed. Media whose
    /// source already is a synthesis are read directly.
    pub fn load(&self, medium: &Medium) -> Result<Catalog, CatalogError> {
        let catalog = if medium.synthesis_only {
            self.read_synthesis_source(medium)?
        } else if self.options.prefer_synthesis {
            self.load_cached(medium)?
        } else {
            self.load_full(medium)?
        };
        self.finish_load(medium, catalog)
    }

    /// Parse the full source catalog of `medium`
    pub fn load_full(&self, medium: &Medium) -> Result<Catalog, CatalogError> {
        if medium.synthesis_only {
            return Err(CatalogError::NoFullCatalog {
                medium: medium.name.clone(),
            });
        }

        let text = read_catalog_text(&medium.name, &medium.catalog_path)?;
        let parsed = parse_catalog(&text, &medium.name)?;
        warn_duplicate_filenames(&medium.name, &parsed.records);
        debug!(
            "parsed full catalog of medium \"{}\" ({} packages)",
            medium.name,
            parsed.records.len()
        );
        Ok(Catalog::Full(CatalogData::new(&medium.name, parsed.records)))
    }

    /// Derive a fresh synthesis from the full catalog and store it in the cache
    pub fn rebuild_synthesis(&self, medium: &Medium) -> Result<Catalog, CatalogError> {
        if medium.synthesis_only {
            return Err(CatalogError::NoFullCatalog {
                medium: medium.name.clone(),
            });
        }

        let build_failed = |reason: String| CatalogError::SynthesisBuildFailed {
            medium: medium.name.clone(),
            reason,
        };

        let in_process = self.rebuild_lock(&medium.name);
        let _guard = in_process.lock();
        let _file_lock = FileLock::acquire(self.lock_path(&medium.name))
            .map_err(|e| build_failed(format!("cannot lock cache: {e}")))?;

        let source = Fingerprint::of_file(&medium.catalog_path, self.options.algorithm)
            .map_err(|e| CatalogError::Unreadable {
                medium: medium.name.clone(),
                path: medium.catalog_path.clone(),
                source: e,
            })?;

        let full = self.load_full(medium)?;
        let derived = derive_synthesis(full.records().iter().map(|r| &**r));
        let text = write_catalog(&derived, Some(&source), false);
        let bytes = compression::compress(text.as_bytes(), CompressionFormat::Gzip)
            .map_err(|e| build_failed(e.to_string()))?;

        let target = self.synthesis_path(&medium.name);
        let mut tmp = NamedTempFile::new_in(&self.options.cache_dir)
            .map_err(|e| build_failed(e.to_string()))?;
        tmp.write_all(&bytes)
            .map_err(|e| build_failed(e.to_string()))?;
        tmp.persist(&target)
            .map_err(|e| build_failed(e.error.to_string()))?;

        self.dirty.lock().insert(medium.name.clone());
        info!(
            "built hdlist synthesis file for medium \"{}\" ({} packages)",
            medium.name,
            derived.len()
        );

        let mut data = CatalogData::new(&medium.name, derived);
        data.source = Some(source);
        Ok(Catalog::Synthesis(data))
    }

    /// Load several media in parallel, at most `workers` at a time
    ///
    /// Every medium gets a result; a failure for one medium does not stop
    /// the others. Results come back in the order of `media`.
    pub fn load_all(
        &self,
        media: &[Medium],
        workers: usize,
    ) -> Vec<(String, Result<Catalog, CatalogError>)> {
        let load_one = |m: &Medium| (m.name.clone(), self.load(m));

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .build();

        let results: Vec<_> = match pool {
            Ok(pool) => pool.install(|| media.par_iter().map(load_one).collect()),
            Err(e) => {
                warn!("falling back to sequential catalog loading: {}", e);
                media.iter().map(load_one).collect()
            }
        };

        for (name, result) in &results {
            if let Err(e) = result {
                warn!("unable to load medium \"{}\": {}", name, e);
            }
        }
        results
    }

    /// Number of records found by the last load of `medium`
    pub fn record_count(&self, medium: &str) -> Option<usize> {
        self.counts.lock().get(medium).copied()
    }

    pub fn is_dirty(&self, medium: &str) -> bool {
        self.dirty.lock().contains(medium)
    }

    /// Media whose synthesis was rebuilt, clearing the set
    pub fn take_dirty(&self) -> Vec<String> {
        std::mem::take(&mut *self.dirty.lock()).into_iter().collect()
    }

    /// Media that have a synthesis in the cache
    pub fn cached_media(&self) -> Result<Vec<String>, std::io::Error> {
        let entries = match fs::read_dir(&self.options.cache_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut names = Vec::new();
        for entry in entries {
            let file_name = entry?.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(name) = file_name
                .strip_prefix(SYNTHESIS_PREFIX)
                .and_then(|rest| rest.strip_suffix(SYNTHESIS_SUFFIX))
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        debug!("found {} headers in cache", names.len());
        Ok(names)
    }

    /// Remove cached syntheses of media not in `known`
    pub fn clean_cache<S: AsRef<str>>(&self, known: &[S]) -> Result<usize, std::io::Error> {
        let known: BTreeSet<&str> = known.iter().map(AsRef::as_ref).collect();
        let mut removed = 0;

        for name in self.cached_media()? {
            if known.contains(name.as_str()) {
                continue;
            }
            fs::remove_file(self.synthesis_path(&name))?;
            let _ = fs::remove_file(self.lock_path(&name));
            self.counts.lock().remove(&name);
            removed += 1;
        }

        if removed > 0 {
            info!("removing {} obsolete headers in cache", removed);
        }
        Ok(removed)
    }

    fn load_cached(&self, medium: &Medium) -> Result<Catalog, CatalogError> {
        let cache = self.synthesis_path(&medium.name);

        let current = match Fingerprint::of_file(&medium.catalog_path, self.options.algorithm) {
            Ok(fp) => fp,
            Err(e) if cache.exists() => {
                warn!(
                    "source catalog of medium \"{}\" unavailable ({}), using cached synthesis",
                    medium.name, e
                );
                return read_synthesis(&medium.name, &cache);
            }
            Err(e) => {
                return Err(CatalogError::Unreadable {
                    medium: medium.name.clone(),
                    path: medium.catalog_path.clone(),
                    source: e,
                });
            }
        };

        if cache.exists() {
            match read_synthesis(&medium.name, &cache) {
                Ok(catalog)
                    if catalog
                        .source()
                        .is_some_and(|fp| fp.is_fresh(&current, self.options.freshness)) =>
                {
                    debug!("using cached synthesis of medium \"{}\"", medium.name);
                    return Ok(catalog);
                }
                Ok(_) => debug!("synthesis of medium \"{}\" is stale", medium.name),
                Err(e) => warn!("ignoring unusable synthesis of \"{}\": {}", medium.name, e),
            }
        }

        self.rebuild_synthesis(medium)
    }

    fn read_synthesis_source(&self, medium: &Medium) -> Result<Catalog, CatalogError> {
        read_synthesis(&medium.name, &medium.catalog_path)
    }

    fn finish_load(&self, medium: &Medium, catalog: Catalog) -> Result<Catalog, CatalogError> {
        if catalog.is_empty() && !medium.allow_empty {
            return Err(CatalogError::NoHeadersFound {
                medium: medium.name.clone(),
            });
        }
        self.counts
            .lock()
            .insert(medium.name.clone(), catalog.len());
        Ok(catalog)
    }

    fn rebuild_lock(&self, medium: &str) -> Arc<Mutex<()>> {
        self.rebuilds
            .lock()
            .entry(medium.to_string())
            .or_default()
            .clone()
    }
}

fn read_catalog_text(medium: &str, path: &Path) -> Result<String, CatalogError> {
    let raw = fs::read(path).map_err(|e| CatalogError::Unreadable {
        medium: medium.to_string(),
        path: path.to_path_buf(),
        source: e,
    })?;
    let plain = compression::decompress_auto(&raw).map_err(|e| CatalogError::Compression {
        medium: medium.to_string(),
        source: e,
    })?;
    String::from_utf8(plain).map_err(|e| {
        let bytes = e.as_bytes();
        let bad = e.utf8_error().valid_up_to();
        let start = bytes[..bad].iter().rposition(|&b| b == b'\n').map_or(0, |p| p + 1);
        let end = bytes[bad..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(bytes.len(), |p| bad + p);
        CatalogError::Malformed {
            medium: medium.to_string(),
            line: bytes[..bad].iter().filter(|&&b| b == b'\n').count() + 1,
            value: String::from_utf8_lossy(&bytes[start..end]).into_owned(),
            reason: "invalid UTF-8".to_string(),
        }
    })
}

fn read_synthesis(medium: &str, path: &Path) -> Result<Catalog, CatalogError> {
    let text = read_catalog_text(medium, path)?;
    let mut parsed = parse_catalog(&text, medium)?;
    for record in &mut parsed.records {
        record.partial_files = true;
    }
    let mut data = CatalogData::new(medium, parsed.records);
    data.source = parsed.header;
    Ok(Catalog::Synthesis(data))
}

fn warn_duplicate_filenames(medium: &str, records: &[PackageRecord]) {
    let mut seen = BTreeSet::new();
    for record in records {
        let filename = record.filename();
        if !seen.insert(filename.clone()) {
            warn!(
                "there are multiple packages with the same rpm filename \"{}\" in medium \"{}\"",
                filename, medium
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medium::{MediumOptions, MediumRegistry};
    use tempfile::{tempdir, TempDir};

    const FULL: &str = "\
@provides@libfoo.so.1
@summary@Foo library
@description@A library
@files@/usr/lib/libfoo.so.1@/usr/share/doc/foo
@info@foo-1.0-1mdk.i586@0@1000@System/Libraries
@requires@/usr/lib/libfoo.so.1
@files@/usr/bin/app
@info@app-2.0-1mdk.i586@0@2000@Applications
";

    fn setup(text: &str) -> (TempDir, CatalogStore, Medium) {
        let dir = tempdir().unwrap();
        let media_dir = dir.path().join("main");
        fs::create_dir_all(media_dir.join("media_info")).unwrap();
        let bytes = compression::compress(text.as_bytes(), CompressionFormat::Gzip).unwrap();
        fs::write(media_dir.join("media_info/hdlist.cz"), bytes).unwrap();

        let mut reg = MediumRegistry::new(dir.path().join("lib"));
        let medium = reg
            .add("main", media_dir.to_str().unwrap(), MediumOptions::default())
            .unwrap()
            .clone();
        let store = CatalogStore::new(StoreOptions::new(dir.path().join("cache")));
        (dir, store, medium)
    }

    #[test]
    fn test_load_builds_and_reuses_synthesis() {
        let (_dir, store, medium) = setup(FULL);

        let first = store.load(&medium).unwrap();
        assert!(!first.is_full());
        assert_eq!(first.len(), 2);
        assert!(store.synthesis_path("main").exists());
        assert_eq!(store.take_dirty(), vec!["main".to_string()]);

        let second = store.load(&medium).unwrap();
        assert_eq!(second.len(), 2);
        assert!(!store.is_dirty("main"));
        assert_eq!(store.record_count("main"), Some(2));
    }

    #[test]
    fn test_rebuild_is_byte_identical() {
        let (_dir, store, medium) = setup(FULL);
        store.rebuild_synthesis(&medium).unwrap();
        let first = fs::read(store.synthesis_path("main")).unwrap();
        store.rebuild_synthesis(&medium).unwrap();
        let second = fs::read(store.synthesis_path("main")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_changed_source_invalidates_synthesis() {
        let (_dir, store, medium) = setup(FULL);
        store.load(&medium).unwrap();
        store.take_dirty();

        let more = format!("{FULL}@info@extra-1-1mdk.noarch@0@1@Misc\n");
        fs::write(&medium.catalog_path, more).unwrap();

        let reloaded = store.load(&medium).unwrap();
        assert_eq!(reloaded.len(), 3);
        assert!(store.is_dirty("main"));
    }

    #[test]
    fn test_full_load_without_cache() {
        let (_dir, mut store, medium) = setup(FULL);
        store.options.prefer_synthesis = false;
        let catalog = store.load(&medium).unwrap();
        assert!(catalog.is_full());
        assert_eq!(catalog.records()[0].description, "A library");
        assert!(!store.synthesis_path("main").exists());
    }

    #[test]
    fn test_empty_catalog_needs_allow_empty() {
        let (_dir, store, mut medium) = setup("# empty\n");
        assert!(matches!(
            store.load(&medium),
            Err(CatalogError::NoHeadersFound { .. })
        ));
        medium.allow_empty = true;
        assert!(store.load(&medium).unwrap().is_empty());
    }

    #[test]
    fn test_synthesis_only_medium() {
        let (_dir, store, mut medium) = setup(FULL);
        medium.synthesis_only = true;
        assert!(matches!(
            store.load_full(&medium),
            Err(CatalogError::NoFullCatalog { .. })
        ));
        let catalog = store.load(&medium).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(!store.synthesis_path("main").exists());
    }

    #[test]
    fn test_unreadable_source() {
        let (_dir, store, mut medium) = setup(FULL);
        medium.catalog_path = medium.catalog_path.with_file_name("missing.cz");
        assert!(matches!(
            store.load(&medium),
            Err(CatalogError::Unreadable { .. })
        ));
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let (_dir, store, medium) = setup(FULL);
        fs::write(
            &medium.catalog_path,
            b"@provides@a\n@summary@caf\xe9\n@info@a-1-1.noarch@0@1@G\n",
        )
        .unwrap();

        match store.load_full(&medium).unwrap_err() {
            CatalogError::Malformed { line, value, .. } => {
                assert_eq!(line, 2);
                assert!(value.starts_with("@summary@caf"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_clean_cache_removes_unknown_media() {
        let (_dir, store, medium) = setup(FULL);
        store.load(&medium).unwrap();
        fs::write(store.synthesis_path("gone"), b"").unwrap();

        assert_eq!(store.cached_media().unwrap(), vec!["gone", "main"]);
        assert_eq!(store.clean_cache(&["main"]).unwrap(), 1);
        assert_eq!(store.cached_media().unwrap(), vec!["main"]);
    }

    #[test]
    fn test_load_all_reports_each_medium() {
        let (_dir, store, medium) = setup(FULL);
        let mut broken = medium.clone();
        broken.name = "broken".to_string();
        broken.catalog_path = broken.catalog_path.with_file_name("missing.cz");

        let results = store.load_all(&[medium, broken], 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "main");
        assert!(results[0].1.is_ok());
        assert_eq!(results[1].0, "broken");
        assert!(results[1].1.is_err());
    }
}
