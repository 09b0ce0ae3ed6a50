// src/session.rs

//! Process-scoped session
//!
//! A [`Session`] owns the configuration, the media registry, the catalog
//! store and the current index snapshot. It is created explicitly from the
//! persisted configuration and written back explicitly with
//! [`Session::flush`]; nothing is saved implicitly on drop.
//!
//! The registry sits behind a `parking_lot::RwLock` (single writer, many
//! readers). Index snapshots are immutable `Arc<CapabilityIndex>` values:
//! rebuilding publishes a new snapshot and resolutions in flight keep the
//! one they started with.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, CatalogStore, StoreOptions};
use crate::config::{load_config, Config};
use crate::depslist::{update_depslist, DepslistReport};
use crate::error::{Error, Result};
use crate::index::files::FileIndex;
use crate::index::CapabilityIndex;
use crate::medium::config::{load_registry, save_registry};
use crate::medium::{Medium, MediumOptions, MediumRegistry};
use crate::resolver::{InstalledSet, Request, Resolution, Resolver};
use crate::retrieval::{fetch_with_timeout, Retriever};

pub struct Session {
    config: Config,
    registry: Arc<RwLock<MediumRegistry>>,
    store: CatalogStore,
    catalogs: RwLock<BTreeMap<String, Catalog>>,
    index: RwLock<Arc<CapabilityIndex>>,
}

impl Session {
    /// Read the configuration at `config_path` and the media file it names
    pub fn init(config_path: &Path) -> Result<Self> {
        let config = load_config(config_path)?;
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Result<Self> {
        let registry = load_registry(&config.paths.media_file, &config.paths.catalog_dir)?;
        info!(
            "session started with {} media from {}",
            registry.len(),
            config.paths.media_file.display()
        );

        let store = CatalogStore::new(StoreOptions {
            cache_dir: config.paths.cache_dir.clone(),
            prefer_synthesis: config.catalog.prefer_synthesis,
            algorithm: config.catalog.fingerprint,
            freshness: config.catalog.freshness,
        });

        Ok(Self {
            config,
            registry: Arc::new(RwLock::new(registry)),
            store,
            catalogs: RwLock::new(BTreeMap::new()),
            index: RwLock::new(Arc::new(CapabilityIndex::new())),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared handle to the registry
    pub fn registry(&self) -> Arc<RwLock<MediumRegistry>> {
        Arc::clone(&self.registry)
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    /// Current index snapshot
    pub fn index(&self) -> Arc<CapabilityIndex> {
        Arc::clone(&self.index.read())
    }

    pub fn add_medium(&self, name: &str, origin: &str, options: MediumOptions) -> Result<String> {
        let mut registry = self.registry.write();
        let medium = registry.add(name, origin, options)?;
        info!("added medium {}", medium.name);
        Ok(medium.name.clone())
    }

    /// Remove a medium and drop its records from the index
    pub fn remove_medium(&self, name: &str) -> Result<Medium> {
        let removed = self.registry.write().remove(name)?;
        self.catalogs.write().remove(name);
        let mut next = (*self.index()).clone();
        if next.remove_medium(name) {
            self.publish(next);
        }
        Ok(removed)
    }

    /// Load the catalogs of every non-ignored medium and rebuild the index
    ///
    /// A medium that fails to load is logged and left out; the others are
    /// still loaded. Returns the number of media loaded.
    pub fn load_media(&self) -> Result<usize> {
        let media: Vec<Medium> = self
            .registry
            .read()
            .media()
            .iter()
            .filter(|m| !m.is_ignored())
            .cloned()
            .collect();

        let results = self.store.load_all(&media, self.config.catalog.workers);
        let mut loaded = 0;
        {
            let mut catalogs = self.catalogs.write();
            for (name, result) in results {
                if let Ok(catalog) = result {
                    catalogs.insert(name, catalog);
                    loaded += 1;
                }
            }
        }

        self.build_index();
        Ok(loaded)
    }

    /// Rebuild the index from the loaded catalogs and publish it
    pub fn build_index(&self) -> Arc<CapabilityIndex> {
        let index = {
            let catalogs = self.catalogs.read();
            CapabilityIndex::build(catalogs.values())
        };
        debug!(
            "index built: {} packages, {} capabilities",
            index.len(),
            index.capability_names().len()
        );
        self.publish(index)
    }

    fn publish(&self, index: CapabilityIndex) -> Arc<CapabilityIndex> {
        let snapshot = Arc::new(index);
        *self.index.write() = Arc::clone(&snapshot);
        snapshot
    }

    /// Full catalogs of the non-ignored media that have one
    fn full_catalogs(&self) -> Vec<Catalog> {
        let media: Vec<Medium> = self
            .registry
            .read()
            .media()
            .iter()
            .filter(|m| !m.is_ignored() && !m.synthesis_only)
            .cloned()
            .collect();

        media
            .iter()
            .filter_map(|medium| {
                if let Some(catalog) = self.catalogs.read().get(&medium.name)
                    && catalog.is_full()
                {
                    return Some(catalog.clone());
                }
                match self.store.load_full(medium) {
                    Ok(catalog) => Some(catalog),
                    Err(e) => {
                        warn!("no full catalog for medium \"{}\": {}", medium.name, e);
                        None
                    }
                }
            })
            .collect()
    }

    /// Build the file index from the full catalogs and attach it to a new
    /// snapshot
    pub fn attach_file_index(&self) -> Arc<CapabilityIndex> {
        let full = self.full_catalogs();
        let files = FileIndex::build(&full);
        info!("file index built: {} paths", files.len());

        let mut next = (*self.index()).clone();
        next.attach_files(files);
        self.publish(next)
    }

    /// Update media: fetch remote catalogs, refresh syntheses, reload
    ///
    /// With an empty `names` every non-ignored medium is updated. Each
    /// medium gets its own result; failures do not stop the others.
    pub fn update_media<S: AsRef<str>>(
        &self,
        retriever: Arc<dyn Retriever>,
        names: &[S],
    ) -> Vec<(String, Result<()>)> {
        let media: Vec<Medium> = {
            let registry = self.registry.read();
            registry
                .media()
                .iter()
                .filter(|m| !m.is_ignored())
                .filter(|m| names.is_empty() || names.iter().any(|n| n.as_ref() == m.name))
                .cloned()
                .collect()
        };
        let timeout = Duration::from_secs(self.config.retrieval.timeout_secs);

        let mut results = Vec::new();
        for medium in media {
            let outcome = self.update_one(Arc::clone(&retriever), &medium, timeout);
            match &outcome {
                Ok(()) => {
                    if let Err(e) = self.registry.write().touch_updated(&medium.name) {
                        warn!("{}", e);
                    }
                }
                Err(e) => warn!("unable to update medium \"{}\": {}", medium.name, e),
            }
            results.push((medium.name.clone(), outcome));
        }

        if let Err(e) = self.load_media() {
            warn!("reloading media failed: {}", e);
        }
        results
    }

    fn update_one(
        &self,
        retriever: Arc<dyn Retriever>,
        medium: &Medium,
        timeout: Duration,
    ) -> Result<()> {
        if let Some(url) = medium.remote_catalog_url() {
            info!("retrieving source hdlist (or synthesis) of \"{}\"...", medium.name);
            fetch_with_timeout(retriever, &url, &medium.catalog_path, timeout)?;
        }

        if medium.synthesis_only {
            self.store.load(medium)?;
        } else {
            self.store.rebuild_synthesis(medium)?;
        }
        Ok(())
    }

    /// Resolve `request` over the current snapshot
    pub fn resolve(&self, request: &Request, installed: &InstalledSet) -> Result<Resolution> {
        let index = self.index();
        let registry = self.registry.read();
        let resolution = Resolver::new(&index, &registry, installed)
            .with_policy(self.config.resolver.clone())
            .resolve(request)?;
        Ok(resolution)
    }

    /// Recompute `depslist.ordered` from the full catalogs
    ///
    /// Without any full catalog nothing is written and `None` is returned.
    pub fn write_depslist(&self) -> Result<Option<DepslistReport>> {
        let full = self.full_catalogs();
        match update_depslist(&full, &self.config.paths.depslist) {
            Ok(report) => Ok(Some(report)),
            Err(Error::NoFullMedia) => {
                info!("no full media list was found");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Persist the registry if it changed and drop cache entries of media
    /// that no longer exist
    pub fn flush(&self) -> Result<()> {
        let mut registry = self.registry.write();
        let rebuilt = self.store.take_dirty();

        if registry.is_modified() || !rebuilt.is_empty() {
            let media_file = &self.config.paths.media_file;
            save_registry(&registry, media_file)?;
            registry.clear_modified();
        } else {
            debug!("media registry unchanged");
        }

        let known: Vec<String> = registry.names().into_iter().map(str::to_string).collect();
        self.store
            .clean_cache(&known)
            .map_err(|e| Error::IoError {
                path: self.config.paths.cache_dir.display().to_string(),
                source: e,
            })?;
        Ok(())
    }
}
