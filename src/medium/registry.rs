// src/medium/registry.rs

//! The set of configured media
//!
//! Adding, removing, selecting and ignoring media, plus the active-media
//! filter the resolver works from. The registry is shared by a session as
//! `Arc<parking_lot::RwLock<MediumRegistry>>`: one writer, many readers.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info};

use crate::config::ConfigError;

use super::{Medium, MediumOptions, Origin, DEFAULT_CATALOG};

/// Default number of distinct removable mount points
pub const DEFAULT_MAX_MOUNT_POINTS: usize = 1;

#[derive(Debug, Clone)]
pub struct MediumRegistry {
    media: Vec<Medium>,
    /// Where catalogs of remote media are stored once retrieved
    catalog_dir: PathBuf,
    max_mount_points: usize,
    /// Media removed since the last flush
    removed: BTreeSet<String>,
}

impl MediumRegistry {
    pub fn new(catalog_dir: impl Into<PathBuf>) -> Self {
        Self {
            media: Vec::new(),
            catalog_dir: catalog_dir.into(),
            max_mount_points: DEFAULT_MAX_MOUNT_POINTS,
            removed: BTreeSet::new(),
        }
    }

    pub fn with_max_mount_points(mut self, max: usize) -> Self {
        self.max_mount_points = max;
        self
    }

    pub fn max_mount_points(&self) -> usize {
        self.max_mount_points
    }

    pub fn catalog_dir(&self) -> &Path {
        &self.catalog_dir
    }

    /// Add a medium
    ///
    /// An empty `name` is derived from the origin. The catalog path is
    /// resolved against the origin for local media and against the catalog
    /// directory for remote ones.
    pub fn add(
        &mut self,
        name: &str,
        origin: &str,
        options: MediumOptions,
    ) -> Result<&Medium, ConfigError> {
        let parsed = Origin::parse(origin)?;

        let name = if name.is_empty() {
            let derived = parsed.derived_name().ok_or_else(|| ConfigError::InvalidOrigin {
                origin: origin.to_string(),
                reason: "no name can be derived".to_string(),
            })?;
            if self.get(&derived).is_some() {
                return Err(ConfigError::UnnamedMediumTaken(derived));
            }
            derived
        } else {
            name.to_string()
        };

        if self.get(&name).is_some() {
            return Err(ConfigError::DuplicateMedium(name));
        }

        let with_path = options
            .with_path
            .clone()
            .unwrap_or_else(|| DEFAULT_CATALOG.to_string());
        let catalog_path = match parsed.local_path() {
            Some(dir) => dir.join(&with_path),
            None => self.catalog_dir.join(format!("hdlist.{name}.cz")),
        };

        if let Some(owner) = self.media.iter().find(|m| m.catalog_path == catalog_path) {
            return Err(ConfigError::DuplicateCatalog {
                path: catalog_path,
                medium: owner.name.clone(),
            });
        }

        let removable = parsed.is_removable();
        let mount_point = if removable {
            options
                .mount_point
                .clone()
                .or_else(|| parsed.local_path().map(Path::to_path_buf))
        } else {
            None
        };

        if let Some(mount) = &mount_point {
            let mounts = self.mount_points();
            if !mounts.contains(mount) && mounts.len() >= self.max_mount_points {
                return Err(ConfigError::TooManyMountPoints {
                    max: self.max_mount_points,
                });
            }
        }

        let medium = Medium {
            name: name.clone(),
            origin: origin.to_string(),
            with_path,
            catalog_path,
            removable,
            update: options.update,
            ignored: options.ignored,
            selected: true,
            mount_point,
            synthesis_only: options.synthesis_only,
            allow_empty: options.allow_empty,
            last_update: None,
            modified: true,
        };

        info!("added medium {} ({})", medium.name, medium.origin);
        self.media.push(medium);
        Ok(&self.media[self.media.len() - 1])
    }

    /// Insert an already configured medium, as read back from the media file
    pub(crate) fn insert_loaded(&mut self, medium: Medium) -> Result<(), ConfigError> {
        if self.get(&medium.name).is_some() {
            return Err(ConfigError::DuplicateMedium(medium.name));
        }
        if let Some(owner) = self
            .media
            .iter()
            .find(|m| m.catalog_path == medium.catalog_path)
        {
            return Err(ConfigError::DuplicateCatalog {
                path: medium.catalog_path,
                medium: owner.name.clone(),
            });
        }
        if let Some(mount) = &medium.mount_point {
            let mounts = self.mount_points();
            if !mounts.contains(mount) && mounts.len() >= self.max_mount_points {
                return Err(ConfigError::TooManyMountPoints {
                    max: self.max_mount_points,
                });
            }
        }
        self.media.push(medium);
        Ok(())
    }

    /// Remove a medium, returning it
    pub fn remove(&mut self, name: &str) -> Result<Medium, ConfigError> {
        let pos = self
            .media
            .iter()
            .position(|m| m.name == name)
            .ok_or_else(|| ConfigError::MediumNotFound {
                name: name.to_string(),
                action: "remove",
            })?;

        let medium = self.media.remove(pos);
        self.removed.insert(medium.name.clone());
        info!("removing medium \"{}\"", name);
        Ok(medium)
    }

    /// Select or deselect media by name
    ///
    /// All names are checked before any flag changes.
    pub fn set_selection<S: AsRef<str>>(
        &mut self,
        names: &[S],
        select: bool,
    ) -> Result<(), ConfigError> {
        for name in names {
            if self.get(name.as_ref()).is_none() {
                return Err(ConfigError::MediumNotFound {
                    name: name.as_ref().to_string(),
                    action: "select",
                });
            }
        }

        for name in names {
            if let Some(medium) = self.get_mut(name.as_ref())
                && medium.selected != select
            {
                medium.selected = select;
                medium.modified = true;
            }
        }
        Ok(())
    }

    pub fn set_ignored(&mut self, name: &str, ignored: bool) -> Result<(), ConfigError> {
        let medium = self
            .get_mut(name)
            .ok_or_else(|| ConfigError::MediumNotFound {
                name: name.to_string(),
                action: "ignore",
            })?;
        if medium.ignored != ignored {
            medium.ignored = ignored;
            medium.modified = true;
            info!(
                "{} medium \"{}\"",
                if ignored { "ignoring" } else { "using" },
                name
            );
        }
        Ok(())
    }

    /// Media taking part in resolution
    ///
    /// Ignored and deselected media are never active; removable media only
    /// with `include_removable`; with `update_only` only update media.
    pub fn active_media(&self, include_removable: bool, update_only: bool) -> Vec<&Medium> {
        self.media
            .iter()
            .filter(|m| !m.ignored && m.selected)
            .filter(|m| include_removable || !m.removable)
            .filter(|m| !update_only || m.update)
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&Medium> {
        self.media.iter().find(|m| m.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Medium> {
        self.media.iter_mut().find(|m| m.name == name)
    }

    /// All media in configuration order
    pub fn media(&self) -> &[Medium] {
        &self.media
    }

    pub fn names(&self) -> Vec<&str> {
        self.media.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.media.len()
    }

    pub fn is_empty(&self) -> bool {
        self.media.is_empty()
    }

    /// Distinct mount points claimed by removable media
    pub fn mount_points(&self) -> BTreeSet<PathBuf> {
        self.media
            .iter()
            .filter_map(|m| m.mount_point.clone())
            .collect()
    }

    pub fn mark_modified(&mut self, name: &str) -> Result<(), ConfigError> {
        let medium = self
            .get_mut(name)
            .ok_or_else(|| ConfigError::MediumNotFound {
                name: name.to_string(),
                action: "update",
            })?;
        medium.modified = true;
        Ok(())
    }

    /// Names of media changed since the last flush
    pub fn modified_media(&self) -> Vec<&str> {
        self.media
            .iter()
            .filter(|m| m.modified)
            .map(|m| m.name.as_str())
            .collect()
    }

    /// Does the registry differ from what was last persisted?
    pub fn is_modified(&self) -> bool {
        !self.removed.is_empty() || self.media.iter().any(|m| m.modified)
    }

    pub fn clear_modified(&mut self) {
        for medium in &mut self.media {
            medium.modified = false;
        }
        self.removed.clear();
    }

    /// Record a successful update of a medium
    pub fn touch_updated(&mut self, name: &str) -> Result<(), ConfigError> {
        let medium = self
            .get_mut(name)
            .ok_or_else(|| ConfigError::MediumNotFound {
                name: name.to_string(),
                action: "update",
            })?;
        medium.last_update = Some(Utc::now());
        medium.modified = true;
        debug!("medium \"{}\" updated at {:?}", name, medium.last_update);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> MediumRegistry {
        MediumRegistry::new("/var/lib/urpmi")
    }

    fn update_opts() -> MediumOptions {
        MediumOptions {
            update: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_add_resolves_catalog_paths() {
        let mut reg = registry();
        let local = reg
            .add("main", "/mnt/mirror/main", MediumOptions::default())
            .unwrap();
        assert_eq!(
            local.catalog_path,
            PathBuf::from("/mnt/mirror/main/media_info/hdlist.cz")
        );
        assert!(local.modified);

        let remote = reg
            .add("updates", "http://mirror.example.org/updates", update_opts())
            .unwrap();
        assert_eq!(
            remote.catalog_path,
            PathBuf::from("/var/lib/urpmi/hdlist.updates.cz")
        );
        assert!(remote.update);
    }

    #[test]
    fn test_add_rejects_duplicates() {
        let mut reg = registry();
        reg.add("main", "/mnt/a", MediumOptions::default()).unwrap();

        let err = reg.add("main", "/mnt/b", MediumOptions::default()).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateMedium(ref n) if n == "main"));

        let err = reg.add("other", "/mnt/a", MediumOptions::default()).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateCatalog { ref medium, .. } if medium == "main"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_unnamed_medium_takes_origin_name() {
        let mut reg = registry();
        let added = reg.add("", "/mnt/mirror/contrib", MediumOptions::default()).unwrap();
        assert_eq!(added.name, "contrib");

        let err = reg
            .add("", "/srv/other/contrib", MediumOptions::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnnamedMediumTaken(ref n) if n == "contrib"));
    }

    #[test]
    fn test_remove_and_select_unknown() {
        let mut reg = registry();
        reg.add("main", "/mnt/a", MediumOptions::default()).unwrap();

        assert!(matches!(
            reg.remove("nope"),
            Err(ConfigError::MediumNotFound { action: "remove", .. })
        ));
        assert!(matches!(
            reg.set_selection(&["main", "nope"], false),
            Err(ConfigError::MediumNotFound { action: "select", .. })
        ));
        // nothing changed by the failed call
        assert!(reg.get("main").unwrap().selected);

        let removed = reg.remove("main").unwrap();
        assert_eq!(removed.name, "main");
        assert!(reg.is_empty());
    }

    #[test]
    fn test_active_media_filters() {
        let mut reg = registry().with_max_mount_points(2);
        reg.add("main", "/mnt/main", MediumOptions::default()).unwrap();
        reg.add("updates", "/mnt/updates", update_opts()).unwrap();
        reg.add("cd", "removable://mnt/cdrom", MediumOptions::default())
            .unwrap();
        reg.add("old", "/mnt/old", MediumOptions::default()).unwrap();
        reg.set_ignored("old", true).unwrap();

        let names = |media: Vec<&Medium>| media.iter().map(|m| m.name.clone()).collect::<Vec<_>>();
        assert_eq!(names(reg.active_media(true, false)), vec!["main", "updates", "cd"]);
        assert_eq!(names(reg.active_media(false, false)), vec!["main", "updates"]);
        assert_eq!(names(reg.active_media(true, true)), vec!["updates"]);

        reg.set_selection(&["updates"], false).unwrap();
        assert!(reg.active_media(true, true).is_empty());
    }

    #[test]
    fn test_mount_point_limit() {
        let mut reg = registry();
        reg.add("cd1", "removable://mnt/cdrom", MediumOptions::default())
            .unwrap();
        // same mount point is fine
        reg.add(
            "cd2",
            "removable://mnt/cdrom",
            MediumOptions {
                with_path: Some("media_info/hdlist2.cz".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let err = reg
            .add("dvd", "removable://mnt/dvd", MediumOptions::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::TooManyMountPoints { max: 1 }));
    }

    #[test]
    fn test_modified_tracking() {
        let mut reg = registry();
        reg.add("main", "/mnt/main", MediumOptions::default()).unwrap();
        assert_eq!(reg.modified_media(), vec!["main"]);

        reg.clear_modified();
        assert!(reg.modified_media().is_empty());

        reg.touch_updated("main").unwrap();
        assert!(reg.get("main").unwrap().last_update.is_some());
        assert_eq!(reg.modified_media(), vec!["main"]);
    }
}
