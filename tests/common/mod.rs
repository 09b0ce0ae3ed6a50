// tests/common/mod.rs

//! Shared fixtures for integration tests: scratch media on disk and a
//! session configured to use them.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;
use urpm::{Config, MediumOptions, Session};

/// A package block in catalog text form
#[derive(Debug, Clone, Default)]
pub struct Pkg {
    fullname: String,
    size: u64,
    provides: Vec<String>,
    requires: Vec<String>,
    conflicts: Vec<String>,
    obsoletes: Vec<String>,
    files: Vec<String>,
    summary: Option<String>,
}

pub fn pkg(fullname: &str) -> Pkg {
    Pkg {
        fullname: fullname.to_string(),
        size: 1000,
        ..Default::default()
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Pkg {
    pub fn provides(mut self, caps: &[&str]) -> Self {
        self.provides = owned(caps);
        self
    }

    pub fn requires(mut self, caps: &[&str]) -> Self {
        self.requires = owned(caps);
        self
    }

    pub fn conflicts(mut self, caps: &[&str]) -> Self {
        self.conflicts = owned(caps);
        self
    }

    pub fn obsoletes(mut self, caps: &[&str]) -> Self {
        self.obsoletes = owned(caps);
        self
    }

    pub fn files(mut self, files: &[&str]) -> Self {
        self.files = owned(files);
        self
    }

    pub fn summary(mut self, summary: &str) -> Self {
        self.summary = Some(summary.to_string());
        self
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (tag, values) in [
            ("provides", &self.provides),
            ("requires", &self.requires),
            ("conflicts", &self.conflicts),
            ("obsoletes", &self.obsoletes),
        ] {
            if !values.is_empty() {
                out.push_str(&format!("@{}@{}\n", tag, values.join("@")));
            }
        }
        if let Some(summary) = &self.summary {
            out.push_str(&format!("@summary@{}\n", summary));
        }
        if !self.files.is_empty() {
            out.push_str(&format!("@files@{}\n", self.files.join("@")));
        }
        out.push_str(&format!("@info@{}@0@{}@Testing\n", self.fullname, self.size));
        out
    }
}

pub fn catalog(pkgs: &[Pkg]) -> String {
    pkgs.iter().map(Pkg::render).collect()
}

/// Scratch directory holding configuration, cache and media
pub struct TestEnv {
    pub dir: TempDir,
    pub config: Config,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.paths.media_file = dir.path().join("etc/media.toml");
        config.paths.cache_dir = dir.path().join("cache");
        config.paths.catalog_dir = dir.path().join("lib");
        config.paths.depslist = dir.path().join("lib/depslist.ordered");
        config.catalog.workers = 2;
        Self { dir, config }
    }

    pub fn session(&self) -> Session {
        Session::with_config(self.config.clone()).unwrap()
    }

    /// Directory of medium `name`
    pub fn origin(&self, name: &str) -> PathBuf {
        self.dir.path().join("media").join(name)
    }

    /// Full catalog path of medium `name`
    pub fn catalog_path(&self, name: &str) -> PathBuf {
        self.origin(name).join("media_info/hdlist.cz")
    }

    pub fn write_catalog(&self, name: &str, pkgs: &[Pkg]) -> PathBuf {
        let path = self.catalog_path(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, catalog(pkgs)).unwrap();
        path
    }

    /// Write the catalog and register the medium with `session`
    pub fn add_medium(&self, session: &Session, name: &str, options: MediumOptions, pkgs: &[Pkg]) {
        self.write_catalog(name, pkgs);
        session
            .add_medium(name, self.origin(name).to_str().unwrap(), options)
            .unwrap();
    }
}

pub fn update_medium() -> MediumOptions {
    MediumOptions {
        update: true,
        ..Default::default()
    }
}

/// Installed set read from a catalog-format list, as an installer would
/// supply it
pub fn installed(env: &TestEnv, pkgs: &[Pkg]) -> urpm::InstalledSet {
    let path = env.dir.path().join("installed.list");
    fs::write(&path, catalog(pkgs)).unwrap();
    urpm::InstalledSet::load(&path).unwrap()
}
