// src/depslist.rs

//! The `depslist.ordered` artifact
//!
//! One line per package of the full catalogs, dependencies before their
//! dependents:
//!
//! ```text
//! name-version-release.arch size dep dep|alt ...
//! ```
//!
//! Each `dep` is the line number (from 0) of a package satisfying one
//! requirement; `a|b` lists alternative providers. A package whose line
//! number changes between two computations counts as relocated.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::catalog::{Catalog, RecordRef};
use crate::error::{Error, Result};
use crate::index::{CapabilityIndex, FileIndex};
use crate::resolver::DependencyGraph;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepslistEntry {
    pub fullname: String,
    pub size: u64,
    /// Per requirement, the positions of its providers
    pub deps: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Depslist {
    entries: Vec<DepslistEntry>,
}

impl Depslist {
    /// Order the records of the full catalogs among `catalogs`
    ///
    /// Fails with [`Error::NoFullMedia`] when none of them is a full catalog.
    pub fn compute<'a>(catalogs: impl IntoIterator<Item = &'a Catalog>) -> Result<Self> {
        let full: Vec<&Catalog> = catalogs.into_iter().filter(|c| c.is_full()).collect();
        if full.is_empty() {
            return Err(Error::NoFullMedia);
        }

        let mut ids: HashMap<String, usize> = HashMap::new();
        let mut records: Vec<RecordRef> = Vec::new();
        for record in full.iter().flat_map(|c| c.records()) {
            if let Entry::Vacant(slot) = ids.entry(record.fullname()) {
                slot.insert(records.len());
                records.push(RecordRef::clone(record));
            }
        }

        let mut index = CapabilityIndex::build(full.iter().copied());
        index.attach_files(FileIndex::build(full.iter().copied()));

        // requirement -> provider ids, per record
        let requirements: Vec<Vec<Vec<usize>>> = records
            .iter()
            .enumerate()
            .map(|(id, record)| {
                record
                    .requires
                    .iter()
                    .filter(|req| !req.is_rpmlib())
                    .map(|req| {
                        let mut providers: Vec<usize> = index
                            .find_providers(req)
                            .iter()
                            .filter_map(|p| ids.get(&p.fullname()).copied())
                            .filter(|&other| other != id)
                            .collect();
                        providers.sort_unstable();
                        providers.dedup();
                        providers
                    })
                    .filter(|providers| !providers.is_empty())
                    .collect()
            })
            .collect();

        let mut graph = DependencyGraph::with_nodes(records.len());
        for (id, reqs) in requirements.iter().enumerate() {
            for &provider in reqs.iter().flatten() {
                graph.add_edge(id, provider);
            }
        }

        let order: Vec<usize> = graph.install_order().into_iter().flatten().collect();
        let mut position = vec![0usize; records.len()];
        for (pos, &id) in order.iter().enumerate() {
            position[id] = pos;
        }

        let entries = order
            .iter()
            .map(|&id| {
                let mut deps: Vec<Vec<usize>> = requirements[id]
                    .iter()
                    .map(|providers| {
                        let mut alternatives: Vec<usize> =
                            providers.iter().map(|&p| position[p]).collect();
                        alternatives.sort_unstable();
                        alternatives
                    })
                    .collect();
                deps.sort();
                deps.dedup();
                DepslistEntry {
                    fullname: records[id].fullname(),
                    size: records[id].size,
                    deps,
                }
            })
            .collect();

        Ok(Self { entries })
    }

    /// Parse an existing artifact; malformed lines are skipped
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let fullname = fields.next()?.to_string();
                let size = fields.next()?.parse().ok()?;
                let deps = fields
                    .map(|field| {
                        field
                            .split('|')
                            .filter_map(|p| p.parse().ok())
                            .collect::<Vec<usize>>()
                    })
                    .collect();
                Some(DepslistEntry {
                    fullname,
                    size,
                    deps,
                })
            })
            .collect();
        Self { entries }
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.fullname);
            out.push(' ');
            out.push_str(&entry.size.to_string());
            for alternatives in &entry.deps {
                let rendered: Vec<String> = alternatives.iter().map(usize::to_string).collect();
                out.push(' ');
                out.push_str(&rendered.join("|"));
            }
            out.push('\n');
        }
        out
    }

    pub fn entries(&self) -> &[DepslistEntry] {
        &self.entries
    }

    pub fn position(&self, fullname: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.fullname == fullname)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Packages present in both lists whose position differs
    pub fn relocations(&self, previous: &Depslist) -> usize {
        let before: HashMap<&str, usize> = previous
            .entries
            .iter()
            .enumerate()
            .map(|(pos, e)| (e.fullname.as_str(), pos))
            .collect();
        self.entries
            .iter()
            .enumerate()
            .filter(|(pos, e)| before.get(e.fullname.as_str()).is_some_and(|old| old != pos))
            .count()
    }
}

/// What [`update_depslist`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepslistReport {
    pub entries: usize,
    pub relocated: usize,
    pub written: bool,
}

/// Recompute the artifact at `path` and rewrite it if it changed
pub fn update_depslist<'a>(
    catalogs: impl IntoIterator<Item = &'a Catalog>,
    path: &Path,
) -> Result<DepslistReport> {
    let computed = Depslist::compute(catalogs)?;
    let new_text = computed.to_text();

    let old_text = match std::fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            return Err(Error::IoError {
                path: path.display().to_string(),
                source: e,
            })
        }
    };

    let relocated = old_text
        .as_deref()
        .map(|text| computed.relocations(&Depslist::parse(text)))
        .unwrap_or(0);
    if relocated == 0 {
        info!("no entries relocated in depslist");
    } else {
        info!("{} entries relocated in depslist", relocated);
    }

    let written = old_text.as_deref() != Some(new_text.as_str());
    if written {
        write_atomic(path, new_text.as_bytes())?;
        info!("write depslist file [{}]", path.display());
    } else {
        debug!("depslist unchanged");
    }

    Ok(DepslistReport {
        entries: computed.len(),
        relocated,
        written,
    })
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let io_error = |source| Error::IoError {
        path: path.display().to_string(),
        source,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(io_error)?;

    let mut tmp = NamedTempFile::new_in(&dir).map_err(io_error)?;
    tmp.write_all(bytes).map_err(io_error)?;
    tmp.as_file().sync_all().map_err(io_error)?;
    tmp.persist(path).map_err(|e| io_error(e.error))?;
    Ok(())
}
