// src/commands/catalog.rs
//! Synthesis, query and depslist commands

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;
use urpm::{what_provides, Capability, Query, QueryField, Session};

use super::open_loaded;

/// Rebuild the synthesis of the named media (all when empty)
pub fn cmd_synthesis(config_path: &str, media: &[String]) -> Result<()> {
    let session = Session::init(Path::new(config_path))?;
    let registry = session.registry();
    let targets: Vec<urpm::Medium> = registry
        .read()
        .media()
        .iter()
        .filter(|m| !m.is_ignored() && !m.synthesis_only)
        .filter(|m| media.is_empty() || media.contains(&m.name))
        .cloned()
        .collect();

    for medium in &targets {
        let catalog = session.store().rebuild_synthesis(medium)?;
        println!("{}: {} packages", medium.name, catalog.len());
    }
    session.flush()?;
    Ok(())
}

pub fn cmd_query(
    config_path: &str,
    pattern: &str,
    field: &str,
    regex: bool,
    ignore_case: bool,
) -> Result<()> {
    let field: QueryField = field
        .parse()
        .with_context(|| format!("unknown query field {field}"))?;
    let query = Query::new(field, pattern, regex, ignore_case)?;

    let session = open_loaded(config_path)?;
    let index = if field == QueryField::Files {
        session.attach_file_index()
    } else {
        session.index()
    };

    let matches = query.run(&index);
    if matches.is_empty() {
        println!("No package found");
    }
    for found in matches {
        for value in &found.matched {
            println!("{}:{}", found.package.fullname(), value);
        }
    }
    Ok(())
}

pub fn cmd_what_provides(config_path: &str, capability: &str) -> Result<()> {
    let capability = Capability::parse(capability)?;
    let session = open_loaded(config_path)?;
    let index = if capability.is_file() {
        session.attach_file_index()
    } else {
        session.index()
    };

    let providers = what_provides(&index, &capability);
    if providers.is_empty() {
        println!("no package provides {}", capability.to_display_string());
    }
    for provider in providers {
        println!("{} ({})", provider.fullname(), provider.medium);
    }
    Ok(())
}

pub fn cmd_depslist(config_path: &str) -> Result<()> {
    let session = Session::init(Path::new(config_path))?;
    match session.write_depslist()? {
        Some(report) => info!(
            "depslist: {} entries, {} relocated",
            report.entries, report.relocated
        ),
        None => println!("no full media list was found"),
    }
    Ok(())
}
