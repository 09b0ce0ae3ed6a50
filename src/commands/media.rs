// src/commands/media.rs
//! Media management commands

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use urpm::{LocalRetriever, MediumOptions, Session};

pub struct AddArgs {
    pub with_path: Option<String>,
    pub update: bool,
    pub ignore: bool,
    pub synthesis: bool,
    pub allow_empty: bool,
    pub mount_point: Option<String>,
}

/// Add a medium and build its synthesis
pub fn cmd_media_add(config_path: &str, name: &str, origin: &str, args: AddArgs) -> Result<()> {
    let session = Session::init(Path::new(config_path))?;
    let options = MediumOptions {
        with_path: args.with_path,
        update: args.update,
        ignored: args.ignore,
        synthesis_only: args.synthesis,
        allow_empty: args.allow_empty,
        mount_point: args.mount_point.map(PathBuf::from),
    };
    let name = session.add_medium(name, origin, options)?;

    if !args.ignore {
        for (medium, result) in session.update_media(Arc::new(LocalRetriever), &[name.as_str()]) {
            if let Err(e) = result {
                println!("unable to update medium \"{}\": {}", medium, e);
            }
        }
    }
    session.flush()?;
    println!("added medium {}", name);
    Ok(())
}

pub fn cmd_media_remove(config_path: &str, names: &[String]) -> Result<()> {
    let session = Session::init(Path::new(config_path))?;
    for name in names {
        session.remove_medium(name)?;
    }
    session.flush()?;
    Ok(())
}

pub fn cmd_media_list(config_path: &str, all: bool) -> Result<()> {
    let session = Session::init(Path::new(config_path))?;
    let registry = session.registry();
    let registry = registry.read();

    if registry.is_empty() {
        println!("No media configured");
        return Ok(());
    }
    for medium in registry.media() {
        if medium.is_ignored() && !all {
            continue;
        }
        let mut flags = Vec::new();
        if medium.is_update() {
            flags.push("update");
        }
        if medium.is_removable() {
            flags.push("removable");
        }
        if medium.is_ignored() {
            flags.push("ignored");
        }
        if !medium.is_selected() {
            flags.push("deselected");
        }
        let updated = medium
            .last_update
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never updated".to_string());
        println!("  {} [{}] ({})", medium.name, flags.join(","), updated);
        println!("      {}", medium.origin);
    }
    Ok(())
}

pub fn cmd_media_select(config_path: &str, names: &[String], select: bool) -> Result<()> {
    let session = Session::init(Path::new(config_path))?;
    session.registry().write().set_selection(names, select)?;
    session.flush()?;
    Ok(())
}

pub fn cmd_media_update(config_path: &str, names: &[String]) -> Result<()> {
    let session = Session::init(Path::new(config_path))?;
    let results = session.update_media(Arc::new(LocalRetriever), names);

    let mut failed = 0;
    for (name, result) in &results {
        match result {
            Ok(()) => info!("medium \"{}\" is up-to-date", name),
            Err(e) => {
                failed += 1;
                println!("unable to update medium \"{}\": {}", name, e);
            }
        }
    }
    session.flush()?;
    if failed > 0 {
        anyhow::bail!("{} of {} media failed to update", failed, results.len());
    }
    Ok(())
}
