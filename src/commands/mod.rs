// src/commands/mod.rs
//! Command handlers for the urpm CLI

mod catalog;
mod media;
mod resolve;

pub use catalog::{cmd_depslist, cmd_query, cmd_synthesis, cmd_what_provides};
pub use media::{AddArgs, cmd_media_add, cmd_media_list, cmd_media_remove, cmd_media_select, cmd_media_update};
pub use resolve::{cmd_resolve, ResolveArgs};

use anyhow::Result;
use std::path::Path;
use urpm::Session;

/// Open a session and load the configured media
pub(crate) fn open_loaded(config_path: &str) -> Result<Session> {
    let session = Session::init(Path::new(config_path))?;
    session.load_media()?;
    Ok(session)
}
