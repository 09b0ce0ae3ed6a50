// src/cli/media.rs
//! Media management commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum MediaCommands {
    /// Add a medium
    Add {
        /// Medium name (derived from the origin when empty)
        name: String,

        /// Origin: path, file://, http://, ftp:// or removable://
        origin: String,

        /// Catalog path relative to the origin
        #[arg(long = "with", value_name = "PATH")]
        with_path: Option<String>,

        /// Mark as an update medium
        #[arg(long)]
        update: bool,

        /// Add the medium in ignored state
        #[arg(long)]
        ignore: bool,

        /// The catalog already is a synthesis
        #[arg(long)]
        synthesis: bool,

        /// Accept an empty catalog
        #[arg(long)]
        allow_empty: bool,

        /// Mount point of a removable medium
        #[arg(long)]
        mount_point: Option<String>,
    },

    /// Remove media
    Remove {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// List configured media
    List {
        /// Show ignored media too
        #[arg(short, long)]
        all: bool,
    },

    /// Select media for resolution
    Select {
        #[arg(required = true)]
        names: Vec<String>,

        /// Deselect instead
        #[arg(long)]
        off: bool,
    },

    /// Update media catalogs
    Update {
        /// Media to update (default: all)
        names: Vec<String>,
    },
}
