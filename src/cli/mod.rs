// src/cli/mod.rs
//! CLI definitions for urpm
//!
//! Only argument parsing lives here; the handlers are in the `commands`
//! module and all behavior in the library.

use clap::{Parser, Subcommand};

mod media;

pub use media::MediaCommands;

#[derive(Parser)]
#[command(name = "urpm")]
#[command(author, version)]
#[command(about = "Media catalogs and dependency resolution for urpmi-style package management", long_about = None)]
pub struct Cli {
    /// Tool configuration file
    #[arg(short, long, global = true, default_value = urpm::DEFAULT_CONFIG_PATH)]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage package media
    #[command(subcommand)]
    Media(MediaCommands),

    /// Rebuild the synthesis cache of media
    Synthesis {
        /// Media to rebuild (default: all)
        media: Vec<String>,
    },

    /// Search the catalogs of the configured media
    Query {
        /// Pattern to look for
        pattern: String,

        /// Field to search: name, summary, group, provides, requires,
        /// conflicts, obsoletes, files
        #[arg(short, long, default_value = "name")]
        field: String,

        /// Treat the pattern as a regular expression
        #[arg(short = 'e', long)]
        regex: bool,

        /// Case-insensitive matching
        #[arg(short, long)]
        ignore_case: bool,
    },

    /// List the packages providing a capability or containing a file
    WhatProvides {
        /// Capability (`name`, `"name >= 1.0"`) or absolute path
        capability: String,
    },

    /// Compute the install/remove plan for a selection
    Resolve {
        /// Package names, capabilities or absolute file paths
        selections: Vec<String>,

        /// Installed-package list in catalog format
        #[arg(long)]
        installed: Option<String>,

        /// Upgrade every installed package with a newer candidate
        #[arg(long)]
        auto_select: bool,

        /// Only use update media
        #[arg(long)]
        update: bool,

        /// Do not use removable media
        #[arg(long)]
        no_removable: bool,

        /// Search provides when no package has a requested name
        #[arg(short = 'p', long)]
        provides: bool,

        /// Answer a choice: CAPABILITY=PACKAGE
        #[arg(long, value_name = "CAPABILITY=PACKAGE")]
        choose: Vec<String>,

        /// Answer every choice with its first candidate
        #[arg(long)]
        auto: bool,

        /// Fail on the first unresolvable, conflicting or ambiguous branch
        #[arg(long)]
        strict: bool,
    },

    /// Rewrite depslist.ordered from the full catalogs
    Depslist,
}
