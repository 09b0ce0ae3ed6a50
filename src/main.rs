// src/main.rs

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::{Cli, Commands, MediaCommands};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_str();

    match cli.command {
        Commands::Media(media) => match media {
            MediaCommands::Add {
                name,
                origin,
                with_path,
                update,
                ignore,
                synthesis,
                allow_empty,
                mount_point,
            } => commands::cmd_media_add(
                config,
                &name,
                &origin,
                commands::AddArgs {
                    with_path,
                    update,
                    ignore,
                    synthesis,
                    allow_empty,
                    mount_point,
                },
            ),
            MediaCommands::Remove { names } => commands::cmd_media_remove(config, &names),
            MediaCommands::List { all } => commands::cmd_media_list(config, all),
            MediaCommands::Select { names, off } => {
                commands::cmd_media_select(config, &names, !off)
            }
            MediaCommands::Update { names } => commands::cmd_media_update(config, &names),
        },
        Commands::Synthesis { media } => commands::cmd_synthesis(config, &media),
        Commands::Query {
            pattern,
            field,
            regex,
            ignore_case,
        } => commands::cmd_query(config, &pattern, &field, regex, ignore_case),
        Commands::WhatProvides { capability } => commands::cmd_what_provides(config, &capability),
        Commands::Resolve {
            selections,
            installed,
            auto_select,
            update,
            no_removable,
            provides,
            choose,
            auto,
            strict,
        } => commands::cmd_resolve(
            config,
            commands::ResolveArgs {
                selections,
                installed,
                auto_select,
                update,
                no_removable,
                provides,
                choose,
                auto,
                strict,
            },
        ),
        Commands::Depslist => commands::cmd_depslist(config),
    }
}
