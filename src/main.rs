// Copyright (c) 2024-2026 Nervosys LLC
// SPDX-License-Identifier: Apache-2.0
//! MAVIS - Main entry point
//!
//! A CLI that routes chat turns between censored and uncensored models.

use anyhow::Result;
use clap::Parser;
use mavis::cli::{Cli, Commands, ConfigCommands, ModelCommands, WorkflowCommands};
use mavis::commands;
use mavis::routing::TurnOptions;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("mavis=debug,info")
        } else {
            EnvFilter::new("mavis=info,warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let explicit = cli.config.as_deref();
    let load = || commands::load_config(explicit);

    match cli.command {
        // ====================================================================
        // Chat
        // ====================================================================
        Commands::Chat {
            message,
            workflow,
            model,
            flagged,
            no_moderation,
        } => {
            let options = TurnOptions {
                model_index: model,
                force_flagged: flagged,
                skip_moderation: no_moderation,
            };
            commands::chat(&load()?, message.as_deref(), workflow.as_deref(), options).await
        }

        // ====================================================================
        // Workflow Commands
        // ====================================================================
        Commands::Workflow { command } => match command {
            WorkflowCommands::List => commands::list_workflows(&load()?),
            WorkflowCommands::Create { name } => commands::create_workflow(&load()?, &name).await,
            WorkflowCommands::Select { id } => commands::select_workflow(&load()?, &id).await,
            WorkflowCommands::Delete { id } => commands::delete_workflow(&load()?, &id),
        },
        Commands::History { id } => commands::show_history(&load()?, id.as_deref()),

        // ====================================================================
        // Model Commands
        // ====================================================================
        Commands::Model { command } => match command {
            ModelCommands::List => commands::list_models(&load()?),
            ModelCommands::Add {
                provider,
                name,
                uncensored,
            } => commands::add_model(&load()?, &provider, &name, uncensored).await,
            ModelCommands::Remove { id } => commands::remove_model(&load()?, id).await,
            ModelCommands::Move { from, to } => commands::move_model(&load()?, from, to).await,
            ModelCommands::Set {
                index,
                provider,
                name,
                uncensored,
            } => commands::set_model(&load()?, index, &provider, &name, uncensored).await,
        },

        // ====================================================================
        // Config Commands
        // ====================================================================
        Commands::Config { command } => match command {
            ConfigCommands::Show => commands::show_config(&load()?),
            ConfigCommands::Path => commands::show_config_path(explicit),
            ConfigCommands::Init { force } => commands::init_config(explicit, force),
        },
    }
}
