// Copyright (c) 2024-2026 Nervosys LLC
// SPDX-License-Identifier: AGPL-3.0-only
//! CLI argument definitions using clap derive macros

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// MAVIS - Route chat turns between censored and uncensored models
#[derive(Parser)]
#[command(name = "mavis")]
#[command(author = "Nervosys")]
#[command(version)]
#[command(about = "Route chat turns between censored and uncensored models", long_about = None)]
pub struct Cli {
    /// Path to the config file (defaults to the user config directory)
    #[arg(long, global = true, env = "MAVIS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    // ============================================================================
    // Chat
    // ============================================================================
    /// Send a message, or start an interactive session when no message is given
    Chat {
        /// Message to send
        message: Option<String>,

        /// Workflow to use (defaults to the most recent one)
        #[arg(short, long)]
        workflow: Option<String>,

        /// Use the model at this registry position, bypassing moderation
        #[arg(short, long)]
        model: Option<usize>,

        /// Treat the message as flagged (routes to an uncensored model)
        #[arg(long, conflicts_with = "no_moderation")]
        flagged: bool,

        /// Skip moderation and use the censored model
        #[arg(long)]
        no_moderation: bool,
    },

    // ============================================================================
    // Workflow Commands
    // ============================================================================
    /// Create, list, select and delete workflows
    #[command(visible_alias = "wf")]
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommands,
    },

    /// Print the stored history of a workflow
    History {
        /// Workflow id (defaults to the most recent one)
        id: Option<String>,
    },

    // ============================================================================
    // Model Commands
    // ============================================================================
    /// Manage the model registry
    Model {
        #[command(subcommand)]
        command: ModelCommands,
    },

    // ============================================================================
    // Config Commands
    // ============================================================================
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum WorkflowCommands {
    /// List all workflows
    #[command(visible_alias = "ls")]
    List,

    /// Create a new workflow
    Create {
        /// Workflow name
        name: String,
    },

    /// Select a workflow and print its history
    Select {
        /// Workflow id
        id: String,
    },

    /// Delete a workflow and its history
    #[command(visible_alias = "rm")]
    Delete {
        /// Workflow id
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ModelCommands {
    /// List registered models in priority order
    #[command(visible_alias = "ls")]
    List,

    /// Register a model at the end of the list
    Add {
        /// Provider name (openai, ollama)
        provider: String,

        /// Model name
        name: String,

        /// Tag the model as uncensored
        #[arg(long)]
        uncensored: bool,
    },

    /// Remove a model by id
    #[command(visible_alias = "rm")]
    Remove {
        /// Model id
        id: i64,
    },

    /// Move a model to another position
    #[command(visible_alias = "mv")]
    Move {
        /// Current position
        from: usize,

        /// New position
        to: usize,
    },

    /// Replace the model at a position
    Set {
        /// Position to replace
        index: usize,

        /// Provider name (openai, ollama)
        provider: String,

        /// Model name
        name: String,

        /// Tag the model as uncensored
        #[arg(long)]
        uncensored: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Print the config file path
    Path,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
