// Copyright (c) 2024-2026 Nervosys LLC
// SPDX-License-Identifier: AGPL-3.0-only
//! Chat commands

use anyhow::{Context, Result};
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{parse_workflow_id, provider_factory};
use crate::config::MavisConfig;
use crate::models::{Message, Role};
use crate::orchestrator::{ConversationOrchestrator, TurnOutcome};
use crate::routing::TurnOptions;

const DEFAULT_WORKFLOW_NAME: &str = "Default";

/// Build an orchestrator and activate the requested (or most recent) workflow
pub(crate) async fn open_session(
    config: &MavisConfig,
    workflow: Option<&str>,
    prefetch: bool,
) -> Result<ConversationOrchestrator> {
    let factory = provider_factory(config, prefetch)?;
    let mut orchestrator = ConversationOrchestrator::with_factory(config, factory)
        .await
        .context("Failed to initialize orchestrator")?;

    match workflow {
        Some(id) => {
            orchestrator.set_active_workflow(parse_workflow_id(id)?)?;
        }
        None => {
            if orchestrator.resume_latest()?.is_none() {
                orchestrator.create_workflow(DEFAULT_WORKFLOW_NAME)?;
            }
        }
    }
    Ok(orchestrator)
}

/// Send one message, or run an interactive loop when `message` is `None`
pub async fn chat(
    config: &MavisConfig,
    message: Option<&str>,
    workflow: Option<&str>,
    options: TurnOptions,
) -> Result<()> {
    let mut orchestrator = open_session(config, workflow, true).await?;

    if let Some(active) = orchestrator.active_workflow() {
        println!(
            "{} {} ({})",
            "Workflow:".dimmed(),
            active.name.cyan(),
            active.id.to_string().dimmed()
        );
    }

    match message {
        Some(text) => {
            let outcome = orchestrator.generate_response(text, options).await?;
            print_outcome(&outcome);
        }
        None => interactive(&mut orchestrator, options).await?,
    }
    Ok(())
}

async fn interactive(orchestrator: &mut ConversationOrchestrator, options: TurnOptions) -> Result<()> {
    for message in orchestrator.history() {
        print_message(message);
    }
    println!("{}", "Type a message, or 'exit' to quit.".dimmed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", "you>".green().bold());
        std::io::Write::flush(&mut std::io::stdout())?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if matches!(text, "exit" | "quit") {
            break;
        }

        match orchestrator.generate_response(text, options).await {
            Ok(outcome) => print_outcome(&outcome),
            Err(e) => eprintln!("{} {}", "error:".red().bold(), e),
        }
    }
    Ok(())
}

fn print_outcome(outcome: &TurnOutcome) {
    let tag = format!("[{}]", outcome.model);
    let tag = if outcome.model.censored {
        tag.dimmed()
    } else {
        tag.yellow()
    };
    if outcome.degraded {
        println!("{} {}", tag, outcome.content.red());
    } else {
        println!("{} {}", tag, outcome.content);
    }
}

pub(crate) fn print_message(message: &Message) {
    let label = match message.role {
        Role::Human => "you".green().bold(),
        Role::Assistant => "mavis".cyan().bold(),
        Role::System => "system".magenta().bold(),
    };
    println!("{}: {}", label, message.content);
}
