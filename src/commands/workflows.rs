// Copyright (c) 2024-2026 Nervosys LLC
// SPDX-License-Identifier: AGPL-3.0-only
//! Workflow and history commands

use anyhow::Result;
use colored::*;
use tabled::{settings::Style as TableStyle, Table, Tabled};

use super::chat::{open_session, print_message};
use super::{open_database, parse_workflow_id, provider_factory, truncate};
use crate::config::MavisConfig;
use crate::orchestrator::ConversationOrchestrator;
use crate::storage::{ConversationStore, HistoryStore, WorkflowStore};

#[derive(Tabled)]
struct WorkflowRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Messages")]
    messages: usize,
    #[tabled(rename = "Last Message")]
    last_message: String,
}

/// List all workflows in creation order
pub fn list_workflows(config: &MavisConfig) -> Result<()> {
    let db = open_database(config)?;
    let workflows = db.list_workflows()?;

    if workflows.is_empty() {
        println!("{} No workflows yet. Create one with `mavis workflow create <name>`", "[i]".blue());
        return Ok(());
    }

    let mut rows = Vec::with_capacity(workflows.len());
    for (position, workflow) in workflows.iter().enumerate() {
        let history = db.load_history(workflow.id)?;
        rows.push(WorkflowRow {
            position,
            id: workflow.id.to_string(),
            name: workflow.name.clone(),
            messages: history.len(),
            last_message: history
                .last()
                .map(|m| truncate(&m.content, 40))
                .unwrap_or_else(|| "(empty)".to_string()),
        });
    }

    let table = Table::new(rows)
        .with(TableStyle::ascii_rounded())
        .to_string();

    println!("{}", table);
    println!("\nTotal workflows: {}", workflows.len());
    Ok(())
}

/// Create a workflow, seeding the welcome message
pub async fn create_workflow(config: &MavisConfig, name: &str) -> Result<()> {
    let factory = provider_factory(config, false)?;
    let mut orchestrator = ConversationOrchestrator::with_factory(config, factory).await?;
    let workflow = orchestrator.create_workflow(name)?;

    println!(
        "{} Created workflow {} ({})",
        "[+]".green(),
        workflow.name.cyan(),
        workflow.id
    );
    Ok(())
}

/// Select a workflow and print its history
pub async fn select_workflow(config: &MavisConfig, id: &str) -> Result<()> {
    let orchestrator = open_session(config, Some(id), false).await?;
    if let Some(workflow) = orchestrator.active_workflow() {
        println!("{} {}", "Workflow:".bold(), workflow.name.cyan());
    }
    for message in orchestrator.history() {
        print_message(message);
    }
    Ok(())
}

/// Delete a workflow and its history
pub fn delete_workflow(config: &MavisConfig, id: &str) -> Result<()> {
    let id = parse_workflow_id(id)?;
    let db = open_database(config)?;
    let workflow = db
        .get_workflow(id)?
        .ok_or_else(|| anyhow::anyhow!("Workflow not found: {}", id))?;

    if !db.purge_workflow(id)? {
        anyhow::bail!("Workflow not found: {}", id);
    }
    println!("{} Deleted workflow {} ({})", "[-]".red(), workflow.name, id);
    Ok(())
}

/// Print the stored history of a workflow (or the most recent one)
pub fn show_history(config: &MavisConfig, id: Option<&str>) -> Result<()> {
    let db = open_database(config)?;
    let workflow = match id {
        Some(id) => {
            let id = parse_workflow_id(id)?;
            db.get_workflow(id)?
                .ok_or_else(|| anyhow::anyhow!("Workflow not found: {}", id))?
        }
        None => match db.list_workflows()?.pop() {
            Some(workflow) => workflow,
            None => {
                println!("{} No workflows yet", "[i]".blue());
                return Ok(());
            }
        },
    };

    let history = db.load_history(workflow.id)?;
    println!(
        "{} {} ({} messages)",
        "Workflow:".bold(),
        workflow.name.cyan(),
        history.len()
    );
    println!();
    for message in &history {
        print_message(message);
    }
    Ok(())
}
