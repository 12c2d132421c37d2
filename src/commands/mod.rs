// Copyright (c) 2024-2026 Nervosys LLC
// SPDX-License-Identifier: Apache-2.0
//! Command implementations

mod chat;
mod config_cmds;
mod models;
mod workflows;

pub use chat::*;
pub use config_cmds::*;
pub use models::*;
pub use workflows::*;

use anyhow::{Context, Result};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::MavisConfig;
use crate::database::ChatDatabase;
use crate::providers::ProviderFactory;

/// Open the configured database
pub(crate) fn open_database(config: &MavisConfig) -> Result<ChatDatabase> {
    let path = config.database_path();
    ChatDatabase::open(&path)
        .with_context(|| format!("Failed to open database at {}", path.display()))
}

/// Adapter factory for commands. Without `prefetch`, Ollama models are not
/// pulled until a turn actually uses them.
pub(crate) fn provider_factory(
    config: &MavisConfig,
    prefetch: bool,
) -> Result<Arc<ProviderFactory>> {
    let factory = ProviderFactory::new(config.clone())?;
    Ok(Arc::new(if prefetch {
        factory
    } else {
        factory.without_prefetch()
    }))
}

/// Parse a workflow id given on the command line
pub(crate) fn parse_workflow_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id.trim()).with_context(|| format!("Invalid workflow id: {}", id))
}

/// Shorten long text for table cells
pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= max_chars {
        single_line
    } else {
        let cut: String = single_line.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
