// Copyright (c) 2024-2026 Nervosys LLC
// SPDX-License-Identifier: AGPL-3.0-only
//! Error types for mavis

use thiserror::Error;

/// Why a turn could not be routed to a model
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Invalid model index {index} (registry has {len} models)")]
    InvalidIndex { index: usize, len: usize },

    #[error("No suitable model found (need censored={censored})")]
    NoSuitableModel { censored: bool },
}

#[derive(Error, Debug)]
pub enum MavisError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Selection error: {0}")]
    Selection(#[from] SelectionError),

    #[error("Provider invocation failed: {0}")]
    ProviderInvocation(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Moderation service error: {0}")]
    Moderation(String),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Model not found: {0}")]
    ModelNotFound(i64),

    #[error("No active workflow. Create or select one first")]
    NoActiveWorkflow,

    #[error("Invalid index {index} (length {len})")]
    InvalidIndex { index: usize, len: usize },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl MavisError {
    /// Whether the error came from the durable store
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            MavisError::Persistence(_) | MavisError::SqliteError(_)
        )
    }
}

pub type MavisResult<T> = std::result::Result<T, MavisError>;
