// Copyright (c) 2024-2026 Nervosys LLC
// SPDX-License-Identifier: AGPL-3.0-only
//! Storage contracts used by the orchestrator
//!
//! The orchestrator never talks to SQLite directly; it holds a
//! [`ConversationStore`] and reads/writes through these traits.
//! [`crate::database::ChatDatabase`] is the shipped implementation.

use crate::error::MavisResult;
use crate::models::{Message, ModelEntry, ModelSpec, Workflow};
use uuid::Uuid;

/// Durable per-workflow message log
pub trait HistoryStore: Send + Sync {
    /// Overwrite the full history of a workflow
    fn save_history(&self, workflow_id: Uuid, history: &[Message]) -> MavisResult<()>;

    /// Load a workflow's history. Absent or unparsable data yields an empty history.
    fn load_history(&self, workflow_id: Uuid) -> MavisResult<Vec<Message>>;

    fn delete_history(&self, workflow_id: Uuid) -> MavisResult<()>;
}

/// Durable registry of workflows
pub trait WorkflowStore: Send + Sync {
    fn create_workflow(&self, workflow: &Workflow) -> MavisResult<()>;

    fn get_workflow(&self, id: Uuid) -> MavisResult<Option<Workflow>>;

    /// All workflows in creation order
    fn list_workflows(&self) -> MavisResult<Vec<Workflow>>;

    /// Returns whether a row was removed
    fn delete_workflow(&self, id: Uuid) -> MavisResult<bool>;
}

/// Durable, ordered model registry
pub trait ModelStore: Send + Sync {
    fn insert_model(&self, spec: &ModelSpec) -> MavisResult<i64>;

    /// All entries in priority (insertion) order
    fn load_models(&self) -> MavisResult<Vec<ModelEntry>>;

    fn update_model(&self, id: i64, spec: &ModelSpec) -> MavisResult<()>;

    /// Returns whether a row was removed
    fn delete_model(&self, id: i64) -> MavisResult<bool>;

    /// Replace every entry with `specs`, in order, as a single atomic step.
    /// Returns the freshly persisted entries.
    fn replace_models(&self, specs: &[ModelSpec]) -> MavisResult<Vec<ModelEntry>>;
}

/// Everything the orchestrator needs from the durable store
pub trait ConversationStore: HistoryStore + WorkflowStore + ModelStore {
    /// Remove a workflow and its history together. Returns whether the workflow existed.
    fn purge_workflow(&self, id: Uuid) -> MavisResult<bool>;
}
