// Copyright (c) 2024-2026 Nervosys LLC
// SPDX-License-Identifier: AGPL-3.0-only
//! Conversation orchestration
//!
//! [`ConversationOrchestrator`] owns the active workflow's history, routes each
//! turn to a model, and persists the full history after every turn. There is
//! no global instance; callers construct one and hold it. Mutating calls take
//! `&mut self`, so one orchestrator processes one turn at a time.

use crate::config::MavisConfig;
use crate::database::ChatDatabase;
use crate::error::{MavisError, MavisResult};
use crate::models::{Message, ModelEntry, Workflow};
use crate::moderation::{moderation_from_config, ModerationGate};
use crate::providers::{
    AdapterFactory, ProviderAdapter, ProviderFactory, ProviderReply, FALLBACK_RESPONSE,
};
use crate::registry::ModelRegistry;
use crate::routing::{resolve_route, select_model, Route, TurnOptions};
use crate::storage::{ConversationStore, ModelStore};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Behavioural knobs taken from [`MavisConfig`]
#[derive(Debug, Clone, Default)]
pub struct OrchestratorSettings {
    /// Seeded as the first assistant message of every new workflow
    pub welcome_message: Option<String>,
    /// Upper bound for one provider call
    pub request_timeout: Option<Duration>,
}

impl From<&MavisConfig> for OrchestratorSettings {
    fn from(config: &MavisConfig) -> Self {
        Self {
            welcome_message: config.welcome().map(String::from),
            request_timeout: (config.request_timeout_secs > 0)
                .then(|| Duration::from_secs(config.request_timeout_secs)),
        }
    }
}

/// The active workflow and its in-memory history
#[derive(Debug, Clone)]
pub struct Session {
    workflow: Workflow,
    messages: Vec<Message>,
}

impl Session {
    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}

/// Result of one completed turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Assistant text appended to the history
    pub content: String,
    /// Entry that handled the turn
    pub model: ModelEntry,
    /// True when the provider failed and the fallback text was used
    pub degraded: bool,
}

pub struct ConversationOrchestrator {
    store: Arc<dyn ConversationStore>,
    registry: ModelRegistry,
    moderation: Arc<dyn ModerationGate>,
    settings: OrchestratorSettings,
    session: Option<Session>,
}

impl ConversationOrchestrator {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        registry: ModelRegistry,
        moderation: Arc<dyn ModerationGate>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            store,
            registry,
            moderation,
            settings,
            session: None,
        }
    }

    /// Open the configured database and build providers, moderation and registry
    pub async fn from_config(config: &MavisConfig) -> MavisResult<Self> {
        let factory = Arc::new(ProviderFactory::new(config.clone())?);
        Self::with_factory(config, factory).await
    }

    /// Like [`from_config`](Self::from_config) with a caller-chosen adapter factory
    pub async fn with_factory(
        config: &MavisConfig,
        factory: Arc<dyn AdapterFactory>,
    ) -> MavisResult<Self> {
        let db = Arc::new(ChatDatabase::open(&config.database_path())?);
        let model_store: Arc<dyn ModelStore> = db.clone();
        let registry = ModelRegistry::load(model_store, factory, &config.default_models).await?;
        let moderation = moderation_from_config(config)?;
        Ok(Self::new(db, registry, moderation, config.into()))
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Registry mutations take effect from the next turn
    pub fn registry_mut(&mut self) -> &mut ModelRegistry {
        &mut self.registry
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn active_workflow(&self) -> Option<&Workflow> {
        self.session.as_ref().map(|s| &s.workflow)
    }

    /// In-memory history of the active workflow (empty when none is active)
    pub fn history(&self) -> &[Message] {
        self.session
            .as_ref()
            .map(|s| s.messages.as_slice())
            .unwrap_or(&[])
    }

    pub fn list_workflows(&self) -> MavisResult<Vec<Workflow>> {
        self.store.list_workflows()
    }

    /// Read any workflow's stored history without changing the active one
    pub fn load_history(&self, workflow_id: Uuid) -> MavisResult<Vec<Message>> {
        self.store.load_history(workflow_id)
    }

    fn load_or_empty(&self, workflow_id: Uuid) -> Vec<Message> {
        match self.store.load_history(workflow_id) {
            Ok(messages) => messages,
            Err(e) => {
                log::warn!(
                    "Could not load history for workflow {}: {}; starting empty",
                    workflow_id,
                    e
                );
                Vec::new()
            }
        }
    }

    /// Make `workflow_id` the active workflow, replacing the in-memory history
    pub fn set_active_workflow(&mut self, workflow_id: Uuid) -> MavisResult<&Session> {
        let workflow = self
            .store
            .get_workflow(workflow_id)?
            .ok_or_else(|| MavisError::WorkflowNotFound(workflow_id.to_string()))?;
        let messages = self.load_or_empty(workflow_id);
        log::info!(
            "Active workflow set to {} ({} messages)",
            workflow_id,
            messages.len()
        );
        Ok(&*self.session.insert(Session { workflow, messages }))
    }

    /// Activate the most recently created workflow, if any
    pub fn resume_latest(&mut self) -> MavisResult<Option<Workflow>> {
        let Some(latest) = self.store.list_workflows()?.pop() else {
            log::info!("No previous workflows found");
            return Ok(None);
        };
        self.set_active_workflow(latest.id)?;
        Ok(Some(latest))
    }

    /// Register a new workflow and make it active, seeding the welcome message
    pub fn create_workflow(&mut self, name: impl Into<String>) -> MavisResult<Workflow> {
        let workflow = Workflow::new(name);
        self.store.create_workflow(&workflow)?;
        log::info!("Created workflow {} ({})", workflow.name, workflow.id);

        self.session = Some(Session {
            workflow: workflow.clone(),
            messages: Vec::new(),
        });
        if let Some(welcome) = self.settings.welcome_message.clone() {
            self.insert_assistant_message(welcome)?;
        }
        Ok(workflow)
    }

    /// Remove a workflow and its history. Deleting the active workflow leaves
    /// no session until another one is selected.
    pub fn delete_workflow(&mut self, workflow_id: Uuid) -> MavisResult<()> {
        if !self.store.purge_workflow(workflow_id)? {
            return Err(MavisError::WorkflowNotFound(workflow_id.to_string()));
        }
        if self.active_workflow().map(|w| w.id) == Some(workflow_id) {
            self.session = None;
        }
        log::info!("Deleted workflow {}", workflow_id);
        Ok(())
    }

    /// Append an assistant message to the active history and persist it
    pub fn insert_assistant_message(&mut self, content: impl Into<String>) -> MavisResult<()> {
        let session = self.session.as_mut().ok_or(MavisError::NoActiveWorkflow)?;
        let checkpoint = session.messages.len();
        session.messages.push(Message::assistant(content));
        persist(self.store.as_ref(), session, checkpoint)
    }

    /// Process one human turn.
    ///
    /// Selection errors abort the turn before the history changes. Provider
    /// failures still complete the turn with [`FALLBACK_RESPONSE`]. A failed
    /// save rolls the in-memory history back and is returned.
    pub async fn generate_response(
        &mut self,
        text: &str,
        options: TurnOptions,
    ) -> MavisResult<TurnOutcome> {
        if self.session.is_none() {
            return Err(MavisError::NoActiveWorkflow);
        }

        let route = resolve_route(&options, self.moderation.as_ref(), text).await;
        let index = select_model(self.registry.entries(), route)?;
        let (entry, adapter) = match (self.registry.get(index), self.registry.adapter(index)) {
            (Some(entry), Some(adapter)) => (entry.clone(), adapter),
            _ => {
                return Err(MavisError::InvalidIndex {
                    index,
                    len: self.registry.len(),
                })
            }
        };
        match route {
            Route::Explicit(i) => log::info!("Using model at index {}: {}", i, entry),
            Route::Uncensored => log::warn!("Using uncensored model {}", entry),
            Route::Censored => log::info!("Using censored model {}", entry),
        }

        let session = self.session.as_mut().ok_or(MavisError::NoActiveWorkflow)?;
        let checkpoint = session.messages.len();
        session.messages.push(Message::human(text));

        let reply = invoke(
            adapter.as_ref(),
            &session.messages[..checkpoint],
            text,
            self.settings.request_timeout,
        )
        .await;
        let degraded = reply.is_failed();
        let content = reply.content().to_string();
        session.messages.push(reply.into_message());

        persist(self.store.as_ref(), session, checkpoint)?;

        Ok(TurnOutcome {
            content,
            model: entry,
            degraded,
        })
    }

    /// Like [`generate_response`](Self::generate_response) with default options,
    /// but every error becomes the fallback text
    pub async fn chat(&mut self, text: &str) -> String {
        match self.generate_response(text, TurnOptions::default()).await {
            Ok(outcome) => outcome.content,
            Err(e) => {
                log::error!("Error generating response: {}", e);
                FALLBACK_RESPONSE.to_string()
            }
        }
    }
}

/// Save the full history, restoring `checkpoint` length on failure
fn persist(
    store: &dyn ConversationStore,
    session: &mut Session,
    checkpoint: usize,
) -> MavisResult<()> {
    if let Err(e) = store.save_history(session.workflow.id, &session.messages) {
        log::error!(
            "Failed to save history for workflow {}: {}",
            session.workflow.id,
            e
        );
        session.messages.truncate(checkpoint);
        return Err(e);
    }
    Ok(())
}

async fn invoke(
    adapter: &dyn ProviderAdapter,
    history: &[Message],
    input: &str,
    timeout: Option<Duration>,
) -> ProviderReply {
    let Some(limit) = timeout else {
        return adapter.respond(history, input).await;
    };
    match tokio::time::timeout(limit, adapter.respond(history, input)).await {
        Ok(reply) => reply,
        Err(_) => {
            log::error!(
                "{}:{} timed out after {}s",
                adapter.provider(),
                adapter.model(),
                limit.as_secs()
            );
            ProviderReply::failed(format!("timed out after {}s", limit.as_secs()))
        }
    }
}
