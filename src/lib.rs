// Copyright (c) 2024-2026 Nervosys LLC
// SPDX-License-Identifier: Apache-2.0
//! MAVIS - Library
//!
//! Routes conversational turns from one chat session to one of several model
//! providers, choosing between censored and uncensored models from a
//! moderation verdict, and persists history per named workflow.
//!
//! ## Supported Providers
//!
//! - **OpenAI** - Chat Completions API
//! - **Ollama** - Local LLM inference, models pulled on demand
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mavis::{ConversationOrchestrator, MavisConfig, TurnOptions};
//!
//! let config = MavisConfig::load()?;
//! let mut orchestrator = ConversationOrchestrator::from_config(&config).await?;
//! orchestrator.create_workflow("research")?;
//! let outcome = orchestrator.generate_response("Hello!", TurnOptions::default()).await?;
//! println!("{}", outcome.content);
//! ```

#![allow(clippy::upper_case_acronyms)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod moderation;
pub mod orchestrator;
pub mod providers;
pub mod registry;
pub mod routing;
pub mod storage;

// Re-export commonly used items
pub use config::MavisConfig;
pub use database::ChatDatabase;
pub use error::{MavisError, MavisResult, SelectionError};
pub use models::{Message, ModelEntry, ModelSpec, Role, Workflow};
pub use moderation::{ModerationGate, OpenAIModeration, StaticModeration};
pub use orchestrator::{ConversationOrchestrator, OrchestratorSettings, Session, TurnOutcome};
pub use providers::{
    AdapterFactory, ProviderAdapter, ProviderFactory, ProviderReply, ProviderType,
    UnavailableProvider, FALLBACK_RESPONSE,
};
pub use registry::ModelRegistry;
pub use routing::{Route, TurnOptions};
pub use storage::{ConversationStore, HistoryStore, ModelStore, WorkflowStore};
