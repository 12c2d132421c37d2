// Copyright (c) 2024-2026 Nervosys LLC
// SPDX-License-Identifier: AGPL-3.0-only
//! Model provider adapters
//!
//! Every backend is reached through [`ProviderAdapter`]. Supported providers:
//!
//! - **OpenAI** - Chat Completions API, requires an API key
//! - **Ollama** - Local models, pulled on demand before first use

pub mod http;
pub mod ollama;
pub mod openai;

pub use ollama::{OllamaProvider, PullStatus};
pub use openai::OpenAIProvider;

use crate::config::MavisConfig;
use crate::error::{MavisError, MavisResult};
use crate::models::{Message, ModelSpec};
use async_trait::async_trait;
use std::sync::Arc;

/// Assistant text returned when a provider call fails
pub const FALLBACK_RESPONSE: &str = "Sorry, I encountered an error processing your request.";

/// Supported provider kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderType {
    OpenAI,
    Ollama,
}

impl ProviderType {
    /// Whether the provider needs an API credential
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::OpenAI)
    }
}

impl std::str::FromStr for ProviderType {
    type Err = MavisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            other => Err(MavisError::Configuration(format!(
                "Unsupported provider: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAI => write!(f, "openai"),
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

/// Outcome of one provider call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderReply {
    /// The provider produced an answer
    Completed { content: String, model: String },
    /// The call failed; the turn continues with [`FALLBACK_RESPONSE`]
    Failed { reason: String },
}

impl ProviderReply {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Assistant text for this reply
    pub fn content(&self) -> &str {
        match self {
            Self::Completed { content, .. } => content,
            Self::Failed { .. } => FALLBACK_RESPONSE,
        }
    }

    pub fn into_message(self) -> Message {
        match self {
            Self::Completed { content, .. } => Message::assistant(content),
            Self::Failed { .. } => Message::assistant(FALLBACK_RESPONSE),
        }
    }
}

/// Uniform call interface to one model backend
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider name, e.g. `openai`
    fn provider(&self) -> &str;

    /// Target model name
    fn model(&self) -> &str;

    /// Send a full conversation and return the assistant's text
    async fn complete(&self, messages: &[Message]) -> MavisResult<String>;

    /// Answer `input` given the prior `history`. Never fails: errors become
    /// [`ProviderReply::Failed`].
    async fn respond(&self, history: &[Message], input: &str) -> ProviderReply {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.extend_from_slice(history);
        messages.push(Message::human(input));

        match self.complete(&messages).await {
            Ok(content) => ProviderReply::Completed {
                content,
                model: self.model().to_string(),
            },
            Err(e) => {
                log::error!(
                    "Error generating response with {}:{}: {}",
                    self.provider(),
                    self.model(),
                    e
                );
                ProviderReply::failed(e.to_string())
            }
        }
    }
}

/// Stand-in for an entry whose adapter could not be built. Every call fails
/// with the original build error, so the turn degrades to the fallback text.
pub struct UnavailableProvider {
    provider: String,
    model: String,
    reason: String,
}

impl UnavailableProvider {
    pub fn new(spec: &ModelSpec, reason: impl Into<String>) -> Self {
        Self {
            provider: spec.provider.clone(),
            model: spec.name.clone(),
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[async_trait]
impl ProviderAdapter for UnavailableProvider {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, _messages: &[Message]) -> MavisResult<String> {
        Err(MavisError::ProviderInvocation(format!(
            "{}:{} is unavailable: {}",
            self.provider, self.model, self.reason
        )))
    }
}

/// Builds adapters for registry entries
#[async_trait]
pub trait AdapterFactory: Send + Sync {
    async fn build(&self, spec: &ModelSpec) -> MavisResult<Arc<dyn ProviderAdapter>>;
}

/// Builds real OpenAI / Ollama adapters from configuration
pub struct ProviderFactory {
    config: MavisConfig,
    client: reqwest::Client,
    prefetch: bool,
}

impl ProviderFactory {
    pub fn new(config: MavisConfig) -> MavisResult<Self> {
        let client = http::build_http_client(&http::HttpClientConfig::default())?;
        Ok(Self {
            config,
            client,
            prefetch: true,
        })
    }

    /// Skip the Ollama pull at build time; models are pulled on first use
    pub fn without_prefetch(mut self) -> Self {
        self.prefetch = false;
        self
    }

    fn credential(&self, provider_type: ProviderType, spec: &ModelSpec) -> MavisResult<String> {
        let key = match provider_type {
            ProviderType::OpenAI => self.config.openai.api_key.as_deref(),
            ProviderType::Ollama => None,
        };
        key.map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from)
            .ok_or_else(|| {
                MavisError::Configuration(format!(
                    "Missing {} API key for model {} (set OPENAI_API_KEY)",
                    provider_type, spec.name
                ))
            })
    }
}

#[async_trait]
impl AdapterFactory for ProviderFactory {
    async fn build(&self, spec: &ModelSpec) -> MavisResult<Arc<dyn ProviderAdapter>> {
        let provider_type: ProviderType = spec.provider.parse()?;
        let api_key = if provider_type.requires_api_key() {
            self.credential(provider_type, spec)?
        } else {
            String::new()
        };

        match provider_type {
            ProviderType::OpenAI => {
                let provider = OpenAIProvider::new(
                    self.client.clone(),
                    &self.config.openai.base_url,
                    api_key,
                    &spec.name,
                    &self.config.system_prompt,
                );
                Ok(Arc::new(provider))
            }
            ProviderType::Ollama => {
                let provider = OllamaProvider::new(
                    self.client.clone(),
                    &self.config.ollama,
                    &spec.name,
                    &self.config.system_prompt,
                );
                // A failed pull is retried on first use
                if self.prefetch {
                    if let Err(e) = provider.ensure_model().await {
                        log::warn!("Failed to pull model {}: {}", spec.name, e);
                    }
                }
                Ok(Arc::new(provider))
            }
        }
    }
}

/// Prefix `messages` with the system prompt unless one is already present
pub(crate) fn with_system_prompt(system_prompt: &str, messages: &[Message]) -> Vec<Message> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    let has_system = messages
        .first()
        .map(|m| m.role == crate::models::Role::System)
        .unwrap_or(false);
    if !has_system && !system_prompt.is_empty() {
        out.push(Message::system(system_prompt));
    }
    out.extend_from_slice(messages);
    out
}
