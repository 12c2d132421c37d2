// Copyright (c) 2024-2026 Nervosys LLC
// SPDX-License-Identifier: AGPL-3.0-only
//! Ollama provider for local LLM inference
//!
//! Ollama serves local models at `http://localhost:11434` by default. A model
//! must be pulled before it can answer; [`OllamaProvider::ensure_model`] does
//! that once and remembers the outcome.

use super::http::error_for_status;
use super::{with_system_prompt, ProviderAdapter};
use crate::config::OllamaConfig;
use crate::error::{MavisError, MavisResult};
use crate::models::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::OnceCell;

/// Result of making a model available locally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullStatus {
    /// The model was already listed by `/api/tags`
    AlreadyPresent,
    /// The model was downloaded by `/api/pull`
    Pulled,
}

/// Ollama API response for listing models
#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Debug, Serialize)]
struct OllamaPullRequest<'a> {
    model: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaPullResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Ollama chat message format
#[derive(Debug, Serialize, Deserialize)]
struct OllamaChatMessage {
    role: String,
    content: String,
}

/// Ollama chat request
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaChatMessage>,
    stream: bool,
}

/// Ollama chat response
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<OllamaChatMessage>,
    #[serde(default)]
    error: Option<String>,
}

/// Ollama API provider
pub struct OllamaProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    system_prompt: String,
    pull_timeout: Duration,
    ready: OnceCell<PullStatus>,
}

impl OllamaProvider {
    pub fn new(
        client: reqwest::Client,
        config: &OllamaConfig,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: config.endpoint(),
            model: model.into(),
            system_prompt: system_prompt.into(),
            pull_timeout: Duration::from_secs(config.pull_timeout_secs),
            ready: OnceCell::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether a successful `ensure_model` has already run
    pub fn is_ready(&self) -> bool {
        self.ready.initialized()
    }

    /// Make sure the model is available locally, pulling it if needed.
    ///
    /// Success is cached; a failure is reported and retried on the next call.
    pub async fn ensure_model(&self) -> MavisResult<PullStatus> {
        let status = self
            .ready
            .get_or_try_init(|| async {
                log::info!("Checking availability of Ollama model: {}", self.model);
                let result = self.fetch_model().await;
                match &result {
                    Ok(PullStatus::AlreadyPresent) => {
                        log::info!("Ollama model already present: {}", self.model)
                    }
                    Ok(PullStatus::Pulled) => {
                        log::info!("Successfully pulled Ollama model: {}", self.model)
                    }
                    Err(e) => log::error!("Failed to pull model {}: {}", self.model, e),
                }
                result
            })
            .await?;
        Ok(*status)
    }

    async fn fetch_model(&self) -> MavisResult<PullStatus> {
        if self.list_models().await?.iter().any(|name| model_matches(name, &self.model)) {
            return Ok(PullStatus::AlreadyPresent);
        }

        let response = self
            .client
            .post(format!("{}/api/pull", self.endpoint))
            .timeout(self.pull_timeout)
            .json(&OllamaPullRequest {
                model: &self.model,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| MavisError::ProviderInvocation(format!("Cannot reach Ollama: {}", e)))?;
        let response = error_for_status(response, "Ollama pull").await?;
        let body = response.text().await?;
        parse_pull_response(&body)?;
        Ok(PullStatus::Pulled)
    }

    /// List model names known to the Ollama server
    pub async fn list_models(&self) -> MavisResult<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.endpoint))
            .send()
            .await
            .map_err(|e| MavisError::ProviderInvocation(format!("Cannot reach Ollama: {}", e)))?;
        let response = error_for_status(response, "Ollama").await?;
        let tags: OllamaTagsResponse = response.json().await.map_err(|e| {
            MavisError::ProviderInvocation(format!("Failed to parse Ollama response: {}", e))
        })?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

/// `llama3` matches a local `llama3:latest`
fn model_matches(local: &str, wanted: &str) -> bool {
    local == wanted || (!wanted.contains(':') && local == format!("{}:latest", wanted))
}

fn parse_pull_response(body: &str) -> MavisResult<()> {
    // With stream=false Ollama answers with a single object; tolerate NDJSON too
    let last = body.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
    let reply: OllamaPullResponse = serde_json::from_str(last).map_err(|e| {
        MavisError::ProviderInvocation(format!("Failed to parse pull response: {}", e))
    })?;
    if let Some(error) = reply.error {
        return Err(MavisError::ProviderInvocation(error));
    }
    match reply.status.as_deref() {
        Some("success") => Ok(()),
        other => Err(MavisError::ProviderInvocation(format!(
            "Unexpected pull status: {:?}",
            other
        ))),
    }
}

fn parse_chat_response(body: &str) -> MavisResult<String> {
    let reply: OllamaChatResponse = serde_json::from_str(body).map_err(|e| {
        MavisError::ProviderInvocation(format!("Failed to parse response: {}", e))
    })?;
    if let Some(error) = reply.error {
        return Err(MavisError::ProviderInvocation(error));
    }
    reply
        .message
        .map(|m| m.content)
        .ok_or_else(|| MavisError::ProviderInvocation("Malformed reply: no message".to_string()))
}

#[async_trait]
impl ProviderAdapter for OllamaProvider {
    fn provider(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[Message]) -> MavisResult<String> {
        self.ensure_model().await?;

        let request = OllamaChatRequest {
            model: self.model.clone(),
            messages: with_system_prompt(&self.system_prompt, messages)
                .into_iter()
                .map(|m| OllamaChatMessage {
                    role: m.role.api_name().to_string(),
                    content: m.content,
                })
                .collect(),
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.endpoint))
            .json(&request)
            .send()
            .await
            .map_err(|e| MavisError::ProviderInvocation(format!("HTTP request failed: {}", e)))?;
        let response = error_for_status(response, "Ollama").await?;
        let body = response.text().await?;
        parse_chat_response(&body)
    }
}
