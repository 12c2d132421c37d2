// Copyright (c) 2024-2026 Nervosys LLC
// SPDX-License-Identifier: AGPL-3.0-only
//! OpenAI Chat Completions provider

use super::http::error_for_status;
use super::{with_system_prompt, ProviderAdapter};
use crate::error::{MavisError, MavisResult};
use crate::models::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// OpenAI chat message format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

/// OpenAI chat completion request
#[derive(Debug, Serialize)]
pub struct OpenAIChatRequest {
    pub model: String,
    pub messages: Vec<OpenAIChatMessage>,
}

/// OpenAI chat completion response
#[derive(Debug, Deserialize)]
pub struct OpenAIChatResponse {
    #[serde(default)]
    pub choices: Vec<OpenAIChatChoice>,
}

/// OpenAI chat completion choice
#[derive(Debug, Deserialize)]
pub struct OpenAIChatChoice {
    pub message: OpenAIChatMessage,
}

/// OpenAI API provider
pub struct OpenAIProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    system_prompt: String,
}

impl OpenAIProvider {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            system_prompt: system_prompt.into(),
        }
    }

    /// Build the request body for a conversation
    pub fn build_request(&self, messages: &[Message]) -> OpenAIChatRequest {
        OpenAIChatRequest {
            model: self.model.clone(),
            messages: with_system_prompt(&self.system_prompt, messages)
                .into_iter()
                .map(|m| OpenAIChatMessage {
                    role: m.role.api_name().to_string(),
                    content: Some(m.content),
                })
                .collect(),
        }
    }
}

/// Extract the assistant text from a chat completion body
pub fn parse_chat_response(body: &str) -> MavisResult<String> {
    let response: OpenAIChatResponse = serde_json::from_str(body).map_err(|e| {
        MavisError::ProviderInvocation(format!("Failed to parse response: {}", e))
    })?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| {
            MavisError::ProviderInvocation("Malformed reply: no message content".to_string())
        })
}

#[async_trait]
impl ProviderAdapter for OpenAIProvider {
    fn provider(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[Message]) -> MavisResult<String> {
        let request = self.build_request(messages);
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| MavisError::ProviderInvocation(format!("HTTP request failed: {}", e)))?;

        let response = error_for_status(response, "OpenAI").await?;
        let body = response.text().await?;
        parse_chat_response(&body)
    }
}
