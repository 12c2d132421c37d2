// Copyright (c) 2024-2026 Nervosys LLC
// SPDX-License-Identifier: AGPL-3.0-only
//! Content moderation gate
//!
//! Decides whether a turn should avoid the censored (default) models. The
//! OpenAI gate reports failures as the configured `flag_on_error` verdict.

use crate::config::{MavisConfig, ModerationConfig};
use crate::error::{MavisError, MavisResult};
use crate::providers::http::{build_http_client, error_for_status, HttpClientConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Classifies text as flagged or not
#[async_trait]
pub trait ModerationGate: Send + Sync {
    async fn is_flagged(&self, text: &str) -> bool;
}

/// Gate with a fixed verdict
#[derive(Debug, Clone, Copy)]
pub struct StaticModeration(pub bool);

#[async_trait]
impl ModerationGate for StaticModeration {
    async fn is_flagged(&self, _text: &str) -> bool {
        self.0
    }
}

#[derive(Debug, Serialize)]
struct ModerationRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct ModerationResponse {
    #[serde(default)]
    results: Vec<ModerationResult>,
}

#[derive(Debug, Deserialize)]
struct ModerationResult {
    flagged: bool,
}

/// OpenAI moderation endpoint
pub struct OpenAIModeration {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    flag_on_error: bool,
}

impl OpenAIModeration {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        api_key: Option<String>,
        config: &ModerationConfig,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            flag_on_error: config.flag_on_error,
        }
    }

    /// Ask the service for a verdict
    pub async fn classify(&self, text: &str) -> MavisResult<bool> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| MavisError::Moderation("no API key configured".to_string()))?;

        let response = self
            .client
            .post(format!("{}/moderations", self.base_url))
            .bearer_auth(api_key)
            .json(&ModerationRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await
            .map_err(|e| MavisError::Moderation(e.to_string()))?;
        let response = error_for_status(response, "Moderation")
            .await
            .map_err(|e| MavisError::Moderation(e.to_string()))?;
        let body = response.text().await?;
        parse_moderation_response(&body)
    }
}

fn parse_moderation_response(body: &str) -> MavisResult<bool> {
    let response: ModerationResponse = serde_json::from_str(body)
        .map_err(|e| MavisError::Moderation(format!("Failed to parse response: {}", e)))?;
    response
        .results
        .first()
        .map(|r| r.flagged)
        .ok_or_else(|| MavisError::Moderation("empty results".to_string()))
}

#[async_trait]
impl ModerationGate for OpenAIModeration {
    async fn is_flagged(&self, text: &str) -> bool {
        match self.classify(text).await {
            Ok(flagged) => flagged,
            Err(e) => {
                log::warn!(
                    "Error in content moderation: {} (treating as flagged={})",
                    e,
                    self.flag_on_error
                );
                self.flag_on_error
            }
        }
    }
}

/// Build the gate described by the configuration
pub fn moderation_from_config(config: &MavisConfig) -> MavisResult<Arc<dyn ModerationGate>> {
    if !config.moderation.enabled {
        log::debug!("Moderation disabled");
        return Ok(Arc::new(StaticModeration(false)));
    }
    if config.openai.api_key.is_none() {
        log::warn!(
            "Moderation enabled without an OpenAI API key; every check will report flagged={}",
            config.moderation.flag_on_error
        );
    }
    let client = build_http_client(&HttpClientConfig::default())?;
    Ok(Arc::new(OpenAIModeration::new(
        client,
        &config.openai.base_url,
        config.openai.api_key.clone(),
        &config.moderation,
    )))
}
