// Copyright (c) 2024-2026 Nervosys LLC
// SPDX-License-Identifier: AGPL-3.0-only
//! Shared HTTP client setup for providers and moderation

use crate::error::{MavisError, MavisResult};
use std::time::Duration;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            user_agent: format!("mavis/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Build a configured async HTTP client.
///
/// No overall request timeout is set here: chat calls are bounded by the
/// orchestrator and model pulls set their own per-request timeout.
pub fn build_http_client(config: &HttpClientConfig) -> MavisResult<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .user_agent(&config.user_agent)
        .build()
        .map_err(|e| MavisError::Configuration(format!("Failed to build HTTP client: {}", e)))
}

/// Turn a non-2xx response into a provider error carrying the body
pub(crate) async fn error_for_status(
    response: reqwest::Response,
    what: &str,
) -> MavisResult<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(MavisError::ProviderInvocation(format!(
        "{} API error ({}): {}",
        what, status, body
    )))
}
