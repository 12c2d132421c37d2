// Copyright (c) 2024-2026 Nervosys LLC
// SPDX-License-Identifier: AGPL-3.0-only
//! Configuration
//!
//! Loaded from `<config_dir>/mavis/config.json` when present, otherwise
//! defaulted, then overlaid with environment variables.

use crate::models::ModelSpec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

pub const DEFAULT_WELCOME_MESSAGE: &str = "Hi there! 👋\n\
I'm MAVIS – your **Multi-tasking AI Virtual Intelligent Solution**. Think of me as your personal AI assistant, \
Ready to help with anything you need! 💡🤖\n\n\
How can I assist you today?";

fn default_true() -> bool {
    true
}

/// OpenAI API settings (chat and moderation)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// API key; `OPENAI_API_KEY` overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openai_base_url(),
        }
    }
}

/// Local Ollama server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_host")]
    pub host: String,

    #[serde(default = "default_ollama_port")]
    pub port: u16,

    /// Upper bound for a model pull
    #[serde(default = "default_pull_timeout")]
    pub pull_timeout_secs: u64,
}

fn default_ollama_host() -> String {
    "localhost".to_string()
}

fn default_ollama_port() -> u16 {
    11434
}

fn default_pull_timeout() -> u64 {
    3600
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            port: default_ollama_port(),
            pull_timeout_secs: default_pull_timeout(),
        }
    }
}

impl OllamaConfig {
    /// Base URL of the Ollama API. `host` may already carry a scheme.
    pub fn endpoint(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            // A host with a scheme and port is used verbatim
            let after_scheme = host.split("://").nth(1).unwrap_or(host);
            if after_scheme.contains(':') {
                return host.to_string();
            }
            return format!("{}:{}", host, self.port);
        }
        format!("http://{}:{}", host, self.port)
    }
}

/// Moderation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// When disabled, no text is ever flagged
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_moderation_model")]
    pub model: String,

    /// Verdict used when the moderation service fails
    #[serde(default = "default_true")]
    pub flag_on_error: bool,
}

fn default_moderation_model() -> String {
    "omni-moderation-latest".to_string()
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: default_moderation_model(),
            flag_on_error: true,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MavisConfig {
    /// SQLite database path; `MAVIS_DB_PATH` overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Seeded into every new workflow. Empty disables seeding.
    #[serde(default = "default_welcome_message")]
    pub welcome_message: String,

    /// Upper bound for one provider call; 0 disables the timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub openai: OpenAIConfig,

    #[serde(default)]
    pub ollama: OllamaConfig,

    #[serde(default)]
    pub moderation: ModerationConfig,

    /// Registry contents used when the store holds no models
    #[serde(default = "default_models")]
    pub default_models: Vec<ModelSpec>,
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_welcome_message() -> String {
    DEFAULT_WELCOME_MESSAGE.to_string()
}

fn default_request_timeout() -> u64 {
    120
}

fn default_models() -> Vec<ModelSpec> {
    vec![ModelSpec::new("openai", "gpt-4o-mini", true)]
}

impl Default for MavisConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            system_prompt: default_system_prompt(),
            welcome_message: default_welcome_message(),
            request_timeout_secs: default_request_timeout(),
            openai: OpenAIConfig::default(),
            ollama: OllamaConfig::default(),
            moderation: ModerationConfig::default(),
            default_models: default_models(),
        }
    }
}

impl MavisConfig {
    /// Load configuration from the default location, then apply environment overrides
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from an explicit path, then apply environment overrides
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Save configuration to the given location
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join("mavis").join("config.json"))
    }

    /// Overlay values from the environment. `lookup` is injectable for tests.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|v| !v.is_empty()) {
            self.openai.api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL").filter(|v| !v.is_empty()) {
            self.openai.base_url = url;
        }
        if let Some(host) = lookup("OLLAMA_HOST").filter(|v| !v.is_empty()) {
            self.ollama.host = host;
        }
        if let Some(port) = lookup("OLLAMA_PORT") {
            match port.parse() {
                Ok(port) => self.ollama.port = port,
                Err(_) => log::warn!("Ignoring invalid OLLAMA_PORT {:?}", port),
            }
        }
        if let Some(path) = lookup("MAVIS_DB_PATH").filter(|v| !v.is_empty()) {
            self.database_path = Some(PathBuf::from(path));
        }
    }

    /// Resolved database path
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(crate::database::default_db_path)
    }

    /// Welcome message, if seeding is enabled
    pub fn welcome(&self) -> Option<&str> {
        let trimmed = self.welcome_message.trim();
        (!trimmed.is_empty()).then_some(self.welcome_message.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_values() {
        let config = MavisConfig::default();
        assert_eq!(config.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(config.ollama.endpoint(), "http://localhost:11434");
        assert_eq!(
            config.default_models,
            vec![ModelSpec::new("openai", "gpt-4o-mini", true)]
        );
        assert!(config.moderation.flag_on_error);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-test"),
            ("OLLAMA_HOST", "gpu-box"),
            ("OLLAMA_PORT", "9999"),
        ]
        .into_iter()
        .collect();

        let mut config = MavisConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.ollama.endpoint(), "http://gpu-box:9999");
    }

    #[test]
    fn test_ollama_host_with_scheme() {
        let mut ollama = OllamaConfig::default();
        ollama.host = "http://127.0.0.1:11500".to_string();
        assert_eq!(ollama.endpoint(), "http://127.0.0.1:11500");
        ollama.host = "https://ollama.internal".to_string();
        assert_eq!(ollama.endpoint(), "https://ollama.internal:11434");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: MavisConfig =
            serde_json::from_str(r#"{"welcome_message": "", "request_timeout_secs": 5}"#).unwrap();
        assert!(config.welcome().is_none());
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.moderation.model, "omni-moderation-latest");
    }
}
