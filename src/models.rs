// Copyright (c) 2024-2026 Nervosys LLC
// SPDX-License-Identifier: AGPL-3.0-only
//! Core data structures: messages, model entries and workflows

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Assistant,
    System,
}

impl Role {
    /// Role name used by OpenAI-style chat APIs
    pub fn api_name(&self) -> &'static str {
        match self {
            Role::Human => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Human => write!(f, "human"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

/// A single conversation turn. Identity is its position in the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::new(Role::Human, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Message in `{"role", "content"}` form for chat APIs
    pub fn to_api_message(&self) -> serde_json::Value {
        serde_json::json!({
            "role": self.role.api_name(),
            "content": self.content,
        })
    }
}

/// A model to register: provider, model name and censorship tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub provider: String,
    pub name: String,
    pub censored: bool,
}

impl ModelSpec {
    pub fn new(provider: impl Into<String>, name: impl Into<String>, censored: bool) -> Self {
        Self {
            provider: provider.into(),
            name: name.into(),
            censored,
        }
    }
}

impl std::fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.provider, self.name)
    }
}

/// A persisted registry entry. `id` is assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: i64,
    pub provider: String,
    pub name: String,
    pub censored: bool,
}

impl ModelEntry {
    pub fn from_spec(id: i64, spec: ModelSpec) -> Self {
        Self {
            id,
            provider: spec.provider,
            name: spec.name,
            censored: spec.censored,
        }
    }

    pub fn spec(&self) -> ModelSpec {
        ModelSpec::new(&self.provider, &self.name, self.censored)
    }

    /// Whether the adapter for `self` can serve `other` without a rebuild
    pub fn same_target(&self, other: &ModelSpec) -> bool {
        self.provider.eq_ignore_ascii_case(&other.provider) && self.name == other.name
    }
}

impl std::fmt::Display for ModelEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.provider, self.name)
    }
}

/// A named, durable conversation thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub name: String,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}
