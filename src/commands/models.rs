// Copyright (c) 2024-2026 Nervosys LLC
// SPDX-License-Identifier: AGPL-3.0-only
//! Model registry commands

use anyhow::{Context, Result};
use colored::*;
use std::sync::Arc;
use tabled::{settings::Style as TableStyle, Table, Tabled};

use super::{open_database, provider_factory};
use crate::config::MavisConfig;
use crate::models::{ModelEntry, ModelSpec};
use crate::providers::ProviderType;
use crate::registry::ModelRegistry;
use crate::storage::ModelStore;

#[derive(Tabled)]
struct ModelRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Provider")]
    provider: String,
    #[tabled(rename = "Model")]
    name: String,
    #[tabled(rename = "Censored")]
    censored: String,
}

fn print_models(entries: &[ModelEntry]) {
    let rows: Vec<ModelRow> = entries
        .iter()
        .enumerate()
        .map(|(position, entry)| ModelRow {
            position,
            id: entry.id,
            provider: entry.provider.clone(),
            name: entry.name.clone(),
            censored: if entry.censored {
                "Yes".to_string()
            } else {
                "No".to_string()
            },
        })
        .collect();

    let table = Table::new(rows)
        .with(TableStyle::ascii_rounded())
        .to_string();
    println!("{}", table);
}

/// Registry for editing. Ollama models are not pulled here, and entries
/// that cannot be built stay editable.
async fn open_registry(config: &MavisConfig) -> Result<ModelRegistry> {
    let db = Arc::new(open_database(config)?);
    let factory = provider_factory(config, false)?;
    ModelRegistry::load(db, factory, &config.default_models)
        .await
        .context("Failed to load model registry")
}

fn model_spec(provider: &str, name: &str, uncensored: bool) -> Result<ModelSpec> {
    let provider: ProviderType = provider.parse()?;
    Ok(ModelSpec::new(provider.to_string(), name, !uncensored))
}

/// List registered models in priority order
pub fn list_models(config: &MavisConfig) -> Result<()> {
    let db = open_database(config)?;
    let entries = db.load_models()?;

    if entries.is_empty() {
        println!(
            "{} No models saved; these defaults are used until the list is changed:",
            "[i]".blue()
        );
        for spec in &config.default_models {
            println!("  {} (censored={})", spec, spec.censored);
        }
        return Ok(());
    }

    print_models(&entries);
    println!("\nTotal models: {}", entries.len());
    Ok(())
}

/// Append a model to the registry
pub async fn add_model(
    config: &MavisConfig,
    provider: &str,
    name: &str,
    uncensored: bool,
) -> Result<()> {
    let spec = model_spec(provider, name, uncensored)?;
    let mut registry = open_registry(config).await?;
    let id = registry.add(spec.clone()).await?;

    println!("{} Added {} with id {}", "[+]".green(), spec.to_string().cyan(), id);
    print_models(registry.entries());
    Ok(())
}

/// Remove a model by id
pub async fn remove_model(config: &MavisConfig, id: i64) -> Result<()> {
    let mut registry = open_registry(config).await?;
    let removed = registry.remove(id)?;

    println!("{} Removed {} (id {})", "[-]".red(), removed, id);
    print_models(registry.entries());
    Ok(())
}

/// Move a model to another position
pub async fn move_model(config: &MavisConfig, from: usize, to: usize) -> Result<()> {
    let mut registry = open_registry(config).await?;
    registry.move_entry(from, to)?;

    println!("{} Moved model {} -> {}", "[*]".yellow(), from, to);
    print_models(registry.entries());
    Ok(())
}

/// Replace the model at a position
pub async fn set_model(
    config: &MavisConfig,
    index: usize,
    provider: &str,
    name: &str,
    uncensored: bool,
) -> Result<()> {
    let spec = model_spec(provider, name, uncensored)?;
    let mut registry = open_registry(config).await?;
    registry.set_model(index, spec.clone()).await?;

    println!("{} Model {} set to {}", "[*]".yellow(), index, spec.to_string().cyan());
    print_models(registry.entries());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::ChatDatabase;

    fn keyless_config(dir: &tempfile::TempDir) -> MavisConfig {
        let mut config = MavisConfig::default();
        config.database_path = Some(dir.path().join("mavis.db"));
        config.openai.api_key = None;
        config.ollama.host = "http://127.0.0.1:9".to_string();
        config
    }

    /// Stores `[openai gpt-4o-mini, ollama llama3]` and returns their ids
    fn seed(config: &MavisConfig) -> (i64, i64) {
        let db = ChatDatabase::open(&config.database_path()).unwrap();
        let openai = db
            .insert_model(&ModelSpec::new("openai", "gpt-4o-mini", true))
            .unwrap();
        let ollama = db
            .insert_model(&ModelSpec::new("ollama", "llama3", false))
            .unwrap();
        (openai, ollama)
    }

    fn stored(config: &MavisConfig) -> Vec<String> {
        let db = ChatDatabase::open(&config.database_path()).unwrap();
        db.load_models()
            .unwrap()
            .iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_remove_entry_that_cannot_be_built() {
        let dir = tempfile::tempdir().unwrap();
        let config = keyless_config(&dir);
        let (openai, _) = seed(&config);

        remove_model(&config, openai).await.unwrap();
        assert_eq!(stored(&config), ["ollama:llama3"]);
    }

    #[tokio::test]
    async fn test_move_and_set_with_unbuildable_entry() {
        let dir = tempfile::tempdir().unwrap();
        let config = keyless_config(&dir);
        seed(&config);

        move_model(&config, 1, 0).await.unwrap();
        assert_eq!(stored(&config), ["ollama:llama3", "openai:gpt-4o-mini"]);

        set_model(&config, 0, "ollama", "dolphin-mistral", true)
            .await
            .unwrap();
        assert_eq!(
            stored(&config),
            ["ollama:dolphin-mistral", "openai:gpt-4o-mini"]
        );
    }

    #[tokio::test]
    async fn test_add_openai_without_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = keyless_config(&dir);
        seed(&config);

        assert!(add_model(&config, "openai", "gpt-4o", false).await.is_err());
        assert_eq!(stored(&config), ["openai:gpt-4o-mini", "ollama:llama3"]);
    }

    #[tokio::test]
    async fn test_removing_last_model_does_not_restore_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = keyless_config(&dir);
        let (openai, ollama) = seed(&config);

        remove_model(&config, openai).await.unwrap();
        remove_model(&config, ollama).await.unwrap();
        list_models(&config).unwrap();
        assert!(stored(&config).is_empty());
    }
}
