// Copyright (c) 2024-2026 Nervosys LLC
// SPDX-License-Identifier: AGPL-3.0-only
//! Configuration commands

use anyhow::Result;
use colored::*;
use std::path::{Path, PathBuf};

use crate::config::MavisConfig;

/// Resolve `--config` or fall back to the default location
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => MavisConfig::config_path(),
    }
}

/// Load the effective configuration
pub fn load_config(explicit: Option<&Path>) -> Result<MavisConfig> {
    let path = resolve_config_path(explicit)?;
    MavisConfig::load_from(&path)
}

/// Print the effective configuration with secrets masked
pub fn show_config(config: &MavisConfig) -> Result<()> {
    let mut shown = config.clone();
    if let Some(key) = shown.openai.api_key.as_mut() {
        *key = mask_secret(key);
    }

    println!("{}", serde_json::to_string_pretty(&shown)?);
    println!();
    println!("{} {}", "Database:".bold(), config.database_path().display());
    println!("{} {}", "Ollama:".bold(), config.ollama.endpoint());
    println!(
        "{} {}",
        "OpenAI key:".bold(),
        if config.openai.api_key.is_some() {
            "set".green()
        } else {
            "missing".red()
        }
    );
    Ok(())
}

/// Print the config file path
pub fn show_config_path(explicit: Option<&Path>) -> Result<()> {
    let path = resolve_config_path(explicit)?;
    let status = if path.exists() {
        "exists".green()
    } else {
        "not created".dimmed()
    };
    println!("{} ({})", path.display(), status);
    Ok(())
}

/// Write the default configuration
pub fn init_config(explicit: Option<&Path>, force: bool) -> Result<()> {
    let path = resolve_config_path(explicit)?;
    if path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    MavisConfig::default().save_to(&path)?;
    println!("{} Wrote {}", "[+]".green(), path.display());
    Ok(())
}

fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{}****", visible)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_secret_keeps_prefix() {
        assert_eq!(mask_secret("sk-abcdef"), "sk-a****");
        assert_eq!(mask_secret("ab"), "ab****");
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        init_config(Some(&path), false).unwrap();
        assert!(path.exists());
        assert!(init_config(Some(&path), false).is_err());
        init_config(Some(&path), true).unwrap();
    }
}
