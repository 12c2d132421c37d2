// Copyright (c) 2024-2027 Nervosys LLC
// SPDX-License-Identifier: AGPL-3.0-only
//! Censorship-aware model routing
//!
//! A turn is routed in two steps. [`resolve_route`] turns the caller's options
//! and the moderation verdict into a [`Route`]; [`select_model`] maps the route
//! onto a registry snapshot. Both are deterministic for fixed inputs.

use crate::error::SelectionError;
use crate::models::ModelEntry;
use crate::moderation::ModerationGate;

/// Per-turn routing options supplied by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnOptions {
    /// Use this registry position, bypassing moderation
    pub model_index: Option<usize>,
    /// Treat the input as flagged without asking the gate
    pub force_flagged: bool,
    /// Never consult moderation; route to the censored model
    pub skip_moderation: bool,
}

impl TurnOptions {
    pub fn with_model(index: usize) -> Self {
        Self {
            model_index: Some(index),
            ..Self::default()
        }
    }

    pub fn flagged() -> Self {
        Self {
            force_flagged: true,
            ..Self::default()
        }
    }

    pub fn unmoderated() -> Self {
        Self {
            skip_moderation: true,
            ..Self::default()
        }
    }
}

/// Where a turn should go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Explicit(usize),
    /// First entry with `censored == false`
    Uncensored,
    /// First entry with `censored == true`
    Censored,
}

/// Decide the route for `text`. The gate is only consulted when neither an
/// explicit index, `force_flagged` nor `skip_moderation` decides it first.
pub async fn resolve_route(options: &TurnOptions, gate: &dyn ModerationGate, text: &str) -> Route {
    if let Some(index) = options.model_index {
        return Route::Explicit(index);
    }
    if options.skip_moderation {
        return Route::Censored;
    }
    if options.force_flagged || gate.is_flagged(text).await {
        Route::Uncensored
    } else {
        Route::Censored
    }
}

/// Pick the registry position serving `route`
pub fn select_model(entries: &[ModelEntry], route: Route) -> Result<usize, SelectionError> {
    match route {
        Route::Explicit(index) if index < entries.len() => Ok(index),
        Route::Explicit(index) => Err(SelectionError::InvalidIndex {
            index,
            len: entries.len(),
        }),
        Route::Uncensored => first_with(entries, false),
        Route::Censored => first_with(entries, true),
    }
}

fn first_with(entries: &[ModelEntry], censored: bool) -> Result<usize, SelectionError> {
    entries
        .iter()
        .position(|e| e.censored == censored)
        .ok_or(SelectionError::NoSuitableModel { censored })
}
