// Copyright (c) 2024-2026 Nervosys LLC
// SPDX-License-Identifier: AGPL-3.0-only
//! Ordered model registry
//!
//! Holds the configured [`ModelEntry`] list together with one adapter per
//! entry. `entries[i]` is always served by `adapters[i]`; every mutation
//! updates the store first and only then swaps the in-memory state, so a
//! failed write leaves the registry untouched.
//!
//! An empty store is served from the default models without writing them.
//! The first mutation persists the whole resulting list.

use crate::error::{MavisError, MavisResult};
use crate::models::{ModelEntry, ModelSpec};
use crate::providers::{AdapterFactory, ProviderAdapter, UnavailableProvider};
use crate::storage::ModelStore;
use std::collections::HashSet;
use std::sync::Arc;

/// Registry of models available for routing
pub struct ModelRegistry {
    store: Arc<dyn ModelStore>,
    factory: Arc<dyn AdapterFactory>,
    defaults: Vec<ModelSpec>,
    entries: Vec<ModelEntry>,
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    /// Entries are the in-memory defaults, not rows of the store
    unsaved: bool,
}

/// Ids handed to unsaved defaults; never produced by the store
fn default_entries(defaults: &[ModelSpec]) -> Vec<ModelEntry> {
    defaults
        .iter()
        .enumerate()
        .map(|(i, spec)| ModelEntry::from_spec(-(i as i64) - 1, spec.clone()))
        .collect()
}

/// Build an adapter for a stored entry. A build failure yields an adapter
/// that fails every call, so one bad entry cannot block the rest.
async fn build_or_unavailable(
    factory: &dyn AdapterFactory,
    spec: &ModelSpec,
) -> Arc<dyn ProviderAdapter> {
    match factory.build(spec).await {
        Ok(adapter) => adapter,
        Err(e) => {
            log::warn!("Model {} is unavailable: {}", spec, e);
            Arc::new(UnavailableProvider::new(spec, e.to_string()))
        }
    }
}

impl ModelRegistry {
    /// Load entries from the store and build their adapters. An empty store
    /// is served from `defaults`, which are not persisted.
    pub async fn load(
        store: Arc<dyn ModelStore>,
        factory: Arc<dyn AdapterFactory>,
        defaults: &[ModelSpec],
    ) -> MavisResult<Self> {
        let mut registry = Self {
            store,
            factory,
            defaults: defaults.to_vec(),
            entries: Vec::new(),
            adapters: Vec::new(),
            unsaved: false,
        };
        registry.refresh().await?;
        Ok(registry)
    }

    /// Whether the entries are unsaved defaults
    pub fn is_unsaved(&self) -> bool {
        self.unsaved
    }

    /// Entries in priority order
    pub fn entries(&self) -> &[ModelEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ModelEntry> {
        self.entries.get(index)
    }

    /// Adapter bound to the entry at `index`
    pub fn adapter(&self, index: usize) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(index).cloned()
    }

    pub fn position(&self, id: i64) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    fn check_index(&self, index: usize) -> MavisResult<()> {
        if index >= self.entries.len() {
            return Err(MavisError::InvalidIndex {
                index,
                len: self.entries.len(),
            });
        }
        Ok(())
    }

    fn specs(&self) -> Vec<ModelSpec> {
        self.entries.iter().map(ModelEntry::spec).collect()
    }

    /// Persist `specs` as the whole registry, replacing the unsaved defaults
    fn save_all(&mut self, specs: &[ModelSpec]) -> MavisResult<Vec<ModelEntry>> {
        let entries = self.store.replace_models(specs)?;
        if self.unsaved {
            log::info!("Saved model registry ({} models)", entries.len());
            self.unsaved = false;
        }
        Ok(entries)
    }

    /// Append a model. The adapter is built before anything is persisted.
    pub async fn add(&mut self, spec: ModelSpec) -> MavisResult<i64> {
        let adapter = self.factory.build(&spec).await?;
        let entry = if self.unsaved {
            let mut specs = self.specs();
            specs.push(spec.clone());
            let mut entries = self.save_all(&specs)?;
            let entry = entries.pop().ok_or_else(|| {
                MavisError::Persistence(format!("Model {} was not saved", spec))
            })?;
            self.entries = entries;
            entry
        } else {
            let id = self.store.insert_model(&spec)?;
            ModelEntry::from_spec(id, spec)
        };
        log::info!(
            "Added model {} (id={}, censored={})",
            entry,
            entry.id,
            entry.censored
        );
        self.entries.push(entry.clone());
        self.adapters.push(adapter);
        Ok(entry.id)
    }

    /// Remove the entry with the given id
    pub fn remove(&mut self, id: i64) -> MavisResult<ModelEntry> {
        let index = self.position(id).ok_or(MavisError::ModelNotFound(id))?;
        if self.unsaved {
            let mut specs = self.specs();
            specs.remove(index);
            let entries = self.save_all(&specs)?;
            let entry = self.entries.remove(index);
            self.entries = entries;
            self.adapters.remove(index);
            log::info!("Removed model {} (id={})", entry, id);
            return Ok(entry);
        }
        if !self.store.delete_model(id)? {
            return Err(MavisError::ModelNotFound(id));
        }
        self.adapters.remove(index);
        let entry = self.entries.remove(index);
        log::info!("Removed model {} (id={})", entry, id);
        Ok(entry)
    }

    /// Replace the registry order. `order[i]` is the current position of the
    /// entry that should end up at position `i`. Entries keep their values but
    /// receive new ids.
    pub fn reorder(&mut self, order: &[usize]) -> MavisResult<()> {
        let len = self.entries.len();
        if order.len() != len {
            return Err(MavisError::InvalidIndex {
                index: order.len(),
                len,
            });
        }
        let mut seen = HashSet::with_capacity(len);
        for &index in order {
            if index >= len || !seen.insert(index) {
                return Err(MavisError::InvalidIndex { index, len });
            }
        }

        let specs: Vec<ModelSpec> = order.iter().map(|&i| self.entries[i].spec()).collect();
        let adapters: Vec<_> = order.iter().map(|&i| self.adapters[i].clone()).collect();
        let entries = self.save_all(&specs)?;

        self.entries = entries;
        self.adapters = adapters;
        log::debug!("Reordered model registry: {:?}", order);
        Ok(())
    }

    /// Move the entry at `from` to position `to`
    pub fn move_entry(&mut self, from: usize, to: usize) -> MavisResult<()> {
        self.check_index(from)?;
        self.check_index(to)?;
        let mut order: Vec<usize> = (0..self.entries.len()).collect();
        let moved = order.remove(from);
        order.insert(to, moved);
        self.reorder(&order)
    }

    /// Replace the entry at `index` in place. The adapter is rebuilt when the
    /// provider or model name changes.
    pub async fn set_model(&mut self, index: usize, spec: ModelSpec) -> MavisResult<()> {
        self.check_index(index)?;
        let adapter = if self.entries[index].same_target(&spec) {
            self.adapters[index].clone()
        } else {
            self.factory.build(&spec).await?
        };

        if self.unsaved {
            let mut specs = self.specs();
            specs[index] = spec.clone();
            self.entries = self.save_all(&specs)?;
        } else {
            let id = self.entries[index].id;
            self.store.update_model(id, &spec)?;
            self.entries[index] = ModelEntry::from_spec(id, spec.clone());
        }
        log::info!("Model at index {} updated: {} (censored={})", index, spec, spec.censored);
        self.adapters[index] = adapter;
        Ok(())
    }

    /// Re-read the store, rebuilding adapters whose target changed. Entries
    /// that cannot be built get an adapter that fails every call.
    pub async fn refresh(&mut self) -> MavisResult<()> {
        let mut entries = self.store.load_models()?;
        let unsaved = entries.is_empty();
        if unsaved {
            entries = default_entries(&self.defaults);
        }

        let mut adapters = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let reusable = self
                .entries
                .get(index)
                .filter(|old| old.same_target(&entry.spec()))
                .and_then(|_| self.adapters.get(index).cloned());
            match reusable {
                Some(adapter) => adapters.push(adapter),
                None => {
                    adapters.push(build_or_unavailable(self.factory.as_ref(), &entry.spec()).await)
                }
            }
        }

        if unsaved && !entries.is_empty() {
            log::info!("No models stored; using {} default models", entries.len());
        }
        self.entries = entries;
        self.adapters = adapters;
        self.unsaved = unsaved;
        Ok(())
    }
}
