// Copyright (c) 2024-2026 Nervosys LLC
// SPDX-License-Identifier: AGPL-3.0-only
//! SQLite-backed conversation store
//!
//! ## Schema Overview
//!
//! ```text
//! +-----------------+     +-----------------+     +-----------------+
//! |    workflow     |----<|  chat_history   |     |     models      |
//! | uuid, name      |     | workflow_id,    |     | id, provider,   |
//! | created_at      |     | history (JSON)  |     | name, censored  |
//! +-----------------+     +-----------------+     +-----------------+
//! ```
//!
//! History is stored as one JSON array per workflow and always overwritten in
//! full. Model rows are ordered by id; reordering rewrites the whole table.

use crate::error::{MavisError, MavisResult};
use crate::models::{Message, ModelEntry, ModelSpec, Workflow};
use crate::storage::{ConversationStore, HistoryStore, ModelStore, WorkflowStore};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Default database location
pub fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|p| p.join("mavis").join("chat_history.db"))
        .unwrap_or_else(|| PathBuf::from("chat_history.db"))
}

/// Conversation database manager
#[derive(Clone)]
pub struct ChatDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl ChatDatabase {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> MavisResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize()?;
        log::debug!("Opened database at {}", path.display());
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> MavisResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize()?;
        Ok(db)
    }

    fn lock(&self) -> MavisResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| MavisError::Persistence(e.to_string()))
    }

    /// Initialize the database schema
    fn initialize(&self) -> MavisResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS chat_history (
                workflow_id TEXT PRIMARY KEY,
                history TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS workflow (
                uuid TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS models (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                provider TEXT NOT NULL,
                name TEXT NOT NULL,
                censored BOOLEAN NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Write a raw history payload, bypassing serialization (used to repair or
    /// import data, and by tests exercising corrupt rows)
    pub fn save_raw_history(&self, workflow_id: Uuid, payload: &str) -> MavisResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO chat_history (workflow_id, history) VALUES (?1, ?2)",
            params![workflow_id.to_string(), payload],
        )?;
        Ok(())
    }

    /// Whether a history row exists for the workflow
    pub fn has_history(&self, workflow_id: Uuid) -> MavisResult<bool> {
        let conn = self.lock()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM chat_history WHERE workflow_id = ?1",
                params![workflow_id.to_string()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

fn row_to_workflow(uuid: String, name: String) -> Option<Workflow> {
    match Uuid::parse_str(&uuid) {
        Ok(id) => Some(Workflow { id, name }),
        Err(e) => {
            log::warn!("Skipping workflow with malformed id {:?}: {}", uuid, e);
            None
        }
    }
}

impl HistoryStore for ChatDatabase {
    fn save_history(&self, workflow_id: Uuid, history: &[Message]) -> MavisResult<()> {
        let payload = serde_json::to_string(history)?;
        self.save_raw_history(workflow_id, &payload)
    }

    fn load_history(&self, workflow_id: Uuid) -> MavisResult<Vec<Message>> {
        let payload: Option<String> = {
            let conn = self.lock()?;
            conn.query_row(
                "SELECT history FROM chat_history WHERE workflow_id = ?1",
                params![workflow_id.to_string()],
                |row| row.get(0),
            )
            .optional()?
        };

        let Some(payload) = payload else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Vec<Message>>(&payload) {
            Ok(messages) => Ok(messages),
            Err(e) => {
                log::warn!("Error parsing history for workflow {}: {}", workflow_id, e);
                Ok(Vec::new())
            }
        }
    }

    fn delete_history(&self, workflow_id: Uuid) -> MavisResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM chat_history WHERE workflow_id = ?1",
            params![workflow_id.to_string()],
        )?;
        Ok(())
    }
}

impl WorkflowStore for ChatDatabase {
    fn create_workflow(&self, workflow: &Workflow) -> MavisResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO workflow (uuid, name, created_at) VALUES (?1, ?2, ?3)",
            params![
                workflow.id.to_string(),
                workflow.name,
                Utc::now().timestamp_millis()
            ],
        )?;
        Ok(())
    }

    fn get_workflow(&self, id: Uuid) -> MavisResult<Option<Workflow>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT uuid, name FROM workflow WHERE uuid = ?1",
                params![id.to_string()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        Ok(row.and_then(|(uuid, name)| row_to_workflow(uuid, name)))
    }

    fn list_workflows(&self) -> MavisResult<Vec<Workflow>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT uuid, name FROM workflow ORDER BY created_at, rowid")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows
            .into_iter()
            .filter_map(|(uuid, name)| row_to_workflow(uuid, name))
            .collect())
    }

    fn delete_workflow(&self, id: Uuid) -> MavisResult<bool> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "DELETE FROM workflow WHERE uuid = ?1",
            params![id.to_string()],
        )?;
        Ok(rows > 0)
    }
}

impl ModelStore for ChatDatabase {
    fn insert_model(&self, spec: &ModelSpec) -> MavisResult<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO models (provider, name, censored) VALUES (?1, ?2, ?3)",
            params![spec.provider, spec.name, spec.censored],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn load_models(&self) -> MavisResult<Vec<ModelEntry>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT id, provider, name, censored FROM models ORDER BY id")?;
        let entries = stmt
            .query_map([], |row| {
                Ok(ModelEntry {
                    id: row.get(0)?,
                    provider: row.get(1)?,
                    name: row.get(2)?,
                    censored: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn update_model(&self, id: i64, spec: &ModelSpec) -> MavisResult<()> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE models SET provider = ?1, name = ?2, censored = ?3 WHERE id = ?4",
            params![spec.provider, spec.name, spec.censored, id],
        )?;
        if rows == 0 {
            return Err(MavisError::Persistence(format!("model {} not found", id)));
        }
        Ok(())
    }

    fn delete_model(&self, id: i64) -> MavisResult<bool> {
        let conn = self.lock()?;
        let rows = conn.execute("DELETE FROM models WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn replace_models(&self, specs: &[ModelSpec]) -> MavisResult<Vec<ModelEntry>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM models", [])?;
        let mut entries = Vec::with_capacity(specs.len());
        for spec in specs {
            tx.execute(
                "INSERT INTO models (provider, name, censored) VALUES (?1, ?2, ?3)",
                params![spec.provider, spec.name, spec.censored],
            )?;
            entries.push(ModelEntry::from_spec(tx.last_insert_rowid(), spec.clone()));
        }
        tx.commit()?;
        Ok(entries)
    }
}

impl ConversationStore for ChatDatabase {
    fn purge_workflow(&self, id: Uuid) -> MavisResult<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM chat_history WHERE workflow_id = ?1",
            params![id.to_string()],
        )?;
        let rows = tx.execute(
            "DELETE FROM workflow WHERE uuid = ?1",
            params![id.to_string()],
        )?;
        tx.commit()?;
        Ok(rows > 0)
    }
}
