use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::store::PersistencePort;

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Ok(Self { conn })
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS store_snapshots (
                name TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    pub fn updated_at(&self, store: &str) -> Result<Option<String>> {
        let updated_at = self
            .conn
            .query_row(
                "SELECT updated_at FROM store_snapshots WHERE name = ?1",
                params![store],
                |row| row.get(0),
            )
            .optional()?;
        Ok(updated_at)
    }
}

impl PersistencePort for Database {
    fn load(&self, store: &str) -> Result<Option<String>> {
        let payload = self
            .conn
            .query_row(
                "SELECT payload FROM store_snapshots WHERE name = ?1",
                params![store],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to load store {store}"))?;
        Ok(payload)
    }

    fn save(&self, store: &str, payload: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                r#"
                INSERT INTO store_snapshots (name, payload, updated_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(name) DO UPDATE SET
                    payload = excluded.payload,
                    updated_at = excluded.updated_at
                "#,
                params![store, payload, now],
            )
            .with_context(|| format!("failed to save store {store}"))?;
        Ok(())
    }
}
