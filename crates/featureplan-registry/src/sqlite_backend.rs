//! SQLite backend implementation with WAL mode
//!
//! This backend uses SQLite with Write-Ahead Logging (WAL) for multi-process safety.
//! Suitable for:
//! - Small deployments sharing one registry file
//! - Embedded deployments (no external dependencies)
//! - Development and testing

use crate::backend::RegistryBackend;
use crate::schema;
use crate::RegisteredTable;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use featureplan_core::{recover_mutex, TableDescriptor};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// SQLite backend with WAL mode for multi-process safety
pub struct SqliteBackend {
    db: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    /// Create new SQLite backend from file path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy();
        let is_memory = path_str == ":memory:" || path_str.starts_with("file::memory:");

        if !is_memory {
            if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create registry directory {:?}", parent)
                })?;
            }
        }

        let db = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )
        .context("Failed to open SQLite connection for registry")?;

        // WAL needs a file
        if !is_memory {
            db.pragma_update(None, "journal_mode", "WAL")
                .context("Failed to enable WAL mode")?;

            // wait for locks instead of failing immediately
            db.pragma_update(None, "busy_timeout", 5000)
                .context("Failed to set busy timeout")?;

            db.pragma_update(None, "synchronous", "NORMAL")
                .context("Failed to set synchronous mode")?;

            info!(
                "Initialized SQLite registry at {:?} with WAL mode",
                path.as_ref()
            );
        } else {
            info!("Initialized in-memory SQLite registry (testing mode)");
        }

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Create in-memory SQLite backend (for testing)
    pub fn in_memory() -> Result<Self> {
        let db =
            Connection::open_in_memory().context("Failed to create in-memory SQLite connection")?;

        info!("Initialized in-memory SQLite registry");

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }
}

const SELECT_COLUMNS: &str =
    "SELECT name, descriptor, created_at, updated_at FROM table_descriptors";

fn row_to_table(row: &Row<'_>) -> rusqlite::Result<RegisteredTable> {
    let descriptor_json: String = row.get(1)?;
    let descriptor: TableDescriptor = serde_json::from_str(&descriptor_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_ts: i64 = row.get(2)?;
    let updated_ts: i64 = row.get(3)?;

    Ok(RegisteredTable {
        name: row.get(0)?,
        descriptor: Arc::new(descriptor),
        created_at: DateTime::from_timestamp(created_ts, 0).unwrap_or_else(Utc::now),
        updated_at: DateTime::from_timestamp(updated_ts, 0).unwrap_or_else(Utc::now),
    })
}

#[async_trait]
impl RegistryBackend for SqliteBackend {
    async fn init_schema(&self) -> Result<()> {
        let db = recover_mutex(&self.db, "FeatureRegistry")?;
        schema::create_tables(&db)?;
        Ok(())
    }

    async fn put_table(&self, namespace: &str, table: &RegisteredTable) -> Result<()> {
        let db = recover_mutex(&self.db, "FeatureRegistry")?;

        let descriptor_json = serde_json::to_string(table.descriptor.as_ref())?;

        db.execute(
            r#"
            INSERT INTO table_descriptors (
                namespace, name, kind, descriptor, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (namespace, name) DO UPDATE SET
                kind = excluded.kind,
                descriptor = excluded.descriptor,
                updated_at = excluded.updated_at
            "#,
            params![
                namespace,
                &table.name,
                table.descriptor.kind(),
                descriptor_json,
                table.created_at.timestamp(),
                table.updated_at.timestamp(),
            ],
        )
        .with_context(|| format!("Failed to store table descriptor '{}'", table.name))?;

        debug!("Stored table descriptor {}/{}", namespace, table.name);
        Ok(())
    }

    async fn get_table(&self, namespace: &str, name: &str) -> Result<Option<RegisteredTable>> {
        let db = recover_mutex(&self.db, "FeatureRegistry")?;

        let mut stmt = db.prepare(&format!(
            "{} WHERE namespace = ? AND name = ?",
            SELECT_COLUMNS
        ))?;

        let table = stmt
            .query_row(params![namespace, name], row_to_table)
            .optional()
            .with_context(|| format!("Failed to load table descriptor '{}'", name))?;

        Ok(table)
    }

    async fn list_tables(
        &self,
        namespace: &str,
        filter: Option<&str>,
    ) -> Result<Vec<RegisteredTable>> {
        let db = recover_mutex(&self.db, "FeatureRegistry")?;

        let (query, params_vec): (String, Vec<String>) = match filter {
            Some(f) => (
                format!(
                    "{} WHERE namespace = ? AND instr(name, ?) > 0 ORDER BY name",
                    SELECT_COLUMNS
                ),
                vec![namespace.to_string(), f.to_string()],
            ),
            None => (
                format!("{} WHERE namespace = ? ORDER BY name", SELECT_COLUMNS),
                vec![namespace.to_string()],
            ),
        };

        let mut stmt = db.prepare(&query)?;

        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec
            .iter()
            .map(|s| s as &dyn rusqlite::ToSql)
            .collect();

        let rows = stmt.query_map(params_refs.as_slice(), row_to_table)?;

        let mut tables = Vec::new();
        for row in rows {
            tables.push(row?);
        }

        Ok(tables)
    }

    async fn delete_table(&self, namespace: &str, name: &str) -> Result<bool> {
        let db = recover_mutex(&self.db, "FeatureRegistry")?;

        let rows_affected = db
            .execute(
                "DELETE FROM table_descriptors WHERE namespace = ? AND name = ?",
                params![namespace, name],
            )
            .with_context(|| format!("Failed to delete table descriptor '{}'", name))?;

        if rows_affected > 0 {
            info!("Deleted table descriptor {}/{}", namespace, name);
        }
        Ok(rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use featureplan_core::{DataType, Schema, Source};

    fn registered(name: &str) -> RegisteredTable {
        let source = Source::file_system(
            name,
            "/data/events",
            "json",
            Schema::builder().column("id", DataType::Int64).build(),
        );
        RegisteredTable::new(Arc::new(source.into()))
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.init_schema().await.unwrap();

        backend.put_table("default", &registered("events")).await.unwrap();

        let loaded = backend.get_table("default", "events").await.unwrap().unwrap();
        assert_eq!(loaded.name, "events");
        assert_eq!(loaded.descriptor.kind(), "source");
        assert!(backend.get_table("other", "events").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_keeps_created_at() {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.init_schema().await.unwrap();

        let mut table = registered("events");
        table.created_at = DateTime::from_timestamp(1_000, 0).unwrap();
        backend.put_table("default", &table).await.unwrap();

        let mut replacement = registered("events");
        replacement.created_at = DateTime::from_timestamp(2_000, 0).unwrap();
        backend.put_table("default", &replacement).await.unwrap();

        let loaded = backend.get_table("default", "events").await.unwrap().unwrap();
        assert_eq!(loaded.created_at.timestamp(), 1_000);
        assert_eq!(backend.list_tables("default", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_filter_and_delete() {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.init_schema().await.unwrap();

        for name in ["user_clicks", "user_orders", "items"] {
            backend.put_table("default", &registered(name)).await.unwrap();
        }

        let users = backend.list_tables("default", Some("user")).await.unwrap();
        let names: Vec<_> = users.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["user_clicks", "user_orders"]);

        assert!(backend.delete_table("default", "items").await.unwrap());
        assert!(!backend.delete_table("default", "items").await.unwrap());
        assert_eq!(backend.list_tables("default", None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_list_filter_is_literal_and_case_sensitive() {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.init_schema().await.unwrap();

        for name in ["user_f1", "userxf2", "User_f3", "user%f4"] {
            backend.put_table("default", &registered(name)).await.unwrap();
        }

        let names = |tables: Vec<RegisteredTable>| {
            tables.into_iter().map(|t| t.name).collect::<Vec<_>>()
        };
        assert_eq!(
            names(backend.list_tables("default", Some("user_f")).await.unwrap()),
            vec!["user_f1"]
        );
        assert_eq!(
            names(backend.list_tables("default", Some("%")).await.unwrap()),
            vec!["user%f4"]
        );
    }
}
