//! Database schema for the table descriptor registry
//!
//! # Tables
//!
//! - **table_descriptors**: one row per registered descriptor, scoped by namespace
//!
//! The descriptor itself is stored as a JSON document. Loading it goes through
//! the descriptor's deserializer, which resolves and validates feature views
//! again.

use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn create_tables(db: &Connection) -> Result<()> {
    db.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS table_descriptors (
            namespace TEXT NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('source', 'feature_view', 'sink')),
            descriptor TEXT NOT NULL,
            created_at BIGINT NOT NULL,
            updated_at BIGINT NOT NULL,
            PRIMARY KEY (namespace, name)
        );

        CREATE INDEX IF NOT EXISTS idx_descriptors_kind ON table_descriptors(namespace, kind);
        CREATE INDEX IF NOT EXISTS idx_descriptors_updated ON table_descriptors(updated_at DESC);
        "#,
    )
    .context("Failed to create registry schema")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tables() {
        let db = Connection::open_in_memory().unwrap();
        assert!(create_tables(&db).is_ok());
        // idempotent
        assert!(create_tables(&db).is_ok());

        let mut stmt = db
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap();
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();

        assert!(tables.contains(&"table_descriptors".to_string()));
    }

    #[test]
    fn test_kind_is_checked() {
        let db = Connection::open_in_memory().unwrap();
        create_tables(&db).unwrap();

        let result = db.execute(
            "INSERT INTO table_descriptors VALUES ('default', 'x', 'bogus', '{}', 0, 0)",
            [],
        );
        assert!(result.is_err());
    }
}
