//! In-memory backend
//!
//! Keeps descriptors in a map for the lifetime of the process. Used by the
//! `local` registry type and by tests.

use crate::backend::RegistryBackend;
use crate::RegisteredTable;
use anyhow::Result;
use async_trait::async_trait;
use featureplan_core::recover_mutex;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::debug;

#[derive(Default)]
pub struct MemoryBackend {
    tables: Mutex<BTreeMap<(String, String), RegisteredTable>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistryBackend for MemoryBackend {
    async fn init_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn put_table(&self, namespace: &str, table: &RegisteredTable) -> Result<()> {
        let mut tables = recover_mutex(&self.tables, "MemoryBackend")?;
        tables.insert((namespace.to_string(), table.name.clone()), table.clone());
        debug!("Stored table descriptor {}/{}", namespace, table.name);
        Ok(())
    }

    async fn get_table(&self, namespace: &str, name: &str) -> Result<Option<RegisteredTable>> {
        let tables = recover_mutex(&self.tables, "MemoryBackend")?;
        Ok(tables
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn list_tables(
        &self,
        namespace: &str,
        filter: Option<&str>,
    ) -> Result<Vec<RegisteredTable>> {
        let tables = recover_mutex(&self.tables, "MemoryBackend")?;
        Ok(tables
            .iter()
            .filter(|((ns, name), _)| {
                ns == namespace && filter.map_or(true, |f| name.contains(f))
            })
            .map(|(_, table)| table.clone())
            .collect())
    }

    async fn delete_table(&self, namespace: &str, name: &str) -> Result<bool> {
        let mut tables = recover_mutex(&self.tables, "MemoryBackend")?;
        Ok(tables
            .remove(&(namespace.to_string(), name.to_string()))
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use featureplan_core::{DataType, Schema, Source};
    use std::sync::Arc;

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
    async fn test_list_filter_matches_sqlite_semantics() {
        let backend = MemoryBackend::new();
        for name in ["userxf2", "user_f1", "User_f3", "user%f4"] {
            backend.put_table("default", &registered(name)).await.unwrap();
        }
        backend.put_table("other", &registered("user_f5")).await.unwrap();

        let names = |tables: Vec<RegisteredTable>| {
            tables.into_iter().map(|t| t.name).collect::<Vec<_>>()
        };
        assert_eq!(
            names(backend.list_tables("default", Some("user_f")).await.unwrap()),
            vec!["user_f1"]
        );
        assert_eq!(
            names(backend.list_tables("default", None).await.unwrap()),
            vec!["User_f3", "user%f4", "user_f1", "userxf2"]
        );
    }
}
