//! Registry backend trait and configuration
//!
//! This module provides a trait-based abstraction for the registry storage backend.
//! Supports multiple backends:
//! - **Memory** - Process-local, nothing persisted
//! - **SQLite with WAL** - Embedded, multi-process safe

use crate::RegisteredTable;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Registry backend trait for storage operations
///
/// Every call is scoped to a namespace; the same name may be registered in
/// several namespaces independently.
#[async_trait]
pub trait RegistryBackend: Send + Sync {
    /// Initialize schema (create tables, indexes)
    async fn init_schema(&self) -> Result<()>;

    /// Insert or replace a descriptor
    async fn put_table(&self, namespace: &str, table: &RegisteredTable) -> Result<()>;

    /// Get descriptor by name, `None` when absent
    async fn get_table(&self, namespace: &str, name: &str) -> Result<Option<RegisteredTable>>;

    /// List descriptors ordered by name (with optional name substring filter)
    async fn list_tables(&self, namespace: &str, filter: Option<&str>)
        -> Result<Vec<RegisteredTable>>;

    /// Delete descriptor; returns whether it existed
    async fn delete_table(&self, namespace: &str, name: &str) -> Result<bool>;
}

pub const DEFAULT_NAMESPACE: &str = "default";

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

/// Configuration for registry backend
///
/// ```yaml
/// type: sqlite
/// path: .featureplan/registry.db
/// namespace: analytics
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryConfig {
    /// Process-local registry, lost on exit
    Local {
        #[serde(default = "default_namespace")]
        namespace: String,
    },

    /// SQLite with WAL mode (embedded, multi-process safe)
    Sqlite {
        /// Path to SQLite database file
        path: String,
        #[serde(default = "default_namespace")]
        namespace: String,
    },
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: ".featureplan/registry.db".to_string(),
            namespace: default_namespace(),
        }
    }
}

impl RegistryConfig {
    /// Create local (in-memory) configuration
    pub fn local(namespace: impl Into<String>) -> Self {
        Self::Local {
            namespace: namespace.into(),
        }
    }

    /// Create SQLite configuration in the default namespace
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self::Sqlite {
            path: path.into(),
            namespace: default_namespace(),
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            Self::Local { namespace } | Self::Sqlite { namespace, .. } => namespace,
        }
    }
}
