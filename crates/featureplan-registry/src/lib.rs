//! Table Descriptor Registry for featureplan
//!
//! The registry stores table descriptors by name and turns definitions that
//! refer to other tables by name into concrete, resolved descriptors:
//!
//! - a source given by name is looked up and resolved recursively
//! - a feature `table.feature` becomes a join feature typed after the upstream
//!   feature
//! - a bare feature `name` becomes a pass-through of the source column
//!
//! Backends:
//! - **Memory** - Process-local (`type: local`)
//! - **SQLite with WAL** - Embedded, multi-process safe (`type: sqlite`)
//!
//! # Examples
//!
//! ```rust
//! use featureplan_core::{DataType, FeatureView, Schema, Source};
//! use featureplan_registry::{FeatureRegistry, Registry};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let registry = FeatureRegistry::in_memory();
//!
//! let orders = Source::file_system(
//!     "orders",
//!     "/data/orders",
//!     "csv",
//!     Schema::builder()
//!         .column("user_id", DataType::Int64)
//!         .column("amount", DataType::Float64)
//!         .build(),
//! );
//! registry
//!     .register_features(Arc::new(orders.into()), false)
//!     .await
//!     .unwrap();
//!
//! let view = FeatureView::builder("order_amounts")
//!     .source("orders")
//!     .feature("amount")
//!     .build()
//!     .unwrap();
//! assert!(view.is_unresolved());
//!
//! let built = registry.build_features(vec![Arc::new(view.into())], false).await.unwrap();
//! assert!(!built[0].is_unresolved());
//! # }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use featureplan_core::{
    Error, Feature, FeatureRef, FeatureView, Result, TableDescriptor, TableRef, Transform,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info};

// Re-export backend types
pub mod backend;
pub use backend::{RegistryBackend, RegistryConfig, DEFAULT_NAMESPACE};

// Backend implementations
mod memory_backend;
mod schema;
mod sqlite_backend;

pub use memory_backend::MemoryBackend;
pub use sqlite_backend::SqliteBackend;

/// A stored descriptor with bookkeeping timestamps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredTable {
    pub name: String,
    pub descriptor: Arc<TableDescriptor>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

impl RegisteredTable {
    pub fn new(descriptor: Arc<TableDescriptor>) -> Self {
        let now = Utc::now();
        Self {
            name: descriptor.name().to_string(),
            descriptor,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Name → table descriptor lookup used to resolve name references
#[async_trait]
pub trait Registry: Send + Sync {
    /// Resolves every descriptor and caches the named ones
    ///
    /// A descriptor is cached when its name is not registered yet, or always
    /// when `force_update` is set. Returns the resolved descriptors in input
    /// order.
    async fn build_features(
        &self,
        descriptors: Vec<Arc<TableDescriptor>>,
        force_update: bool,
    ) -> Result<Vec<Arc<TableDescriptor>>>;

    /// Resolves and stores one descriptor
    ///
    /// Fails with [`Error::AlreadyExists`] if the name is taken and
    /// `force_update` is not set.
    async fn register_features(
        &self,
        descriptor: Arc<TableDescriptor>,
        force_update: bool,
    ) -> Result<Arc<TableDescriptor>>;

    /// Fails with [`Error::TableNotFound`] when the name is unknown
    async fn get_features(&self, name: &str) -> Result<Arc<TableDescriptor>>;

    /// Returns whether a descriptor was deleted
    async fn delete_features(&self, name: &str) -> Result<bool>;

    async fn list_features(&self, filter: Option<&str>) -> Result<Vec<RegisteredTable>>;
}

type ResolveFuture<'a> = Pin<Box<dyn Future<Output = Result<Arc<TableDescriptor>>> + Send + 'a>>;

/// Feature Registry with pluggable backend, scoped to one namespace
pub struct FeatureRegistry {
    backend: Arc<dyn RegistryBackend>,
    namespace: String,
}

impl FeatureRegistry {
    /// Create new registry with specified backend configuration
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// // SQLite (embedded, multi-process safe)
    /// let config = RegistryConfig::sqlite("./registry.db");
    /// let registry = FeatureRegistry::new(config).await?;
    ///
    /// // Process-local
    /// let registry = FeatureRegistry::new(RegistryConfig::local("my-namespace")).await?;
    /// ```
    pub async fn new(config: RegistryConfig) -> Result<Self> {
        let (backend, namespace): (Arc<dyn RegistryBackend>, String) = match config {
            RegistryConfig::Local { namespace } => (Arc::new(MemoryBackend::new()), namespace),
            RegistryConfig::Sqlite { path, namespace } => {
                let backend = SqliteBackend::new(&path)?;
                (Arc::new(backend), namespace)
            }
        };

        backend.init_schema().await?;
        info!("Opened feature registry in namespace '{}'", namespace);

        Ok(Self { backend, namespace })
    }

    /// Create in-memory registry in the default namespace (for testing)
    pub fn in_memory() -> Self {
        Self::with_backend(Arc::new(MemoryBackend::new()), DEFAULT_NAMESPACE)
    }

    /// Registry over an already initialized backend
    pub fn with_backend(backend: Arc<dyn RegistryBackend>, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Substitutes concrete objects for every name reference in `table`
    ///
    /// Resolved tables are returned unchanged (same `Arc`).
    pub fn resolve<'a>(&'a self, table: Arc<TableDescriptor>) -> ResolveFuture<'a> {
        Box::pin(async move {
            if !table.is_unresolved() {
                return Ok(table);
            }
            let view = table.as_feature_view().ok_or_else(|| {
                Error::internal(format!("unresolved {} '{}'", table.kind(), table.name()))
            })?;
            debug!("Resolving feature view '{}'", view.name());

            let source = match view.source() {
                TableRef::Name(name) => self.resolve(self.get_features(name).await?).await?,
                TableRef::Table(source) => self.resolve(Arc::clone(source)).await?,
            };

            let mut features = Vec::with_capacity(view.features().len());
            for feature in view.features() {
                let feature = match feature {
                    FeatureRef::Feature(feature) => feature.clone(),
                    FeatureRef::Name(name) => match name.split_once('.') {
                        Some((table_name, feature_name)) => {
                            self.join_feature(table_name, feature_name).await?
                        }
                        None => pass_through_feature(&source, name)?,
                    },
                };
                features.push(feature);
            }

            let mut builder = FeatureView::builder(view.name())
                .source(source)
                .features(features)
                .keep_source_fields(view.keep_source_fields())
                .timestamp_format(view.timestamp_format());
            if let Some(field) = view.timestamp_field() {
                builder = builder.timestamp_field(field);
            }
            Ok(Arc::new(TableDescriptor::from(builder.build()?)))
        })
    }

    /// Join feature reading `feature_name` from the registered table `table_name`
    async fn join_feature(&self, table_name: &str, feature_name: &str) -> Result<Feature> {
        let table = self.resolve(self.get_features(table_name).await?).await?;
        let upstream = find_output_feature(&table, feature_name)?;

        let mut feature = Feature::new(feature_name, Transform::join(table_name, feature_name));
        feature.keys = upstream.keys;
        feature.dtype = upstream.dtype;
        Ok(feature)
    }

    async fn store(&self, descriptor: Arc<TableDescriptor>) -> Result<()> {
        let mut table = RegisteredTable::new(descriptor);
        if let Some(existing) = self.backend.get_table(&self.namespace, &table.name).await? {
            table.created_at = existing.created_at;
        }
        self.backend.put_table(&self.namespace, &table).await?;
        info!(
            "Registered {} '{}' in namespace '{}'",
            table.descriptor.kind(),
            table.name,
            self.namespace
        );
        Ok(())
    }
}

/// Pass-through of the source column `name`
fn pass_through_feature(source: &TableDescriptor, name: &str) -> Result<Feature> {
    let column = find_output_feature(source, name)?;
    let mut feature = Feature::expression(name, name);
    feature.keys = column.keys;
    feature.dtype = column.dtype;
    Ok(feature)
}

fn find_output_feature(table: &TableDescriptor, name: &str) -> Result<Feature> {
    table
        .get_output_features()?
        .into_iter()
        .find(|f| f.name == name)
        .ok_or_else(|| Error::FeatureNotFound {
            table: table.name().to_string(),
            feature: name.to_string(),
        })
}

#[async_trait]
impl Registry for FeatureRegistry {
    async fn build_features(
        &self,
        descriptors: Vec<Arc<TableDescriptor>>,
        force_update: bool,
    ) -> Result<Vec<Arc<TableDescriptor>>> {
        let mut built = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let resolved = self.resolve(descriptor).await?;
            let name = resolved.name();
            if !name.is_empty()
                && (force_update
                    || self.backend.get_table(&self.namespace, name).await?.is_none())
            {
                self.store(Arc::clone(&resolved)).await?;
            }
            built.push(resolved);
        }
        Ok(built)
    }

    async fn register_features(
        &self,
        descriptor: Arc<TableDescriptor>,
        force_update: bool,
    ) -> Result<Arc<TableDescriptor>> {
        let name = descriptor.name().to_string();
        if name.is_empty() {
            return Err(Error::invalid_input(format!(
                "Cannot register an unnamed {}",
                descriptor.kind()
            )));
        }
        if !force_update && self.backend.get_table(&self.namespace, &name).await?.is_some() {
            return Err(Error::AlreadyExists(name));
        }

        let resolved = self.resolve(descriptor).await?;
        self.store(Arc::clone(&resolved)).await?;
        Ok(resolved)
    }

    async fn get_features(&self, name: &str) -> Result<Arc<TableDescriptor>> {
        self.backend
            .get_table(&self.namespace, name)
            .await?
            .map(|table| table.descriptor)
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }

    async fn delete_features(&self, name: &str) -> Result<bool> {
        Ok(self.backend.delete_table(&self.namespace, name).await?)
    }

    async fn list_features(&self, filter: Option<&str>) -> Result<Vec<RegisteredTable>> {
        Ok(self.backend.list_tables(&self.namespace, filter).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use featureplan_core::{DataType, Schema, Source};

    fn orders() -> Arc<TableDescriptor> {
        Arc::new(
            Source::file_system(
                "orders",
                "/data/orders",
                "csv",
                Schema::builder()
                    .column("user_id", DataType::Int64)
                    .column("amount", DataType::Float64)
                    .column("ts", DataType::Timestamp)
                    .build(),
            )
            .with_keys(&["user_id"])
            .with_timestamp("ts", "epoch")
            .into(),
        )
    }

    fn users() -> Arc<TableDescriptor> {
        Arc::new(
            Source::file_system(
                "users",
                "/data/users",
                "csv",
                Schema::builder()
                    .column("user_id", DataType::Int64)
                    .column("age", DataType::Int32)
                    .build(),
            )
            .with_keys(&["user_id"])
            .into(),
        )
    }

    #[tokio::test]
    async fn test_get_unknown_table() {
        let registry = FeatureRegistry::in_memory();
        let err = registry.get_features("missing").await.unwrap_err();
        assert!(matches!(err, Error::TableNotFound(ref name) if name == "missing"));
    }

    #[tokio::test]
    async fn test_register_twice_requires_force_update() {
        let registry = FeatureRegistry::in_memory();
        registry.register_features(orders(), false).await.unwrap();

        let err = registry.register_features(orders(), false).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(ref name) if name == "orders"));

        assert!(registry.register_features(orders(), true).await.is_ok());
    }

    #[tokio::test]
    async fn test_resolve_source_and_feature_names() {
        let registry = FeatureRegistry::in_memory();
        registry.register_features(orders(), false).await.unwrap();
        registry.register_features(users(), false).await.unwrap();

        let view = FeatureView::builder("enriched")
            .source("orders")
            .feature("amount")
            .feature("users.age")
            .feature(Feature::expression("age_next_year", "age + 1"))
            .build()
            .unwrap();

        let built = registry
            .build_features(vec![Arc::new(view.into())], false)
            .await
            .unwrap();
        let view = built[0].as_feature_view().unwrap();
        let features = view.resolved_features().unwrap();

        assert_eq!(features[0].name, "amount");
        assert!(features[0].is_pass_through());
        assert_eq!(features[0].dtype, Some(DataType::Float64));

        assert_eq!(features[1].name, "age");
        assert_eq!(features[1].transform, Transform::join("users", "age"));
        assert_eq!(features[1].dtype, Some(DataType::Int32));
        assert_eq!(features[1].keys, Some(vec!["user_id".to_string()]));

        assert_eq!(features[2].dtype, Some(DataType::Int32));
        assert_eq!(view.timestamp_field(), Some("ts"));

        // cached under its own name
        let cached = registry.get_features("enriched").await.unwrap();
        assert!(!cached.is_unresolved());
    }

    #[tokio::test]
    async fn test_build_does_not_overwrite_without_force_update() {
        let registry = FeatureRegistry::in_memory();
        registry.register_features(orders(), false).await.unwrap();

        let first = FeatureView::builder("v")
            .source("orders")
            .feature(Feature::expression("x", "amount"))
            .build()
            .unwrap();
        let second = FeatureView::builder("v")
            .source("orders")
            .feature(Feature::expression("x", "amount * 2"))
            .build()
            .unwrap();

        registry
            .build_features(vec![Arc::new(first.into())], false)
            .await
            .unwrap();
        registry
            .build_features(vec![Arc::new(second.clone().into())], false)
            .await
            .unwrap();
        let cached = registry.get_features("v").await.unwrap();
        let expr = |table: &TableDescriptor| match &table
            .as_feature_view()
            .unwrap()
            .resolved_features()
            .unwrap()[0]
            .transform
        {
            Transform::Expression(t) => t.expr.clone(),
            other => panic!("unexpected transform {:?}", other),
        };
        assert_eq!(expr(&*cached), "amount");

        registry
            .build_features(vec![Arc::new(second.into())], true)
            .await
            .unwrap();
        let cached = registry.get_features("v").await.unwrap();
        assert_eq!(expr(&*cached), "amount * 2");
    }

    #[tokio::test]
    async fn test_unknown_feature_reference() {
        let registry = FeatureRegistry::in_memory();
        registry.register_features(orders(), false).await.unwrap();

        let view = FeatureView::builder("v")
            .source("orders")
            .feature("orders.discount")
            .build()
            .unwrap();
        let err = registry
            .build_features(vec![Arc::new(view.into())], false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::FeatureNotFound { ref table, ref feature } if table == "orders" && feature == "discount"
        ));
    }

    #[tokio::test]
    async fn test_resolved_tables_are_returned_unchanged() {
        let registry = FeatureRegistry::in_memory();
        let table = orders();
        let resolved = registry.resolve(Arc::clone(&table)).await.unwrap();
        assert!(Arc::ptr_eq(&table, &resolved));
    }

    #[tokio::test]
    async fn test_local_registry_namespace() {
        let config: RegistryConfig =
            serde_json::from_str(r#"{"type": "local", "namespace": "my-namespace"}"#).unwrap();
        let registry = FeatureRegistry::new(config).await.unwrap();
        assert_eq!(registry.namespace(), "my-namespace");
    }

    #[test]
    fn test_registered_table_serialization() {
        let table = RegisteredTable::new(orders());
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["name"], "orders");
        assert_eq!(json["descriptor"]["kind"], "source");
        assert!(json["created_at"].is_i64());
    }
}
