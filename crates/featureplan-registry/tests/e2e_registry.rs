//! End-to-end integration tests for the feature registry
//!
//! These tests validate complete workflows from registration to resolution of
//! chained definitions, against a SQLite registry on disk.

use featureplan_core::{
    AggFunc, DataType, Error, Feature, FeatureView, OverWindowTransform, Schema, Source,
    TableDescriptor, Transform,
};
use featureplan_registry::{FeatureRegistry, Registry, RegistryConfig};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn transactions() -> Arc<TableDescriptor> {
    Arc::new(
        Source::kafka(
            "transactions",
            "localhost:9092",
            "transactions",
            "json",
            Schema::builder()
                .column("account_id", DataType::Int64)
                .column("amount", DataType::Float64)
                .column("merchant", DataType::String)
                .column("ts", DataType::Timestamp)
                .build(),
        )
        .with_keys(&["account_id"])
        .with_timestamp("ts", "epoch")
        .into(),
    )
}

fn accounts() -> Arc<TableDescriptor> {
    Arc::new(
        Source::file_system(
            "accounts",
            "/data/accounts",
            "parquet",
            Schema::builder()
                .column("account_id", DataType::Int64)
                .column("country", DataType::String)
                .column("credit_limit", DataType::Float64)
                .build(),
        )
        .with_keys(&["account_id"])
        .into(),
    )
}

fn sqlite_config(temp_dir: &TempDir, namespace: &str) -> RegistryConfig {
    RegistryConfig::Sqlite {
        path: temp_dir
            .path()
            .join("registry.db")
            .to_string_lossy()
            .to_string(),
        namespace: namespace.to_string(),
    }
}

#[tokio::test]
async fn test_e2e_descriptor_lifecycle() {
    // Given: A new SQLite registry with two sources
    let temp_dir = TempDir::new().unwrap();
    let registry = FeatureRegistry::new(sqlite_config(&temp_dir, "default"))
        .await
        .unwrap();
    registry.register_features(transactions(), false).await.unwrap();
    registry.register_features(accounts(), false).await.unwrap();

    // When: List all descriptors
    let tables = registry.list_features(None).await.unwrap();

    // Then: Both are present, ordered by name
    let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["accounts", "transactions"]);

    // When: Filter by name
    let tables = registry.list_features(Some("trans")).await.unwrap();

    // Then: Only the match is returned
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].descriptor.kind(), "source");

    // When: Delete a descriptor
    assert!(registry.delete_features("accounts").await.unwrap());

    // Then: It is gone
    let err = registry.get_features("accounts").await.unwrap_err();
    assert!(matches!(err, Error::TableNotFound(_)));
    assert!(!registry.delete_features("accounts").await.unwrap());
}

#[tokio::test]
async fn test_e2e_chained_views_resolve_by_name() {
    // Given: Registered sources and a window view defined by name
    let temp_dir = TempDir::new().unwrap();
    let registry = FeatureRegistry::new(sqlite_config(&temp_dir, "default"))
        .await
        .unwrap();
    registry.register_features(transactions(), false).await.unwrap();
    registry.register_features(accounts(), false).await.unwrap();

    let spend = FeatureView::builder("spend_7d")
        .source("transactions")
        .feature(
            Feature::new(
                "amount_7d",
                OverWindowTransform::new("amount", AggFunc::Sum)
                    .group_by(&["account_id"])
                    .window_size(Duration::from_secs(7 * 86400)),
            )
            .with_keys(&["account_id"]),
        )
        .build()
        .unwrap();
    registry
        .register_features(Arc::new(spend.into()), false)
        .await
        .unwrap();

    // When: A second view refers to the first and to another table by name
    let risk = FeatureView::builder("risk")
        .source("spend_7d")
        .feature("amount_7d")
        .feature("accounts.credit_limit")
        .feature(Feature::expression("utilization", "amount_7d / credit_limit"))
        .build()
        .unwrap();
    let built = registry
        .build_features(vec![Arc::new(risk.into())], false)
        .await
        .unwrap();

    // Then: The built view is resolved with types carried through the chain
    let view = built[0].as_feature_view().unwrap();
    assert!(!view.is_unresolved());
    let features = view.resolved_features().unwrap();
    assert_eq!(features[0].dtype, Some(DataType::Float64));
    assert_eq!(
        features[1].transform,
        Transform::join("accounts", "credit_limit")
    );
    assert_eq!(features[2].dtype, Some(DataType::Float64));
    assert_eq!(view.keys(), Some(&["account_id".to_string()][..]));
    assert!(!built[0].is_bounded().unwrap());
}

#[tokio::test]
async fn test_e2e_registry_persists_across_reopen() {
    // Given: A view registered in one registry instance
    let temp_dir = TempDir::new().unwrap();
    {
        let registry = FeatureRegistry::new(sqlite_config(&temp_dir, "default"))
            .await
            .unwrap();
        registry.register_features(transactions(), false).await.unwrap();
        let view = FeatureView::builder("merchants")
            .source("transactions")
            .feature(Feature::expression("merchant_lower", "lower(merchant)"))
            .keep_source_fields(true)
            .build()
            .unwrap();
        registry
            .register_features(Arc::new(view.into()), false)
            .await
            .unwrap();
    }

    // When: Opening the same database again
    let registry = FeatureRegistry::new(sqlite_config(&temp_dir, "default"))
        .await
        .unwrap();
    let table = registry.get_features("merchants").await.unwrap();

    // Then: The view comes back resolved and typed
    let view = table.as_feature_view().unwrap();
    assert!(!view.is_unresolved());
    assert_eq!(
        view.resolved_features().unwrap()[0].dtype,
        Some(DataType::String)
    );
    assert_eq!(view.keys(), Some(&["account_id".to_string()][..]));
    assert_eq!(view.timestamp_field(), Some("ts"));
}

#[tokio::test]
async fn test_e2e_namespaces_are_isolated() {
    // Given: Two registries sharing one database file in different namespaces
    let temp_dir = TempDir::new().unwrap();
    let team_a = FeatureRegistry::new(sqlite_config(&temp_dir, "team-a"))
        .await
        .unwrap();
    let team_b = FeatureRegistry::new(sqlite_config(&temp_dir, "team-b"))
        .await
        .unwrap();

    // When: Only team A registers a source
    team_a.register_features(transactions(), false).await.unwrap();

    // Then: Team B cannot see it and can register its own under the same name
    assert!(matches!(
        team_b.get_features("transactions").await,
        Err(Error::TableNotFound(_))
    ));
    team_b.register_features(transactions(), false).await.unwrap();
    assert_eq!(team_a.list_features(None).await.unwrap().len(), 1);
    assert_eq!(team_b.list_features(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_e2e_missing_source_name() {
    // Given: A view whose source was never registered
    let registry = FeatureRegistry::new(RegistryConfig::local("default"))
        .await
        .unwrap();
    let view = FeatureView::builder("orphan")
        .source("nowhere")
        .feature(Feature::expression("x", "1"))
        .build()
        .unwrap();

    // When: Building it
    let err = registry
        .build_features(vec![Arc::new(view.into())], false)
        .await
        .unwrap_err();

    // Then: The missing table is named
    assert!(matches!(err, Error::TableNotFound(ref name) if name == "nowhere"));
}
