//! E2E tests for feature view resolution
//!
//! Builds realistic multi-level definitions and checks what a processor would
//! see after resolution:
//! - Chained views with inferred keys and types
//! - Output column ordering and feature shadowing
//! - Bounded projections of streaming pipelines
//! - Serialized definitions coming back resolved

use featureplan_core::{
    AggFunc, DataType, Error, Feature, FeatureView, OverWindowTransform, Schema,
    SlidingWindowTransform, Source, TableDescriptor, Transform,
};
use std::sync::Arc;
use std::time::Duration;

fn purchases() -> Source {
    Source::kafka(
        "purchases",
        "localhost:9092",
        "purchases",
        "json",
        Schema::builder()
            .column("user_id", DataType::Int64)
            .column("item_id", DataType::Int64)
            .column("price", DataType::Float64)
            .column("quantity", DataType::Int32)
            .column("category", DataType::String)
            .column("ts", DataType::String)
            .build(),
    )
    .with_keys(&["user_id", "item_id"])
    .with_timestamp("ts", "%Y-%m-%d %H:%M:%S")
}

fn purchase_features() -> FeatureView {
    FeatureView::builder("purchase_features")
        .source(purchases())
        .feature(Feature::expression("total", "price * quantity"))
        .feature(
            Feature::new(
                "total_1h",
                OverWindowTransform::new("total", AggFunc::Sum)
                    .group_by(&["user_id"])
                    .window_size(Duration::from_secs(3600))
                    .filter("category <> 'gift'"),
            )
            .with_keys(&["user_id"]),
        )
        .feature(
            Feature::new(
                "categories_1d",
                SlidingWindowTransform::new(
                    "lower(category)",
                    AggFunc::ValueCounts,
                    Duration::from_secs(86400),
                    Duration::from_secs(3600),
                )
                .group_by(&["user_id"]),
            )
            .with_keys(&["user_id"]),
        )
        .keep_source_fields(true)
        .build()
        .unwrap()
}

// ============================================================================
// Chained Resolution Tests
// ============================================================================

#[test]
fn test_e2e_chained_views_resolve_types_and_keys() {
    // Given: A view over a stream and a second view over the first
    let base = purchase_features();
    let spend = FeatureView::builder("spend_flags")
        .source(base)
        .feature(Feature::expression("big_spender", "total_1h > 1000.0"))
        .feature(Feature::expression("label", "CASE WHEN big_spender THEN 'vip' ELSE NULL END"))
        .build()
        .unwrap();

    // When: Reading the resolved features of both levels
    let features = spend.resolved_features().unwrap();
    let base = spend.resolved_source().unwrap().as_feature_view().unwrap();
    let base_features = base.resolved_features().unwrap();

    // Then: Types follow the expressions and aggregations
    assert_eq!(base_features[0].dtype, Some(DataType::Float64));
    assert_eq!(base_features[1].dtype, Some(DataType::Float64));
    assert_eq!(
        base_features[2].dtype,
        Some(DataType::map(DataType::String, DataType::Int64))
    );
    assert_eq!(features[0].dtype, Some(DataType::Bool));
    assert_eq!(features[1].dtype, Some(DataType::String));

    // And: Keys merge source keys with explicit feature keys
    let base_keys = vec!["user_id".to_string(), "item_id".to_string()];
    assert_eq!(base.keys(), Some(&base_keys[..]));
    assert_eq!(base_features[0].keys, Some(base_keys));
    assert_eq!(spend.keys(), None);

    // And: The timestamp is inherited through the chain
    assert_eq!(spend.timestamp_field(), Some("ts"));
    assert_eq!(spend.timestamp_format(), "%Y-%m-%d %H:%M:%S");
}

#[test]
fn test_e2e_output_features_of_chain() {
    // Given: A view that keeps no source fields over a keyed view
    let top = FeatureView::builder("top")
        .source(purchase_features())
        .feature(Feature::expression("total_1h", "total_1h / 100").with_keys(&["user_id"]))
        .build()
        .unwrap();

    // When: Listing its output features
    let features = top.get_output_features().unwrap();
    let names: Vec<_> = features.iter().map(|f| f.name.as_str()).collect();

    // Then: Timestamp and keys come in source order, then the feature
    assert_eq!(names, vec!["user_id", "ts", "total_1h"]);

    // And: The top-level feature shadows the upstream one
    assert!(matches!(
        &features[2].transform,
        Transform::Expression(t) if t.expr == "total_1h / 100"
    ));
}

#[test]
fn test_e2e_unknown_upstream_feature_fails() {
    // Given: A view referencing a column its source does not produce
    let result = FeatureView::builder("broken")
        .source(purchase_features())
        .feature(Feature::expression("discount", "price - coupon"))
        .build();

    // Then: The expression error names the feature being typed
    match result {
        Err(Error::Expression { feature, .. }) => assert_eq!(feature, "discount"),
        other => panic!("Expected expression error, got {:?}", other),
    }
}

// ============================================================================
// Bounded Projection Tests
// ============================================================================

#[test]
fn test_e2e_bounded_projection_of_streaming_chain() {
    // Given: A two-level chain over a Kafka stream
    let top = Arc::new(TableDescriptor::from(
        FeatureView::builder("top")
            .source(purchase_features())
            .feature(Feature::expression("total_x2", "total * 2"))
            .build()
            .unwrap(),
    ));

    // When: Projecting it onto bounded input
    let bounded = top.get_bounded_view().unwrap();

    // Then: Every level of the copy is bounded and the Kafka scan stops at latest offset
    assert!(bounded.is_bounded().unwrap());
    let middle = bounded
        .as_feature_view()
        .unwrap()
        .resolved_source()
        .unwrap();
    let source = middle
        .as_feature_view()
        .unwrap()
        .resolved_source()
        .unwrap();
    match source.as_ref() {
        TableDescriptor::Source(source) => {
            assert!(source.bounded);
            assert_eq!(
                source.properties.get("scan.bounded.mode").map(String::as_str),
                Some("latest-offset")
            );
        }
        other => panic!("Expected source, got {:?}", other),
    }

    // And: The original chain is untouched
    assert!(!top.is_bounded().unwrap());

    // And: Projecting the projection is the identity
    let again = bounded.get_bounded_view().unwrap();
    assert!(Arc::ptr_eq(&bounded, &again));
}

// ============================================================================
// Serialization Tests
// ============================================================================

#[test]
fn test_e2e_yaml_definition_resolves_on_load() {
    // Given: A hand-written YAML definition with nothing inferred
    let yaml = r#"
kind: feature_view
name: order_stats
keep_source_fields: false
source:
  kind: source
  name: orders
  system_name: filesystem
  properties:
    path: /data/orders
  data_format: csv
  schema:
    - name: user_id
      dtype: INT64
    - name: amount
      dtype: FLOAT32
    - name: ts
      dtype: TIMESTAMP
  keys: [user_id]
  timestamp_field: ts
  bounded: true
features:
  - name: order_count_7d
    keys: [user_id]
    transform:
      type: OverWindowTransform
      expr: amount
      agg_func: COUNT
      group_by_keys: [user_id]
      window_size: 604800
  - name: amounts
    keys: [user_id]
    transform:
      type: OverWindowTransform
      expr: amount
      agg_func: COLLECT_LIST
      group_by_keys: [user_id]
      limit: 10
"#;

    // When: Loading it
    let table: TableDescriptor = serde_yaml::from_str(yaml).unwrap();

    // Then: The view is resolved with types and keys filled in
    let view = table.as_feature_view().unwrap();
    assert!(!view.is_unresolved());
    assert_eq!(view.keys(), Some(&["user_id".to_string()][..]));
    let features = view.resolved_features().unwrap();
    assert_eq!(features[0].dtype, Some(DataType::Int64));
    assert_eq!(features[1].dtype, Some(DataType::vector(DataType::Float32)));
    assert!(table.is_bounded().unwrap());
    assert_eq!(view.timestamp_format(), "epoch");
}

#[test]
fn test_e2e_unresolved_definition_survives_roundtrip() {
    // Given: A view that only names its source and one feature
    let view = FeatureView::builder("by_name")
        .source("purchase_features")
        .feature("purchase_features.total")
        .feature(Feature::new("age", Transform::join("users", "age")).with_dtype(DataType::Int32))
        .build()
        .unwrap();

    // When: Serializing and loading it again
    let json = serde_json::to_string(&TableDescriptor::from(view.clone())).unwrap();
    let loaded: TableDescriptor = serde_json::from_str(&json).unwrap();

    // Then: It is still unresolved and otherwise unchanged
    assert!(loaded.is_unresolved());
    assert_eq!(loaded, TableDescriptor::from(view));
}
