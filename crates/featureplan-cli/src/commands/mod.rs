//! CLI command implementations

pub mod delete;
pub mod list;
pub mod materialize;
pub mod register;
pub mod show;
pub mod validate;

use anyhow::{Context, Result};
use featureplan_core::{Sink, TableDescriptor};
use featureplan_processor::LocalProcessor;
use featureplan_registry::FeatureRegistry;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::config::CliConfig;

/// Create registry from config
pub async fn create_registry(config: &CliConfig) -> Result<Arc<FeatureRegistry>> {
    let registry = FeatureRegistry::new(config.registry.clone())
        .await
        .context("Failed to open registry")?;
    Ok(Arc::new(registry))
}

/// Processor over the configured registry
pub fn create_processor(config: &CliConfig, registry: Arc<FeatureRegistry>) -> LocalProcessor {
    LocalProcessor::new(registry, config.processor.clone())
}

/// Descriptors defined in a YAML or JSON file, either one document or a list
pub fn read_descriptors(file: &str) -> Result<Vec<TableDescriptor>> {
    let value: serde_yaml::Value = read_document(file)?;
    let descriptors = if value.is_sequence() {
        serde_yaml::from_value(value)
    } else {
        serde_yaml::from_value(value).map(|d| vec![d])
    };
    descriptors.with_context(|| format!("Invalid table descriptor in {}", file))
}

/// Sink defined in a YAML or JSON file
pub fn read_sink(file: &str) -> Result<Sink> {
    read_document(file)
}

fn read_document<T: DeserializeOwned>(file: &str) -> Result<T> {
    let content =
        std::fs::read_to_string(file).with_context(|| format!("Failed to read file: {}", file))?;
    // YAML is a superset of JSON
    serde_yaml::from_str(&content).with_context(|| format!("Failed to parse {}", file))
}
