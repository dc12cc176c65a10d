//! Source tables
//!
//! A [`Source`] describes a physical table that features are computed from. It
//! is always resolved: its schema, keys and timestamp are known up front.

use crate::feature::Feature;
use crate::transform::Transform;
use crate::types::Schema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_TIMESTAMP_FORMAT: &str = "epoch";

fn default_timestamp_format() -> String {
    DEFAULT_TIMESTAMP_FORMAT.to_string()
}

/// Physical table read by a processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    /// Underlying system, e.g. `filesystem` or `kafka`
    pub system_name: String,
    /// System-specific properties identifying the physical table
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub data_format: Option<String>,
    pub schema: Schema,
    #[serde(default)]
    pub keys: Option<Vec<String>>,
    #[serde(default)]
    pub timestamp_field: Option<String>,
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
    pub bounded: bool,
}

impl Source {
    fn new(name: impl Into<String>, system_name: &str, schema: Schema, bounded: bool) -> Self {
        Self {
            name: name.into(),
            system_name: system_name.to_string(),
            properties: BTreeMap::new(),
            data_format: None,
            schema,
            keys: None,
            timestamp_field: None,
            timestamp_format: default_timestamp_format(),
            bounded,
        }
    }

    /// Files under `path`, read once
    pub fn file_system(
        name: impl Into<String>,
        path: impl Into<String>,
        data_format: impl Into<String>,
        schema: Schema,
    ) -> Self {
        let mut source = Self::new(name, "filesystem", schema, true).with_property("path", path);
        source.data_format = Some(data_format.into());
        source
    }

    /// Kafka topic, read continuously
    pub fn kafka(
        name: impl Into<String>,
        bootstrap_server: impl Into<String>,
        topic: impl Into<String>,
        data_format: impl Into<String>,
        schema: Schema,
    ) -> Self {
        let mut source = Self::new(name, "kafka", schema, false)
            .with_property("bootstrap_server", bootstrap_server)
            .with_property("topic", topic);
        source.data_format = Some(data_format.into());
        source
    }

    /// Generated rows; unbounded unless a row count is given
    pub fn datagen(name: impl Into<String>, schema: Schema, number_of_rows: Option<u64>) -> Self {
        let source = Self::new(name, "datagen", schema, number_of_rows.is_some());
        match number_of_rows {
            Some(rows) => source.with_property("number-of-rows", rows.to_string()),
            None => source,
        }
    }

    pub fn with_keys(mut self, keys: &[&str]) -> Self {
        self.keys = Some(keys.iter().map(|k| k.to_string()).collect());
        self
    }

    pub fn with_timestamp(
        mut self,
        timestamp_field: impl Into<String>,
        timestamp_format: impl Into<String>,
    ) -> Self {
        self.timestamp_field = Some(timestamp_field.into());
        self.timestamp_format = timestamp_format.into();
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Schema columns as pass-through features keyed by the source keys
    pub fn get_output_features(&self) -> Vec<Feature> {
        self.schema
            .fields()
            .iter()
            .map(|field| Feature {
                name: field.name.clone(),
                transform: Transform::expression(field.name.clone()),
                keys: self.keys.clone(),
                dtype: Some(field.dtype.clone()),
            })
            .collect()
    }

    /// Copy of this source that stops at the data available when it is read
    pub fn to_bounded(&self) -> Self {
        let mut bounded = self.clone();
        bounded.bounded = true;
        if bounded.system_name == "kafka" {
            bounded
                .properties
                .insert("scan.bounded.mode".to_string(), "latest-offset".to_string());
        }
        bounded
    }
}
