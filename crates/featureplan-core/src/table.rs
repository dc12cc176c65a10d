//! Table descriptors and references
//!
//! Every named tabular schema (source, feature view, sink) is a
//! [`TableDescriptor`]. Definitions refer to tables and features either by name
//! or by value; [`TableRef`] and [`FeatureRef`] make that choice explicit so
//! that resolution status is a structural check.

use crate::error::{Error, Result};
use crate::feature::Feature;
use crate::feature_view::FeatureView;
use crate::sink::Sink;
use crate::source::{Source, DEFAULT_TIMESTAMP_FORMAT};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A named, keyed, time-aware table
///
/// Serialized with a `kind` tag:
///
/// ```json
/// {"kind": "source", "name": "orders", "system_name": "filesystem", ...}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableDescriptor {
    Source(Source),
    FeatureView(FeatureView),
    Sink(Sink),
}

impl TableDescriptor {
    /// Name under which the table is registered; sinks are unnamed
    pub fn name(&self) -> &str {
        match self {
            Self::Source(source) => &source.name,
            Self::FeatureView(view) => view.name(),
            Self::Sink(_) => "",
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Source(_) => "source",
            Self::FeatureView(_) => "feature_view",
            Self::Sink(_) => "sink",
        }
    }

    /// Key columns; `None` means unknown, `Some([])` means no key columns
    pub fn keys(&self) -> Option<&[String]> {
        match self {
            Self::Source(source) => source.keys.as_deref(),
            Self::FeatureView(view) => view.keys(),
            Self::Sink(_) => None,
        }
    }

    pub fn timestamp_field(&self) -> Option<&str> {
        match self {
            Self::Source(source) => source.timestamp_field.as_deref(),
            Self::FeatureView(view) => view.timestamp_field(),
            Self::Sink(_) => None,
        }
    }

    pub fn timestamp_format(&self) -> &str {
        match self {
            Self::Source(source) => &source.timestamp_format,
            Self::FeatureView(view) => view.timestamp_format(),
            Self::Sink(_) => DEFAULT_TIMESTAMP_FORMAT,
        }
    }

    /// True when the table still holds name references
    pub fn is_unresolved(&self) -> bool {
        match self {
            Self::FeatureView(view) => view.is_unresolved(),
            Self::Source(_) | Self::Sink(_) => false,
        }
    }

    /// Whether a scan of this table terminates
    pub fn is_bounded(&self) -> Result<bool> {
        match self {
            Self::Source(source) => Ok(source.bounded),
            Self::FeatureView(view) => view.is_bounded(),
            Self::Sink(_) => Err(Error::not_supported(
                "sink tables have no boundedness",
            )),
        }
    }

    /// Bounded variant of this table
    ///
    /// Returns the same `Arc` when the table is already bounded; otherwise a new
    /// table whose unbounded inputs are replaced by their bounded views. `self`
    /// is never modified.
    pub fn get_bounded_view(self: &Arc<Self>) -> Result<Arc<TableDescriptor>> {
        if self.is_bounded()? {
            return Ok(Arc::clone(self));
        }
        match self.as_ref() {
            Self::Source(source) => Ok(Arc::new(Self::Source(source.to_bounded()))),
            Self::FeatureView(view) => Ok(Arc::new(Self::FeatureView(view.to_bounded()?))),
            Self::Sink(_) => Err(Error::not_supported(
                "cannot get a bounded view of a sink table",
            )),
        }
    }

    /// Features produced by this table, in output column order
    pub fn get_output_features(&self) -> Result<Vec<Feature>> {
        match self {
            Self::Source(source) => Ok(source.get_output_features()),
            Self::FeatureView(view) => view.get_output_features(),
            Self::Sink(_) => Err(Error::not_supported(
                "sink tables do not produce features",
            )),
        }
    }

    pub fn as_feature_view(&self) -> Option<&FeatureView> {
        match self {
            Self::FeatureView(view) => Some(view),
            _ => None,
        }
    }

    pub fn as_sink(&self) -> Option<&Sink> {
        match self {
            Self::Sink(sink) => Some(sink),
            _ => None,
        }
    }
}

impl From<Source> for TableDescriptor {
    fn from(source: Source) -> Self {
        Self::Source(source)
    }
}

impl From<FeatureView> for TableDescriptor {
    fn from(view: FeatureView) -> Self {
        Self::FeatureView(view)
    }
}

impl From<Sink> for TableDescriptor {
    fn from(sink: Sink) -> Self {
        Self::Sink(sink)
    }
}

/// Reference to a table, by registry name or by value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableRef {
    Name(String),
    Table(Arc<TableDescriptor>),
}

impl TableRef {
    /// True for a name, or for a table that is itself unresolved
    pub fn is_unresolved(&self) -> bool {
        match self {
            Self::Name(_) => true,
            Self::Table(table) => table.is_unresolved(),
        }
    }

    /// Referenced table name
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Table(table) => table.name(),
        }
    }
}

impl From<&str> for TableRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for TableRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<Arc<TableDescriptor>> for TableRef {
    fn from(table: Arc<TableDescriptor>) -> Self {
        Self::Table(table)
    }
}

impl From<TableDescriptor> for TableRef {
    fn from(table: TableDescriptor) -> Self {
        Self::Table(Arc::new(table))
    }
}

impl From<Source> for TableRef {
    fn from(source: Source) -> Self {
        TableDescriptor::from(source).into()
    }
}

impl From<FeatureView> for TableRef {
    fn from(view: FeatureView) -> Self {
        TableDescriptor::from(view).into()
    }
}

/// Reference to a feature, by name or by value
///
/// A name is either `feature`, a column of the view's source, or
/// `table.feature`, a feature of another registered table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureRef {
    Name(String),
    Feature(Feature),
}

impl FeatureRef {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Feature(feature) => &feature.name,
        }
    }

    pub fn as_feature(&self) -> Option<&Feature> {
        match self {
            Self::Feature(feature) => Some(feature),
            Self::Name(_) => None,
        }
    }
}

impl From<&str> for FeatureRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for FeatureRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<Feature> for FeatureRef {
    fn from(feature: Feature) -> Self {
        Self::Feature(feature)
    }
}
