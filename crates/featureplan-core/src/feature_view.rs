//! Feature views
//!
//! A [`FeatureView`] derives a table of features from a source table. The
//! source and the features may be given by name, in which case the view is
//! *unresolved*: it only records the definition and a registry must build a
//! new view once the names are substituted.
//!
//! A view whose source and features are all concrete is resolved eagerly when
//! it is built:
//!
//! 1. The view's keys are inferred from the source and the features' keys.
//! 2. Features without keys inherit the view's keys.
//! 3. Features without a dtype get one derived from their transform, in list
//!    order. Later features may refer to earlier ones by name.
//! 4. A view without a timestamp field inherits the source's timestamp field
//!    and format.
//! 5. Duplicate feature names are rejected.
//!
//! # Examples
//!
//! ```
//! use featureplan_core::{DataType, Feature, FeatureView, Schema, Source};
//!
//! let orders = Source::file_system(
//!     "orders",
//!     "/data/orders",
//!     "csv",
//!     Schema::builder()
//!         .column("user_id", DataType::Int64)
//!         .column("amount", DataType::Int32)
//!         .build(),
//! )
//! .with_keys(&["user_id"]);
//!
//! let view = FeatureView::builder("order_features")
//!     .source(orders)
//!     .feature(Feature::expression("amount_x2", "amount * 2"))
//!     .keep_source_fields(true)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(view.keys(), Some(&["user_id".to_string()][..]));
//! let features = view.resolved_features().unwrap();
//! assert_eq!(features[0].dtype, Some(DataType::Int32));
//! ```

use crate::error::{Error, Result};
use crate::expr;
use crate::feature::Feature;
use crate::source::DEFAULT_TIMESTAMP_FORMAT;
use crate::table::{FeatureRef, TableDescriptor, TableRef};
use crate::transform::Transform;
use crate::types::DataType;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Table of features derived from a source table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "FeatureViewDef", try_from = "FeatureViewDef")]
pub struct FeatureView {
    name: String,
    source: TableRef,
    features: Vec<FeatureRef>,
    keep_source_fields: bool,
    keys: Option<Vec<String>>,
    timestamp_field: Option<String>,
    timestamp_format: String,
}

impl FeatureView {
    pub fn builder(name: impl Into<String>) -> FeatureViewBuilder {
        FeatureViewBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &TableRef {
        &self.source
    }

    pub fn features(&self) -> &[FeatureRef] {
        &self.features
    }

    pub fn keep_source_fields(&self) -> bool {
        self.keep_source_fields
    }

    /// Inferred key columns; always `None` while unresolved
    pub fn keys(&self) -> Option<&[String]> {
        self.keys.as_deref()
    }

    pub fn timestamp_field(&self) -> Option<&str> {
        self.timestamp_field.as_deref()
    }

    pub fn timestamp_format(&self) -> &str {
        &self.timestamp_format
    }

    /// True if the source is a name, the source is an unresolved view, or any
    /// feature is a name
    pub fn is_unresolved(&self) -> bool {
        self.source.is_unresolved()
            || self
                .features
                .iter()
                .any(|f| matches!(f, FeatureRef::Name(_)))
    }

    /// Concrete source table
    pub fn resolved_source(&self) -> Result<&Arc<TableDescriptor>> {
        match &self.source {
            TableRef::Table(table) if !self.is_unresolved() => Ok(table),
            _ => Err(Error::Unresolved(self.name.clone())),
        }
    }

    /// Concrete features, in definition order
    pub fn resolved_features(&self) -> Result<Vec<&Feature>> {
        if self.is_unresolved() {
            return Err(Error::Unresolved(self.name.clone()));
        }
        Ok(self.features.iter().filter_map(FeatureRef::as_feature).collect())
    }

    /// Whether the source of this view is bounded, recursively
    pub fn is_bounded(&self) -> Result<bool> {
        self.resolved_source()?.is_bounded()
    }

    /// Copy of this view reading from the bounded view of its source
    pub(crate) fn to_bounded(&self) -> Result<FeatureView> {
        let bounded_source = self.resolved_source()?.get_bounded_view()?;
        let mut view = self.clone();
        view.source = TableRef::Table(bounded_source);
        Ok(view)
    }

    /// Names of the columns this view outputs, given the source's column names
    ///
    /// The columns are the source columns (with `keep_source_fields`) or the
    /// timestamp field, then each feature's keys and name. Columns that also
    /// appear in `source_fields` come first, in source order.
    pub fn get_output_fields(&self, source_fields: &[&str]) -> Result<Vec<String>> {
        let features = self.resolved_features()?;

        let mut built: Vec<&str> = Vec::new();
        if self.keep_source_fields {
            built.extend_from_slice(source_fields);
        } else if let Some(timestamp_field) = &self.timestamp_field {
            built.push(timestamp_field);
        }
        for feature in features {
            if let Some(keys) = &feature.keys {
                built.extend(keys.iter().map(String::as_str));
            }
            built.push(&feature.name);
        }

        let built_set: HashSet<&str> = built.iter().copied().collect();
        let ordered = source_fields
            .iter()
            .copied()
            .filter(|field| built_set.contains(field))
            .chain(built);

        let mut seen = HashSet::new();
        Ok(ordered
            .filter(|field| seen.insert(*field))
            .map(str::to_string)
            .collect())
    }

    /// Features backing each output column, in output column order
    ///
    /// Features of this view shadow same-named features of the source.
    pub fn get_output_features(&self) -> Result<Vec<Feature>> {
        let source_features = self.resolved_source()?.get_output_features()?;
        let source_names: Vec<&str> = source_features.iter().map(|f| f.name.as_str()).collect();
        let output_fields = self.get_output_fields(&source_names)?;

        let mut by_name: HashMap<&str, &Feature> = source_features
            .iter()
            .map(|f| (f.name.as_str(), f))
            .collect();
        for feature in self.resolved_features()? {
            by_name.insert(&feature.name, feature);
        }

        output_fields
            .iter()
            .map(|field| {
                by_name
                    .get(field.as_str())
                    .map(|feature| (*feature).clone())
                    .ok_or_else(|| Error::FeatureNotFound {
                        table: self.name.clone(),
                        feature: field.clone(),
                    })
            })
            .collect()
    }

    fn resolve(&mut self) -> Result<()> {
        let source = Arc::clone(self.resolved_source()?);

        self.keys = self.infer_keys(&source);
        debug!(view = %self.name, keys = ?self.keys, "Inferred feature view keys");

        let mut variable_types = self.initial_variable_types(&source)?;
        let keys = self.keys.clone();
        for feature in self.features.iter_mut().filter_map(|f| match f {
            FeatureRef::Feature(feature) => Some(feature),
            FeatureRef::Name(_) => None,
        }) {
            if feature.keys.is_none() {
                feature.keys = keys.clone();
            }
            if feature.dtype.is_none() {
                let dtype = derive_feature_dtype(feature, &mut variable_types)?;
                debug!(
                    view = %self.name,
                    feature = %feature.name,
                    dtype = %dtype,
                    "Derived feature type"
                );
                feature.dtype = Some(dtype);
            }
        }

        if self.timestamp_field.is_none() {
            self.timestamp_field = source.timestamp_field().map(str::to_string);
            self.timestamp_format = source.timestamp_format().to_string();
        }

        let mut names = HashSet::new();
        for feature in &self.features {
            if !names.insert(feature.name()) {
                return Err(Error::DuplicateFeature {
                    view: self.name.clone(),
                    feature: feature.name().to_string(),
                });
            }
        }
        Ok(())
    }

    fn infer_keys(&self, source: &TableDescriptor) -> Option<Vec<String>> {
        let source_keys = source.keys();
        if self.keep_source_fields && source_keys.is_none() {
            return None;
        }

        let feature_keys: Vec<&[String]> = self
            .features
            .iter()
            .filter_map(|f| f.as_feature().and_then(|f| f.keys.as_deref()))
            .collect();
        if !self.keep_source_fields && feature_keys.is_empty() {
            return None;
        }

        let mut keys: Vec<String> = Vec::new();
        let candidates = self
            .keep_source_fields
            .then_some(source_keys)
            .flatten()
            .into_iter()
            .chain(feature_keys)
            .flatten();
        for key in candidates {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        Some(keys)
    }

    /// Types visible to this view's expressions before any feature is derived
    fn initial_variable_types(
        &self,
        source: &TableDescriptor,
    ) -> Result<HashMap<String, DataType>> {
        let mut variable_types = HashMap::new();
        for feature in source.get_output_features()? {
            if let Some(dtype) = feature.dtype {
                variable_types.insert(feature.name, dtype);
            }
        }
        for feature in self.features.iter().filter_map(FeatureRef::as_feature) {
            if let Some(dtype) = &feature.dtype {
                variable_types.insert(feature.name.clone(), dtype.clone());
            }
        }
        Ok(variable_types)
    }
}

/// Derives the dtype of `feature` and records it in `variable_types`
pub fn derive_feature_dtype(
    feature: &Feature,
    variable_types: &mut HashMap<String, DataType>,
) -> Result<DataType> {
    let eval = |expression: &str| {
        expr::parse(expression)
            .and_then(|parsed| parsed.eval_dtype(variable_types))
            .map_err(|e| Error::expression(&feature.name, e))
    };

    let dtype = match &feature.transform {
        Transform::Expression(t) => eval(&t.expr)?,
        Transform::OverWindow(t) => t
            .agg_func
            .get_result_type(&eval(&t.expr)?)
            .map_err(|e| Error::expression(&feature.name, e))?,
        Transform::SlidingWindow(t) => t
            .agg_func
            .get_result_type(&eval(&t.expr)?)
            .map_err(|e| Error::expression(&feature.name, e))?,
        Transform::Join(_) => {
            return Err(Error::UnsupportedTransform {
                feature: feature.name.clone(),
                transform: feature.transform.kind(),
                reason: "join features must have their dtype set".to_string(),
            })
        }
    };

    variable_types.insert(feature.name.clone(), dtype.clone());
    Ok(dtype)
}

/// Builder for [`FeatureView`]
#[derive(Debug, Clone)]
pub struct FeatureViewBuilder {
    name: String,
    source: Option<TableRef>,
    features: Vec<FeatureRef>,
    keep_source_fields: bool,
    timestamp_field: Option<String>,
    timestamp_format: String,
}

impl FeatureViewBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: None,
            features: Vec::new(),
            keep_source_fields: false,
            timestamp_field: None,
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
        }
    }

    pub fn source(mut self, source: impl Into<TableRef>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn feature(mut self, feature: impl Into<FeatureRef>) -> Self {
        self.features.push(feature.into());
        self
    }

    pub fn features<I, F>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<FeatureRef>,
    {
        self.features.extend(features.into_iter().map(Into::into));
        self
    }

    pub fn keep_source_fields(mut self, keep: bool) -> Self {
        self.keep_source_fields = keep;
        self
    }

    /// Only used when `timestamp_field` is set; otherwise the source's format wins
    pub fn timestamp_field(mut self, field: impl Into<String>) -> Self {
        self.timestamp_field = Some(field.into());
        self
    }

    pub fn timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = format.into();
        self
    }

    /// Builds the view, resolving it immediately unless it holds name references
    pub fn build(self) -> Result<FeatureView> {
        let source = self.source.ok_or_else(|| {
            Error::invalid_input(format!("Feature view '{}' has no source", self.name))
        })?;
        for feature in self.features.iter().filter_map(FeatureRef::as_feature) {
            feature.transform.check_durations(&feature.name)?;
        }

        let mut view = FeatureView {
            name: self.name,
            source,
            features: self.features,
            keep_source_fields: self.keep_source_fields,
            keys: None,
            timestamp_field: self.timestamp_field,
            timestamp_format: self.timestamp_format,
        };

        if view.is_unresolved() {
            debug!(view = %view.name, "Feature view holds name references, skipping resolution");
        } else {
            view.resolve()?;
        }
        Ok(view)
    }
}

/// Serialized form of a [`FeatureView`]
///
/// Deserializing goes through [`FeatureViewBuilder::build`], so a stored view
/// comes back resolved and validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FeatureViewDef {
    name: String,
    source: TableRef,
    features: Vec<FeatureRef>,
    #[serde(default)]
    keep_source_fields: bool,
    #[serde(default)]
    timestamp_field: Option<String>,
    #[serde(default = "default_timestamp_format")]
    timestamp_format: String,
}

fn default_timestamp_format() -> String {
    DEFAULT_TIMESTAMP_FORMAT.to_string()
}

impl From<FeatureView> for FeatureViewDef {
    fn from(view: FeatureView) -> Self {
        Self {
            name: view.name,
            source: view.source,
            features: view.features,
            keep_source_fields: view.keep_source_fields,
            timestamp_field: view.timestamp_field,
            timestamp_format: view.timestamp_format,
        }
    }
}

impl TryFrom<FeatureViewDef> for FeatureView {
    type Error = Error;

    fn try_from(def: FeatureViewDef) -> Result<Self> {
        let mut builder = FeatureView::builder(def.name)
            .source(def.source)
            .features(def.features)
            .keep_source_fields(def.keep_source_fields)
            .timestamp_format(def.timestamp_format);
        if let Some(field) = def.timestamp_field {
            builder = builder.timestamp_field(field);
        }
        builder.build()
    }
}
