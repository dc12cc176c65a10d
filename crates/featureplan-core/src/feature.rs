//! Feature definitions
//!
//! A [`Feature`] is a named derivation rule. Its `keys` and `dtype` may be left
//! unset by the author; a feature view fills both in when it resolves.

use crate::transform::Transform;
use crate::types::DataType;
use serde::{Deserialize, Serialize};

/// A named, typed column derived through a [`Transform`]
///
/// # Examples
///
/// ```
/// use featureplan_core::{DataType, Feature};
///
/// let feature = Feature::expression("amount_x2", "amount * 2")
///     .with_keys(&["user_id"])
///     .with_dtype(DataType::Int64);
/// assert_eq!(feature.keys.as_deref(), Some(&["user_id".to_string()][..]));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub transform: Transform,
    /// Join/grouping keys; `None` until inherited from the owning view
    #[serde(default)]
    pub keys: Option<Vec<String>>,
    /// Result type; `None` until derived by the owning view
    #[serde(default)]
    pub dtype: Option<DataType>,
}

impl Feature {
    pub fn new(name: impl Into<String>, transform: impl Into<Transform>) -> Self {
        Self {
            name: name.into(),
            transform: transform.into(),
            keys: None,
            dtype: None,
        }
    }

    /// Feature computed by a row-level expression
    pub fn expression(name: impl Into<String>, expr: impl Into<String>) -> Self {
        Self::new(name, Transform::expression(expr))
    }

    pub fn with_keys(mut self, keys: &[&str]) -> Self {
        self.keys = Some(keys.iter().map(|k| k.to_string()).collect());
        self
    }

    pub fn with_dtype(mut self, dtype: DataType) -> Self {
        self.dtype = Some(dtype);
        self
    }

    /// True when the feature passes a same-named source column through unchanged
    pub fn is_pass_through(&self) -> bool {
        matches!(&self.transform, Transform::Expression(t) if t.expr.trim() == self.name)
    }
}
