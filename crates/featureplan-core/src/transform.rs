//! Feature transforms
//!
//! A transform describes how a feature's values are derived. The set is closed:
//! every consumer matches [`Transform`] exhaustively.
//!
//! ## Transform Types
//!
//! - **Expression**: row-level expression over the source row
//! - **OverWindow**: aggregation over a per-row window (optionally time/row bounded)
//! - **SlidingWindow**: aggregation over fixed-size windows advancing by a step
//! - **Join**: value of a feature looked up from another table by key

use crate::aggregation::AggFunc;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a feature's values are derived
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Transform {
    #[serde(rename = "ExpressionTransform")]
    Expression(ExpressionTransform),
    #[serde(rename = "OverWindowTransform")]
    OverWindow(OverWindowTransform),
    #[serde(rename = "SlidingWindowTransform")]
    SlidingWindow(SlidingWindowTransform),
    #[serde(rename = "JoinTransform")]
    Join(JoinTransform),
}

impl Transform {
    /// Human-readable transform kind, used in errors and plans
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Expression(_) => "ExpressionTransform",
            Self::OverWindow(_) => "OverWindowTransform",
            Self::SlidingWindow(_) => "SlidingWindowTransform",
            Self::Join(_) => "JoinTransform",
        }
    }

    /// Fails when a window or step duration is not a whole number of seconds
    pub fn check_durations(&self, feature: &str) -> Result<()> {
        let durations = match self {
            Self::OverWindow(t) => vec![("window_size", t.window_size)],
            Self::SlidingWindow(t) => vec![
                ("window_size", Some(t.window_size)),
                ("step_size", Some(t.step_size)),
            ],
            Self::Expression(_) | Self::Join(_) => Vec::new(),
        };
        for (field, duration) in durations {
            if let Some(duration) = duration.filter(|d| d.subsec_nanos() != 0) {
                return Err(Error::invalid_input(format!(
                    "Feature '{}' has {} {:?}; window durations must be whole seconds",
                    feature, field, duration
                )));
            }
        }
        Ok(())
    }

    /// Shorthand for an expression transform
    pub fn expression(expr: impl Into<String>) -> Self {
        Self::Expression(ExpressionTransform { expr: expr.into() })
    }

    /// Shorthand for a join transform
    pub fn join(table_name: impl Into<String>, feature_name: impl Into<String>) -> Self {
        Self::Join(JoinTransform {
            table_name: table_name.into(),
            feature_name: feature_name.into(),
        })
    }
}

impl From<&str> for Transform {
    fn from(expr: &str) -> Self {
        Self::expression(expr)
    }
}

impl From<ExpressionTransform> for Transform {
    fn from(t: ExpressionTransform) -> Self {
        Self::Expression(t)
    }
}

impl From<OverWindowTransform> for Transform {
    fn from(t: OverWindowTransform) -> Self {
        Self::OverWindow(t)
    }
}

impl From<SlidingWindowTransform> for Transform {
    fn from(t: SlidingWindowTransform) -> Self {
        Self::SlidingWindow(t)
    }
}

impl From<JoinTransform> for Transform {
    fn from(t: JoinTransform) -> Self {
        Self::Join(t)
    }
}

/// Row-level expression, e.g. `"amount * 2"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpressionTransform {
    pub expr: String,
}

/// Aggregation over a window that ends at the current row
///
/// With neither `window_size` nor `limit` the window covers all earlier rows of
/// the same group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverWindowTransform {
    /// Expression evaluated per row before aggregation
    pub expr: String,
    pub agg_func: AggFunc,
    #[serde(default)]
    pub group_by_keys: Vec<String>,
    /// Time span of the window; must be whole seconds
    #[serde(default, with = "opt_duration_secs")]
    pub window_size: Option<Duration>,
    /// Maximum number of most recent rows in the window
    #[serde(default)]
    pub limit: Option<u64>,
    /// Only rows satisfying this boolean expression are aggregated
    #[serde(default)]
    pub filter_expr: Option<String>,
}

impl OverWindowTransform {
    pub fn new(expr: impl Into<String>, agg_func: AggFunc) -> Self {
        Self {
            expr: expr.into(),
            agg_func,
            group_by_keys: Vec::new(),
            window_size: None,
            limit: None,
            filter_expr: None,
        }
    }

    pub fn group_by(mut self, keys: &[&str]) -> Self {
        self.group_by_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn window_size(mut self, size: Duration) -> Self {
        self.window_size = Some(size);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn filter(mut self, filter_expr: impl Into<String>) -> Self {
        self.filter_expr = Some(filter_expr.into());
        self
    }
}

/// Aggregation over fixed-size windows that advance by `step_size`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlidingWindowTransform {
    pub expr: String,
    pub agg_func: AggFunc,
    #[serde(default)]
    pub group_by_keys: Vec<String>,
    /// Whole seconds
    #[serde(with = "duration_secs")]
    pub window_size: Duration,
    /// Whole seconds
    #[serde(with = "duration_secs")]
    pub step_size: Duration,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub filter_expr: Option<String>,
}

impl SlidingWindowTransform {
    pub fn new(
        expr: impl Into<String>,
        agg_func: AggFunc,
        window_size: Duration,
        step_size: Duration,
    ) -> Self {
        Self {
            expr: expr.into(),
            agg_func,
            group_by_keys: Vec::new(),
            window_size,
            step_size,
            limit: None,
            filter_expr: None,
        }
    }

    pub fn group_by(mut self, keys: &[&str]) -> Self {
        self.group_by_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn filter(mut self, filter_expr: impl Into<String>) -> Self {
        self.filter_expr = Some(filter_expr.into());
        self
    }
}

/// Value of `feature_name` looked up from the table registered as `table_name`
///
/// Join results cannot be typed from the joining view alone, so join features
/// must carry an explicit dtype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinTransform {
    pub table_name: String,
    pub feature_name: String,
}

/// Seconds of `value`, refusing to drop a fractional part
fn whole_secs<E: serde::ser::Error>(value: &Duration) -> std::result::Result<u64, E> {
    if value.subsec_nanos() != 0 {
        return Err(E::custom(format!(
            "duration {:?} is not a whole number of seconds",
            value
        )));
    }
    Ok(value.as_secs())
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(super::whole_secs::<S::Error>(value)?)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

mod opt_duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => {
                serializer.serialize_some(&super::whole_secs::<S::Error>(duration)?)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
    }
}
