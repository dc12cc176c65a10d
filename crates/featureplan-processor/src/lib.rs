//! Processor for featureplan
//!
//! A processor turns resolved table descriptors into an [`ExecutionPlan`] and
//! hands the plan to an [`Engine`] to materialize it into a sink.
//!
//! ## Architecture
//!
//! ```text
//! TableRef ──► Registry (resolve names) ──► ExecutionPlan ──► Engine ──► Sink
//!                                               │
//!                                     scan / derive / window /
//!                                     join / time range / project
//! ```
//!
//! Materialization runs on the tokio runtime; at most
//! [`ProcessorConfig::max_concurrent_jobs`] jobs execute at once and each
//! submission returns a [`ProcessorJob`] handle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use featureplan_core::{Result, Sink, TableRef};
use serde::{Deserialize, Serialize};
use std::time::Duration;

mod engine;
mod job;
mod local;
mod plan;

pub use engine::{Engine, JobReport, LoggingEngine};
pub use job::ProcessorJob;
pub use local::LocalProcessor;
pub use plan::{DerivedColumn, ExecutionPlan, PlanStep, TimeRange, WindowKind};

/// Options for [`Processor::get_table`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableOptions {
    /// Only rows at or after this instant
    pub start_datetime: Option<DateTime<Utc>>,
    /// Only rows before this instant
    pub end_datetime: Option<DateTime<Utc>>,
}

/// Options for [`Processor::materialize_features`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializeOptions {
    /// How long materialized values stay valid in the sink
    #[serde(default)]
    pub ttl: Option<Duration>,
    #[serde(default)]
    pub start_datetime: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_datetime: Option<DateTime<Utc>>,
    /// Replace existing rows in the sink instead of failing on conflicts
    #[serde(default)]
    pub allow_overwrite: bool,
}

impl MaterializeOptions {
    pub fn time_range(&self) -> Option<TimeRange> {
        TimeRange::new(self.start_datetime, self.end_datetime)
    }
}

impl TableOptions {
    pub fn time_range(&self) -> Option<TimeRange> {
        TimeRange::new(self.start_datetime, self.end_datetime)
    }
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_supports_time_range() -> bool {
    true
}

/// Processor configuration
///
/// ```yaml
/// max_concurrent_jobs: 8
/// supports_ttl: false
/// supports_time_range: true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Maximum number of materialization jobs running at once
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Whether the engine can expire materialized values
    #[serde(default)]
    pub supports_ttl: bool,

    /// Whether the engine can filter rows by event time
    #[serde(default = "default_supports_time_range")]
    pub supports_time_range: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            supports_ttl: false,
            supports_time_range: default_supports_time_range(),
        }
    }
}

/// Computes feature tables and writes them to sinks
///
/// Implementations must be thread-safe (Send + Sync) so one processor can be
/// shared across tasks.
///
/// # Example
///
/// ```rust,ignore
/// let processor = LocalProcessor::new(registry, ProcessorConfig::default());
///
/// // Plan only
/// let plan = processor
///     .get_table("user_features".into(), TableOptions::default())
///     .await?;
///
/// // Plan and run
/// let job = processor
///     .materialize_features("user_features".into(), sink, MaterializeOptions::default())
///     .await?;
/// let report = job.wait().await?;
/// ```
#[async_trait]
pub trait Processor: Send + Sync {
    /// Plans the computation of a table
    ///
    /// # Errors
    ///
    /// - `TableNotFound` if a referenced name is not registered
    /// - `NotSupported` if the options ask for something this processor
    ///   cannot do
    /// - `InvalidInput` if `features` is a sink, or a time range is requested
    ///   on a table without a timestamp field
    async fn get_table(&self, features: TableRef, options: TableOptions) -> Result<ExecutionPlan>;

    /// Plans a table and starts writing it into `sink`
    ///
    /// Returns as soon as the job is submitted; await [`ProcessorJob::wait`]
    /// for the outcome.
    async fn materialize_features(
        &self,
        features: TableRef,
        sink: Sink,
        options: MaterializeOptions,
    ) -> Result<ProcessorJob>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processor_config_defaults() {
        let config: ProcessorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ProcessorConfig::default());
        assert_eq!(config.max_concurrent_jobs, 4);
        assert!(!config.supports_ttl);
        assert!(config.supports_time_range);
    }

    #[test]
    fn test_options_time_range() {
        assert!(TableOptions::default().time_range().is_none());

        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let options = MaterializeOptions {
            start_datetime: Some(start),
            ..Default::default()
        };
        let range = options.time_range().unwrap();
        assert_eq!(range.start, Some(start));
        assert_eq!(range.end, None);
    }
}
