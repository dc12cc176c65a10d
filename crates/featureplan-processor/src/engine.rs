//! Execution engines
//!
//! An [`Engine`] runs an [`ExecutionPlan`] against real systems. The
//! processor owns planning, option checks and concurrency; engines only
//! execute.

use crate::plan::{ExecutionPlan, PlanStep};
use crate::MaterializeOptions;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use featureplan_core::{Result, Sink};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Outcome of one materialization job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub table: String,
    /// Human-readable sink location, see [`Sink::describe`]
    pub sink: String,
    pub steps: usize,
    pub output_columns: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Runs execution plans
///
/// Implementations must be thread-safe (Send + Sync); the processor calls
/// `execute` from spawned tasks.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Computes `plan` and writes its output columns into `sink`
    ///
    /// # Errors
    ///
    /// Any failure of the underlying systems. The processor reports it
    /// through [`crate::ProcessorJob::wait`].
    async fn execute(
        &self,
        plan: &ExecutionPlan,
        sink: &Sink,
        options: &MaterializeOptions,
    ) -> Result<JobReport>;
}

/// Engine that only traces the steps it is given
///
/// Useful for dry runs and for checking what a definition would compute.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEngine;

#[async_trait]
impl Engine for LoggingEngine {
    async fn execute(
        &self,
        plan: &ExecutionPlan,
        sink: &Sink,
        options: &MaterializeOptions,
    ) -> Result<JobReport> {
        let started_at = Utc::now();
        let destination = sink.describe();
        info!(
            "Materializing '{}' into {} ({} steps)",
            plan.table,
            destination,
            plan.steps.len()
        );

        for (i, step) in plan.steps.iter().enumerate() {
            match step {
                PlanStep::Scan { properties, .. } => {
                    info!("[{}/{}] {}", i + 1, plan.steps.len(), step);
                    debug!("Scan properties: {:?}", properties);
                }
                _ => info!("[{}/{}] {}", i + 1, plan.steps.len(), step),
            }
        }

        let write_mode = if options.allow_overwrite {
            "overwrite"
        } else {
            "append"
        };
        info!(
            "Writing {} columns to {} ({}, ttl: {:?})",
            plan.output_columns.len(),
            destination,
            write_mode,
            options.ttl
        );

        Ok(JobReport {
            table: plan.table.clone(),
            sink: destination,
            steps: plan.steps.len(),
            output_columns: plan.output_columns.len(),
            started_at,
            finished_at: Utc::now(),
        })
    }
}
