//! Handles to submitted materialization jobs

use crate::engine::JobReport;
use featureplan_core::{Error, Result};
use tokio::task::JoinHandle;

/// A materialization job running on the tokio runtime
#[derive(Debug)]
pub struct ProcessorJob {
    table: String,
    handle: JoinHandle<Result<JobReport>>,
}

impl ProcessorJob {
    pub(crate) fn new(table: impl Into<String>, handle: JoinHandle<Result<JobReport>>) -> Self {
        Self {
            table: table.into(),
            handle,
        }
    }

    /// Name of the table being materialized
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the job and returns its report
    ///
    /// A panicked or cancelled task is reported as an internal error.
    pub async fn wait(self) -> Result<JobReport> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(Error::internal(format!(
                "Materialization job for '{}' did not complete: {}",
                self.table, e
            ))),
        }
    }
}
