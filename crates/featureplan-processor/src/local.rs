//! In-process processor
//!
//! Resolves definitions through a [`Registry`], plans them, and runs the plans
//! on an [`Engine`] inside the current tokio runtime.

use crate::engine::{Engine, LoggingEngine};
use crate::job::ProcessorJob;
use crate::plan::{join_dependencies, ExecutionPlan, TimeRange};
use crate::{MaterializeOptions, Processor, ProcessorConfig, TableOptions};
use async_trait::async_trait;
use featureplan_core::{Error, Result, Sink, TableDescriptor, TableRef};
use featureplan_registry::Registry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Processor running jobs on the local tokio runtime
pub struct LocalProcessor {
    registry: Arc<dyn Registry>,
    engine: Arc<dyn Engine>,
    config: ProcessorConfig,
    semaphore: Arc<Semaphore>,
}

impl LocalProcessor {
    /// Processor with the [`LoggingEngine`]
    pub fn new(registry: Arc<dyn Registry>, config: ProcessorConfig) -> Self {
        Self::with_engine(registry, Arc::new(LoggingEngine), config)
    }

    pub fn with_engine(
        registry: Arc<dyn Registry>,
        engine: Arc<dyn Engine>,
        config: ProcessorConfig,
    ) -> Self {
        let permits = config.max_concurrent_jobs.max(1);
        info!("Local processor allows {} concurrent jobs", permits);
        Self {
            registry,
            engine,
            config,
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Number of jobs that could start right now
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    fn check_time_range(&self, range: Option<TimeRange>) -> Result<()> {
        let Some(range) = range else {
            return Ok(());
        };
        if !self.config.supports_time_range {
            return Err(Error::not_supported(
                "This processor does not support filtering by start or end datetime",
            ));
        }
        if let (Some(start), Some(end)) = (range.start, range.end) {
            if start > end {
                return Err(Error::invalid_input(format!(
                    "Start datetime {} is after end datetime {}",
                    start, end
                )));
            }
        }
        Ok(())
    }

    /// Concrete, resolved table for a reference
    async fn resolve_table(&self, features: TableRef) -> Result<Arc<TableDescriptor>> {
        let table = match features {
            TableRef::Name(name) => self.registry.get_features(&name).await?,
            TableRef::Table(table) => table,
        };
        if !table.is_unresolved() {
            return Ok(table);
        }

        debug!("Building unresolved table '{}'", table.name());
        self.registry
            .build_features(vec![table], false)
            .await?
            .pop()
            .ok_or_else(|| Error::internal("Registry built no table"))
    }

    /// Every table joined anywhere below `table`, including joins of joined
    /// tables
    async fn join_tables(
        &self,
        table: &TableDescriptor,
    ) -> Result<HashMap<String, Arc<TableDescriptor>>> {
        let mut tables = HashMap::new();
        let mut pending = join_dependencies(table)?;
        while let Some(name) = pending.pop() {
            if tables.contains_key(&name) {
                continue;
            }
            let joined = self.resolve_table(TableRef::Name(name.clone())).await?;
            pending.extend(join_dependencies(&joined)?);
            tables.insert(name, joined);
        }
        Ok(tables)
    }

    async fn plan(&self, features: TableRef, range: Option<TimeRange>) -> Result<ExecutionPlan> {
        let table = self.resolve_table(features).await?;
        let join_tables = self.join_tables(&table).await?;
        let plan = ExecutionPlan::build(&table, &join_tables, range)?;
        debug!(
            "Planned '{}' in {} steps with {} output columns",
            plan.table,
            plan.steps.len(),
            plan.output_columns.len()
        );
        Ok(plan)
    }
}

#[async_trait]
impl Processor for LocalProcessor {
    async fn get_table(&self, features: TableRef, options: TableOptions) -> Result<ExecutionPlan> {
        let range = options.time_range();
        self.check_time_range(range)?;
        self.plan(features, range).await
    }

    async fn materialize_features(
        &self,
        features: TableRef,
        sink: Sink,
        options: MaterializeOptions,
    ) -> Result<ProcessorJob> {
        if options.ttl.is_some() && !self.config.supports_ttl {
            return Err(Error::not_supported(
                "This processor does not support ttl on materialized features",
            ));
        }
        let range = options.time_range();
        self.check_time_range(range)?;

        let plan = self.plan(features, range).await?;
        if plan.keys.is_none() {
            warn!(
                "Keys of '{}' are unknown; {} cannot upsert by key",
                plan.table,
                sink.describe()
            );
        }

        info!("Submitting materialization of '{}' into {}", plan.table, sink.describe());
        let table = plan.table.clone();
        let engine = Arc::clone(&self.engine);
        let semaphore = Arc::clone(&self.semaphore);
        let handle = tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| Error::internal(format!("Job limiter closed: {}", e)))?;
            engine.execute(&plan, &sink, &options).await
        });

        Ok(ProcessorJob::new(table, handle))
    }
}
