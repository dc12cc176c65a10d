//! Validate registered table descriptors

use anyhow::{Context, Result};
use featureplan_core::{TableDescriptor, TableRef};
use featureplan_processor::{Processor, TableOptions};
use featureplan_registry::Registry;
use std::sync::Arc;

use crate::config::CliConfig;
use crate::output::{print_error, print_info, print_success, print_warning};

use super::{create_processor, create_registry};

#[derive(Debug, Default)]
struct Summary {
    total: usize,
    passed: usize,
    failed: usize,
    warnings: usize,
}

impl Summary {
    fn check<T>(&mut self, label: &str, result: featureplan_core::Result<T>) -> Option<T> {
        self.total += 1;
        match result {
            Ok(value) => {
                print_success(label);
                self.passed += 1;
                Some(value)
            }
            Err(e) => {
                print_error(&format!("{}: {}", label, e));
                self.failed += 1;
                None
            }
        }
    }

    fn warn(&mut self, msg: &str) {
        print_warning(msg);
        self.warnings += 1;
    }
}

/// Validates `name`, or every registered descriptor when `name` is `all`
pub async fn run(config: &CliConfig, name: &str) -> Result<()> {
    let registry = create_registry(config).await?;
    let processor = create_processor(config, registry.clone());

    let tables: Vec<Arc<TableDescriptor>> = if name == "all" {
        registry
            .list_features(None)
            .await?
            .into_iter()
            .map(|t| t.descriptor)
            .collect()
    } else {
        vec![registry
            .get_features(name)
            .await
            .with_context(|| format!("Failed to load '{}'", name))?]
    };

    if tables.is_empty() {
        print_warning("No table descriptors found to validate");
        return Ok(());
    }

    print_info(&format!("Validating {} table descriptor(s)...", tables.len()));
    println!();

    let mut summary = Summary::default();
    for table in tables {
        println!("{}: {}", table.kind(), table.name());
        println!("{}", "-".repeat(50));

        if table.is_unresolved() {
            summary.total += 1;
            summary.failed += 1;
            print_error("Definition still refers to tables or features by name");
            println!();
            continue;
        }
        if let Some(sink) = table.as_sink() {
            print_success(&format!("Sink writes to {}", sink.describe()));
            println!();
            continue;
        }

        summary.check("Output features typed", table.get_output_features());
        if table.keys().is_none() {
            summary.warn("Keys are unknown; sinks cannot upsert by key");
        }
        if table.timestamp_field().is_none() {
            summary.warn("No timestamp field; time range filters are unavailable");
        }
        let plan = processor
            .get_table(TableRef::Table(Arc::clone(&table)), TableOptions::default())
            .await;
        if let Some(plan) = summary.check("Execution plan built", plan) {
            print_info(&format!(
                "{} steps, {} output columns",
                plan.steps.len(),
                plan.output_columns.len()
            ));
        }
        println!();
    }

    println!("{}", "=".repeat(50));
    println!("Validation Summary:");
    println!("  Total checks: {}", summary.total);
    println!("  Passed: {}", summary.passed);
    println!("  Failed: {}", summary.failed);
    println!("  Warnings: {}", summary.warnings);

    if summary.failed > 0 {
        anyhow::bail!("{} validation check(s) failed", summary.failed);
    } else if summary.warnings > 0 {
        print_warning(&format!(
            "All checks passed with {} warning(s)",
            summary.warnings
        ));
    } else {
        print_success("All validation checks passed!");
    }

    Ok(())
}
