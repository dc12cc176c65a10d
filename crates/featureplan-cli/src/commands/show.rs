//! Show table descriptor details

use anyhow::{Context, Result};
use comfy_table::Cell;
use featureplan_core::{FeatureRef, TableDescriptor, TableRef, Transform};
use featureplan_processor::{ExecutionPlan, Processor, TableOptions};
use featureplan_registry::Registry;

use crate::config::CliConfig;
use crate::output::{create_table, format_dtype, format_keys, print_output, OutputFormat};

use super::{create_processor, create_registry};

pub async fn run(config: &CliConfig, name: &str, plan: bool, format: OutputFormat) -> Result<()> {
    let registry = create_registry(config).await?;

    let table = registry
        .get_features(name)
        .await
        .with_context(|| format!("Failed to load '{}'", name))?;

    let plan = if plan {
        let processor = create_processor(config, registry.clone());
        Some(
            processor
                .get_table(TableRef::Name(name.to_string()), TableOptions::default())
                .await?,
        )
    } else {
        None
    };

    if format != OutputFormat::Table {
        match &plan {
            Some(plan) => print_output(plan, format)?,
            None => print_output(table.as_ref(), format)?,
        }
        return Ok(());
    }

    println!("{}: {}", table.kind(), name);
    println!("{}", "=".repeat(50));
    print_properties(&table);
    if let TableDescriptor::FeatureView(view) = table.as_ref() {
        println!("\nFeatures:");
        let mut features = create_table();
        features.set_header(vec!["Name", "Transform", "DType", "Keys"]);
        for feature in view.features() {
            match feature {
                FeatureRef::Feature(f) => features.add_row(vec![
                    Cell::new(&f.name),
                    Cell::new(describe_transform(&f.transform)),
                    Cell::new(format_dtype(f.dtype.as_ref())),
                    Cell::new(format_keys(f.keys.as_deref())),
                ]),
                FeatureRef::Name(n) => features.add_row(vec![n.as_str(), "(unresolved)", "?", "-"]),
            };
        }
        println!("{features}");
    }
    if let Some(plan) = &plan {
        print_plan(plan);
    }

    Ok(())
}

fn print_properties(table: &TableDescriptor) {
    let mut properties = create_table();
    properties.set_header(vec!["Property", "Value"]);
    properties.add_row(vec!["Keys".to_string(), format_keys(table.keys())]);
    properties.add_row(vec![
        "Timestamp".to_string(),
        table
            .timestamp_field()
            .map(|f| format!("{} ({})", f, table.timestamp_format()))
            .unwrap_or_else(|| "-".to_string()),
    ]);

    match table {
        TableDescriptor::Source(source) => {
            properties.add_row(vec!["System".to_string(), source.system_name.clone()]);
            properties.add_row(vec!["Bounded".to_string(), source.bounded.to_string()]);
            for (key, value) in &source.properties {
                properties.add_row(vec![key.clone(), value.clone()]);
            }
            for field in source.schema.fields() {
                properties.add_row(vec![format!("column {}", field.name), field.dtype.to_string()]);
            }
        }
        TableDescriptor::FeatureView(view) => {
            properties.add_row(vec!["Source".to_string(), view.source().name().to_string()]);
            properties.add_row(vec![
                "Keep source fields".to_string(),
                view.keep_source_fields().to_string(),
            ]);
            if let Ok(bounded) = view.is_bounded() {
                properties.add_row(vec!["Bounded".to_string(), bounded.to_string()]);
            }
        }
        TableDescriptor::Sink(sink) => {
            properties.add_row(vec!["Destination".to_string(), sink.describe()]);
        }
    }
    println!("{properties}");
}

fn describe_transform(transform: &Transform) -> String {
    match transform {
        Transform::Expression(t) => t.expr.clone(),
        Transform::OverWindow(t) => match t.window_size {
            Some(size) => format!("{}({}) over {}s", t.agg_func, t.expr, size.as_secs()),
            None => format!("{}({}) over all rows", t.agg_func, t.expr),
        },
        Transform::SlidingWindow(t) => format!(
            "{}({}) over {}s every {}s",
            t.agg_func,
            t.expr,
            t.window_size.as_secs(),
            t.step_size.as_secs()
        ),
        Transform::Join(t) => format!("join {}.{}", t.table_name, t.feature_name),
    }
}

fn print_plan(plan: &ExecutionPlan) {
    println!("\nExecution plan:");
    let mut steps = create_table();
    steps.set_header(vec!["#", "Step", "Detail"]);
    for (i, step) in plan.steps.iter().enumerate() {
        steps.add_row(vec![
            Cell::new(i + 1),
            Cell::new(step.name()),
            Cell::new(step.to_string()),
        ]);
    }
    println!("{steps}");
}
