//! List registered table descriptors

use anyhow::Result;
use comfy_table::Cell;
use featureplan_registry::Registry;
use serde::Serialize;

use crate::config::CliConfig;
use crate::output::{
    create_table, format_keys, format_kind, print_info, print_output, OutputFormat,
};

use super::create_registry;

#[derive(Debug, Serialize)]
struct TableSummary {
    name: String,
    kind: String,
    keys: Option<Vec<String>>,
    timestamp_field: Option<String>,
    bounded: Option<bool>,
    updated_at: String,
}

pub async fn run(config: &CliConfig, filter: Option<&str>, format: OutputFormat) -> Result<()> {
    let registry = create_registry(config).await?;

    let tables = registry.list_features(filter).await?;

    if tables.is_empty() {
        print_info(&format!(
            "No table descriptors found in namespace '{}'",
            registry.namespace()
        ));
        return Ok(());
    }

    let summaries: Vec<TableSummary> = tables
        .iter()
        .map(|t| TableSummary {
            name: t.name.clone(),
            kind: t.descriptor.kind().to_string(),
            keys: t.descriptor.keys().map(<[String]>::to_vec),
            timestamp_field: t.descriptor.timestamp_field().map(str::to_string),
            bounded: t.descriptor.is_bounded().ok(),
            updated_at: t.updated_at.to_rfc3339(),
        })
        .collect();

    match format {
        OutputFormat::Table => {
            let mut table = create_table();
            table.set_header(vec!["Name", "Kind", "Keys", "Timestamp", "Bounded", "Updated"]);

            for summary in &summaries {
                table.add_row(vec![
                    Cell::new(&summary.name),
                    format_kind(&summary.kind),
                    Cell::new(format_keys(summary.keys.as_deref())),
                    Cell::new(summary.timestamp_field.as_deref().unwrap_or("-")),
                    Cell::new(summary.bounded.map_or("-", |b| if b { "yes" } else { "no" })),
                    Cell::new(&summary.updated_at),
                ]);
            }

            println!("{table}");
            println!("\nTotal: {} table descriptor(s)", summaries.len());
        }
        _ => print_output(&summaries, format)?,
    }

    Ok(())
}
