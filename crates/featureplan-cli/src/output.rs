//! Output formatting utilities

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use console::style;
use featureplan_core::DataType;
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

impl OutputFormat {
    /// Parse output format from string
    /// Unlike FromStr trait, this never fails - unknown values default to Table
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "yaml" | "yml" => Self::Yaml,
            _ => Self::Table,
        }
    }
}

/// Print data as JSON or YAML; tables are rendered by each command
pub fn print_output<T: Serialize>(data: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(data)?),
        OutputFormat::Json | OutputFormat::Table => {
            println!("{}", serde_json::to_string_pretty(data)?)
        }
    }
    Ok(())
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn print_success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("✗").red().bold(), msg);
}

pub fn print_warning(msg: &str) {
    println!("{} {}", style("⚠").yellow().bold(), msg);
}

pub fn print_info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Table kind with color
pub fn format_kind(kind: &str) -> Cell {
    match kind {
        "source" => Cell::new(kind).fg(Color::Blue),
        "feature_view" => Cell::new(kind).fg(Color::Green),
        "sink" => Cell::new(kind).fg(Color::Yellow),
        _ => Cell::new(kind),
    }
}

/// Key columns; unknown keys and "no keys" are told apart
pub fn format_keys(keys: Option<&[String]>) -> String {
    match keys {
        None => "-".to_string(),
        Some([]) => "(none)".to_string(),
        Some(keys) => keys.join(", "),
    }
}

pub fn format_dtype(dtype: Option<&DataType>) -> String {
    dtype.map_or_else(|| "?".to_string(), DataType::to_string)
}
