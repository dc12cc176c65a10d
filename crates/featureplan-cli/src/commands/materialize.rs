//! Materialize a feature view into a sink
//!
//! ## How it works:
//! 1. Reads the sink definition from a YAML or JSON file
//! 2. Resolves the table through the registry and plans it
//! 3. Submits the plan to the processor and waits for the job

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use featureplan_core::TableRef;
use featureplan_processor::{MaterializeOptions, Processor, TableOptions};

use crate::config::CliConfig;
use crate::output::{print_info, print_output, print_success, print_warning, OutputFormat};

use super::{create_processor, create_registry, read_sink};

/// Arguments of the `materialize` command
#[derive(Debug, Default)]
pub struct MaterializeArgs<'a> {
    pub name: &'a str,
    pub sink_file: &'a str,
    pub ttl_secs: Option<u64>,
    pub start: Option<&'a str>,
    pub end: Option<&'a str>,
    pub allow_overwrite: bool,
    pub dry_run: bool,
}

pub async fn run(
    config: &CliConfig,
    args: MaterializeArgs<'_>,
    format: OutputFormat,
) -> Result<()> {
    let registry = create_registry(config).await?;
    let processor = create_processor(config, registry);
    let sink = read_sink(args.sink_file)?;

    let options = MaterializeOptions {
        ttl: args.ttl_secs.map(std::time::Duration::from_secs),
        start_datetime: args.start.map(parse_time).transpose()?,
        end_datetime: args.end.map(parse_time).transpose()?,
        allow_overwrite: args.allow_overwrite,
    };
    let features = TableRef::Name(args.name.to_string());

    print_info(&format!(
        "Materializing '{}' into {}",
        args.name,
        sink.describe()
    ));
    if let Some(range) = options.time_range() {
        print_info(&format!(
            "Time range: {} to {}",
            range.start.map_or("-".to_string(), |t| t.to_rfc3339()),
            range.end.map_or("-".to_string(), |t| t.to_rfc3339())
        ));
    }

    if args.dry_run {
        print_warning("Dry run mode - no job will be submitted");
        let plan = processor
            .get_table(
                features,
                TableOptions {
                    start_datetime: options.start_datetime,
                    end_datetime: options.end_datetime,
                },
            )
            .await?;
        for (i, step) in plan.steps.iter().enumerate() {
            println!("  {}. {}", i + 1, step);
        }
        return Ok(());
    }

    let job = processor
        .materialize_features(features, sink, options)
        .await
        .with_context(|| format!("Failed to submit materialization of '{}'", args.name))?;
    let report = job.wait().await?;

    if format == OutputFormat::Table {
        let elapsed = report.finished_at - report.started_at;
        print_success(&format!(
            "Materialized '{}' into {}: {} steps, {} columns in {}ms",
            report.table,
            report.sink,
            report.steps,
            report.output_columns,
            elapsed.num_milliseconds()
        ));
    } else {
        print_output(&report, format)?;
    }

    Ok(())
}

/// Parse time string (ISO8601, YYYY-MM-DD, or relative like -7d, -24h, -30m)
fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();

    if s == "now" {
        return Ok(Utc::now());
    }

    if let Some((split, unit)) = s
        .strip_prefix('-')
        .and_then(|r| r.char_indices().last().filter(|(i, _)| *i > 0))
    {
        let num_str = &s[1..=split];
        let num: i64 = num_str
            .parse()
            .with_context(|| format!("Invalid number in time string: {}", s))?;

        let duration = match unit {
            'd' => Duration::try_days(num),
            'h' => Duration::try_hours(num),
            'm' => Duration::try_minutes(num),
            _ => anyhow::bail!("Unknown time unit: {}. Use 'd', 'h', or 'm'", unit),
        }
        .with_context(|| format!("Time offset out of range: {}", s))?;

        return Utc::now()
            .checked_sub_signed(duration)
            .with_context(|| format!("Time offset out of range: {}", s));
    }

    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::MIN).and_utc())
        })
        .with_context(|| {
            format!(
                "Invalid time format: {}. Use ISO8601, YYYY-MM-DD, or relative (-7d, -24h)",
                s
            )
        })
}
