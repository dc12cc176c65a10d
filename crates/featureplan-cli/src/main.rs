//! featureplan CLI - Feature definition and materialization tool
//!
//! Commands:
//! - `register` - Register sources, feature views and sinks from a file
//! - `list` - List registered table descriptors
//! - `show` - Show details (and optionally the execution plan) of a descriptor
//! - `validate` - Check that definitions resolve and can be planned
//! - `delete` - Remove a descriptor from the registry
//! - `materialize` - Compute a feature view and write it into a sink

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod output;

use commands::materialize::MaterializeArgs;
use commands::{delete, list, materialize, register, show, validate};
use output::OutputFormat;

/// featureplan CLI - Feature definition and materialization tool
#[derive(Parser)]
#[command(name = "featureplan")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Define, resolve and materialize feature views", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "FEATUREPLAN_CONFIG")]
    config: Option<String>,

    /// Registry database path (SQLite), overrides the configured registry
    #[arg(long, env = "FEATUREPLAN_REGISTRY")]
    registry: Option<String>,

    /// Output format (table, json, yaml)
    #[arg(short, long, default_value = "table")]
    output: String,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register table descriptors from a YAML or JSON file
    Register {
        /// Path to a descriptor file (one descriptor or a list)
        #[arg(short, long)]
        file: String,

        /// Overwrite descriptors that already exist
        #[arg(long)]
        force: bool,
    },

    /// List registered table descriptors
    List {
        /// Filter by name substring
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Show details of a table descriptor
    Show {
        /// Table name
        name: String,

        /// Also show the execution plan
        #[arg(long)]
        plan: bool,
    },

    /// Validate table descriptors
    Validate {
        /// Table name (or 'all' for every registered descriptor)
        name: String,
    },

    /// Delete a table descriptor
    Delete {
        /// Table name
        name: String,

        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Compute a feature view and write it into a sink
    Materialize {
        /// Feature view name
        #[arg(short, long)]
        name: String,

        /// Path to the sink definition (YAML or JSON)
        #[arg(long)]
        sink_file: String,

        /// Expire materialized values after this many seconds
        #[arg(long)]
        ttl_secs: Option<u64>,

        /// Start time (ISO8601, YYYY-MM-DD or relative: -7d, -24h)
        #[arg(long)]
        start: Option<String>,

        /// End time (ISO8601, YYYY-MM-DD or relative: now, -1h)
        #[arg(long)]
        end: Option<String>,

        /// Replace existing rows in the sink
        #[arg(long)]
        allow_overwrite: bool,

        /// Show the plan without submitting a job
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn,featureplan=info",
        1 => "info,featureplan=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let config = config::load_config(cli.config.as_deref(), cli.registry.as_deref())?;
    let format = OutputFormat::parse(&cli.output);
    tracing::debug!("Loaded configuration: {:?}", config);

    match cli.command {
        Commands::Register { file, force } => {
            register::run(&config, &file, force).await?;
        }

        Commands::List { filter } => {
            list::run(&config, filter.as_deref(), format).await?;
        }

        Commands::Show { name, plan } => {
            show::run(&config, &name, plan, format).await?;
        }

        Commands::Validate { name } => {
            validate::run(&config, &name).await?;
        }

        Commands::Delete { name, yes } => {
            delete::run(&config, &name, yes).await?;
        }

        Commands::Materialize {
            name,
            sink_file,
            ttl_secs,
            start,
            end,
            allow_overwrite,
            dry_run,
        } => {
            let args = MaterializeArgs {
                name: &name,
                sink_file: &sink_file,
                ttl_secs,
                start: start.as_deref(),
                end: end.as_deref(),
                allow_overwrite,
                dry_run,
            };
            materialize::run(&config, args, format).await?;
        }
    }

    Ok(())
}
