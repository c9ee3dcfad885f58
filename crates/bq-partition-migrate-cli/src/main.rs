//! bq-partition-migrate CLI - migrate BigQuery tables to partitioned, clustered tables.

mod output;

use bq_partition_migrate::{BigQueryWarehouse, Config, MigrateError, RunMode, Runner};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "bq-partition-migrate")]
#[command(about = "Migrate BigQuery tables to date-partitioned, clustered tables")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml", global = true)]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long, global = true)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text", global = true)]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info", global = true)]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate tables (dry run unless --execute is given)
    Run {
        /// Issue the migration statements instead of printing them
        #[arg(long)]
        execute: bool,

        /// Confirm execute mode without prompting
        #[arg(short, long)]
        yes: bool,

        /// Table to migrate (repeatable). Default: every table in the dataset
        #[arg(long = "table", value_name = "TABLE")]
        tables: Vec<String>,
    },

    /// Inspect tables and show the migration plan without changing anything
    Plan {
        /// Table to inspect (repeatable). Default: every table in the dataset
        #[arg(long = "table", value_name = "TABLE")]
        tables: Vec<String>,
    },

    /// Test warehouse connectivity and dataset access
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    // Refuse unconfirmed execution before touching config or the warehouse
    if let Commands::Run {
        execute: true,
        yes: false,
        ..
    } = cli.command
    {
        return Err(MigrateError::Confirmation);
    }

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    // Setup signal handling for graceful shutdown (SIGINT and SIGTERM)
    let cancel_token = setup_signal_handler()?;

    let warehouse = BigQueryWarehouse::connect(&config.warehouse).await?;

    match cli.command {
        Commands::Run { execute, tables, .. } => {
            let mode = if execute {
                RunMode::Execute
            } else {
                RunMode::DryRun
            };
            let runner = Runner::new(config, Arc::new(warehouse), mode).with_cancel(cancel_token);
            let report = runner.run(&tables).await?;

            if cli.output_json {
                println!("{}", report.to_json()?);
            } else {
                output::print_report(&report);
            }

            output::report_status(&report)?;
        }

        Commands::Plan { tables } => {
            let runner = Runner::new(config, Arc::new(warehouse), RunMode::DryRun)
                .with_cancel(cancel_token);
            let report = runner.plan(&tables).await?;

            if cli.output_json {
                println!("{}", report.to_json()?);
            } else {
                output::print_report(&report);
            }

            output::report_status(&report)?;
        }

        Commands::HealthCheck => {
            let runner = Runner::new(config, Arc::new(warehouse), RunMode::DryRun);
            let result = runner.health_check().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                output::print_health(&result);
            }

            if !result.healthy {
                return Err(MigrateError::warehouse(
                    "health-check",
                    format!("{}.{}", result.project, result.dataset),
                    result.error.unwrap_or_else(|| "unhealthy".to_string()),
                ));
            }
        }
    }

    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("unknown verbosity '{}'", other)),
    };

    // Logs go to stderr so --output-json stays parseable
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("unknown log format '{}'", other)),
    }

    Ok(())
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM.
/// Returns a CancellationToken that will be cancelled when a signal is received.
#[cfg(unix)]
fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token = cancel_token.clone();
    tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        };
        eprintln!(
            "\nReceived {}. Stopping after the current step (a started swap is completed)...",
            name
        );
        token.cancel();
    });

    Ok(cancel_token)
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Stopping after the current step...");
            token.cancel();
        }
    });

    Ok(cancel_token)
}
