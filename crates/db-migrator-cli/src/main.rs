//! db-migrator CLI - Heterogeneous schema and data migration.

use clap::{Parser, Subcommand};
use db_migrator::error::{EXIT_CANCELLED, EXIT_TRANSFER_ERROR};
use db_migrator::{CheckReport, Config, MigrateError, Orchestrator, RunReport, RunStatus};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "db-migrator")]
#[command(about = "Heterogeneous database schema and data migration")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate DDL for the target dialect
    Schema {
        /// Override the script output file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Introspect the source database and write a schema document
    Capture {
        /// Override the schema document path
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Dump source tables to files
    Dump {
        /// Override the dump directory
        #[arg(long)]
        directory: Option<PathBuf>,

        /// Override number of workers
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Load dumped files into the target database
    Load {
        /// Override the dump directory
        #[arg(long)]
        directory: Option<PathBuf>,

        /// Override number of workers
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Validate configuration and show the resolved dialect
    Check,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<u8, MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(MigrateError::Config)?;

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    // Scripts on stdout leave no room for a text summary.
    let mut scripts_to_stdout = false;

    match &cli.command {
        Commands::Schema { output } => {
            if let Some(path) = output {
                config.schema.output = Some(path.clone());
            }
            scripts_to_stdout = config.schema.output.is_none() && config.target.connection.is_none();
        }
        Commands::Capture { output } => {
            if let Some(path) = output {
                config.schema.capture = Some(path.clone());
            }
        }
        Commands::Dump { directory, workers } | Commands::Load { directory, workers } => {
            if let Some(dir) = directory {
                config.transfer.directory = dir.clone();
            }
            if let Some(w) = workers {
                config.transfer.workers = *w;
            }
            config.validate()?;
        }
        Commands::Check => {}
    }

    let orchestrator = Orchestrator::new(config);

    let report = match cli.command {
        Commands::Check => {
            let report = orchestrator.check()?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_check(&report);
            }
            return Ok(0);
        }
        Commands::Capture { .. } => orchestrator.capture().await?,
        Commands::Schema { .. } => orchestrator.schema(setup_signal_handler()).await?,
        Commands::Dump { .. } => orchestrator.dump(setup_signal_handler()).await?,
        Commands::Load { .. } => orchestrator.load(setup_signal_handler()).await?,
    };

    if cli.output_json {
        println!("{}", report.to_json()?);
    } else if scripts_to_stdout {
        eprintln!("{}", summary(&report));
    } else {
        println!("{}", summary(&report));
    }

    Ok(exit_code(&report))
}

/// Errors in the report win over a cancelled status.
fn exit_code(report: &RunReport) -> u8 {
    if report.has_errors() {
        EXIT_TRANSFER_ERROR
    } else if report.status == RunStatus::Cancelled {
        EXIT_CANCELLED
    } else {
        0
    }
}

fn summary(report: &RunReport) -> String {
    let mut lines = vec![
        format!("\n{} {:?}", report.command, report.status),
        format!("  Run ID: {}", report.run_id),
        format!("  Duration: {:.2}s", report.duration_seconds),
    ];
    if report.command == "schema" {
        lines.push(format!("  Statements: {}", report.statements));
    }
    if !report.tables.is_empty() {
        lines.push(format!("  Tables: {}", report.tables.len()));
        lines.push(format!("  Rows: {}", report.rows_transferred));
    }
    for err in &report.errors {
        lines.push(format!("  Error [{}] {}: {}", err.kind, err.unit, err.message));
    }
    lines.join("\n")
}

fn print_check(report: &CheckReport) {
    println!("Configuration OK");
    println!("  Dialect: {} ({})", report.dialect, report.product.product_name);
    if let Some(version) = &report.product.product_version {
        println!("  Version: {}", version);
    }
    println!("  Quoting: {:?}", report.quoting);
    println!("  Format: {}", report.format);
    if let Some(source) = &report.source {
        println!("  Source: {}", source);
    }
    if let Some(target) = &report.target_connection {
        println!("  Target: {}", target);
    }
    println!("  Available dialects: {}", report.available_dialects.join(", "));
    println!("  Available formats: {}", report.available_formats.join(", "));
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("unknown verbosity '{}'", other)),
    };

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

/// Cancel the returned token on SIGINT (Ctrl-C) or SIGTERM.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    for (kind, name) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let token = cancel_token.clone();
        tokio::spawn(async move {
            match signal(kind) {
                Ok(mut stream) => {
                    stream.recv().await;
                    eprintln!("\nReceived {}. Shutting down gracefully...", name);
                    token.cancel();
                }
                Err(e) => eprintln!("Failed to setup {} handler: {}", name, e),
            }
        });
    }

    cancel_token
}

/// Ctrl-C only.
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                eprintln!("\nReceived Ctrl-C. Shutting down gracefully...");
                token.cancel();
            }
            Err(e) => eprintln!("Failed to setup Ctrl-C handler: {}", e),
        }
    });

    cancel_token
}
