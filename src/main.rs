//! Binary entry point for callsnap.
//!
//! This binary provides the CLI for running the snapshot HTTP service.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr/print_stdout in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::Context;
use callsnap::config::ServiceConfig;
use callsnap::http::{self, AppState, DatabaseInfo};
use callsnap::observability;
use callsnap::storage::{InMemorySnapshotStore, PostgresSnapshotStore, SnapshotBackend};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Callsnap - store JSON call snapshots in PostgreSQL.
#[derive(Parser)]
#[command(name = "callsnap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose (debug) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a TOML configuration file (default: `CALLSNAP_CONFIG`).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    Serve {
        /// Address to bind (overrides config).
        #[arg(short, long)]
        bind: Option<SocketAddr>,

        /// Use the in-memory store instead of PostgreSQL.
        #[arg(long)]
        memory: bool,

        /// Exit if the snapshot table cannot be created.
        #[arg(long)]
        require_schema: bool,
    },

    /// Create the snapshot table and exit.
    InitSchema,

    /// Print the effective database settings (password redacted).
    ShowConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // A missing .env file is normal.
    let _ = dotenvy::dotenv();

    let mut config = match ServiceConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };
    if cli.verbose {
        config.logging.filter = "debug".to_string();
    }

    if let Err(e) = observability::init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Command failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
async fn run_command(command: Commands, mut config: ServiceConfig) -> anyhow::Result<()> {
    match command {
        Commands::Serve {
            bind,
            memory,
            require_schema,
        } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            config.server.require_schema |= require_schema;
            cmd_serve(config, memory).await
        },
        Commands::InitSchema => cmd_init_schema(&config).await,
        Commands::ShowConfig => cmd_show_config(&config),
    }
}

async fn cmd_serve(config: ServiceConfig, memory: bool) -> anyhow::Result<()> {
    let _metrics = observability::install_prometheus(&config.metrics)
        .context("failed to install metrics exporter")?;

    if memory {
        tracing::warn!("Using in-memory store; snapshots are lost on exit");
        let store = Arc::new(InMemorySnapshotStore::new());
        return start(store, &config).await;
    }

    let store = Arc::new(
        PostgresSnapshotStore::new(&config.database).context("failed to create snapshot store")?,
    );
    start(store, &config).await
}

/// Initializes the schema once, then serves.
async fn start<B: SnapshotBackend>(store: Arc<B>, config: &ServiceConfig) -> anyhow::Result<()> {
    if let Err(e) = store.initialize().await {
        if config.server.require_schema {
            return Err(e).context("schema initialization failed");
        }
        // Degraded start: requests fail until the table exists.
        tracing::error!(
            error = %e,
            "Schema initialization failed; continuing without a verified table"
        );
    }

    let state = AppState::new(store, &config.database);
    http::serve(config.server.bind, state).await?;
    Ok(())
}

async fn cmd_init_schema(config: &ServiceConfig) -> anyhow::Result<()> {
    let store =
        PostgresSnapshotStore::new(&config.database).context("failed to create snapshot store")?;
    store
        .initialize()
        .await
        .with_context(|| format!("failed to initialize table '{}'", store.table()))?;
    println!("Table '{}' is ready", store.table());
    Ok(())
}

fn cmd_show_config(config: &ServiceConfig) -> anyhow::Result<()> {
    let info = DatabaseInfo::from_settings(&config.database);
    println!("{}", serde_json::to_string_pretty(&info)?);
    println!("bind: {}", config.server.bind);
    println!("require_schema: {}", config.server.require_schema);
    Ok(())
}
