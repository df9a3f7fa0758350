//! custos - facilities custody and inspection tracker.
//!
//! Operator CLI over the custos-core engines: key custody transfers,
//! radio sign-out/sign-in, and component inspections against a local
//! document store.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use custos_core::store::SqliteEntityStore;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;
mod config;

use commands::AppContext;
use config::CliConfig;

/// custos - facilities custody and inspection tracker
#[derive(Parser, Debug)]
#[command(name = "custos")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "custos.toml")]
    config: PathBuf,

    /// Path to the document store (overrides config)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Act under this display name (overrides config)
    #[arg(long)]
    as_name: Option<String>,

    /// Act with this role (overrides config)
    #[arg(long)]
    as_role: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Key custody ledger
    #[command(subcommand)]
    Key(commands::key::KeyCommand),

    /// Radio assignments
    #[command(subcommand)]
    Radio(commands::radio::RadioCommand),

    /// Component inspections
    #[command(subcommand)]
    Inspection(commands::inspection::InspectionCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("invalid log level")?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = CliConfig::load(&cli.config)?;
    let user = config.acting_user(cli.as_name.as_deref(), cli.as_role.as_deref())?;

    let db_path = cli.db.unwrap_or_else(|| config.core.db_path.clone());
    let store = SqliteEntityStore::open(&db_path)
        .with_context(|| format!("failed to open store at {}", db_path.display()))?;

    let ctx = AppContext {
        store: Arc::new(store),
        store_timeout: config.core.store_timeout(),
        user,
    };

    match cli.command {
        Commands::Key(command) => command.run(&ctx).await,
        Commands::Radio(command) => command.run(&ctx).await,
        Commands::Inspection(command) => command.run(&ctx).await,
    }
}
