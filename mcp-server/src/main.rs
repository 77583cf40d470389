mod config;
mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use config::ServerConfig;
use telemetry::{init_telemetry, log_config_validation, log_startup_info};
use tracing::{error, info};

use orchestrator_core::config::ConfigLoader;
use orchestrator_mcp::OrchestratorHandler;
use orchestrator_storage::SqliteRepository;
use rmcp::transport::io::stdio;
use rmcp::ServiceExt;

#[derive(Parser)]
#[command(name = "orchestrator-server")]
#[command(about = "Task-orchestration MCP server over stdio")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Project root directory. Holds `.taskorchestrator/config.yaml`
    /// and, by default, the SQLite database file.
    #[arg(long, env = "PROJECT_ROOT", default_value = ".")]
    project_root: PathBuf,

    /// Server deployment configuration file (not the workflow config).
    #[arg(short, long, env = "CONFIG_FILE")]
    config: Option<String>,

    /// Database URL override (e.g. `sqlite://path/to/file.sqlite` or
    /// `sqlite::memory:`).
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Log level override.
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,
}

fn load_config(cli: &Cli) -> Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(config_file) => {
            info!("Loading configuration from file: {}", config_file);
            ServerConfig::from_file(config_file)?
        }
        None => {
            info!("Loading configuration from environment");
            ServerConfig::from_env()?
        }
    };

    config.working_dir = cli.project_root.clone();

    if let Some(ref database_url) = cli.database_url {
        info!("Overriding database URL from CLI");
        config.database.url = Some(database_url.clone());
    }

    if let Some(ref log_level) = cli.log_level {
        info!("Overriding log level from CLI");
        config.logging.level = log_level.clone();
    }

    Ok(config)
}

fn ensure_database_directory(database_url: &str) -> Result<()> {
    if database_url.contains(":memory:") {
        return Ok(());
    }
    let path = database_url
        .strip_prefix("sqlite://")
        .unwrap_or(database_url);
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {parent:?}"))?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli).context("Failed to load configuration")?;

    init_telemetry(&config.logging).context("Failed to initialize telemetry")?;
    log_config_validation(&config);

    if let Err(e) = config.validate() {
        error!(error = %e, "Configuration validation failed");
        std::process::exit(1);
    }

    log_startup_info(&config);

    let database_url = config.database_url();
    ensure_database_directory(&database_url).context("Failed to create database directory")?;

    let repository = SqliteRepository::new(&database_url)
        .await
        .context("Failed to open database")?;
    repository
        .migrate()
        .await
        .context("Failed to run database migrations")?;
    repository
        .health_check()
        .await
        .context("Database health check failed")?;

    let repos = Arc::new(repository);
    let config_loader = Arc::new(ConfigLoader::new());
    let handler = OrchestratorHandler::new(repos, config_loader, config.working_dir.clone());

    info!("starting orchestrator MCP server on stdio transport");

    let service = handler
        .serve(stdio())
        .await
        .context("Failed to start MCP server")?;
    service
        .waiting()
        .await
        .context("MCP server terminated with an error")?;

    telemetry::log_shutdown_info();
    Ok(())
}
