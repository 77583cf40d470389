//! Server deployment configuration.
//!
//! Deliberately thin: it carries no workflow semantics (those live in
//! `orchestrator_core::config::WorkflowConfig`, loaded separately per
//! request from `.taskorchestrator/config.yaml`). This config only
//! answers "where is the project root", "where is the database", and
//! "how loud should logging be".

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Project root the orchestrator operates on. Holds
    /// `.taskorchestrator/config.yaml` and, by default, the SQLite file.
    pub working_dir: PathBuf,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    /// Optional database URL. If not provided, defaults to a SQLite
    /// file under `working_dir/.taskorchestrator/`.
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (pretty, json, compact)
    pub format: LogFormat,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}

impl ServerConfig {
    /// Load configuration from environment variables, with built-in
    /// defaults as the base layer.
    pub fn from_env() -> Result<Self> {
        let builder = ConfigBuilder::builder()
            .set_default("working_dir", ".")?
            .set_default("database.url", None::<String>)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(
                Environment::with_prefix("ORCHESTRATOR")
                    .separator("_")
                    .try_parsing(true),
            );

        let config = builder.build().context("Failed to build configuration")?;
        let mut result: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        Self::apply_standard_env_vars(&mut result);
        Ok(result)
    }

    /// Load configuration from a specific file path, layered over the
    /// same defaults as [`from_env`](Self::from_env).
    pub fn from_file(path: &str) -> Result<Self> {
        let builder = ConfigBuilder::builder()
            .set_default("working_dir", ".")?
            .set_default("database.url", None::<String>)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name(path).format(FileFormat::Toml))
            .add_source(
                Environment::with_prefix("ORCHESTRATOR")
                    .separator("_")
                    .try_parsing(true),
            );

        let config = builder
            .build()
            .context("Failed to build configuration from file")?;
        let mut result: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration from file")?;
        Self::apply_standard_env_vars(&mut result);
        Ok(result)
    }

    /// Apply standard environment variables (DATABASE_URL, LOG_LEVEL),
    /// for compatibility with common deployment patterns.
    fn apply_standard_env_vars(config: &mut Self) {
        if let Ok(database_url) = env::var("DATABASE_URL") {
            config.database.url = Some(database_url);
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.logging.level = log_level;
        }
    }

    /// The database URL, falling back to a SQLite file under
    /// `working_dir/.taskorchestrator/orchestrator.sqlite`.
    pub fn database_url(&self) -> String {
        match &self.database.url {
            Some(url) => url.clone(),
            None => format!(
                "sqlite://{}",
                self.working_dir
                    .join(".taskorchestrator")
                    .join("orchestrator.sqlite")
                    .display()
            ),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(anyhow::anyhow!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                ));
            }
        }

        if !self.working_dir.exists() {
            return Err(anyhow::anyhow!(
                "Project root directory does not exist: {}",
                self.working_dir.display()
            ));
        }

        if !self.working_dir.is_dir() {
            return Err(anyhow::anyhow!(
                "Project root is not a directory: {}",
                self.working_dir.display()
            ));
        }

        let database_url = self.database_url();
        if !database_url.contains(":memory:") && !database_url.starts_with("sqlite://") {
            return Err(anyhow::anyhow!(
                "Only SQLite databases are supported. URL must start with 'sqlite://' or be ':memory:'. Got: {}",
                database_url
            ));
        }

        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            database: DatabaseConfig { url: None },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Pretty,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.logging.level, "info");
        assert!(config.database.url.is_none());
    }

    #[test]
    fn test_database_url_with_default() {
        let config = ServerConfig::default();
        let url = config.database_url();
        assert!(url.starts_with("sqlite://"));
        assert!(url.contains("orchestrator.sqlite"));
    }

    #[test]
    fn test_database_url_with_custom() {
        let mut config = ServerConfig::default();
        config.database.url = Some("sqlite://custom.db".to_string());
        assert_eq!(config.database_url(), "sqlite://custom.db");
    }

    #[test]
    fn test_config_validation_rejects_bad_log_level() {
        let mut config = ServerConfig::default();
        config.working_dir = std::env::temp_dir();
        assert!(config.validate().is_ok());

        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_rejects_missing_working_dir() {
        let mut config = ServerConfig::default();
        config.working_dir = PathBuf::from("/nonexistent/orchestrator-test-path");
        assert!(config.validate().is_err());
    }
}
