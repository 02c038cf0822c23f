use std::path::Path;

use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub archive: ArchiveConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

/// Filesystem layout and export settings
///
/// The archive root and export directory are explicit values injected into
/// the message store and services at construction; nothing reads them from
/// ambient global state at call time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Root of the per-list archive tree
    pub root_dir: String,
    /// Directory receiving the membership export file
    pub export_dir: String,
    /// Directory backing the list-info cache
    pub cache_dir: String,
    /// Command invoked with the export path after each membership export
    pub notify_command: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<String>,
    pub format: String, // "json" or "text"
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            archive: ArchiveConfig {
                root_dir: "./archive".to_string(),
                export_dir: "./export".to_string(),
                cache_dir: "./data/list_cache".to_string(),
                notify_command: None,
            },
            database: DatabaseConfig {
                path: "data/archive.db".to_string(),
                max_connections: 10,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                format: "text".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources with precedence:
    /// struct defaults, then optional config files, then `ARCHIVE_*`
    /// environment variables.
    pub fn load() -> Result<Self> {
        let defaults = AppConfig::default();
        let config = Config::builder()
            .set_default("archive.root_dir", defaults.archive.root_dir)?
            .set_default("archive.export_dir", defaults.archive.export_dir)?
            .set_default("archive.cache_dir", defaults.archive.cache_dir)?
            .set_default("archive.notify_command", None::<String>)?
            .set_default("database.path", defaults.database.path)?
            .set_default(
                "database.max_connections",
                u64::from(defaults.database.max_connections),
            )?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.file_path", None::<String>)?
            .set_default("logging.format", defaults.logging.format)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::with_prefix("ARCHIVE").separator("__"))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        let app_config: AppConfig = config
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("Failed to deserialize configuration: {}", e))?;

        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.archive.root_dir.trim().is_empty() {
            return Err(anyhow::anyhow!("archive.root_dir must not be empty"));
        }
        if self.archive.export_dir.trim().is_empty() {
            return Err(anyhow::anyhow!("archive.export_dir must not be empty"));
        }
        if self.database.path.trim().is_empty() {
            return Err(anyhow::anyhow!("database.path must not be empty"));
        }
        if self.database.max_connections == 0 {
            return Err(anyhow::anyhow!("max_connections must be greater than 0"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            ));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format,
                valid_formats
            ));
        }

        Ok(())
    }

    /// Get database path from environment or config
    pub fn get_database_path(&self) -> String {
        std::env::var("DATABASE_PATH").unwrap_or_else(|_| self.database.path.clone())
    }

    /// Get archive root from environment or config
    pub fn get_archive_root(&self) -> String {
        std::env::var("ARCHIVE_ROOT").unwrap_or_else(|_| self.archive.root_dir.clone())
    }

    /// Get log level from environment or config
    pub fn get_log_level(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.logging.level.clone())
    }

    /// Get log file path from config, if set
    pub fn get_log_file(&self) -> Option<&Path> {
        self.logging.file_path.as_deref().map(Path::new)
    }
}
