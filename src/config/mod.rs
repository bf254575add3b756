mod file_config;

pub use file_config::{FileConfig, TodosConfig};

use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LoggingLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LoggingLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LoggingLevel::Error => "error",
            LoggingLevel::Warn => "warn",
            LoggingLevel::Info => "info",
            LoggingLevel::Debug => "debug",
            LoggingLevel::Trace => "trace",
        }
    }
}

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub logging_level: LoggingLevel,
}

/// Behaviour switches of the to-do engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoSettings {
    pub assign_author_on_create: bool,
    pub ignore_code_blocks: bool,
}

impl Default for TodoSettings {
    fn default() -> Self {
        Self {
            assign_author_on_create: false,
            ignore_code_blocks: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub logging_level: LoggingLevel,
    pub todos: TodoSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_path must be specified via --db-path or in config file")
            })?;

        if db_path.is_dir() {
            bail!("db_path is a directory: {:?}", db_path);
        }
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                bail!("Database directory does not exist: {:?}", parent);
            }
        }

        let logging_level = match file.logging_level {
            Some(level) => parse_logging_level(&level)
                .ok_or_else(|| anyhow::anyhow!("Unknown logging level '{}'", level))?,
            None => cli.logging_level,
        };

        let todos_file = file.todos.unwrap_or_default();
        let defaults = TodoSettings::default();
        let todos = TodoSettings {
            assign_author_on_create: todos_file
                .assign_author_on_create
                .unwrap_or(defaults.assign_author_on_create),
            ignore_code_blocks: todos_file
                .ignore_code_blocks
                .unwrap_or(defaults.ignore_code_blocks),
        };

        Ok(Self {
            db_path,
            logging_level,
            todos,
        })
    }
}

/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<LoggingLevel> {
    LoggingLevel::from_str(s, true).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_logging_level() {
        assert_eq!(parse_logging_level("warn"), Some(LoggingLevel::Warn));
        // Case insensitive
        assert_eq!(parse_logging_level("DEBUG"), Some(LoggingLevel::Debug));
        assert!(parse_logging_level("verbose").is_none());
    }

    #[test]
    fn test_resolve_cli_only() {
        let temp_dir = TempDir::new().unwrap();
        let cli = CliConfig {
            db_path: Some(temp_dir.path().join("todos.db")),
            logging_level: LoggingLevel::Debug,
        };

        let config = AppConfig::resolve(&cli, None).unwrap();

        assert_eq!(config.db_path, temp_dir.path().join("todos.db"));
        assert_eq!(config.logging_level, LoggingLevel::Debug);
        assert_eq!(config.todos, TodoSettings::default());
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let temp_dir = TempDir::new().unwrap();
        let cli = CliConfig {
            db_path: Some(PathBuf::from("/should/be/overridden.db")),
            logging_level: LoggingLevel::Warn,
        };
        let file_config = FileConfig {
            db_path: Some(temp_dir.path().join("file.db").to_string_lossy().to_string()),
            logging_level: Some("trace".to_string()),
            todos: Some(TodosConfig {
                assign_author_on_create: Some(true),
                ignore_code_blocks: None,
            }),
        };

        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();

        assert_eq!(config.db_path, temp_dir.path().join("file.db"));
        assert_eq!(config.logging_level, LoggingLevel::Trace);
        assert!(config.todos.assign_author_on_create);
        // Default kept when TOML doesn't specify
        assert!(config.todos.ignore_code_blocks);
    }

    #[test]
    fn test_resolve_missing_db_path_error() {
        let result = AppConfig::resolve(&CliConfig::default(), None);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("db_path must be specified"));
    }

    #[test]
    fn test_resolve_missing_parent_dir_error() {
        let cli = CliConfig {
            db_path: Some(PathBuf::from("/nonexistent/path/that/should/not/exist/todos.db")),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[test]
    fn test_resolve_directory_as_db_path_error() {
        let temp_dir = TempDir::new().unwrap();
        let cli = CliConfig {
            db_path: Some(temp_dir.path().to_path_buf()),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.unwrap_err().to_string().contains("is a directory"));
    }

    #[test]
    fn test_resolve_rejects_unknown_logging_level() {
        let temp_dir = TempDir::new().unwrap();
        let cli = CliConfig {
            db_path: Some(temp_dir.path().join("todos.db")),
            ..Default::default()
        };
        let file_config = FileConfig {
            logging_level: Some("chatty".to_string()),
            ..Default::default()
        };
        assert!(AppConfig::resolve(&cli, Some(file_config)).is_err());
    }
}
