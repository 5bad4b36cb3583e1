//! Configuration management
//!
//! This module handles loading and managing configuration from:
//! - Command-line arguments
//! - Environment variables
//! - Configuration files (TOML)
//! - Defaults

use crate::cli::OutputFormat;
use crate::definition::resolve_path;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub default: DefaultConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub graph: GraphConfig,

    /// File the configuration was read from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Default settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultConfig {
    /// Automaton definition used when none is given on the command line
    pub definition: Option<PathBuf>,

    #[serde(default = "default_format")]
    pub format: OutputFormat,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Graphviz export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Layout direction (LR, TB, RL, BT)
    #[serde(default = "default_rankdir")]
    pub rankdir: String,

    /// Directory for exported `.dot` files
    pub export_dir: Option<PathBuf>,
}

// Default value functions

fn default_format() -> OutputFormat {
    OutputFormat::Table
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rankdir() -> String {
    "LR".to_string()
}

// Default implementations

impl Default for DefaultConfig {
    fn default() -> Self {
        Self {
            definition: None,
            format: default_format(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            rankdir: default_rankdir(),
            export_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Failed to read config file {:?}: {}", path, e)))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config file {:?}: {}", path, e)))?;
        config.source = Some(path);

        Ok(config)
    }

    /// Load configuration from default locations
    ///
    /// Searches in order:
    /// 1. ./state-gate.toml
    /// 2. ~/.state-gate/config.toml
    /// 3. /etc/state-gate/config.toml
    pub fn load() -> Result<Self> {
        let mut paths = vec![PathBuf::from("state-gate.toml")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".state-gate").join("config.toml"));
        }
        paths.push(PathBuf::from("/etc/state-gate/config.toml"));

        for path in paths {
            if path.exists() {
                tracing::info!("Loading config from {:?}", path);
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Definition path: command line > config file > environment variable.
    /// A relative path from the config file is taken relative to that file.
    pub fn definition_path(&self, arg: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(path) = arg {
            return Ok(path);
        }

        if let Some(path) = &self.default.definition {
            let base = self.source.as_deref().and_then(Path::parent);
            return Ok(resolve_path(base, path));
        }

        std::env::var("STATE_GATE_DEFINITION")
            .map(PathBuf::from)
            .map_err(|_| {
                Error::Config(
                    "No automaton definition given. Pass a path, set STATE_GATE_DEFINITION, \
                     or configure default.definition"
                        .to_string(),
                )
            })
    }

    /// Export directory with fallback to the working directory
    pub fn export_directory(&self) -> PathBuf {
        self.graph
            .export_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
