/// Configuration system for waterfall
///
/// Supports loading from multiple sources with priority:
/// CLI args > Environment variables > Config file > Defaults
use crate::error::{ConfigError, WaterfallError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Graph store configuration
    #[serde(default)]
    pub graph: GraphConfig,

    /// Source repository acquisition configuration
    #[serde(default)]
    pub source: SourceConfig,
}

/// Graph store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Connection string: sqlite://<path>, sqlite::memory:, file:<path> or a bare path
    #[serde(default = "default_graph_uri")]
    pub uri: String,

    /// How long a write waits on a store locked by another run, in milliseconds
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

/// Source acquisition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Root directory holding one working copy per repository
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,

    /// Fetch from the remote when an existing working copy is reused
    #[serde(default = "default_refresh_existing")]
    pub refresh_existing: bool,
}

// Default value functions
fn default_graph_uri() -> String {
    format!(
        "sqlite://{}",
        crate::paths::PlatformPaths::default_graph_path().display()
    )
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_workdir() -> PathBuf {
    crate::paths::PlatformPaths::default_workdir()
}

fn default_refresh_existing() -> bool {
    true
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: default_graph_uri(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            workdir: default_workdir(),
            refresh_existing: default_refresh_existing(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, WaterfallError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location or create default
    pub fn load_or_default() -> Result<Self, WaterfallError> {
        let config_path = crate::paths::PlatformPaths::default_config_path();

        if config_path.exists() {
            tracing::info!("Loading config from: {}", config_path.display());
            Self::from_file(&config_path)
        } else {
            tracing::debug!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), WaterfallError> {
        if self.graph.uri.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "graph.uri".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }

        if self.source.workdir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "source.workdir".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(uri) = std::env::var("WATERFALL_GRAPH_URI") {
            self.graph.uri = uri;
        }

        if let Ok(path) = std::env::var("WATERFALL_WORKDIR") {
            self.source.workdir = PathBuf::from(path);
        }

        if let Ok(offline) = std::env::var("WATERFALL_OFFLINE")
            && let Some(offline) = parse_flag(&offline)
        {
            self.source.refresh_existing = !offline;
        }
    }

    /// Load from an explicit file (which must exist) or the default location,
    /// then apply environment overrides and validate
    pub fn load(path: Option<&Path>) -> Result<Self, WaterfallError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::load_or_default()?,
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Immutable inputs of one ingestion run, built once at invocation time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Source location to ingest (URL or local path)
    pub repository: String,
    /// Graph store connection string
    pub graph_uri: String,
    /// Root directory for working copies
    pub workdir: PathBuf,
    /// Fetch from the remote when reusing an existing working copy
    pub refresh_existing: bool,
    /// Store busy timeout
    pub busy_timeout: Duration,
}

impl RunConfig {
    /// Build run inputs for `repository` from the layered configuration
    pub fn new(repository: impl Into<String>, config: &Config) -> Self {
        Self {
            repository: repository.into(),
            graph_uri: config.graph.uri.clone(),
            workdir: config.source.workdir.clone(),
            refresh_existing: config.source.refresh_existing,
            busy_timeout: Duration::from_millis(config.graph.busy_timeout_ms),
        }
    }

    pub fn with_graph_uri(mut self, uri: impl Into<String>) -> Self {
        self.graph_uri = uri.into();
        self
    }

    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }

    pub fn offline(mut self, offline: bool) -> Self {
        if offline {
            self.refresh_existing = false;
        }
        self
    }
}
