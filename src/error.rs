/// Centralized error types for waterfall using thiserror
///
/// Every failure of a run surfaces as one [`WaterfallError`]; the binary prints
/// it on a single line and exits non-zero.
use crate::pipeline::RunStage;
use thiserror::Error;

/// Main error type for an ingestion run
#[derive(Error, Debug)]
pub enum WaterfallError {
    #[error("Acquisition error: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("Connection error: {0}")]
    Connection(#[source] StoreError),

    #[error("Schema bootstrap failed for constraint '{constraint}': {source}")]
    SchemaBootstrap {
        constraint: String,
        #[source]
        source: StoreError,
    },

    #[error("Write error during {stage}: {source}")]
    Write {
        stage: RunStage,
        #[source]
        source: StoreError,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while obtaining the local working copy
#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("Invalid source location '{location}': {reason}")]
    InvalidSource { location: String, reason: String },

    #[error("Failed to create working copy directory '{path}': {source}")]
    WorkdirCreation {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Working copy '{0}' is locked by another run")]
    Locked(String),

    #[error("Failed to lock working copy '{path}': {source}")]
    LockFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Working copy path '{0}' exists and is not a git repository")]
    OccupiedWorkdir(String),

    #[error("Failed to clone '{url}': {source}")]
    CloneFailed {
        url: String,
        #[source]
        source: git2::Error,
    },

    #[error("Failed to open working copy '{path}': {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: git2::Error,
    },

    #[error("Failed to refresh working copy '{path}': {source}")]
    FetchFailed {
        path: String,
        #[source]
        source: git2::Error,
    },

    #[error("Acquisition was cancelled")]
    Cancelled,
}

/// Errors raised while walking commit history
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Failed to walk commit history: {0}")]
    WalkFailed(#[source] git2::Error),

    #[error("Failed to read commit {hash}: {source}")]
    CommitLookup {
        hash: String,
        #[source]
        source: git2::Error,
    },
}

/// Errors reported by the graph store collaborator
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open graph store at '{uri}': {reason}")]
    ConnectionFailed { uri: String, reason: String },

    #[error("Unsupported graph URI scheme '{0}', expected sqlite:// or file:")]
    UnsupportedScheme(String),

    #[error("Statement failed: {0}")]
    Statement(#[from] rusqlite::Error),

    #[error(
        "Cannot link commit {hash}: author '{author}' or repository '{repository}' is missing"
    )]
    MissingEndpoint {
        hash: String,
        author: String,
        repository: String,
    },

    #[error("Failed to serialize properties: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

impl WaterfallError {
    /// Check if this is a user error (bad input) rather than a system failure
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            WaterfallError::Acquisition(AcquisitionError::InvalidSource { .. })
                | WaterfallError::Connection(StoreError::UnsupportedScheme(_))
                | WaterfallError::Config(_)
        )
    }

    /// Stage of the run the error was raised in, if it happened in the graph phase
    pub fn stage(&self) -> Option<RunStage> {
        match self {
            WaterfallError::SchemaBootstrap { .. } => Some(RunStage::BootstrapSchema),
            WaterfallError::Write { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, WaterfallError>;
