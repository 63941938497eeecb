use bridge_traits::{BridgeError, TransferDirection};
use std::fmt;
use thiserror::Error;

/// Which collaborator an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateSource {
    Local,
    Remote,
    Config,
    Transfer,
    Lifecycle,
}

impl StateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateSource::Local => "local store",
            StateSource::Remote => "remote store",
            StateSource::Config => "config store",
            StateSource::Transfer => "transfer service",
            StateSource::Lifecycle => "lifecycle observer",
        }
    }
}

impl fmt::Display for StateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error("{origin} unavailable: {message}")]
    SourceUnavailable { origin: StateSource, message: String },

    #[error("Sync job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    #[error("Config write conflict: {0}")]
    ConfigWriteConflict(String),

    #[error("Malformed response from {origin}: {message}")]
    MalformedResponse { origin: StateSource, message: String },

    #[error("Sync job {job_id} not found")]
    JobNotFound { job_id: String },

    #[error("A {direction} job is already in progress")]
    SyncInProgress { direction: TransferDirection },

    #[error("Category '{0}' not found")]
    CategoryNotFound(String),

    #[error("Category '{category}' has nested categories: {}", .nested.join(", "))]
    HasNestedCategories { category: String, nested: Vec<String> },

    #[error("File '{filename}' not found in category '{category}'")]
    FileNotFound { category: String, filename: String },

    #[error("File '{filename}' already exists in category '{category}'")]
    FileExists { category: String, filename: String },

    #[error("Not a supported media file: {0}")]
    UnsupportedFile(String),

    #[error("Category '{category}' changed since the delete preview")]
    StalePreview { category: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid job ID: {0}")]
    InvalidJobId(String),

    #[error("Invalid sync status: {0}")]
    InvalidStatus(String),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },
}

impl SyncError {
    /// Classify a collaborator failure.
    ///
    /// Contract violations become `MalformedResponse`, write collisions become
    /// `ConfigWriteConflict`, anything else leaves the state unknown.
    pub fn from_bridge(origin: StateSource, error: BridgeError) -> Self {
        match error {
            BridgeError::InvalidResponse(message) => SyncError::MalformedResponse { origin, message },
            BridgeError::Conflict(message) => SyncError::ConfigWriteConflict(message),
            other => SyncError::SourceUnavailable {
                origin,
                message: other.to_string(),
            },
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::SourceUnavailable { .. })
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
