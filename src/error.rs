//! Error types for the jsonfs virtual filesystem.

use thiserror::Error;

/// Path grammar and shape errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("Invalid path format: {0}")]
    Format(String),

    #[error("Path '{0}' is not a file path")]
    NotAFilePath(String),

    #[error("Path '{0}' is not a folder path")]
    NotAFolderPath(String),

    #[error("Invalid container name: {0}")]
    InvalidContainer(String),
}

/// Disk and document errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Disk ticket {0} was disposed")]
    TicketDisposed(i64),

    #[error("Broken document: {0}")]
    BrokenDocument(String),
}

/// Errors surfaced by the tree, container and manager APIs
#[derive(Debug, Error)]
pub enum FsError {
    #[error("Manager is not booted")]
    NotBooted,

    #[error("Disk has not been scanned yet")]
    NotScanned,

    #[error("'{0}' was removed and can not be operated again")]
    Removed(String),

    #[error("'{0}' was disposed and can not be operated again")]
    Disposed(String),

    #[error("Type tag '{0}' is not registered; add a binder for it")]
    NoMatchingTypeBinder(String),

    #[error("Document structure is broken: {0}")]
    BrokenDocumentStructure(String),

    #[error("Invalid cast on '{path}': file holds {actual}, requested {expected}")]
    InvalidCast {
        path: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("No current container; create or use one before accessing current://")]
    NoCurrentContainer,

    #[error("Unknown container: {0}")]
    UnknownContainer(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lifecycle hook failed: {0}")]
    Hook(String),

    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error("Path error: {0}")]
    Path(#[from] PathError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<config::ConfigError> for FsError {
    fn from(err: config::ConfigError) -> Self {
        FsError::Config(err.to_string())
    }
}

impl From<tokio::task::JoinError> for FsError {
    fn from(err: tokio::task::JoinError) -> Self {
        FsError::Worker(err.to_string())
    }
}

pub type Result<T, E = FsError> = std::result::Result<T, E>;
