//! Sink and folder-store abstractions
//!
//! A [`Sink`] is the durability boundary for report data: once `store` returns `Ok`
//! the forward unit is the remote side's responsibility. Cloud-file sinks are built
//! on a [`FolderStore`], which only knows folders and files.

use async_trait::async_trait;
use bytes::Bytes;
use cleanreport_core::{ForwardUnit, SinkBackend};
use thiserror::Error;

/// Sink operation errors
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sink rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Sink transport error: {0}")]
    Transport(String),

    #[error("Sink call timed out after {0}s")]
    Timeout(u64),

    #[error("Folder resolution failed: {0}")]
    Folder(String),

    #[error("File write failed: {0}")]
    Write(String),

    #[error("Invalid image payload: {0}")]
    InvalidImage(String),

    #[error("Sink configuration error: {0}")]
    Config(String),
}

impl SinkError {
    /// Whether delivering the same unit again can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SinkError::Rejected { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            SinkError::Transport(_)
            | SinkError::Timeout(_)
            | SinkError::Folder(_)
            | SinkError::Write(_) => true,
            SinkError::InvalidImage(_) | SinkError::Config(_) => false,
        }
    }
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Destination of forwarded reports
#[async_trait]
pub trait Sink: Send + Sync {
    /// Deliver one forward unit. Re-delivering the same unit must not duplicate data
    /// beyond what the remote side dedupes by `(submissionId, sequence)`.
    async fn store(&self, unit: &ForwardUnit) -> SinkResult<()>;

    fn backend_type(&self) -> SinkBackend;
}

/// Folder store operation errors
#[derive(Debug, Error)]
pub enum FolderStoreError {
    #[error("Folder not found: {0}")]
    NotFound(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Create failed: {0}")]
    CreateFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for folder store operations
pub type FolderResult<T> = Result<T, FolderStoreError>;

/// Handle to a folder under the store's root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderRef {
    pub name: String,
    /// Backend-specific location (directory path or object prefix).
    pub key: String,
}

/// Folder/file storage used by [`crate::DriveSink`]
///
/// Names passed in are single path components; implementations reject anything that
/// could escape the root.
#[async_trait]
pub trait FolderStore: Send + Sync {
    /// Look up a folder by name.
    async fn find_folder(&self, name: &str) -> FolderResult<Option<FolderRef>>;

    /// Create a folder if absent. Creating an existing folder returns it unchanged.
    async fn create_folder(&self, name: &str) -> FolderResult<FolderRef>;

    /// Write (or overwrite) a file inside `folder`. Returns the file's key.
    async fn write_file(
        &self,
        folder: &FolderRef,
        file_name: &str,
        content_type: &str,
        data: Bytes,
    ) -> FolderResult<String>;

    /// File names inside `folder`, sorted.
    async fn list_files(&self, folder: &FolderRef) -> FolderResult<Vec<String>>;

    fn backend_type(&self) -> SinkBackend;
}

pub(crate) fn validate_component(name: &str) -> FolderResult<()> {
    if name.is_empty()
        || name == "."
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
    {
        return Err(FolderStoreError::InvalidName(name.to_string()));
    }
    Ok(())
}
