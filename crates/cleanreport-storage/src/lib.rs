//! Cleanreport Storage Library
//!
//! Sinks that receive forwarded reports: a remote script endpoint, or a folder
//! store (local filesystem or S3) with one folder per submission.
//!
//! # Folder layout
//!
//! - Folder: `{root}/{site}_({reportDate})_{staff}`
//! - Photos: `{label}_{sequence}.jpg`, 1-based per field
//! - Metadata: `report.json`
//!
//! Names are sanitized in `cleanreport_core::models::sanitize_component`; stores reject
//! any component containing `..` or a path separator.

pub mod drive;
pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod script;
pub mod traits;

// Re-export commonly used types
pub use cleanreport_core::SinkBackend;
pub use drive::DriveSink;
pub use factory::{create_folder_store, create_sink};
#[cfg(feature = "storage-local")]
pub use local::LocalFolderStore;
#[cfg(feature = "storage-s3")]
pub use s3::S3FolderStore;
pub use script::ScriptSink;
pub use traits::{
    FolderRef, FolderResult, FolderStore, FolderStoreError, Sink, SinkError, SinkResult,
};
