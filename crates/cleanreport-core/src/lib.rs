//! Cleanreport Core Library
//!
//! This crate provides the domain models, the photo category catalog, wire types,
//! error types and configuration shared by every cleanreport component.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod sink_types;

// Re-export commonly used types
pub use config::{BaseConfig, Config, RelayConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    catalog, find_field, Category, CategoryField, ForwardUnit, ImageAsset, SubmissionMetadata,
    TransferPayload, UnitShape, UploadRequest, WorkType,
};
pub use sink_types::{ForwardMode, SinkBackend};
