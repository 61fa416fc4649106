//! Client side of the cleaning-report pipeline.
//!
//! - [`form`]: the report form as a state machine gating submission
//! - [`orchestrator`]: compresses the selected photos and sends them to the relay
//! - [`transfer`]: batched or per-image sending strategies
//! - [`transport`]: the HTTP relay client

pub mod config;
pub mod error;
pub mod form;
pub mod orchestrator;
pub mod transfer;
pub mod transport;
pub mod ui;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ClientConfig, ResetPolicy, TransferMode, MAX_COMPRESSION_CONCURRENCY};
pub use error::{
    CompressionFailure, Requirement, SubmitError, TransportError, ValidationError,
    MISSING_FIELDS_MESSAGE, SEND_FAILED_MESSAGE,
};
pub use form::{FieldView, FileSource, FormState, SelectedFile};
pub use orchestrator::{SubmissionOrchestrator, SubmitOutcome};
pub use transfer::{strategy_for, Batched, PerImage, TransferStrategy};
pub use transport::{HttpRelayClient, RelayTransport, UploadAck};
pub use ui::{ScreenLock, SubmissionUi};
