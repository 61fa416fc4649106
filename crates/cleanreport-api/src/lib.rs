//! cleanreport relay
//!
//! HTTP ingress for report uploads. Requests are validated, persisted to the
//! forward outbox and acknowledged with `202 Accepted`; the forward queue then
//! delivers them to the configured sink in the background.

mod telemetry;

pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;

pub use error::{ErrorResponse, HttpAppError, ValidatedJson};
pub use state::AppState;
