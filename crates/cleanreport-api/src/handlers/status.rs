use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use cleanreport_core::AppError;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionStatusResponse {
    pub submission_id: Uuid,
    #[serde(flatten)]
    pub status: cleanreport_worker::ForwardStatus,
}

/// Last known forwarding state of a submission.
#[tracing::instrument(skip(state))]
pub async fn get_submission_status(
    State(state): State<Arc<AppState>>,
    Path(submission_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let status = state.queue.status(&submission_id).ok_or_else(|| {
        AppError::NotFound(format!("No forwarding status for submission {}", submission_id))
    })?;

    Ok(Json(SubmissionStatusResponse {
        submission_id,
        status,
    }))
}
