use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use cleanreport_core::{TransferPayload, UploadRequest};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Message returned with every accepted upload.
pub const ACCEPTED_MESSAGE: &str = "Background processing started";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadAccepted {
    pub message: &'static str,
    pub submission_id: Uuid,
    pub images: usize,
}

/// Accept a report upload and hand it to the forward queue.
///
/// Responds `202 Accepted` as soon as the job is persisted; delivery to the sink
/// happens in the background and is visible through the status endpoint.
#[tracing::instrument(
    skip(state, request),
    fields(staff = %request.staff, site = %request.site, images = request.image_count())
)]
pub async fn upload_report(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<UploadRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let payload = TransferPayload::from_request(request)?;
    let images = payload.images.len();

    let submission_id = state.queue.submit(payload).await?;

    tracing::info!(
        submission_id = %submission_id,
        images = images,
        "Upload accepted for background forwarding"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadAccepted {
            message: ACCEPTED_MESSAGE,
            submission_id,
            images,
        }),
    ))
}
