//! Network seam between the orchestrator and the relay.

use std::time::Duration;

use async_trait::async_trait;
use cleanreport_core::constants::UPLOAD_PATH;
use cleanreport_core::UploadRequest;
use reqwest::Client;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::TransportError;

/// Relay acknowledgement of an upload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadAck {
    #[serde(default)]
    pub message: String,
    pub submission_id: Option<Uuid>,
    #[serde(default)]
    pub images: usize,
}

#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// POST one upload request. Any non-2xx status is an error.
    async fn post_upload(&self, request: &UploadRequest) -> Result<UploadAck, TransportError>;
}

/// [`RelayTransport`] over HTTP.
#[derive(Clone, Debug)]
pub struct HttpRelayClient {
    client: Client,
    base_url: String,
}

impl HttpRelayClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn upload_url(&self) -> String {
        format!("{}{}", self.base_url, UPLOAD_PATH)
    }

    /// Forwarding status of a submission as reported by the relay.
    pub async fn status(&self, submission_id: Uuid) -> Result<serde_json::Value, TransportError> {
        let url = format!("{}{}/{}/status", self.base_url, UPLOAD_PATH, submission_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        response
            .json()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))
    }
}

#[async_trait]
impl RelayTransport for HttpRelayClient {
    async fn post_upload(&self, request: &UploadRequest) -> Result<UploadAck, TransportError> {
        let response = self
            .client
            .post(self.upload_url())
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "Relay rejected upload");
            return Err(TransportError::Status(status.as_u16()));
        }

        // The relay's body is informational; an empty or foreign body still counts as sent.
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let ack = serde_json::from_str(&text).unwrap_or(UploadAck {
            message: text,
            submission_id: request.submission_id,
            images: request.image_count(),
        });
        Ok(ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use chrono::NaiveDate;
    use cleanreport_core::WorkType;

    async fn spawn_relay(status: StatusCode) -> String {
        let app = Router::new()
            .route(
                UPLOAD_PATH,
                post(move |Json(body): Json<serde_json::Value>| async move {
                    let images = body["allImages"].as_array().map_or(0, Vec::len);
                    (
                        status,
                        Json(serde_json::json!({
                            "message": "Background processing started",
                            "submissionId": body["submissionId"],
                            "images": images,
                        })),
                    )
                }),
            )
            .route(
                "/upload/{id}/status",
                get(|| async { Json(serde_json::json!({ "state": "delivered" })) }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn request() -> UploadRequest {
        UploadRequest {
            all_images: Some(Vec::new()),
            ..UploadRequest::metadata_only(
                Uuid::new_v4(),
                &cleanreport_core::SubmissionMetadata {
                    staff: "山田".to_string(),
                    site: "本社ビル".to_string(),
                    report_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                    work_type: WorkType::Normal,
                    work_time: None,
                },
            )
        }
    }

    #[tokio::test]
    async fn test_accepted_upload_returns_ack() {
        let base = spawn_relay(StatusCode::ACCEPTED).await;
        let client = HttpRelayClient::new(format!("{}/", base), Duration::from_secs(5)).unwrap();
        let request = request();

        let ack = client.post_upload(&request).await.unwrap();
        assert_eq!(ack.submission_id, request.submission_id);
        assert_eq!(ack.message, "Background processing started");
    }

    #[tokio::test]
    async fn test_error_status_is_transport_error() {
        let base = spawn_relay(StatusCode::SERVICE_UNAVAILABLE).await;
        let client = HttpRelayClient::new(base, Duration::from_secs(5)).unwrap();

        let err = client.post_upload(&request()).await.unwrap_err();
        assert_eq!(err, TransportError::Status(503));
    }

    #[tokio::test]
    async fn test_status_lookup() {
        let base = spawn_relay(StatusCode::ACCEPTED).await;
        let client = HttpRelayClient::new(base, Duration::from_secs(5)).unwrap();

        let status = client.status(Uuid::new_v4()).await.unwrap();
        assert_eq!(status["state"], "delivered");
    }

    #[tokio::test]
    async fn test_unreachable_relay_is_network_error() {
        let client =
            HttpRelayClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let err = client.post_upload(&request()).await.unwrap_err();
        assert!(matches!(err, TransportError::Network(_)));
    }
}
