use crate::traits::{Sink, SinkError, SinkResult};
use async_trait::async_trait;
use cleanreport_core::{ForwardUnit, SinkBackend};
use reqwest::redirect::Policy;
use std::time::Duration;

/// Redirects followed per call. Script deployments answer with a 302 to the result page.
const MAX_REDIRECTS: usize = 5;

/// Sink posting each forward unit as JSON to a remote script endpoint
#[derive(Clone)]
pub struct ScriptSink {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl ScriptSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> SinkResult<Self> {
        let client = reqwest::Client::builder()
            .redirect(Policy::limited(MAX_REDIRECTS))
            .timeout(timeout)
            .build()
            .map_err(|e| SinkError::Config(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }
}

#[async_trait]
impl Sink for ScriptSink {
    async fn store(&self, unit: &ForwardUnit) -> SinkResult<()> {
        let body = unit.to_request();
        let start = std::time::Instant::now();

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SinkError::Timeout(self.timeout.as_secs())
                } else {
                    SinkError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                submission_id = %unit.submission_id,
                unit_index = unit.index,
                status = status.as_u16(),
                "Script sink rejected forward unit"
            );
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body: body.chars().take(512).collect(),
            });
        }

        tracing::info!(
            submission_id = %unit.submission_id,
            unit_index = unit.index,
            unit_count = unit.total,
            images = unit.images.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Script sink accepted forward unit"
        );

        Ok(())
    }

    fn backend_type(&self) -> SinkBackend {
        SinkBackend::Script
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use chrono::NaiveDate;
    use cleanreport_core::{
        find_field, ForwardMode, ImageAsset, SubmissionMetadata, TransferPayload, WorkType,
    };
    use std::sync::{Arc, Mutex};

    type Received = Arc<Mutex<Vec<serde_json::Value>>>;

    async fn record(
        State(received): State<Received>,
        Json(body): Json<serde_json::Value>,
    ) -> StatusCode {
        received.lock().unwrap().push(body);
        StatusCode::OK
    }

    async fn spawn_script() -> (String, Received) {
        let received: Received = Arc::default();
        let app = Router::new()
            .route("/exec", post(record))
            .route(
                "/redirect",
                post(|| async {
                    (
                        StatusCode::TEMPORARY_REDIRECT,
                        [(axum::http::header::LOCATION, "/exec")],
                    )
                }),
            )
            .route("/fail", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .with_state(received.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), received)
    }

    fn payload() -> TransferPayload {
        let field = find_field("normal_photos").unwrap();
        TransferPayload::new(
            SubmissionMetadata {
                staff: "A".to_string(),
                site: "B".to_string(),
                report_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                work_type: WorkType::Normal,
                work_time: None,
            },
            vec![
                ImageAsset::new(field, 1, "data:image/jpeg;base64,AAAA".to_string()),
                ImageAsset::new(field, 2, "data:image/jpeg;base64,BBBB".to_string()),
            ],
        )
    }

    #[tokio::test]
    async fn test_posts_single_image_units() {
        let (base, received) = spawn_script().await;
        let sink = ScriptSink::new(format!("{}/exec", base), Duration::from_secs(5)).unwrap();

        let payload = payload();
        for unit in payload.forward_units(ForwardMode::PerImage) {
            sink.store(&unit).await.unwrap();
        }

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0]["singleImage"]["sequence"], 1);
        assert_eq!(received[1]["singleImage"]["sequence"], 2);
        assert_eq!(received[0]["submissionId"], payload.submission_id.to_string());
        assert!(received[0].get("allImages").is_none());
    }

    #[tokio::test]
    async fn test_follows_redirects() {
        let (base, received) = spawn_script().await;
        let sink = ScriptSink::new(format!("{}/redirect", base), Duration::from_secs(5)).unwrap();

        let units = payload().forward_units(ForwardMode::Single);
        sink.store(&units[0]).await.unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["allImages"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_non_success_is_rejected() {
        let (base, _received) = spawn_script().await;
        let sink = ScriptSink::new(format!("{}/fail", base), Duration::from_secs(5)).unwrap();

        let units = payload().forward_units(ForwardMode::Single);
        let err = sink.store(&units[0]).await.unwrap_err();
        assert!(matches!(err, SinkError::Rejected { status: 500, .. }));
        assert!(err.is_retryable());
    }
}
