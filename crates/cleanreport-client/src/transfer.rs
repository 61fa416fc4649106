//! Transfer strategies: how a compressed payload is split into relay requests.

use std::time::Duration;

use async_trait::async_trait;
use cleanreport_core::TransferPayload;

use crate::config::TransferMode;
use crate::error::TransportError;
use crate::transport::RelayTransport;
use crate::ui::SubmissionUi;

#[async_trait]
pub trait TransferStrategy: Send + Sync {
    /// Send `payload` to the relay. Returns the number of requests made.
    async fn transfer(
        &self,
        payload: &TransferPayload,
        transport: &dyn RelayTransport,
        ui: &mut dyn SubmissionUi,
    ) -> Result<usize, TransportError>;

    fn mode(&self) -> TransferMode;
}

/// Everything in one request.
pub struct Batched;

#[async_trait]
impl TransferStrategy for Batched {
    async fn transfer(
        &self,
        payload: &TransferPayload,
        transport: &dyn RelayTransport,
        _ui: &mut dyn SubmissionUi,
    ) -> Result<usize, TransportError> {
        transport.post_upload(&payload.batch_request()).await?;
        Ok(1)
    }

    fn mode(&self) -> TransferMode {
        TransferMode::Batched
    }
}

/// One request per image, strictly in order, each awaited and followed by `pace`.
pub struct PerImage {
    pub pace: Duration,
    /// Report `send_progress` before each request and after the last.
    pub report_progress: bool,
}

#[async_trait]
impl TransferStrategy for PerImage {
    async fn transfer(
        &self,
        payload: &TransferPayload,
        transport: &dyn RelayTransport,
        ui: &mut dyn SubmissionUi,
    ) -> Result<usize, TransportError> {
        let total = payload.images.len();
        if total == 0 {
            transport.post_upload(&payload.batch_request()).await?;
            return Ok(1);
        }

        for index in 0..total {
            if self.report_progress {
                ui.send_progress(index, total);
            }
            if let Some(request) = payload.single_request(index) {
                transport.post_upload(&request).await?;
            }
            tracing::debug!(
                submission_id = %payload.submission_id,
                sent = index + 1,
                total = total,
                "Image sent"
            );
            tokio::time::sleep(self.pace).await;
        }

        if self.report_progress {
            ui.send_progress(total, total);
        }
        Ok(total)
    }

    fn mode(&self) -> TransferMode {
        if self.report_progress {
            TransferMode::PerImageWithProgress
        } else {
            TransferMode::PerImageSequential
        }
    }
}

pub fn strategy_for(mode: TransferMode, pace: Duration) -> Box<dyn TransferStrategy> {
    match mode {
        TransferMode::Batched => Box::new(Batched),
        TransferMode::PerImageSequential => Box::new(PerImage {
            pace,
            report_progress: false,
        }),
        TransferMode::PerImageWithProgress => Box::new(PerImage {
            pace,
            report_progress: true,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingTransport, RecordingUi};
    use chrono::NaiveDate;
    use cleanreport_core::{find_field, ImageAsset, SubmissionMetadata, WorkType};
    use std::time::Instant;

    fn payload(images: u32) -> TransferPayload {
        let field = find_field("normal_photos").unwrap();
        TransferPayload::new(
            SubmissionMetadata {
                staff: "山田".to_string(),
                site: "本社ビル".to_string(),
                report_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                work_type: WorkType::Normal,
                work_time: None,
            },
            (1..=images)
                .map(|seq| ImageAsset::new(field, seq, format!("data:image/jpeg;base64,{}", seq)))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_batched_sends_one_request() {
        let transport = RecordingTransport::default();
        let mut ui = RecordingUi::default();
        let strategy = strategy_for(TransferMode::Batched, Duration::ZERO);

        let sent = strategy
            .transfer(&payload(3), &transport, &mut ui)
            .await
            .unwrap();

        assert_eq!(sent, 1);
        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].all_images.as_ref().unwrap().len(), 3);
        assert!(ui.events.is_empty());
    }

    #[tokio::test]
    async fn test_per_image_is_ordered_and_paced() {
        let transport = RecordingTransport::default();
        let mut ui = RecordingUi::default();
        let strategy = strategy_for(TransferMode::PerImageSequential, Duration::from_millis(20));
        let payload = payload(3);

        let start = Instant::now();
        let sent = strategy.transfer(&payload, &transport, &mut ui).await.unwrap();

        assert_eq!(sent, 3);
        assert!(start.elapsed() >= Duration::from_millis(60));
        let sequences: Vec<_> = transport
            .requests()
            .iter()
            .map(|r| r.single_image.as_ref().unwrap().sequence.unwrap())
            .collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert!(transport
            .requests()
            .iter()
            .all(|r| r.submission_id == Some(payload.submission_id)));
        assert!(ui.send_progress().is_empty());
    }

    #[tokio::test]
    async fn test_progress_reported_before_each_and_after_last() {
        let transport = RecordingTransport::default();
        let mut ui = RecordingUi::default();
        let strategy = strategy_for(TransferMode::PerImageWithProgress, Duration::ZERO);

        strategy
            .transfer(&payload(2), &transport, &mut ui)
            .await
            .unwrap();

        assert_eq!(ui.send_progress(), vec![(0, 2), (1, 2), (2, 2)]);
    }

    #[tokio::test]
    async fn test_failure_stops_the_sequence() {
        let transport = RecordingTransport::failing_from(1);
        let mut ui = RecordingUi::default();
        let strategy = strategy_for(TransferMode::PerImageWithProgress, Duration::ZERO);

        let err = strategy
            .transfer(&payload(3), &transport, &mut ui)
            .await
            .unwrap_err();

        assert_eq!(err, TransportError::Status(500));
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(ui.send_progress(), vec![(0, 3), (1, 3)]);
    }
}
