//! Fakes shared by the unit tests of this crate.

use std::sync::Mutex;

use async_trait::async_trait;
use cleanreport_core::UploadRequest;

use crate::error::TransportError;
use crate::transport::{RelayTransport, UploadAck};
use crate::ui::SubmissionUi;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Locked,
    Unlocked,
    SubmitEnabled(bool),
    CompressProgress(usize, usize),
    SendProgress(usize, usize),
    Error(String),
    Complete(usize),
}

#[derive(Default)]
pub struct RecordingUi {
    pub events: Vec<UiEvent>,
}

impl RecordingUi {
    pub fn send_progress(&self) -> Vec<(usize, usize)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                UiEvent::SendProgress(done, total) => Some((*done, *total)),
                _ => None,
            })
            .collect()
    }
}

impl SubmissionUi for RecordingUi {
    fn lock_screen(&mut self) {
        self.events.push(UiEvent::Locked);
    }

    fn unlock_screen(&mut self) {
        self.events.push(UiEvent::Unlocked);
    }

    fn set_submit_enabled(&mut self, enabled: bool) {
        self.events.push(UiEvent::SubmitEnabled(enabled));
    }

    fn compress_progress(&mut self, done: usize, total: usize) {
        self.events.push(UiEvent::CompressProgress(done, total));
    }

    fn send_progress(&mut self, done: usize, total: usize) {
        self.events.push(UiEvent::SendProgress(done, total));
    }

    fn show_error(&mut self, message: &str) {
        self.events.push(UiEvent::Error(message.to_string()));
    }

    fn show_complete(&mut self, images: usize) {
        self.events.push(UiEvent::Complete(images));
    }
}

/// Transport recording every request; fails from call `fail_from` onwards.
#[derive(Default)]
pub struct RecordingTransport {
    pub requests: Mutex<Vec<UploadRequest>>,
    pub fail_from: Option<usize>,
}

impl RecordingTransport {
    pub fn failing_from(call: usize) -> Self {
        Self {
            fail_from: Some(call),
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<UploadRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelayTransport for RecordingTransport {
    async fn post_upload(&self, request: &UploadRequest) -> Result<UploadAck, TransportError> {
        let mut requests = self.requests.lock().unwrap();
        if self.fail_from.is_some_and(|n| requests.len() >= n) {
            return Err(TransportError::Status(500));
        }
        requests.push(request.clone());
        Ok(UploadAck {
            message: "Background processing started".to_string(),
            submission_id: request.submission_id,
            images: request.image_count(),
        })
    }
}
