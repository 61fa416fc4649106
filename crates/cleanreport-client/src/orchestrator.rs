//! Submission orchestrator: compress, send, reset.

use std::sync::Arc;

use cleanreport_core::{CategoryField, ImageAsset, TransferPayload};
use cleanreport_processing::{CompressionError, CompressionOptions, ImageCompressor};
use futures::StreamExt;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::{CompressionFailure, Requirement, SubmitError, ValidationError};
use crate::form::{FormState, SelectedFile};
use crate::transfer::{strategy_for, TransferStrategy};
use crate::transport::RelayTransport;
use crate::ui::{ScreenLock, SubmissionUi};

/// Result of one press of the submit button.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Nothing happened; the form is missing these inputs.
    NotEligible(Vec<Requirement>),
    Completed { submission_id: Uuid, images: usize },
    /// The form is left as it was so the user can retry.
    Failed(SubmitError),
}

pub struct SubmissionOrchestrator {
    config: ClientConfig,
    transport: Arc<dyn RelayTransport>,
    strategy: Box<dyn TransferStrategy>,
}

impl SubmissionOrchestrator {
    pub fn new(config: ClientConfig, transport: Arc<dyn RelayTransport>) -> Self {
        let strategy = strategy_for(config.transfer_mode, config.pace);
        Self {
            config,
            transport,
            strategy,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run one submission of `form`.
    ///
    /// Holding `&mut FormState` for the whole call rules out a second concurrent
    /// submission of the same form.
    pub async fn submit(&self, form: &mut FormState, ui: &mut dyn SubmissionUi) -> SubmitOutcome {
        let Some(metadata) = form.snapshot_metadata() else {
            return SubmitOutcome::NotEligible(form.missing_requirements());
        };

        let mut lock = ScreenLock::acquire(ui);

        let result = async {
            let images = self.compress_all(form, &mut *lock).await?;
            let payload = TransferPayload::new(metadata, images);

            tracing::info!(
                submission_id = %payload.submission_id,
                images = payload.images.len(),
                mode = %self.strategy.mode(),
                "Sending submission"
            );

            self.strategy
                .transfer(&payload, self.transport.as_ref(), &mut *lock)
                .await?;
            Ok::<_, SubmitError>(payload)
        }
        .await;

        match result {
            Ok(payload) => {
                let images = payload.images.len();
                lock.show_complete(images);
                tokio::time::sleep(self.config.completion_delay).await;
                form.reset_after_success(self.config.reset_policy);

                tracing::info!(submission_id = %payload.submission_id, images = images, "Submission complete");
                SubmitOutcome::Completed {
                    submission_id: payload.submission_id,
                    images,
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "Submission failed");
                lock.show_error(&err.user_message());
                SubmitOutcome::Failed(err)
            }
        }
    }

    /// Compress every selected photo, in catalog then selection order.
    ///
    /// All files are attempted; any failure aborts with the full list of failures.
    async fn compress_all(
        &self,
        form: &FormState,
        ui: &mut dyn SubmissionUi,
    ) -> Result<Vec<ImageAsset>, ValidationError> {
        let jobs: Vec<(&'static CategoryField, u32, SelectedFile)> = form
            .populated_fields()
            .into_iter()
            .flat_map(|(field, files)| {
                files
                    .iter()
                    .enumerate()
                    .map(move |(i, file)| (field, i as u32 + 1, file.clone()))
            })
            .collect();

        let total = jobs.len();
        let options = self.config.compression;

        let mut results = futures::stream::iter(jobs.into_iter().map(|(field, sequence, file)| async move {
            let result = compress_file(&file, options).await;
            (field, sequence, file.name, result)
        }))
        .buffered(self.config.effective_concurrency());

        let mut images = Vec::with_capacity(total);
        let mut failures = Vec::new();
        let mut done = 0;

        while let Some((field, sequence, name, result)) = results.next().await {
            done += 1;
            ui.compress_progress(done, total);
            match result {
                Ok(data) => images.push(ImageAsset::new(field, sequence, data)),
                Err(error) => {
                    tracing::warn!(file = %name, field = field.id, error = %error, "Compression failed");
                    failures.push(CompressionFailure { file: name, error });
                }
            }
        }

        if failures.is_empty() {
            Ok(images)
        } else {
            Err(ValidationError::Compression(failures))
        }
    }
}

async fn compress_file(
    file: &SelectedFile,
    options: CompressionOptions,
) -> Result<String, CompressionError> {
    let bytes = file.read().await?;
    tokio::task::spawn_blocking(move || ImageCompressor::compress_to_data_url(&bytes, &options))
        .await
        .map_err(|e| CompressionError::Encode(e.to_string()))?
}
