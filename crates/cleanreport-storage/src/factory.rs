#[cfg(feature = "storage-local")]
use crate::LocalFolderStore;
#[cfg(feature = "storage-s3")]
use crate::S3FolderStore;
use crate::{DriveSink, FolderStore, ScriptSink, Sink, SinkBackend, SinkError, SinkResult};
use cleanreport_core::Config;
use std::sync::Arc;
use std::time::Duration;

/// Create the folder store backing a drive-style sink
pub async fn create_folder_store(config: &Config) -> SinkResult<Arc<dyn FolderStore>> {
    match config.sink_backend() {
        #[cfg(feature = "storage-s3")]
        SinkBackend::S3 => {
            let bucket = config
                .s3_bucket()
                .map(String::from)
                .ok_or_else(|| SinkError::Config("S3_BUCKET not configured".to_string()))?;
            let region = config.s3_region().map(String::from).ok_or_else(|| {
                SinkError::Config("S3_REGION or AWS_REGION not configured".to_string())
            })?;
            let endpoint = config.s3_endpoint().map(String::from);

            let store = S3FolderStore::new(bucket, region, endpoint, config.drive_root())
                .map_err(|e| SinkError::Config(e.to_string()))?;
            Ok(Arc::new(store))
        }

        #[cfg(not(feature = "storage-s3"))]
        SinkBackend::S3 => Err(SinkError::Config(
            "S3 folder store not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        SinkBackend::Local => {
            let base_path = config
                .local_storage_path()
                .map(String::from)
                .ok_or_else(|| {
                    SinkError::Config("LOCAL_STORAGE_PATH not configured".to_string())
                })?;

            let store = LocalFolderStore::new(base_path, config.drive_root())
                .await
                .map_err(|e| SinkError::Config(e.to_string()))?;
            Ok(Arc::new(store))
        }

        #[cfg(not(feature = "storage-local"))]
        SinkBackend::Local => Err(SinkError::Config(
            "Local folder store not available (storage-local feature not enabled)".to_string(),
        )),

        SinkBackend::Script => Err(SinkError::Config(
            "Script backend has no folder store".to_string(),
        )),
    }
}

/// Create the sink selected by `SINK_BACKEND`
pub async fn create_sink(config: &Config) -> SinkResult<Arc<dyn Sink>> {
    let sink: Arc<dyn Sink> = match config.sink_backend() {
        SinkBackend::Script => {
            let url = config
                .script_url()
                .ok_or_else(|| SinkError::Config("SCRIPT_URL not configured".to_string()))?;
            Arc::new(ScriptSink::new(
                url,
                Duration::from_secs(config.sink_timeout_secs()),
            )?)
        }
        SinkBackend::Local | SinkBackend::S3 => {
            Arc::new(DriveSink::new(create_folder_store(config).await?))
        }
    };

    tracing::info!(backend = %sink.backend_type(), "Sink initialized");
    Ok(sink)
}
