use crate::traits::{FolderRef, FolderStore, FolderStoreError, Sink, SinkError, SinkResult};
use async_trait::async_trait;
use bytes::Bytes;
use cleanreport_core::constants::JPEG_MIME;
use cleanreport_core::{ForwardUnit, SinkBackend};
use cleanreport_processing::decode_data_url;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Metadata record written next to the photos of every submission folder.
pub const REPORT_FILE_NAME: &str = "report.json";

/// Folder references kept by default. Older ones are resolved again on next use.
pub const DEFAULT_FOLDER_CACHE_SIZE: usize = 256;

type FolderSlot = Arc<tokio::sync::Mutex<Option<FolderRef>>>;

/// Sink writing each submission into its own folder of a [`FolderStore`]
///
/// Layout: `{root}/{site}_({reportDate})_{staff}/{label}_{sequence}.jpg`.
pub struct DriveSink {
    store: Arc<dyn FolderStore>,
    folders: Mutex<LruCache<String, FolderSlot>>,
}

impl DriveSink {
    pub fn new(store: Arc<dyn FolderStore>) -> Self {
        Self::with_cache_size(store, DEFAULT_FOLDER_CACHE_SIZE)
    }

    pub fn with_cache_size(store: Arc<dyn FolderStore>, cache_size: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            store,
            folders: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn slot(&self, name: &str) -> FolderSlot {
        let mut folders = self.folders.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = folders.get(name).cloned() {
            return slot;
        }
        let slot = FolderSlot::default();
        folders.put(name.to_string(), slot.clone());
        slot
    }

    #[cfg(test)]
    fn cached_folders(&self) -> usize {
        self.folders.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Atomic get-or-create of the folder named `name`.
    ///
    /// Resolution is serialized per name; the first caller finds or creates the folder
    /// and later callers get the cached reference.
    pub async fn resolve_folder(&self, name: &str) -> SinkResult<FolderRef> {
        let slot = self.slot(name);

        let mut cached = slot.lock().await;
        if let Some(folder) = cached.as_ref() {
            return Ok(folder.clone());
        }

        let folder = match self
            .store
            .find_folder(name)
            .await
            .map_err(|e| SinkError::Folder(e.to_string()))?
        {
            Some(folder) => folder,
            None => self
                .store
                .create_folder(name)
                .await
                .map_err(|e| SinkError::Folder(e.to_string()))?,
        };

        *cached = Some(folder.clone());
        Ok(folder)
    }

    async fn forget_folder(&self, name: &str) {
        let slot = {
            let mut folders = self.folders.lock().unwrap_or_else(|e| e.into_inner());
            folders.get(name).cloned()
        };
        if let Some(slot) = slot {
            slot.lock().await.take();
        }
    }

    /// Write one file. A folder removed since it was cached is resolved once more.
    async fn write(
        &self,
        folder: &mut FolderRef,
        file_name: &str,
        content_type: &str,
        data: Bytes,
    ) -> SinkResult<()> {
        let first = self
            .store
            .write_file(folder, file_name, content_type, data.clone())
            .await;
        let result = match first {
            Err(FolderStoreError::NotFound(_)) => {
                tracing::warn!(folder = %folder.name, "Cached folder no longer exists, resolving again");
                self.forget_folder(&folder.name).await;
                *folder = self.resolve_folder(&folder.name).await?;
                self.store
                    .write_file(folder, file_name, content_type, data)
                    .await
            }
            result => result,
        };

        result.map(|_| ()).map_err(|e| {
            tracing::error!(
                error = %e,
                folder = %folder.name,
                file = %file_name,
                "File write failed"
            );
            SinkError::Write(e.to_string())
        })
    }

    async fn write_report(&self, folder: &mut FolderRef, unit: &ForwardUnit) -> SinkResult<()> {
        let record = serde_json::json!({
            "submissionId": unit.submission_id,
            "staff": unit.metadata.staff,
            "site": unit.metadata.site,
            "reportDate": unit.metadata.report_date,
            "workType": unit.metadata.work_type,
            "workTypeLabel": unit.metadata.work_type.label(),
            "workTime": unit.metadata.work_time,
        });
        let data = serde_json::to_vec_pretty(&record)
            .map_err(|e| SinkError::Write(e.to_string()))?;

        self.write(folder, REPORT_FILE_NAME, "application/json", Bytes::from(data))
            .await
    }
}

#[async_trait]
impl Sink for DriveSink {
    async fn store(&self, unit: &ForwardUnit) -> SinkResult<()> {
        let folder_name = unit.metadata.folder_name();
        let mut folder = self.resolve_folder(&folder_name).await?;

        if unit.index == 0 {
            self.write_report(&mut folder, unit).await?;
        }

        for image in &unit.images {
            let (_mime, bytes) = decode_data_url(&image.data)
                .map_err(|e| SinkError::InvalidImage(format!("{}: {}", image.label, e)))?;
            self.write(&mut folder, &image.file_name(), JPEG_MIME, Bytes::from(bytes))
                .await?;
        }

        tracing::info!(
            submission_id = %unit.submission_id,
            folder = %folder.name,
            unit_index = unit.index,
            images = unit.images.len(),
            "Forward unit stored"
        );

        Ok(())
    }

    fn backend_type(&self) -> SinkBackend {
        self.store.backend_type()
    }
}
