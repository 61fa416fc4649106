use crate::traits::{validate_component, FolderRef, FolderResult, FolderStore, FolderStoreError};
use async_trait::async_trait;
use bytes::Bytes;
use cleanreport_core::SinkBackend;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, Attributes, ObjectStore, ObjectStoreExt, PutMode, PutOptions, PutPayload,
};
use std::sync::Arc;

/// Marker object that makes an otherwise empty prefix a folder.
const FOLDER_MARKER: &str = ".folder";

/// Folder store on S3 or an S3-compatible provider
///
/// A folder is the prefix `{root}/{name}/`, materialized by a `.folder` marker
/// written with create-if-absent semantics.
#[derive(Clone)]
pub struct S3FolderStore {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    root: String,
}

impl S3FolderStore {
    /// Create a new S3FolderStore
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint for S3-compatible providers (e.g. MinIO)
    /// * `root` - Prefix holding per-submission folders
    pub fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
        root: &str,
    ) -> FolderResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| FolderStoreError::ConfigError(e.to_string()))?;

        Ok(Self::with_store(Arc::new(store), bucket, root))
    }

    /// Folder store over an already configured object store.
    pub fn with_store(store: Arc<dyn ObjectStore>, bucket: String, root: &str) -> Self {
        S3FolderStore {
            store,
            bucket,
            root: root.trim_matches('/').to_string(),
        }
    }

    fn folder_prefix(&self, name: &str) -> FolderResult<String> {
        validate_component(name)?;
        Ok(format!("{}/{}", self.root, name))
    }

    fn marker_path(&self, name: &str) -> FolderResult<Path> {
        Ok(Path::from(format!(
            "{}/{}",
            self.folder_prefix(name)?,
            FOLDER_MARKER
        )))
    }
}

#[async_trait]
impl FolderStore for S3FolderStore {
    async fn find_folder(&self, name: &str) -> FolderResult<Option<FolderRef>> {
        let marker = self.marker_path(name)?;
        match self.store.head(&marker).await {
            Ok(_) => Ok(Some(FolderRef {
                name: name.to_string(),
                key: self.folder_prefix(name)?,
            })),
            Err(ObjectStoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(FolderStoreError::BackendError(e.to_string())),
        }
    }

    async fn create_folder(&self, name: &str) -> FolderResult<FolderRef> {
        let marker = self.marker_path(name)?;
        let prefix = self.folder_prefix(name)?;

        let result = self
            .store
            .put_opts(
                &marker,
                PutPayload::from(Bytes::new()),
                PutOptions::from(PutMode::Create),
            )
            .await;

        match result {
            Ok(_) => {
                tracing::info!(bucket = %self.bucket, prefix = %prefix, "S3 folder created");
            }
            Err(ObjectStoreError::AlreadyExists { .. })
            | Err(ObjectStoreError::Precondition { .. }) => {
                tracing::debug!(bucket = %self.bucket, prefix = %prefix, "S3 folder already exists");
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    prefix = %prefix,
                    "S3 folder create failed"
                );
                return Err(FolderStoreError::CreateFailed(e.to_string()));
            }
        }

        Ok(FolderRef {
            name: name.to_string(),
            key: prefix,
        })
    }

    async fn write_file(
        &self,
        folder: &FolderRef,
        file_name: &str,
        content_type: &str,
        data: Bytes,
    ) -> FolderResult<String> {
        validate_component(file_name)?;
        let key = format!("{}/{}", self.folder_prefix(&folder.name)?, file_name);
        let location = Path::from(key.clone());
        let size = data.len();
        let start = std::time::Instant::now();

        let options = PutOptions {
            attributes: Attributes::from_iter([(
                Attribute::ContentType,
                content_type.to_string(),
            )]),
            ..Default::default()
        };

        self.store
            .put_opts(&location, PutPayload::from(data), options)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                FolderStoreError::WriteFailed(e.to_string())
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(key)
    }

    async fn list_files(&self, folder: &FolderRef) -> FolderResult<Vec<String>> {
        let prefix = Path::from(self.folder_prefix(&folder.name)?);
        let objects: Vec<_> = self
            .store
            .list(Some(&prefix))
            .try_collect()
            .await
            .map_err(|e| FolderStoreError::BackendError(e.to_string()))?;

        let mut names: Vec<String> = objects
            .into_iter()
            .filter_map(|meta| meta.location.filename().map(str::to_string))
            .filter(|name| name != FOLDER_MARKER)
            .collect();
        names.sort();
        Ok(names)
    }

    fn backend_type(&self) -> SinkBackend {
        SinkBackend::S3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn store() -> (Arc<InMemory>, S3FolderStore) {
        let memory = Arc::new(InMemory::new());
        let store = S3FolderStore::with_store(memory.clone(), "bucket".to_string(), "/reports/");
        (memory, store)
    }

    #[tokio::test]
    async fn test_folder_is_a_marked_prefix() {
        let (_, store) = store();
        assert!(store.find_folder("B_(2024-01-01)_A").await.unwrap().is_none());

        let first = store.create_folder("B_(2024-01-01)_A").await.unwrap();
        let second = store.create_folder("B_(2024-01-01)_A").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.key, "reports/B_(2024-01-01)_A");
        assert_eq!(
            store.find_folder("B_(2024-01-01)_A").await.unwrap(),
            Some(first)
        );
    }

    #[tokio::test]
    async fn test_written_files_carry_their_content_type() {
        let (memory, store) = store();
        let folder = store.create_folder("site").await.unwrap();

        let key = store
            .write_file(&folder, "photo_1.jpg", "image/jpeg", Bytes::from_static(b"\xFF\xD8"))
            .await
            .unwrap();
        assert_eq!(key, "reports/site/photo_1.jpg");

        let object = memory.get(&Path::from(key)).await.unwrap();
        let content_type = object.attributes.get(&Attribute::ContentType).unwrap();
        assert_eq!(content_type.as_ref(), "image/jpeg");

        assert_eq!(store.list_files(&folder).await.unwrap(), vec!["photo_1.jpg"]);
    }
}
