use crate::traits::{validate_component, FolderRef, FolderResult, FolderStore, FolderStoreError};
use async_trait::async_trait;
use bytes::Bytes;
use cleanreport_core::SinkBackend;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Folder store rooted in a local directory
#[derive(Clone)]
pub struct LocalFolderStore {
    root: PathBuf,
}

impl LocalFolderStore {
    /// Create a new LocalFolderStore
    ///
    /// # Arguments
    /// * `base_path` - Storage directory (e.g., "/var/lib/cleanreport")
    /// * `root` - Folder under `base_path` holding per-submission folders (e.g., "reports")
    pub async fn new(base_path: impl Into<PathBuf>, root: &str) -> FolderResult<Self> {
        let base_path: PathBuf = base_path.into();
        let root = root.trim_matches('/');
        if root.split('/').any(|part| part.is_empty() || part == "..") {
            return Err(FolderStoreError::ConfigError(format!(
                "Invalid folder root: {}",
                root
            )));
        }
        let root = base_path.join(root);

        fs::create_dir_all(&root).await.map_err(|e| {
            FolderStoreError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(LocalFolderStore { root })
    }

    /// Convert a folder (and optional file) name to a filesystem path under the root
    fn to_path(&self, folder: &str, file_name: Option<&str>) -> FolderResult<PathBuf> {
        validate_component(folder)?;
        let mut path = self.root.join(folder);
        if let Some(file_name) = file_name {
            validate_component(file_name)?;
            path = path.join(file_name);
        }

        if path.strip_prefix(&self.root).is_err() {
            return Err(FolderStoreError::InvalidName(
                "Name resolves outside storage directory".to_string(),
            ));
        }

        Ok(path)
    }

    fn folder_ref(&self, name: &str, path: &std::path::Path) -> FolderRef {
        FolderRef {
            name: name.to_string(),
            key: path.display().to_string(),
        }
    }
}

#[async_trait]
impl FolderStore for LocalFolderStore {
    async fn find_folder(&self, name: &str) -> FolderResult<Option<FolderRef>> {
        let path = self.to_path(name, None)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => Ok(Some(self.folder_ref(name, &path))),
            Ok(_) => Err(FolderStoreError::BackendError(format!(
                "{} exists and is not a directory",
                path.display()
            ))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_folder(&self, name: &str) -> FolderResult<FolderRef> {
        let path = self.to_path(name, None)?;

        match fs::create_dir(&path).await {
            Ok(()) => {
                tracing::info!(path = %path.display(), folder = %name, "Folder created");
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                tracing::debug!(path = %path.display(), folder = %name, "Folder already exists");
            }
            Err(e) => {
                return Err(FolderStoreError::CreateFailed(format!(
                    "Failed to create folder {}: {}",
                    path.display(),
                    e
                )))
            }
        }

        Ok(self.folder_ref(name, &path))
    }

    async fn write_file(
        &self,
        folder: &FolderRef,
        file_name: &str,
        _content_type: &str,
        data: Bytes,
    ) -> FolderResult<String> {
        let path = self.to_path(&folder.name, Some(file_name))?;
        let size = data.len();
        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => FolderStoreError::NotFound(folder.name.clone()),
            _ => FolderStoreError::WriteFailed(format!(
                "Failed to create file {}: {}",
                path.display(),
                e
            )),
        })?;

        file.write_all(&data).await.map_err(|e| {
            FolderStoreError::WriteFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            FolderStoreError::WriteFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local file write successful"
        );

        Ok(path.display().to_string())
    }

    async fn list_files(&self, folder: &FolderRef) -> FolderResult<Vec<String>> {
        let path = self.to_path(&folder.name, None)?;
        let mut entries = match fs::read_dir(&path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(FolderStoreError::NotFound(folder.name.clone()))
            }
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn backend_type(&self) -> SinkBackend {
        SinkBackend::Local
    }
}
