//! Directory-backed object store
//!
//! Each bucket is a directory under the store root and each blob a file
//! inside it. Used for local runs and tests.

use super::traits::ObjectStore;
use crate::error::{CloudMakerError, CloudMakerResult};
use crate::pipeline::ArtifactLocation;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

pub struct FileObjectStore {
    root: PathBuf,
}

impl FileObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a blob on disk, rejecting names that would escape the root
    pub fn blob_path(&self, location: &ArtifactLocation) -> CloudMakerResult<PathBuf> {
        for part in [&location.bucket, &location.name] {
            let escapes = part.is_empty()
                || Path::new(part)
                    .components()
                    .any(|c| !matches!(c, Component::Normal(_)));
            if escapes {
                return Err(CloudMakerError::Internal(format!(
                    "Invalid blob location: {}",
                    location
                )));
            }
        }
        Ok(self.root.join(&location.bucket).join(&location.name))
    }
}

async fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) => tokio::fs::create_dir_all(parent).await,
        None => Ok(()),
    }
}

#[async_trait]
impl ObjectStore for FileObjectStore {
    async fn download(
        &self,
        location: &ArtifactLocation,
        destination: &Path,
    ) -> CloudMakerResult<()> {
        let path = self
            .blob_path(location)
            .map_err(|e| CloudMakerError::FetchFailed(e.to_string()))?;
        ensure_parent(destination)
            .await
            .map_err(|e| CloudMakerError::FetchFailed(format!("{}: {}", location, e)))?;
        tokio::fs::copy(&path, destination)
            .await
            .map_err(|e| CloudMakerError::FetchFailed(format!("{}: {}", location, e)))?;
        Ok(())
    }

    async fn upload(&self, source: &Path, location: &ArtifactLocation) -> CloudMakerResult<()> {
        let path = self
            .blob_path(location)
            .map_err(|e| CloudMakerError::UploadFailed(e.to_string()))?;
        ensure_parent(&path)
            .await
            .map_err(|e| CloudMakerError::UploadFailed(format!("{}: {}", location, e)))?;
        tokio::fs::copy(source, &path).await.map_err(|e| {
            CloudMakerError::UploadFailed(format!("{} -> {}: {}", source.display(), location, e))
        })?;
        Ok(())
    }

    async fn copy(&self, from: &ArtifactLocation, to: &ArtifactLocation) -> CloudMakerResult<()> {
        let source = self.blob_path(from)?;
        let destination = self.blob_path(to)?;
        if source == destination {
            return Ok(());
        }
        ensure_parent(&destination)
            .await
            .map_err(|e| CloudMakerError::UploadFailed(format!("{}: {}", to, e)))?;
        tokio::fs::copy(&source, &destination)
            .await
            .map_err(|e| CloudMakerError::UploadFailed(format!("{} -> {}: {}", from, to, e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upload_then_download() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileObjectStore::new(temp_dir.path().join("buckets"));
        let source = temp_dir.path().join("cat.png");
        tokio::fs::write(&source, b"png bytes").await.unwrap();

        let location = ArtifactLocation::new("inputs", "cat.png");
        assert!(!store.blob_path(&location).unwrap().exists());

        store.upload(&source, &location).await.unwrap();
        assert!(store.blob_path(&location).unwrap().is_file());

        let destination = temp_dir.path().join("scratch").join("cat.png");
        store.download(&location, &destination).await.unwrap();
        assert_eq!(tokio::fs::read(&destination).await.unwrap(), b"png bytes");
    }

    #[tokio::test]
    async fn test_download_missing_blob_is_fetch_failure() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileObjectStore::new(temp_dir.path());
        let result = store
            .download(
                &ArtifactLocation::new("inputs", "missing.png"),
                &temp_dir.path().join("out.png"),
            )
            .await;
        assert!(matches!(result, Err(CloudMakerError::FetchFailed(_))));
    }

    #[tokio::test]
    async fn test_copy_between_buckets() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileObjectStore::new(temp_dir.path());
        let source = temp_dir.path().join("dog.png");
        tokio::fs::write(&source, b"dog").await.unwrap();

        let from = ArtifactLocation::new("inputs", "dog.png");
        let to = ArtifactLocation::new("outputs", "dog.png");
        store.upload(&source, &from).await.unwrap();
        store.copy(&from, &to).await.unwrap();
        assert_eq!(tokio::fs::read(store.blob_path(&to).unwrap()).await.unwrap(), b"dog");
    }

    #[test]
    fn test_blob_path_rejects_traversal() {
        let store = FileObjectStore::new("/srv/buckets");
        assert!(store
            .blob_path(&ArtifactLocation::new("inputs", "../secrets"))
            .is_err());
        assert!(store.blob_path(&ArtifactLocation::new("", "a.png")).is_err());
        assert_eq!(
            store
                .blob_path(&ArtifactLocation::new("inputs", "nested/a.png"))
                .unwrap(),
            PathBuf::from("/srv/buckets/inputs/nested/a.png")
        );
    }
}
