//! Local Artifact Cache
//!
//! Maps an artifact's blob base name to a file inside the invocation's scratch
//! directory. Entries are never evicted; the scratch directory is removed as a
//! whole when the invocation ends.

use super::artifact::{base_name, Artifact, ArtifactLocation};
use crate::app_log;
use crate::error::{CloudMakerError, CloudMakerResult};
use crate::storage::ObjectStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone)]
pub struct LocalArtifactCache {
    scratch_dir: PathBuf,
    store: Arc<dyn ObjectStore>,
}

impl LocalArtifactCache {
    pub fn new(scratch_dir: impl Into<PathBuf>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            store,
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Deterministic local path for a blob name
    pub fn local_path(&self, name: &str) -> CloudMakerResult<PathBuf> {
        let base = base_name(name);
        if base.is_empty() || base == "." || base == ".." {
            return Err(CloudMakerError::FetchFailed(format!(
                "Cannot derive a local path for blob name '{}'",
                name
            )));
        }
        Ok(self.scratch_dir.join(base))
    }

    /// Local file holding the artifact's bytes, fetched when not already present
    pub async fn ensure_local(&self, artifact: &Artifact) -> CloudMakerResult<PathBuf> {
        let path = self.local_path(artifact.name())?;

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            app_log!(
                LogLevel::Debug,
                "cache",
                "Cache hit for {} at {}",
                artifact.location(),
                path.display()
            );
            return Ok(path);
        }

        if let Some(existing) = artifact.local_path() {
            if existing != path && tokio::fs::try_exists(existing).await.unwrap_or(false) {
                self.prepare_dir().await?;
                tokio::fs::copy(existing, &path).await.map_err(|e| {
                    CloudMakerError::FetchFailed(format!(
                        "Failed to stage {} into cache: {}",
                        existing.display(),
                        e
                    ))
                })?;
                return Ok(path);
            }
        }

        self.prepare_dir().await?;
        app_log!(
            LogLevel::Debug,
            "cache",
            "Fetching {} into {}",
            artifact.location(),
            path.display()
        );
        if let Err(e) = self.store.download(artifact.location(), &path).await {
            // Never leave a partial file behind to be mistaken for a cache hit
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e);
        }
        Ok(path)
    }

    /// Local path for an artifact a step is about to produce
    pub async fn reserve_local(&self, location: &ArtifactLocation) -> CloudMakerResult<PathBuf> {
        self.prepare_dir().await?;
        self.local_path(&location.name)
    }

    async fn prepare_dir(&self) -> CloudMakerResult<()> {
        tokio::fs::create_dir_all(&self.scratch_dir)
            .await
            .map_err(|e| {
                CloudMakerError::FetchFailed(format!(
                    "Failed to create scratch directory {}: {}",
                    self.scratch_dir.display(),
                    e
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockObjectStore;
    use tempfile::TempDir;

    fn cache_with(store: Arc<MockObjectStore>) -> (TempDir, LocalArtifactCache) {
        let temp_dir = TempDir::new().unwrap();
        let cache = LocalArtifactCache::new(temp_dir.path().join("scratch"), store);
        (temp_dir, cache)
    }

    #[tokio::test]
    async fn test_ensure_local_fetches_once_per_blob_name() {
        let store = Arc::new(MockObjectStore::new());
        store.insert(&ArtifactLocation::new("inputs", "cat.png"), b"png bytes".to_vec());
        let (_temp, cache) = cache_with(store.clone());

        let first = Artifact::remote(ArtifactLocation::new("inputs", "cat.png"));
        let second = Artifact::remote(ArtifactLocation::new("inputs", "cat.png"));

        let a = cache.ensure_local(&first).await.unwrap();
        let b = cache.ensure_local(&second).await.unwrap();

        assert_eq!(a, b);
        assert_eq!(store.download_count(), 1);
        assert_eq!(std::fs::read(&a).unwrap(), b"png bytes");
    }

    #[tokio::test]
    async fn test_same_name_in_other_bucket_is_a_hit() {
        let store = Arc::new(MockObjectStore::new());
        store.insert(&ArtifactLocation::new("inputs", "dir/cat.png"), b"x".to_vec());
        let (_temp, cache) = cache_with(store.clone());

        cache
            .ensure_local(&Artifact::remote(ArtifactLocation::new("inputs", "dir/cat.png")))
            .await
            .unwrap();
        cache
            .ensure_local(&Artifact::remote(ArtifactLocation::new("outputs", "cat.png")))
            .await
            .unwrap();

        assert_eq!(store.download_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_blob_is_fetch_failure() {
        let store = Arc::new(MockObjectStore::new());
        let (_temp, cache) = cache_with(store);

        let result = cache
            .ensure_local(&Artifact::remote(ArtifactLocation::new("inputs", "nope.png")))
            .await;

        assert!(matches!(result, Err(CloudMakerError::FetchFailed(_))));
        assert!(!cache.local_path("nope.png").unwrap().exists());
    }

    #[tokio::test]
    async fn test_reserve_local_does_not_fetch() {
        let store = Arc::new(MockObjectStore::new());
        let (_temp, cache) = cache_with(store.clone());

        let path = cache
            .reserve_local(&ArtifactLocation::new("outputs", "resized-cat.png"))
            .await
            .unwrap();

        assert_eq!(path, cache.scratch_dir().join("resized-cat.png"));
        assert!(cache.scratch_dir().is_dir());
        assert!(!path.exists());
        assert_eq!(store.download_count(), 0);
    }

    #[test]
    fn test_local_path_rejects_degenerate_names() {
        let (_temp, cache) = cache_with(Arc::new(MockObjectStore::new()));
        assert!(cache.local_path("").is_err());
        assert!(cache.local_path("dir/..").is_err());
    }
}
