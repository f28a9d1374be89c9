//! In-memory collaborators for development and testing
//!
//! These stand in for object storage, ImageMagick and the vision service so
//! pipelines can run without network access or installed binaries. They
//! record what was asked of them so tests can assert on it.

use crate::engine::{ImageEngine, ImageInfo};
use crate::error::{CloudMakerError, CloudMakerResult};
use crate::pipeline::ArtifactLocation;
use crate::storage::ObjectStore;
use crate::vision::{
    AnnotationService, CropHintsAnnotation, EntityAnnotation, FaceAnnotation, SafeSearchAnnotation,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Object store keeping blobs in a map
#[derive(Default)]
pub struct MockObjectStore {
    blobs: Mutex<HashMap<ArtifactLocation, Vec<u8>>>,
    downloads: AtomicUsize,
    uploads: AtomicUsize,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a blob
    pub fn insert(&self, location: &ArtifactLocation, bytes: Vec<u8>) {
        lock(&self.blobs).insert(location.clone(), bytes);
    }

    pub fn contains(&self, location: &ArtifactLocation) -> bool {
        lock(&self.blobs).contains_key(location)
    }

    pub fn get(&self, location: &ArtifactLocation) -> Option<Vec<u8>> {
        lock(&self.blobs).get(location).cloned()
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn download(
        &self,
        location: &ArtifactLocation,
        destination: &Path,
    ) -> CloudMakerResult<()> {
        let bytes = self
            .get(location)
            .ok_or_else(|| CloudMakerError::FetchFailed(format!("{}: no such blob", location)))?;
        self.downloads.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(destination, bytes)
            .await
            .map_err(|e| CloudMakerError::FetchFailed(format!("{}: {}", location, e)))
    }

    async fn upload(&self, source: &Path, location: &ArtifactLocation) -> CloudMakerResult<()> {
        let bytes = tokio::fs::read(source).await.map_err(|e| {
            CloudMakerError::UploadFailed(format!("{} -> {}: {}", source.display(), location, e))
        })?;
        self.uploads.fetch_add(1, Ordering::SeqCst);
        self.insert(location, bytes);
        Ok(())
    }

    async fn copy(&self, from: &ArtifactLocation, to: &ArtifactLocation) -> CloudMakerResult<()> {
        let bytes = self
            .get(from)
            .ok_or_else(|| CloudMakerError::UploadFailed(format!("{}: no such blob", from)))?;
        self.insert(to, bytes);
        Ok(())
    }
}

/// Image engine that records every `convert` invocation
///
/// Unless built `without_outputs`, the last argument is treated as the output
/// file and receives a copy of the first argument that names an existing file.
pub struct MockImageEngine {
    invocations: Mutex<Vec<Vec<String>>>,
    writes_outputs: bool,
    image_size: (u32, u32),
    failure: Option<String>,
}

impl MockImageEngine {
    pub fn new() -> Self {
        Self {
            invocations: Mutex::new(Vec::new()),
            writes_outputs: true,
            image_size: (640, 480),
            failure: None,
        }
    }

    /// Record invocations without touching the filesystem
    pub fn without_outputs(mut self) -> Self {
        self.writes_outputs = false;
        self
    }

    /// Dimensions reported by `identify`
    pub fn with_image_size(mut self, width: u32, height: u32) -> Self {
        self.image_size = (width, height);
        self
    }

    /// Fail every `convert` with `message`
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn invocations(&self) -> Vec<Vec<String>> {
        lock(&self.invocations).clone()
    }
}

impl Default for MockImageEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageEngine for MockImageEngine {
    async fn convert(&self, args: &[String]) -> CloudMakerResult<()> {
        lock(&self.invocations).push(args.to_vec());

        if let Some(message) = &self.failure {
            return Err(CloudMakerError::ApplyFailed(message.clone()));
        }
        if !self.writes_outputs {
            return Ok(());
        }

        let (output, inputs) = args
            .split_last()
            .ok_or_else(|| {
                CloudMakerError::ApplyFailed("convert called without arguments".to_string())
            })?;
        let source = inputs.iter().map(Path::new).find(|path| path.is_file());
        let written = match source {
            Some(source) => tokio::fs::copy(source, output).await.map(|_| ()),
            None => tokio::fs::write(output, b"mock image").await,
        };
        written.map_err(|e| CloudMakerError::ApplyFailed(format!("{}: {}", output, e)))
    }

    async fn identify(&self, _path: &Path) -> CloudMakerResult<ImageInfo> {
        let (width, height) = self.image_size;
        Ok(ImageInfo {
            format: "PNG".to_string(),
            width,
            height,
        })
    }
}

/// Annotation service answering from canned results
///
/// Features without a canned result answer with an empty annotation.
#[derive(Default)]
pub struct MockAnnotationService {
    safe_search: SafeSearchAnnotation,
    labels: Vec<EntityAnnotation>,
    landmarks: Vec<EntityAnnotation>,
    logos: Vec<EntityAnnotation>,
    faces: Vec<FaceAnnotation>,
    crop_hints: CropHintsAnnotation,
    failure: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl MockAnnotationService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_safe_search(mut self, annotation: SafeSearchAnnotation) -> Self {
        self.safe_search = annotation;
        self
    }

    pub fn with_labels(mut self, labels: Vec<EntityAnnotation>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_landmarks(mut self, landmarks: Vec<EntityAnnotation>) -> Self {
        self.landmarks = landmarks;
        self
    }

    pub fn with_logos(mut self, logos: Vec<EntityAnnotation>) -> Self {
        self.logos = logos;
        self
    }

    pub fn with_faces(mut self, faces: Vec<FaceAnnotation>) -> Self {
        self.faces = faces;
        self
    }

    pub fn with_crop_hints(mut self, hints: CropHintsAnnotation) -> Self {
        self.crop_hints = hints;
        self
    }

    /// Fail every request with `message`
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Features requested so far, in order
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    fn answer<T: Clone>(&self, feature: &str, value: &T) -> CloudMakerResult<T> {
        lock(&self.calls).push(feature.to_string());
        match &self.failure {
            Some(message) => Err(CloudMakerError::AnnotationFailed(message.clone())),
            None => Ok(value.clone()),
        }
    }
}

#[async_trait]
impl AnnotationService for MockAnnotationService {
    async fn safe_search(
        &self,
        _image: &ArtifactLocation,
    ) -> CloudMakerResult<SafeSearchAnnotation> {
        self.answer("safe_search", &self.safe_search)
    }

    async fn labels(&self, _image: &ArtifactLocation) -> CloudMakerResult<Vec<EntityAnnotation>> {
        self.answer("labels", &self.labels)
    }

    async fn landmarks(
        &self,
        _image: &ArtifactLocation,
    ) -> CloudMakerResult<Vec<EntityAnnotation>> {
        self.answer("landmarks", &self.landmarks)
    }

    async fn logos(&self, _image: &ArtifactLocation) -> CloudMakerResult<Vec<EntityAnnotation>> {
        self.answer("logos", &self.logos)
    }

    async fn faces(&self, _image: &ArtifactLocation) -> CloudMakerResult<Vec<FaceAnnotation>> {
        self.answer("faces", &self.faces)
    }

    async fn crop_hints(&self, _image: &ArtifactLocation) -> CloudMakerResult<CropHintsAnnotation> {
        self.answer("crop_hints", &self.crop_hints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_store_counts_transfers() {
        let temp = TempDir::new().unwrap();
        let store = MockObjectStore::new();
        let location = ArtifactLocation::new("inputs", "cat.png");
        store.insert(&location, b"cat".to_vec());

        let local = temp.path().join("cat.png");
        store.download(&location, &local).await.unwrap();
        store.upload(&local, &location.in_bucket("outputs")).await.unwrap();

        assert_eq!(store.download_count(), 1);
        assert_eq!(store.upload_count(), 1);
        assert_eq!(store.get(&location.in_bucket("outputs")), Some(b"cat".to_vec()));

        let missing = store
            .download(&ArtifactLocation::new("inputs", "dog.png"), &local)
            .await;
        assert!(matches!(missing, Err(CloudMakerError::FetchFailed(_))));
    }

    #[tokio::test]
    async fn test_engine_copies_first_existing_input() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in.png");
        let output = temp.path().join("out.png");
        tokio::fs::write(&input, b"pixels").await.unwrap();
        let engine = MockImageEngine::new();

        let args = vec![
            input.display().to_string(),
            "-blur".to_string(),
            "0x8".to_string(),
            output.display().to_string(),
        ];
        engine.convert(&args).await.unwrap();

        assert_eq!(tokio::fs::read(&output).await.unwrap(), b"pixels");
        assert_eq!(engine.invocations(), vec![args]);
    }

    #[tokio::test]
    async fn test_failing_collaborators() {
        let engine = MockImageEngine::new().failing("no convert");
        let err = engine.convert(&["a".to_string()]).await.unwrap_err();
        assert_eq!(err.to_string(), "Image operation failed: no convert");

        let vision = MockAnnotationService::new().failing("quota");
        let err = vision.labels(&ArtifactLocation::new("b", "n")).await.unwrap_err();
        assert!(matches!(err, CloudMakerError::AnnotationFailed(_)));
        assert_eq!(vision.calls(), vec!["labels"]);
    }
}
