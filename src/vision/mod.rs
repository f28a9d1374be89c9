//! Annotation service collaborator
//!
//! Vision-based transforms ask this service about an image that already lives
//! in object storage and turn the answer into extra step parameters.

pub mod cloud;
pub mod types;

pub use cloud::CloudVisionClient;
pub use types::{
    BoundingPoly, CropHint, CropHintsAnnotation, EntityAnnotation, FaceAnnotation, Likelihood,
    SafeSearchAnnotation, Vertex,
};

use crate::error::CloudMakerResult;
use crate::pipeline::ArtifactLocation;
use async_trait::async_trait;

#[async_trait]
pub trait AnnotationService: Send + Sync {
    async fn safe_search(&self, image: &ArtifactLocation) -> CloudMakerResult<SafeSearchAnnotation>;

    async fn labels(&self, image: &ArtifactLocation) -> CloudMakerResult<Vec<EntityAnnotation>>;

    async fn landmarks(&self, image: &ArtifactLocation) -> CloudMakerResult<Vec<EntityAnnotation>>;

    async fn logos(&self, image: &ArtifactLocation) -> CloudMakerResult<Vec<EntityAnnotation>>;

    async fn faces(&self, image: &ArtifactLocation) -> CloudMakerResult<Vec<FaceAnnotation>>;

    async fn crop_hints(&self, image: &ArtifactLocation) -> CloudMakerResult<CropHintsAnnotation>;

    /// Whether safe-search flags the image as unsafe
    async fn check_safety(&self, image: &ArtifactLocation) -> CloudMakerResult<bool> {
        Ok(self.safe_search(image).await?.is_unsafe())
    }
}
