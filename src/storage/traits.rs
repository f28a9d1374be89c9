//! Object storage trait definition
//!
//! The pipeline only needs downloads into a local file, uploads from a local
//! file and server-side copies.

use crate::error::CloudMakerResult;
use crate::pipeline::ArtifactLocation;
use async_trait::async_trait;
use std::path::Path;

/// Blob store holding pipeline inputs and outputs
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write the blob's bytes to `destination`
    ///
    /// Failures are reported as `FetchFailed`.
    async fn download(&self, location: &ArtifactLocation, destination: &Path)
        -> CloudMakerResult<()>;

    /// Store the bytes of `source` as the blob at `location`
    ///
    /// Failures are reported as `UploadFailed`.
    async fn upload(&self, source: &Path, location: &ArtifactLocation) -> CloudMakerResult<()>;

    /// Copy a blob without materializing it locally
    async fn copy(&self, from: &ArtifactLocation, to: &ArtifactLocation) -> CloudMakerResult<()>;
}
