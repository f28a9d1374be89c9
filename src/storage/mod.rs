//! Object storage collaborators
//!
//! The pipeline talks to blob storage only through [`ObjectStore`], so the
//! backend can be swapped between a local directory tree and Cloud Storage.

pub mod file;
pub mod gcs;
pub mod traits;

pub use file::FileObjectStore;
pub use gcs::GcsObjectStore;
pub use traits::ObjectStore;

use crate::config::{ServiceConfig, StorageBackend};
use crate::error::CloudMakerResult;
use std::sync::Arc;

/// Build the configured storage backend
pub fn from_config(
    config: &ServiceConfig,
    client: reqwest::Client,
) -> CloudMakerResult<Arc<dyn ObjectStore>> {
    Ok(match &config.storage {
        StorageBackend::Filesystem { root } => Arc::new(FileObjectStore::new(root.clone())),
        StorageBackend::Gcs => Arc::new(GcsObjectStore::new(client, config.access_token.clone())?),
    })
}
