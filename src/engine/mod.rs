//! Image-processing engine collaborator
//!
//! Transforms describe their work as ImageMagick-style argument lists; the
//! engine runs them. Keeping the seam at the argument level lets tests assert
//! on the exact command a transform would issue.

pub mod imagemagick;

pub use imagemagick::ImageMagick;

use crate::error::CloudMakerResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Basic facts about an image file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub format: String,
    pub width: u32,
    pub height: u32,
}

#[async_trait]
pub trait ImageEngine: Send + Sync {
    /// Run a `convert` invocation with the given arguments
    async fn convert(&self, args: &[String]) -> CloudMakerResult<()>;

    /// Read format and dimensions of an image
    async fn identify(&self, path: &Path) -> CloudMakerResult<ImageInfo>;
}
