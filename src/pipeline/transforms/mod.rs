//! Built-in transform catalog
//!
//! Basic transforms (engine only):
//! - copyImage, convertRasterFormat, resizeTransform, rotateTransform,
//!   reflectTransform, filterTransform, borderTransform, blurTransform
//!
//! Vision transforms (enrich, then apply):
//! - captionTransform, landmarkTransform, dogeTransform
//! - blurFacesTransform, blurLogosTransform, safeSearchTransform
//! - cropShapeTransform, emojiTransform

pub mod basic;
pub mod caption;
pub mod doge;
pub mod emoji;
pub mod geometry;
pub mod redact;
pub mod shape;

use super::params::ResolvedParameters;
use super::transform::{RawTransform, TransformRegistry};
use crate::engine::ImageEngine;
use crate::error::CloudMakerResult;
use crate::vision::AnnotationService;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Builds the engine argument list for one invocation
pub type ArgsBuilder =
    fn(&Path, &Path, &ResolvedParameters) -> CloudMakerResult<Vec<String>>;

/// Raw transform that is a single `convert` call
pub struct ConvertCommand {
    engine: Arc<dyn ImageEngine>,
    args: ArgsBuilder,
}

impl ConvertCommand {
    pub fn new(engine: Arc<dyn ImageEngine>, args: ArgsBuilder) -> Self {
        Self { engine, args }
    }
}

#[async_trait]
impl RawTransform for ConvertCommand {
    async fn apply(
        &self,
        input: &Path,
        output: &Path,
        params: &ResolvedParameters,
    ) -> CloudMakerResult<()> {
        let args = (self.args)(input, output, params)?;
        self.engine.convert(&args).await
    }
}

pub(crate) fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

pub fn register_all(
    registry: &mut TransformRegistry,
    engine: Arc<dyn ImageEngine>,
    vision: Arc<dyn AnnotationService>,
) {
    registry.register(basic::copy_image());
    registry.register(basic::convert_raster_format(engine.clone()));
    registry.register(basic::resize_transform(engine.clone()));
    registry.register(basic::rotate_transform(engine.clone()));
    registry.register(basic::reflect_transform(engine.clone()));
    registry.register(basic::filter_transform(engine.clone()));
    registry.register(basic::border_transform(engine.clone()));
    registry.register(basic::blur_transform(engine.clone()));

    registry.register(caption::caption_transform(engine.clone(), vision.clone()));
    registry.register(caption::landmark_transform(engine.clone(), vision.clone()));
    registry.register(doge::doge_transform(engine.clone(), vision.clone()));
    registry.register(redact::blur_faces_transform(engine.clone(), vision.clone()));
    registry.register(redact::blur_logos_transform(engine.clone(), vision.clone()));
    registry.register(redact::safe_search_transform(engine.clone(), vision.clone()));
    registry.register(shape::crop_shape_transform(engine.clone(), vision.clone()));
    registry.register(emoji::emoji_transform(engine, vision));
}
