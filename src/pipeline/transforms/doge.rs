//! Doge captions: "so cat", "much whiskers", ..., "wow"
//!
//! Caption placement is derived from a SHA-256 digest of the caption and its
//! position, so the same labels always produce the same picture.

use super::geometry::next_google_color;
use super::path_arg;
use crate::engine::ImageEngine;
use crate::error::CloudMakerResult;
use crate::pipeline::artifact::Artifact;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::params::{ParameterSchema, ResolvedParameters};
use crate::pipeline::transform::{
    Enricher, Enrichment, RawTransform, TransformDescriptor, TransformOp,
};
use crate::vision::{AnnotationService, EntityAnnotation};
use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;

pub const DOGE_WORDS: [&str; 5] = ["so", "much", "very", "such", "too"];

pub fn doge_captions(labels: &[EntityAnnotation]) -> Vec<String> {
    labels
        .iter()
        .enumerate()
        .map(|(i, label)| format!("{} {}", DOGE_WORDS[i % DOGE_WORDS.len()], label.description))
        .chain(["wow".to_string(), "wow".to_string()])
        .collect()
}

/// Top-left anchor of a caption inside a `width` x `height` image
pub fn caption_position(
    index: usize,
    caption: &str,
    width: u32,
    height: u32,
    font_size: u32,
) -> (u32, u32) {
    let digest = Sha256::digest(format!("{}:{}", index, caption).as_bytes());
    let x = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    let y = u32::from_be_bytes([digest[4], digest[5], digest[6], digest[7]]);

    let usable_height = height.saturating_sub(font_size).max(1);
    (x % width.max(1), font_size + y % usable_height)
}

pub fn doge_args(
    input: &Path,
    output: &Path,
    width: u32,
    height: u32,
    captions: &[String],
) -> Vec<String> {
    // 5% of the image height
    let font_size = (height / 20).max(1);

    let mut args = vec![path_arg(input)];
    for (index, caption) in captions.iter().enumerate() {
        let color = next_google_color(index);
        let (x, y) = caption_position(index, caption, width, height, font_size);
        args.extend([
            "-fill".to_string(),
            color.to_string(),
            "-stroke".to_string(),
            color.to_string(),
            "-font".to_string(),
            "DejaVu-Sans".to_string(),
            "-pointsize".to_string(),
            font_size.to_string(),
            "-annotate".to_string(),
            format!("+{}+{}", x, y),
            caption.clone(),
        ]);
    }
    args.push(path_arg(output));
    args
}

pub struct ApplyDogeCaptions {
    engine: Arc<dyn ImageEngine>,
}

#[async_trait]
impl RawTransform for ApplyDogeCaptions {
    async fn apply(
        &self,
        input: &Path,
        output: &Path,
        params: &ResolvedParameters,
    ) -> CloudMakerResult<()> {
        let info = self.engine.identify(input).await?;
        let captions = params.string_list("captions");
        self.engine
            .convert(&doge_args(input, output, info.width, info.height, &captions))
            .await
    }
}

pub struct DogeLabels {
    vision: Arc<dyn AnnotationService>,
}

#[async_trait]
impl Enricher for DogeLabels {
    async fn enrich(
        &self,
        artifact: &Artifact,
        params: &ResolvedParameters,
        _context: &PipelineContext,
    ) -> CloudMakerResult<Enrichment> {
        let labels = self.vision.labels(artifact.location()).await?;
        let captions: Vec<Value> = doge_captions(&labels).into_iter().map(Value::from).collect();
        Ok(Enrichment::Proceed(params.with("captions", captions)))
    }
}

pub fn doge_transform(
    engine: Arc<dyn ImageEngine>,
    vision: Arc<dyn AnnotationService>,
) -> TransformDescriptor {
    TransformDescriptor::new(
        "dogeTransform",
        ParameterSchema::with_output("doge", None),
        TransformOp::enriched(DogeLabels { vision }, ApplyDogeCaptions { engine }),
    )
}
