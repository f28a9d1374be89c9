//! Caption overlays: a supplied or label-derived caption, and landmark names

use super::path_arg;
use crate::app_log;
use crate::engine::ImageEngine;
use crate::error::{CloudMakerError, CloudMakerResult};
use crate::pipeline::artifact::Artifact;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::params::{ParamSpec, ParameterSchema, ResolvedParameters};
use crate::pipeline::transform::{
    Enricher, Enrichment, RawTransform, TransformDescriptor, TransformOp,
};
use crate::vision::{AnnotationService, EntityAnnotation};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub const NO_LANDMARK: &str = "No landmark found.";

/// Height in pixels of the caption band
const BAND_HEIGHT: u32 = 30;

/// Semi-transparent band across the bottom of the image with the caption centred in it
pub fn caption_args(input: &Path, output: &Path, width: u32, caption: &str) -> Vec<String> {
    vec![
        "-background".to_string(),
        "#0008".to_string(),
        "-fill".to_string(),
        "white".to_string(),
        "-gravity".to_string(),
        "center".to_string(),
        "-size".to_string(),
        format!("{}x{}", width, BAND_HEIGHT),
        format!("caption: {}", caption),
        path_arg(input),
        "+swap".to_string(),
        "-gravity".to_string(),
        "south".to_string(),
        "-composite".to_string(),
        path_arg(output),
    ]
}

/// Highest-scoring annotation; the first one wins ties
pub fn best_annotation(annotations: &[EntityAnnotation]) -> Option<&EntityAnnotation> {
    annotations.iter().fold(None, |best: Option<&EntityAnnotation>, next| match best {
        Some(current) if current.score >= next.score => Some(current),
        _ => Some(next),
    })
}

pub struct ApplyCaption {
    engine: Arc<dyn ImageEngine>,
}

#[async_trait]
impl RawTransform for ApplyCaption {
    async fn apply(
        &self,
        input: &Path,
        output: &Path,
        params: &ResolvedParameters,
    ) -> CloudMakerResult<()> {
        let caption = params.require_text("caption")?;
        let info = self.engine.identify(input).await?;
        self.engine
            .convert(&caption_args(input, output, info.width, &caption))
            .await
    }
}

/// Uses the caller's caption, or the best label for the image
pub struct LabelCaption {
    vision: Arc<dyn AnnotationService>,
}

#[async_trait]
impl Enricher for LabelCaption {
    async fn enrich(
        &self,
        artifact: &Artifact,
        params: &ResolvedParameters,
        context: &PipelineContext,
    ) -> CloudMakerResult<Enrichment> {
        if params.optional_text("caption").is_some() {
            return Ok(Enrichment::Proceed(params.clone()));
        }

        let labels = self.vision.labels(artifact.location()).await?;
        let caption = best_annotation(&labels)
            .map(|label| label.description.clone())
            .ok_or_else(|| {
                CloudMakerError::AnnotationFailed(format!(
                    "No labels found for {}",
                    artifact.location()
                ))
            })?;

        app_log!(
            LogLevel::Debug,
            "transforms::caption",
            "Generated caption '{}' (invocation: {})",
            caption,
            context.invocation_id()
        );
        Ok(Enrichment::Proceed(params.with("caption", caption)))
    }
}

pub struct LandmarkCaption {
    vision: Arc<dyn AnnotationService>,
}

#[async_trait]
impl Enricher for LandmarkCaption {
    async fn enrich(
        &self,
        artifact: &Artifact,
        params: &ResolvedParameters,
        _context: &PipelineContext,
    ) -> CloudMakerResult<Enrichment> {
        let landmarks = self.vision.landmarks(artifact.location()).await?;
        let caption = best_annotation(&landmarks)
            .map(|landmark| landmark.description.as_str())
            .filter(|description| !description.is_empty())
            .unwrap_or(NO_LANDMARK);
        Ok(Enrichment::Proceed(params.with("caption", caption)))
    }
}

pub fn caption_transform(
    engine: Arc<dyn ImageEngine>,
    vision: Arc<dyn AnnotationService>,
) -> TransformDescriptor {
    TransformDescriptor::new(
        "captionTransform",
        ParameterSchema::with_output("caption", Some("cloud-maker-outputs-captions"))
            .param(ParamSpec::optional_text("caption")),
        TransformOp::enriched(LabelCaption { vision }, ApplyCaption { engine }),
    )
}

pub fn landmark_transform(
    engine: Arc<dyn ImageEngine>,
    vision: Arc<dyn AnnotationService>,
) -> TransformDescriptor {
    TransformDescriptor::new(
        "landmarkTransform",
        ParameterSchema::with_output("landmark", None),
        TransformOp::enriched(LandmarkCaption { vision }, ApplyCaption { engine }),
    )
}
