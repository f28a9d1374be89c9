//! Transforms that hide parts of an image: faces, logos, unsafe content

use super::basic::blur_args;
use super::geometry::annotations_to_polygons;
use super::{path_arg, ConvertCommand};
use crate::app_log;
use crate::engine::ImageEngine;
use crate::error::CloudMakerResult;
use crate::pipeline::artifact::Artifact;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::params::{ParameterSchema, ResolvedParameters};
use crate::pipeline::transform::{
    Enricher, Enrichment, RawTransform, TransformDescriptor, TransformOp,
};
use crate::vision::AnnotationService;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Blur only inside `polygons`, using a white-on-black mask
///
/// With `feather` the mask edge is blurred too, so the blur fades out.
pub fn polygon_blur_args(
    input: &Path,
    output: &Path,
    polygons: &str,
    feather: Option<&str>,
) -> Vec<String> {
    if polygons.is_empty() {
        return vec![path_arg(input), path_arg(output)];
    }

    let mut args: Vec<String> = [
        "(", "+clone", "-blur", "0x24", ")",
        "(", "+clone", "-fill", "black", "-colorize", "100", "-fill", "white", "-draw",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.insert(0, path_arg(input));
    args.push(polygons.to_string());
    if let Some(radius) = feather {
        args.extend(["-blur".to_string(), radius.to_string()]);
    }
    args.extend([")".to_string(), "-composite".to_string(), path_arg(output)]);
    args
}

pub struct BlurPolygons {
    engine: Arc<dyn ImageEngine>,
    feather: Option<&'static str>,
}

#[async_trait]
impl RawTransform for BlurPolygons {
    async fn apply(
        &self,
        input: &Path,
        output: &Path,
        params: &ResolvedParameters,
    ) -> CloudMakerResult<()> {
        let polygons = params.text("polygons").unwrap_or_default();
        self.engine
            .convert(&polygon_blur_args(input, output, &polygons, self.feather))
            .await
    }
}

pub struct FacePolygons {
    vision: Arc<dyn AnnotationService>,
}

#[async_trait]
impl Enricher for FacePolygons {
    async fn enrich(
        &self,
        artifact: &Artifact,
        params: &ResolvedParameters,
        _context: &PipelineContext,
    ) -> CloudMakerResult<Enrichment> {
        let faces = self.vision.faces(artifact.location()).await?;
        let polygons = annotations_to_polygons(faces.iter().map(|face| &face.bounding_poly));
        Ok(Enrichment::Proceed(params.with("polygons", polygons)))
    }
}

pub struct LogoPolygons {
    vision: Arc<dyn AnnotationService>,
}

#[async_trait]
impl Enricher for LogoPolygons {
    async fn enrich(
        &self,
        artifact: &Artifact,
        params: &ResolvedParameters,
        _context: &PipelineContext,
    ) -> CloudMakerResult<Enrichment> {
        let logos = self.vision.logos(artifact.location()).await?;
        let polygons = annotations_to_polygons(logos.iter().map(|logo| &logo.bounding_poly));
        Ok(Enrichment::Proceed(params.with("polygons", polygons)))
    }
}

/// Lets safe images through untouched; unsafe ones go on to be blurred
pub struct SafeSearchGate {
    vision: Arc<dyn AnnotationService>,
}

#[async_trait]
impl Enricher for SafeSearchGate {
    async fn enrich(
        &self,
        artifact: &Artifact,
        params: &ResolvedParameters,
        context: &PipelineContext,
    ) -> CloudMakerResult<Enrichment> {
        if self.vision.check_safety(artifact.location()).await? {
            app_log!(
                LogLevel::Info,
                "transforms::safe_search",
                "{} flagged as unsafe, blurring (invocation: {})",
                artifact.location(),
                context.invocation_id()
            );
            Ok(Enrichment::Proceed(params.clone()))
        } else {
            Ok(Enrichment::Passthrough)
        }
    }
}

pub fn blur_faces_transform(
    engine: Arc<dyn ImageEngine>,
    vision: Arc<dyn AnnotationService>,
) -> TransformDescriptor {
    TransformDescriptor::new(
        "blurFacesTransform",
        ParameterSchema::with_output("faces", Some("cloud-maker-outputs-faces")),
        TransformOp::enriched(
            FacePolygons { vision },
            BlurPolygons {
                engine,
                feather: Some("0x8"),
            },
        ),
    )
}

pub fn blur_logos_transform(
    engine: Arc<dyn ImageEngine>,
    vision: Arc<dyn AnnotationService>,
) -> TransformDescriptor {
    TransformDescriptor::new(
        "blurLogosTransform",
        ParameterSchema::with_output("logo", None),
        TransformOp::enriched(LogoPolygons { vision }, BlurPolygons { engine, feather: None }),
    )
}

pub fn safe_search_transform(
    engine: Arc<dyn ImageEngine>,
    vision: Arc<dyn AnnotationService>,
) -> TransformDescriptor {
    TransformDescriptor::new(
        "safeSearchTransform",
        ParameterSchema::with_output("safe", None),
        TransformOp::enriched(SafeSearchGate { vision }, ConvertCommand::new(engine, blur_args)),
    )
}
