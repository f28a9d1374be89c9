//! Crop to the vision service's suggested region, a square, or a circle

use super::geometry::{crop_hints_to_geometry, crop_hints_to_square, inscribed_circle};
use super::path_arg;
use crate::engine::ImageEngine;
use crate::error::{CloudMakerError, CloudMakerResult};
use crate::pipeline::artifact::Artifact;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::params::{ParamSpec, ParameterSchema, ResolvedParameters};
use crate::pipeline::transform::{
    Enricher, Enrichment, RawTransform, TransformDescriptor, TransformOp,
};
use crate::vision::AnnotationService;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub const SHAPES: &[&str] = &["suggested", "square", "circle"];

/// Circles need a transparent background, so the output is always PNG
pub const SHAPE_EXTENSIONS: &[&str] = &[".png"];

pub fn crop_args(input: &Path, output: &Path, geometry: &str, mask: Option<&str>) -> Vec<String> {
    let mut args = vec![
        path_arg(input),
        "-crop".to_string(),
        geometry.to_string(),
        "+repage".to_string(),
    ];
    if let Some(mask) = mask {
        args.extend(
            [
                "-alpha", "set", "(", "+clone", "-alpha", "transparent", "-fill", "white", "-draw",
                mask, ")", "-compose", "copyopacity", "-composite",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
    }
    args.push(path_arg(output));
    args
}

pub struct ApplyCrop {
    engine: Arc<dyn ImageEngine>,
}

#[async_trait]
impl RawTransform for ApplyCrop {
    async fn apply(
        &self,
        input: &Path,
        output: &Path,
        params: &ResolvedParameters,
    ) -> CloudMakerResult<()> {
        let geometry = params.require_text("geometry")?;
        let mask = params.text("mask");
        self.engine
            .convert(&crop_args(input, output, &geometry, mask.as_deref()))
            .await
    }
}

pub struct CropHintGeometry {
    vision: Arc<dyn AnnotationService>,
}

#[async_trait]
impl Enricher for CropHintGeometry {
    async fn enrich(
        &self,
        artifact: &Artifact,
        params: &ResolvedParameters,
        _context: &PipelineContext,
    ) -> CloudMakerResult<Enrichment> {
        let hints = self.vision.crop_hints(artifact.location()).await?;
        let missing = || {
            CloudMakerError::AnnotationFailed(format!(
                "No crop hints returned for {}",
                artifact.location()
            ))
        };

        let shape = params.require_text("shape")?;
        let enriched = match shape.as_str() {
            "square" => {
                let (geometry, _) = crop_hints_to_square(&hints).ok_or_else(missing)?;
                params.with("geometry", geometry)
            }
            "circle" => {
                let (geometry, side) = crop_hints_to_square(&hints).ok_or_else(missing)?;
                params
                    .with("geometry", geometry)
                    .with("mask", inscribed_circle(side))
            }
            _ => params.with("geometry", crop_hints_to_geometry(&hints).ok_or_else(missing)?),
        };
        Ok(Enrichment::Proceed(enriched))
    }
}

pub fn crop_shape_transform(
    engine: Arc<dyn ImageEngine>,
    vision: Arc<dyn AnnotationService>,
) -> TransformDescriptor {
    TransformDescriptor::new(
        "cropShapeTransform",
        ParameterSchema::with_output("shape", Some("cloud-maker-outputs-cropped"))
            .param(ParamSpec::choice("shape", "suggested", SHAPES))
            .param(ParamSpec::choice("extension", ".png", SHAPE_EXTENSIONS)),
        TransformOp::enriched(CropHintGeometry { vision }, ApplyCrop { engine }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockAnnotationService, MockImageEngine, MockObjectStore};
    use crate::pipeline::artifact::ArtifactLocation;
    use crate::vision::{BoundingPoly, CropHint, CropHintsAnnotation, Vertex};
    use serde_json::json;
    use tempfile::TempDir;

    fn hints() -> CropHintsAnnotation {
        CropHintsAnnotation {
            crop_hints: vec![CropHint {
                bounding_poly: BoundingPoly::new(vec![
                    Vertex::new(10, 20),
                    Vertex::new(210, 20),
                    Vertex::new(210, 120),
                    Vertex::new(10, 120),
                ]),
                confidence: 0.8,
            }],
        }
    }

    async fn run(
        shape: &str,
        hints: CropHintsAnnotation,
    ) -> (CloudMakerResult<Artifact>, Arc<MockImageEngine>) {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MockObjectStore::new());
        let source = ArtifactLocation::new("inputs", "photo.jpg");
        store.insert(&source, b"jpg".to_vec());
        let context = PipelineContext::new("test", "outputs", temp.path(), store);
        let engine = Arc::new(MockImageEngine::new());
        let vision = Arc::new(MockAnnotationService::new().with_crop_hints(hints));
        let descriptor = crop_shape_transform(engine.clone(), vision);

        let params = json!({ "shape": shape });
        let params = params.as_object().unwrap();
        descriptor.schema().validate(descriptor.name(), params).unwrap();
        let result = descriptor
            .total_apply(&Artifact::remote(source), &descriptor.schema().resolve(params), &context)
            .await;
        (result, engine)
    }

    #[test]
    fn test_crop_args() {
        assert_eq!(
            crop_args(Path::new("in"), Path::new("out"), "90x85+10+15", None),
            vec!["in", "-crop", "90x85+10+15", "+repage", "out"]
        );
        let masked = crop_args(
            Path::new("in"),
            Path::new("out"),
            "10x10+0+0",
            Some("circle 5,5 5,0"),
        );
        assert!(masked.contains(&"copyopacity".to_string()));
        assert!(masked.contains(&"circle 5,5 5,0".to_string()));
    }

    #[tokio::test]
    async fn test_suggested_crop_outputs_png() {
        let (result, engine) = run("suggested", hints()).await;
        let output = result.unwrap();
        assert_eq!(output.name(), "shape-photo.png");
        assert_eq!(engine.invocations()[0][2], "200x100+10+20");
    }

    #[tokio::test]
    async fn test_square_and_circle_crops() {
        let (_, engine) = run("square", hints()).await;
        assert_eq!(engine.invocations()[0][2], "100x100+60+20");
        assert_eq!(engine.invocations()[0].len(), 5);

        let (_, engine) = run("circle", hints()).await;
        let invocation = &engine.invocations()[0];
        assert_eq!(invocation[2], "100x100+60+20");
        assert!(invocation.contains(&"circle 50,50 50,0".to_string()));
    }

    #[tokio::test]
    async fn test_missing_hints_fail() {
        let (result, engine) = run("suggested", CropHintsAnnotation::default()).await;
        assert!(matches!(result, Err(CloudMakerError::AnnotationFailed(_))));
        assert!(engine.invocations().is_empty());
    }

    #[test]
    fn test_shape_validators() {
        let descriptor = crop_shape_transform(
            Arc::new(MockImageEngine::new()),
            Arc::new(MockAnnotationService::new()),
        );
        let extension = descriptor.schema().get("extension").unwrap();
        assert!(extension.validate(&json!(".png")));
        assert!(!extension.validate(&json!(".jpg")));
        assert!(!descriptor.schema().get("shape").unwrap().validate(&json!("triangle")));
    }
}
