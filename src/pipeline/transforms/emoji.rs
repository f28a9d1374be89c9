//! Replace each detected face with the emoji matching its expression

use super::geometry::{annotation_coordinate, annotation_dimensions};
use super::{path_arg, ConvertCommand};
use crate::app_log;
use crate::engine::ImageEngine;
use crate::error::CloudMakerResult;
use crate::pipeline::artifact::{Artifact, ArtifactLocation};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::params::{ParamSpec, ParameterSchema, ResolvedParameters};
use crate::pipeline::transform::{Enricher, Enrichment, TransformDescriptor, TransformOp};
use crate::vision::{AnnotationService, FaceAnnotation};
use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const EMOJI_SETS: &[&str] = &["emojis-apple", "emojis-google"];

/// Emoji image per expression; later entries win when several are plausible
pub const EMOJI_FILES: [&str; 5] = [
    "joy.png",
    "anger.png",
    "sorrow.png",
    "surprise.png",
    "none.png",
];

const EXPRESSIONLESS: &str = "none.png";

/// Emoji downloads live here, apart from the cached pipeline artifacts
const ASSET_DIR: &str = "emoji-assets";

pub fn determine_emoji(face: &FaceAnnotation) -> &'static str {
    [
        (face.joy_likelihood, "joy.png"),
        (face.anger_likelihood, "anger.png"),
        (face.sorrow_likelihood, "sorrow.png"),
        (face.surprise_likelihood, "surprise.png"),
    ]
    .iter()
    .filter(|(likelihood, _)| likelihood.is_plausible())
    .map(|(_, file)| *file)
    .last()
    .unwrap_or(EXPRESSIONLESS)
}

fn emoji_dir(scratch_dir: &Path, set: &str) -> PathBuf {
    scratch_dir.join(ASSET_DIR).join(set)
}

/// Local file an emoji from `set` is downloaded to
pub fn emoji_path(scratch_dir: &Path, set: &str, file: &str) -> PathBuf {
    emoji_dir(scratch_dir, set).join(file)
}

/// Composite operations placing one resized emoji over each face
pub fn face_composites(faces: &[FaceAnnotation], scratch_dir: &Path, set: &str) -> Vec<String> {
    faces
        .iter()
        .flat_map(|face| {
            let poly = &face.bounding_poly;
            vec![
                "(".to_string(),
                path_arg(&emoji_path(scratch_dir, set, determine_emoji(face))),
                "-resize".to_string(),
                annotation_dimensions(poly),
                ")".to_string(),
                "-geometry".to_string(),
                annotation_coordinate(poly),
                "-composite".to_string(),
            ]
        })
        .collect()
}

pub fn composite_args(
    input: &Path,
    output: &Path,
    params: &ResolvedParameters,
) -> CloudMakerResult<Vec<String>> {
    let mut args = vec![path_arg(input)];
    args.extend(params.string_list("composites"));
    args.push(path_arg(output));
    Ok(args)
}

pub struct FaceEmojis {
    vision: Arc<dyn AnnotationService>,
}

impl FaceEmojis {
    async fn download_emojis(&self, set: &str, context: &PipelineContext) -> CloudMakerResult<()> {
        tokio::fs::create_dir_all(emoji_dir(context.scratch_dir(), set)).await?;
        let downloads = EMOJI_FILES.iter().map(|file| async move {
            let destination = emoji_path(context.scratch_dir(), set, file);
            if tokio::fs::try_exists(&destination).await.unwrap_or(false) {
                return Ok(());
            }
            context
                .store()
                .download(&ArtifactLocation::new(set, *file), &destination)
                .await
        });
        try_join_all(downloads).await?;
        Ok(())
    }
}

#[async_trait]
impl Enricher for FaceEmojis {
    async fn enrich(
        &self,
        artifact: &Artifact,
        params: &ResolvedParameters,
        context: &PipelineContext,
    ) -> CloudMakerResult<Enrichment> {
        let set = params.require_text("emojiSet")?;

        let (faces, _) = tokio::try_join!(
            self.vision.faces(artifact.location()),
            self.download_emojis(&set, context)
        )?;

        app_log!(
            LogLevel::Debug,
            "transforms::emoji",
            "Found {} faces in {} (invocation: {})",
            faces.len(),
            artifact.location(),
            context.invocation_id()
        );

        let composites: Vec<Value> = face_composites(&faces, context.scratch_dir(), &set)
            .into_iter()
            .map(Value::from)
            .collect();
        Ok(Enrichment::Proceed(params.with("composites", composites)))
    }
}

pub fn emoji_transform(
    engine: Arc<dyn ImageEngine>,
    vision: Arc<dyn AnnotationService>,
) -> TransformDescriptor {
    TransformDescriptor::new(
        "emojiTransform",
        ParameterSchema::with_output("emojis", Some("cloud-maker-outputs-emojis"))
            .param(ParamSpec::choice("emojiSet", "emojis-apple", EMOJI_SETS)),
        TransformOp::enriched(FaceEmojis { vision }, ConvertCommand::new(engine, composite_args)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CloudMakerError;
    use crate::mock::{MockAnnotationService, MockImageEngine, MockObjectStore};
    use crate::vision::{BoundingPoly, Likelihood, Vertex};
    use serde_json::json;
    use tempfile::TempDir;

    fn face(joy: Likelihood, sorrow: Likelihood) -> FaceAnnotation {
        FaceAnnotation {
            bounding_poly: BoundingPoly::new(vec![
                Vertex::new(10, 10),
                Vertex::new(50, 10),
                Vertex::new(50, 60),
                Vertex::new(10, 60),
            ]),
            joy_likelihood: joy,
            sorrow_likelihood: sorrow,
            ..Default::default()
        }
    }

    fn store_with_emojis(set: &str) -> Arc<MockObjectStore> {
        let store = Arc::new(MockObjectStore::new());
        store.insert(&ArtifactLocation::new("inputs", "people.jpg"), b"jpg".to_vec());
        for file in EMOJI_FILES {
            store.insert(&ArtifactLocation::new(set, file), file.as_bytes().to_vec());
        }
        store
    }

    #[test]
    fn test_determine_emoji() {
        assert_eq!(determine_emoji(&face(Likelihood::VeryLikely, Likelihood::Unknown)), "joy.png");
        assert_eq!(determine_emoji(&face(Likelihood::Likely, Likelihood::Possible)), "sorrow.png");
        assert_eq!(
            determine_emoji(&face(Likelihood::Unlikely, Likelihood::VeryUnlikely)),
            "none.png"
        );
    }

    #[test]
    fn test_face_composites() {
        let composites = face_composites(
            &[face(Likelihood::VeryLikely, Likelihood::Unknown)],
            Path::new("/scratch"),
            "emojis-apple",
        );
        assert_eq!(
            composites,
            vec![
                "(",
                "/scratch/emoji-assets/emojis-apple/joy.png",
                "-resize",
                "40x50",
                ")",
                "-geometry",
                "+10+10",
                "-composite"
            ]
        );
    }

    #[tokio::test]
    async fn test_emoji_transform_downloads_set_and_composites() {
        let temp = TempDir::new().unwrap();
        let store = store_with_emojis("emojis-google");
        let context = PipelineContext::new("test", "outputs", temp.path(), store.clone());
        let engine = Arc::new(MockImageEngine::new());
        let vision = Arc::new(
            MockAnnotationService::new()
                .with_faces(vec![face(Likelihood::Possible, Likelihood::Unknown)]),
        );
        let descriptor = emoji_transform(engine.clone(), vision);
        let params = json!({"emojiSet": "emojis-google"});
        let params = descriptor.schema().resolve(params.as_object().unwrap());

        let output = descriptor
            .total_apply(
                &Artifact::remote(ArtifactLocation::new("inputs", "people.jpg")),
                &params,
                &context,
            )
            .await
            .unwrap();

        assert_eq!(output.name(), "emojis-people.jpg");
        // five emojis plus the source image
        assert_eq!(store.download_count(), 6);
        assert!(emoji_path(temp.path(), "emojis-google", "joy.png").exists());
        let invocation = &engine.invocations()[0];
        assert_eq!(invocation.len(), 2 + 8);
        assert!(invocation[2].ends_with("emoji-assets/emojis-google/joy.png"));
    }

    #[tokio::test]
    async fn test_cached_source_named_like_emoji_is_not_reused() {
        let temp = TempDir::new().unwrap();
        let store = store_with_emojis("emojis-apple");
        tokio::fs::write(temp.path().join("emojis-apple-joy.png"), b"someone's photo")
            .await
            .unwrap();
        tokio::fs::write(temp.path().join("joy.png"), b"another photo").await.unwrap();
        let context = PipelineContext::new("test", "outputs", temp.path(), store.clone());
        let descriptor = emoji_transform(
            Arc::new(MockImageEngine::new()),
            Arc::new(MockAnnotationService::new()),
        );
        let params = descriptor.schema().resolve(&Default::default());

        descriptor
            .total_apply(
                &Artifact::remote(ArtifactLocation::new("inputs", "people.jpg")),
                &params,
                &context,
            )
            .await
            .unwrap();

        assert_eq!(store.download_count(), 6);
        let joy = emoji_path(temp.path(), "emojis-apple", "joy.png");
        assert_eq!(tokio::fs::read(joy).await.unwrap(), b"joy.png");
    }

    #[tokio::test]
    async fn test_missing_emoji_set_fails() {
        let temp = TempDir::new().unwrap();
        let store = store_with_emojis("emojis-apple");
        let context = PipelineContext::new("test", "outputs", temp.path(), store);
        let descriptor = emoji_transform(
            Arc::new(MockImageEngine::new()),
            Arc::new(MockAnnotationService::new()),
        );
        let params = json!({"emojiSet": "emojis-google"});
        let params = descriptor.schema().resolve(params.as_object().unwrap());

        let result = descriptor
            .total_apply(
                &Artifact::remote(ArtifactLocation::new("inputs", "people.jpg")),
                &params,
                &context,
            )
            .await;

        assert!(matches!(result, Err(CloudMakerError::FetchFailed(_))));
    }

    #[test]
    fn test_emoji_set_validator() {
        let descriptor = emoji_transform(
            Arc::new(MockImageEngine::new()),
            Arc::new(MockAnnotationService::new()),
        );
        let set = descriptor.schema().get("emojiSet").unwrap();
        assert!(set.validate(&json!("emojis-google")));
        assert!(!set.validate(&json!("emojis-microsoft")));
    }
}
