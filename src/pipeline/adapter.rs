//! Transform Adapter
//!
//! Turns a [`TransformOp`] into an artifact-to-artifact step:
//!
//! ```text
//! artifact ──► enrich? ──► ensure_local ──► reserve_local ──► raw apply ──► upload ──► artifact'
//!                 │
//!                 └── Passthrough ──────────────────────────────────────────────────► artifact
//! ```

use super::artifact::{change_extension, output_file_name, Artifact, ArtifactLocation};
use super::context::PipelineContext;
use super::params::ResolvedParameters;
use super::transform::{Enrichment, TransformDescriptor, TransformOp};
use crate::app_log;
use crate::error::{CloudMakerError, CloudMakerResult};

pub struct TransformAdapter<'a> {
    descriptor: &'a TransformDescriptor,
}

impl<'a> TransformAdapter<'a> {
    pub fn new(descriptor: &'a TransformDescriptor) -> Self {
        Self { descriptor }
    }

    /// Run enrichment (if any) and the local-file phase, producing a new artifact
    pub async fn run(
        &self,
        artifact: &Artifact,
        params: &ResolvedParameters,
        context: &PipelineContext,
    ) -> CloudMakerResult<Artifact> {
        let params = match self.descriptor.op() {
            TransformOp::Simple(_) => params.clone(),
            TransformOp::Enriched { enrich, .. } => {
                match enrich.enrich(artifact, params, context).await? {
                    Enrichment::Proceed(enriched) => enriched,
                    Enrichment::Passthrough => {
                        app_log!(
                            LogLevel::Info,
                            "adapter",
                            "{} passed {} through unchanged (invocation: {})",
                            self.descriptor.name(),
                            artifact.location(),
                            context.invocation_id()
                        );
                        return Ok(artifact.clone());
                    }
                }
            }
        };

        self.apply_local(artifact, &params, context).await
    }

    async fn apply_local(
        &self,
        artifact: &Artifact,
        params: &ResolvedParameters,
        context: &PipelineContext,
    ) -> CloudMakerResult<Artifact> {
        let name = self.descriptor.name();
        let output_location = output_location(artifact, params, context);

        let input = context.cache().ensure_local(artifact).await?;
        let output = context.cache().reserve_local(&output_location).await?;

        if let Err(e) = self
            .descriptor
            .op()
            .raw()
            .apply(&input, &output, params)
            .await
        {
            app_log!(
                LogLevel::Error,
                "adapter",
                "{} failed on {}: {} (invocation: {})",
                name,
                artifact.location(),
                e,
                context.invocation_id()
            );
            return Err(e);
        }

        if !tokio::fs::try_exists(&output).await.unwrap_or(false) {
            return Err(CloudMakerError::ApplyFailed(format!(
                "{} produced no output at {}",
                name,
                output.display()
            )));
        }

        app_log!(
            LogLevel::Debug,
            "adapter",
            "Uploading {} to {}",
            output.display(),
            output_location
        );
        context.store().upload(&output, &output_location).await?;

        Ok(Artifact::materialized(output_location, output))
    }
}

/// Where a step writes its result
///
/// The blob is `prefix-base` (extension replaced when the schema has an
/// `extension` parameter) in the caller's `outputBucketName`, or the
/// invocation's default bucket when the caller did not name one.
pub fn output_location(
    artifact: &Artifact,
    params: &ResolvedParameters,
    context: &PipelineContext,
) -> ArtifactLocation {
    let mut name = output_file_name(params.text("outputPrefix").as_deref(), artifact.name());
    if let Some(extension) = params.text("extension") {
        name = change_extension(&name, &extension.to_lowercase());
    }

    let bucket = params
        .is_supplied("outputBucketName")
        .then(|| params.text("outputBucketName"))
        .flatten()
        .unwrap_or_else(|| context.default_output_bucket().to_string());

    ArtifactLocation::new(bucket, name)
}
