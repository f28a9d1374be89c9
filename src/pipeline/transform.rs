//! Transform Registry contract
//!
//! A transform is a named [`TransformDescriptor`]: a [`ParameterSchema`] plus a
//! [`TransformOp`]. Simple ops only touch local files. Enriched ops first ask
//! an external service for extra parameters, then run the same local-file
//! contract with the enriched parameter set.

use super::adapter::TransformAdapter;
use super::artifact::Artifact;
use super::context::PipelineContext;
use super::params::{ParameterSchema, ResolvedParameters};
use super::transforms;
use crate::engine::ImageEngine;
use crate::error::{CloudMakerError, CloudMakerResult};
use crate::vision::AnnotationService;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Local-file operation: read `input`, write `output`
#[async_trait]
pub trait RawTransform: Send + Sync {
    async fn apply(
        &self,
        input: &Path,
        output: &Path,
        params: &ResolvedParameters,
    ) -> CloudMakerResult<()>;
}

/// Outcome of an enrichment phase
#[derive(Debug, Clone, PartialEq)]
pub enum Enrichment {
    /// Run the apply phase with these parameters
    Proceed(ResolvedParameters),
    /// Skip the apply phase; the step yields its input artifact
    Passthrough,
}

/// Derives extra parameters for an artifact from an external service
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(
        &self,
        artifact: &Artifact,
        params: &ResolvedParameters,
        context: &PipelineContext,
    ) -> CloudMakerResult<Enrichment>;
}

#[derive(Clone)]
pub enum TransformOp {
    Simple(Arc<dyn RawTransform>),
    Enriched {
        enrich: Arc<dyn Enricher>,
        apply: Arc<dyn RawTransform>,
    },
}

impl TransformOp {
    pub fn simple<R: RawTransform + 'static>(apply: R) -> Self {
        TransformOp::Simple(Arc::new(apply))
    }

    pub fn enriched<E, R>(enrich: E, apply: R) -> Self
    where
        E: Enricher + 'static,
        R: RawTransform + 'static,
    {
        TransformOp::Enriched {
            enrich: Arc::new(enrich),
            apply: Arc::new(apply),
        }
    }

    /// The local-file phase shared by both variants
    pub fn raw(&self) -> &Arc<dyn RawTransform> {
        match self {
            TransformOp::Simple(apply) => apply,
            TransformOp::Enriched { apply, .. } => apply,
        }
    }

    pub fn is_enriched(&self) -> bool {
        matches!(self, TransformOp::Enriched { .. })
    }
}

/// One registered step kind
#[derive(Clone)]
pub struct TransformDescriptor {
    name: &'static str,
    schema: ParameterSchema,
    op: TransformOp,
}

impl TransformDescriptor {
    pub fn new(name: &'static str, schema: ParameterSchema, op: TransformOp) -> Self {
        Self { name, schema, op }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn schema(&self) -> &ParameterSchema {
        &self.schema
    }

    pub fn op(&self) -> &TransformOp {
        &self.op
    }

    /// Artifact-to-artifact form of this transform
    pub async fn total_apply(
        &self,
        artifact: &Artifact,
        params: &ResolvedParameters,
        context: &PipelineContext,
    ) -> CloudMakerResult<Artifact> {
        TransformAdapter::new(self).run(artifact, params, context).await
    }
}

/// Closed catalog of transforms, fixed at startup
#[derive(Clone, Default)]
pub struct TransformRegistry {
    transforms: BTreeMap<&'static str, TransformDescriptor>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in transform
    pub fn builtin(engine: Arc<dyn ImageEngine>, vision: Arc<dyn AnnotationService>) -> Self {
        let mut registry = Self::new();
        transforms::register_all(&mut registry, engine, vision);
        registry
    }

    pub fn register(&mut self, descriptor: TransformDescriptor) {
        self.transforms.insert(descriptor.name(), descriptor);
    }

    pub fn get(&self, name: &str) -> Option<&TransformDescriptor> {
        self.transforms.get(name)
    }

    pub fn require(&self, name: &str) -> CloudMakerResult<&TransformDescriptor> {
        self.get(name)
            .ok_or_else(|| CloudMakerError::UnknownTransform(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.transforms.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockAnnotationService, MockImageEngine};

    fn registry() -> TransformRegistry {
        TransformRegistry::builtin(
            Arc::new(MockImageEngine::new()),
            Arc::new(MockAnnotationService::new()),
        )
    }

    #[test]
    fn test_builtin_catalog() {
        let registry = registry();
        let names = registry.names();
        for expected in [
            "copyImage",
            "convertRasterFormat",
            "resizeTransform",
            "rotateTransform",
            "reflectTransform",
            "filterTransform",
            "borderTransform",
            "blurTransform",
            "captionTransform",
            "landmarkTransform",
            "blurFacesTransform",
            "blurLogosTransform",
            "cropShapeTransform",
            "safeSearchTransform",
            "emojiTransform",
            "dogeTransform",
        ] {
            assert!(names.contains(&expected), "missing {}", expected);
        }
        assert_eq!(registry.len(), 16);
    }

    #[test]
    fn test_every_schema_declares_output_keys() {
        let registry = registry();
        for name in registry.names() {
            let schema = registry.get(name).unwrap().schema();
            assert!(schema.get("outputPrefix").is_some(), "{} lacks outputPrefix", name);
            assert!(schema.get("outputBucketName").is_some(), "{} lacks outputBucketName", name);
            for key in schema.keys() {
                let spec = schema.get(key).unwrap();
                assert!(spec.validate(&spec.default), "{}.{} default is invalid", name, key);
            }
        }
    }

    #[test]
    fn test_enriched_variants() {
        let registry = registry();
        assert!(!registry.get("resizeTransform").unwrap().op().is_enriched());
        assert!(registry.get("safeSearchTransform").unwrap().op().is_enriched());
        assert!(registry.get("cropShapeTransform").unwrap().op().is_enriched());
    }

    #[test]
    fn test_require_unknown() {
        let err = registry().require("sharpenTransform").err().unwrap();
        assert_eq!(err.to_string(), "No function exists with name sharpenTransform");
        assert!(err.is_client_error());
    }
}
