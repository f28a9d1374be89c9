//! Image transform pipelines
//!
//! A pipeline threads one [`Artifact`] through an ordered list of named
//! transforms. Every transform is looked up in a [`TransformRegistry`], its
//! parameters are validated and defaulted up front, and each step downloads
//! its input (or reuses the local copy), runs an image operation and uploads
//! the result. The first failing step fails the whole pipeline.
//!
//! # Example
//! ```no_run
//! use cloud_maker::mock::{MockAnnotationService, MockImageEngine, MockObjectStore};
//! use cloud_maker::pipeline::{
//!     Artifact, ArtifactLocation, Pipeline, PipelineContext, PlannedStep, TransformRegistry,
//! };
//! use cloud_maker::pipeline::params::ParamMap;
//! use std::sync::Arc;
//!
//! # async fn demo() -> cloud_maker::error::CloudMakerResult<()> {
//! let registry = Arc::new(TransformRegistry::builtin(
//!     Arc::new(MockImageEngine::new()),
//!     Arc::new(MockAnnotationService::new()),
//! ));
//! let resize = registry.require("resizeTransform")?;
//! let params = resize.schema().resolve(&ParamMap::new());
//!
//! let pipeline = Pipeline::builder("thumbnail", registry.clone())
//!     .add_step(PlannedStep::new("resizeTransform", params))
//!     .build();
//!
//! let mut context = PipelineContext::new(
//!     "invocation-1",
//!     "cloud-maker-outputs",
//!     "/tmp/cloud-maker/invocation-1",
//!     Arc::new(MockObjectStore::new()),
//! );
//! let source = Artifact::remote(ArtifactLocation::new("uploads", "cat.png"));
//! let output = pipeline.run(source, &mut context).await?;
//! println!("{}", output.location());
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod artifact;
pub mod cache;
pub mod context;
pub mod core;
pub mod executor;
pub mod params;
pub mod request;
pub mod transform;
pub mod transforms;

// Re-export main types
pub use adapter::TransformAdapter;
pub use artifact::{Artifact, ArtifactLocation};
pub use cache::LocalArtifactCache;
pub use context::PipelineContext;
pub use core::{PipelineReport, PlannedStep, StepResult};
pub use executor::{Pipeline, PipelineBuilder};
pub use params::{ParameterSchema, ResolvedParameters};
pub use request::{RequestValidator, ValidatedRequest};
pub use transform::{TransformDescriptor, TransformRegistry};
