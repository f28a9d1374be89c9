use super::artifact::Artifact;
use super::context::PipelineContext;
use super::core::{PipelineReport, PlannedStep, StepResult};
use super::transform::TransformRegistry;
use crate::app_log;
use crate::error::{CloudMakerError, CloudMakerResult};
use std::sync::Arc;
use std::time::Instant;

/// Pipeline executor that runs steps sequentially
///
/// Execution is a strict left fold over the steps: each step receives the
/// artifact produced by the one before it, and the first failure stops the
/// fold.
///
/// # Example
/// ```ignore
/// let pipeline = Pipeline::builder("request", registry)
///     .add_step(PlannedStep::new("resizeTransform", params))
///     .build();
///
/// let output = pipeline.run(source, &mut context).await?;
/// ```
pub struct Pipeline {
    name: String,
    registry: Arc<TransformRegistry>,
    steps: Vec<PlannedStep>,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder(name: impl Into<String>, registry: Arc<TransformRegistry>) -> PipelineBuilder {
        PipelineBuilder::new(name, registry)
    }

    /// Get the pipeline name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of steps
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn steps(&self) -> &[PlannedStep] {
        &self.steps
    }

    /// Thread `initial` through every step, failing on the first step error
    ///
    /// An empty pipeline returns `initial` unchanged.
    pub async fn run(
        &self,
        initial: Artifact,
        context: &mut PipelineContext,
    ) -> CloudMakerResult<Artifact> {
        self.execute_internal(initial, context).await.1
    }

    /// Same as `run()` but returns a per-step report instead of an error
    pub async fn execute(
        &self,
        initial: Artifact,
        context: &mut PipelineContext,
    ) -> PipelineReport {
        let start = Instant::now();
        let (step_results, outcome) = self.execute_internal(initial, context).await;
        match outcome {
            Ok(output) => {
                PipelineReport::success(&self.name, step_results, output, start.elapsed())
            }
            Err(e) => {
                PipelineReport::failure(&self.name, step_results, e.to_string(), start.elapsed())
            }
        }
    }

    async fn execute_internal(
        &self,
        initial: Artifact,
        context: &mut PipelineContext,
    ) -> (Vec<StepResult>, CloudMakerResult<Artifact>) {
        app_log!(
            LogLevel::Info,
            "pipeline",
            "Starting pipeline '{}' with {} steps on {} (invocation: {})",
            self.name,
            self.steps.len(),
            initial.location(),
            context.invocation_id()
        );

        let pipeline_start = Instant::now();
        let mut step_results = Vec::with_capacity(self.steps.len());

        // Store pipeline name in context metadata
        context.set_metadata("pipeline_name", &self.name);
        let context = &*context;

        let mut artifact = initial;
        for (position, step) in self.steps.iter().enumerate() {
            let index = position + 1;

            app_log!(
                LogLevel::Info,
                "pipeline",
                "Executing step {}/{}: {} (invocation: {})",
                index,
                self.steps.len(),
                step.name,
                context.invocation_id()
            );

            let step_start = Instant::now();
            let outcome = self.run_step(step, &artifact, context).await;
            let duration = step_start.elapsed();

            match outcome {
                Ok(next) => {
                    app_log!(
                        LogLevel::Info,
                        "pipeline",
                        "Step '{}' completed in {:.2}s producing {} (invocation: {})",
                        step.name,
                        duration.as_secs_f64(),
                        next.location(),
                        context.invocation_id()
                    );
                    step_results.push(StepResult::success(
                        &step.name,
                        index,
                        next.location().clone(),
                        duration,
                    ));
                    artifact = next;
                }
                Err(e) => {
                    app_log!(
                        LogLevel::Error,
                        "pipeline",
                        "Step '{}' failed: {} (invocation: {})",
                        step.name,
                        e,
                        context.invocation_id()
                    );
                    step_results.push(StepResult::failure(
                        &step.name,
                        index,
                        e.to_string(),
                        duration,
                    ));
                    let error = CloudMakerError::StepFailed {
                        step: step.name.clone(),
                        index,
                        source: Box::new(e),
                    };
                    return (step_results, Err(error));
                }
            }
        }

        app_log!(
            LogLevel::Info,
            "pipeline",
            "Pipeline '{}' completed in {:.2}s with {} (invocation: {})",
            self.name,
            pipeline_start.elapsed().as_secs_f64(),
            artifact.location(),
            context.invocation_id()
        );

        (step_results, Ok(artifact))
    }

    /// One step's total transform, bounded by the context's step timeout
    async fn run_step(
        &self,
        step: &PlannedStep,
        artifact: &Artifact,
        context: &PipelineContext,
    ) -> CloudMakerResult<Artifact> {
        let descriptor = self.registry.require(&step.name)?;
        let apply = descriptor.total_apply(artifact, &step.params, context);

        match context.step_timeout() {
            Some(limit) => tokio::time::timeout(limit, apply).await.unwrap_or_else(|_| {
                Err(CloudMakerError::StepTimeout {
                    step: step.name.clone(),
                    millis: limit.as_millis(),
                })
            }),
            None => apply.await,
        }
    }
}

/// Builder for constructing pipelines
pub struct PipelineBuilder {
    name: String,
    registry: Arc<TransformRegistry>,
    steps: Vec<PlannedStep>,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new(name: impl Into<String>, registry: Arc<TransformRegistry>) -> Self {
        Self {
            name: name.into(),
            registry,
            steps: Vec::new(),
        }
    }

    /// Add a step to the pipeline
    pub fn add_step(mut self, step: PlannedStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Add several steps, in order
    pub fn add_steps(mut self, steps: impl IntoIterator<Item = PlannedStep>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Pipeline {
        Pipeline {
            name: self.name,
            registry: self.registry,
            steps: self.steps,
        }
    }
}
