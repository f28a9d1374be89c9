use super::artifact::{Artifact, ArtifactLocation};
use super::params::ResolvedParameters;
use std::time::Duration;

/// A validated step, ready to run
///
/// Produced by the request validator; the name is known to the registry and
/// the parameters are complete.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedStep {
    pub name: String,
    pub params: ResolvedParameters,
}

impl PlannedStep {
    pub fn new(name: impl Into<String>, params: ResolvedParameters) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

/// Result of a pipeline step execution
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Transform name
    pub step_name: String,

    /// 1-based position in the pipeline
    pub index: usize,

    /// Whether the step succeeded
    pub success: bool,

    /// Error message if failed
    pub error: Option<String>,

    /// Duration of execution
    pub duration: Duration,

    /// Blob the step produced
    pub output: Option<ArtifactLocation>,
}

impl StepResult {
    /// Create a successful step result
    pub fn success(
        step_name: impl Into<String>,
        index: usize,
        output: ArtifactLocation,
        duration: Duration,
    ) -> Self {
        Self {
            step_name: step_name.into(),
            index,
            success: true,
            error: None,
            duration,
            output: Some(output),
        }
    }

    /// Create a failed step result
    pub fn failure(
        step_name: impl Into<String>,
        index: usize,
        error: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            step_name: step_name.into(),
            index,
            success: false,
            error: Some(error.into()),
            duration,
            output: None,
        }
    }
}

/// Result of a complete pipeline execution
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Pipeline name
    pub pipeline_name: String,

    /// Whether the pipeline succeeded
    pub success: bool,

    /// Results from each step that ran
    pub step_results: Vec<StepResult>,

    /// Total duration
    pub total_duration: Duration,

    /// Error message if failed
    pub error: Option<String>,

    /// Final artifact on success
    pub output: Option<Artifact>,
}

impl PipelineReport {
    /// Create a successful pipeline report
    pub fn success(
        pipeline_name: impl Into<String>,
        step_results: Vec<StepResult>,
        output: Artifact,
        total_duration: Duration,
    ) -> Self {
        Self {
            pipeline_name: pipeline_name.into(),
            success: true,
            step_results,
            total_duration,
            error: None,
            output: Some(output),
        }
    }

    /// Create a failed pipeline report
    pub fn failure(
        pipeline_name: impl Into<String>,
        step_results: Vec<StepResult>,
        error: impl Into<String>,
        total_duration: Duration,
    ) -> Self {
        Self {
            pipeline_name: pipeline_name.into(),
            success: false,
            step_results,
            total_duration,
            error: Some(error.into()),
            output: None,
        }
    }

    /// Number of steps that ran, including a failed one
    pub fn executed_steps(&self) -> usize {
        self.step_results.len()
    }

    /// The step that failed (if any)
    pub fn failed_step(&self) -> Option<&StepResult> {
        self.step_results.iter().find(|r| !r.success)
    }
}
