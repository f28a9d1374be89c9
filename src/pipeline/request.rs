//! Request Validator
//!
//! Checks the whole request before anything runs: the source descriptor, the
//! step list, every step name and every step's parameters. Only a request
//! that passes every check becomes a [`ValidatedRequest`] whose steps carry
//! resolved parameters.

use super::artifact::ArtifactLocation;
use super::core::PlannedStep;
use super::params::{resolve_parameters, validate_parameters, ParamMap};
use super::transform::TransformRegistry;
use crate::app_log;
use crate::error::{CloudMakerError, CloudMakerResult};
use serde_json::Value;

/// One entry of the request's step list, before validation
#[derive(Debug, Clone, PartialEq)]
pub struct StepRequest {
    pub name: String,
    pub parameters: ParamMap,
}

impl StepRequest {
    pub fn new(name: impl Into<String>, parameters: ParamMap) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }
}

/// A request whose shape, names and parameters all checked out
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub source: ArtifactLocation,
    /// Pipeline-wide output bucket named by the request, if any
    pub output_bucket: Option<String>,
    pub steps: Vec<PlannedStep>,
}

/// Legacy compatibility rewrite for the "bubble" layout
///
/// A request of exactly `resizeTransform, borderTransform, cropShapeTransform`
/// becomes `resize, cropShape, border, cropShape`, so the border follows the
/// cropped outline instead of the rectangular frame.
pub struct BorderedShapeRewrite;

impl BorderedShapeRewrite {
    const PATTERN: [&'static str; 3] = ["resizeTransform", "borderTransform", "cropShapeTransform"];

    pub fn name(&self) -> &'static str {
        "bordered-shape"
    }

    pub fn matches(&self, steps: &[StepRequest]) -> bool {
        steps.len() == Self::PATTERN.len()
            && steps.iter().zip(Self::PATTERN).all(|(step, name)| step.name == name)
    }

    pub fn apply(&self, steps: Vec<StepRequest>) -> Vec<StepRequest> {
        if !self.matches(&steps) {
            return steps;
        }
        let (resize, border, shape) = (steps[0].clone(), steps[1].clone(), steps[2].clone());
        vec![resize, shape.clone(), border, shape]
    }
}

pub struct RequestValidator<'a> {
    registry: &'a TransformRegistry,
    shape_rewrite: Option<BorderedShapeRewrite>,
}

impl<'a> RequestValidator<'a> {
    pub fn new(registry: &'a TransformRegistry) -> Self {
        Self {
            registry,
            shape_rewrite: None,
        }
    }

    /// Enable the legacy resize/border/crop-shape rewrite
    pub fn with_shape_rewrite(mut self, enabled: bool) -> Self {
        self.shape_rewrite = enabled.then_some(BorderedShapeRewrite);
        self
    }

    /// Validate a request body and resolve every step's parameters
    pub fn validate(&self, body: &Value) -> CloudMakerResult<ValidatedRequest> {
        let body = match body {
            Value::Null => {
                return Err(CloudMakerError::shape(
                    "Invalid request: Missing body parameter.",
                ))
            }
            Value::Object(map) => map,
            _ => {
                return Err(CloudMakerError::shape(
                    "Invalid request: Body should be a JSON object.",
                ))
            }
        };

        let data = body
            .get("data")
            .filter(|value| is_truthy(value))
            .ok_or_else(|| CloudMakerError::shape("Invalid request: Missing input data."))?;
        let functions = body
            .get("functions")
            .filter(|value| is_truthy(value))
            .ok_or_else(|| CloudMakerError::shape("Invalid request: Missing functions list."))?;

        let source = validate_data(data)?;

        let functions = functions
            .as_array()
            .ok_or_else(|| CloudMakerError::shape("Invalid request: Functions should be a list."))?;
        let mut steps = functions
            .iter()
            .map(|function| self.validate_function(function))
            .collect::<CloudMakerResult<Vec<_>>>()?;

        if let Some(rule) = &self.shape_rewrite {
            if rule.matches(&steps) {
                app_log!(
                    LogLevel::Info,
                    "request",
                    "Applying compatibility rewrite '{}'",
                    rule.name()
                );
                steps = rule.apply(steps);
            }
        }

        let steps = steps
            .into_iter()
            .map(|step| {
                let params = resolve_parameters(self.registry, &step.name, &step.parameters)?;
                Ok(PlannedStep::new(step.name, params))
            })
            .collect::<CloudMakerResult<Vec<_>>>()?;

        let output_bucket = match body.get("outputBucketName") {
            None | Some(Value::Null) => None,
            Some(Value::String(bucket)) if bucket.is_empty() => None,
            Some(Value::String(bucket)) => Some(bucket.clone()),
            Some(_) => {
                return Err(CloudMakerError::shape(
                    "Invalid request: outputBucketName should be a string.",
                ))
            }
        };

        Ok(ValidatedRequest {
            source,
            output_bucket,
            steps,
        })
    }

    /// Check one step entry: its name is known and its parameters fit the schema
    pub fn validate_function(&self, function: &Value) -> CloudMakerResult<StepRequest> {
        let name = match function.get("name") {
            Some(Value::String(name)) if !name.is_empty() => name.clone(),
            _ => return Err(CloudMakerError::shape("No function name specified")),
        };
        self.registry.require(&name)?;

        let parameters = match function.get("parameters") {
            None | Some(Value::Null) => ParamMap::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(CloudMakerError::shape(format!(
                    "Parameters for function {} should be an object",
                    name
                )))
            }
        };

        validate_parameters(self.registry, &name, &parameters)?;
        Ok(StepRequest::new(name, parameters))
    }
}

/// Check the source descriptor `{bucket, name}`
pub fn validate_data(data: &Value) -> CloudMakerResult<ArtifactLocation> {
    if data.is_array() {
        return Err(CloudMakerError::shape("Data should be a single object, not an array"));
    }

    let field = |key: &str| match data.get(key) {
        Some(Value::String(value)) if !value.is_empty() => Some(value.clone()),
        _ => None,
    };

    let bucket = field("bucket").ok_or_else(|| CloudMakerError::shape("No bucket specified"))?;
    let name = field("name").ok_or_else(|| CloudMakerError::shape("No name specified"))?;
    Ok(ArtifactLocation::new(bucket, name))
}

/// Source descriptor of a request body, for endpoints that run no steps
pub fn validate_source(body: &Value) -> CloudMakerResult<ArtifactLocation> {
    if body.is_null() {
        return Err(CloudMakerError::shape("Invalid request: Missing body parameter."));
    }
    let data = body
        .get("data")
        .filter(|value| is_truthy(value))
        .ok_or_else(|| CloudMakerError::shape("Invalid request: Missing input data."))?;
    validate_data(data)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
