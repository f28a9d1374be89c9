//! Transforms that only need the image engine

use super::geometry::google_color;
use super::{path_arg, ConvertCommand};
use crate::engine::ImageEngine;
use crate::error::{CloudMakerError, CloudMakerResult};
use crate::pipeline::params::{ParamSpec, ParameterSchema, ResolvedParameters};
use crate::pipeline::transform::{RawTransform, TransformDescriptor, TransformOp};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub const RASTER_EXTENSIONS: &[&str] = &[".jpg", ".png", ".gif"];
pub const AXES: &[&str] = &["x", "y"];
pub const FILTERS: &[&str] = &["sepia", "grayscale", "colorize"];
pub const BORDER_COLORS: &[&str] = &["blue", "green", "yellow", "red"];

/// Byte-for-byte copy of the input
pub struct CopyFile;

#[async_trait]
impl RawTransform for CopyFile {
    async fn apply(
        &self,
        input: &Path,
        output: &Path,
        _params: &ResolvedParameters,
    ) -> CloudMakerResult<()> {
        tokio::fs::copy(input, output).await.map_err(|e| {
            CloudMakerError::ApplyFailed(format!(
                "Failed to copy {} to {}: {}",
                input.display(),
                output.display(),
                e
            ))
        })?;
        Ok(())
    }
}

pub fn copy_image() -> TransformDescriptor {
    TransformDescriptor::new(
        "copyImage",
        ParameterSchema::with_output("copied", Some("outputs-copied")),
        TransformOp::simple(CopyFile),
    )
}

/// The output extension decides the format, so the engine only needs both paths
pub fn convert_args(
    input: &Path,
    output: &Path,
    _params: &ResolvedParameters,
) -> CloudMakerResult<Vec<String>> {
    Ok(vec![path_arg(input), path_arg(output)])
}

pub fn convert_raster_format(engine: Arc<dyn ImageEngine>) -> TransformDescriptor {
    TransformDescriptor::new(
        "convertRasterFormat",
        ParameterSchema::with_output("converted", Some("cloud-maker-outputs-converted"))
            .param(ParamSpec::choice_ignore_case("extension", ".png", RASTER_EXTENSIONS)),
        TransformOp::simple(ConvertCommand::new(engine, convert_args)),
    )
}

pub fn resize_args(
    input: &Path,
    output: &Path,
    params: &ResolvedParameters,
) -> CloudMakerResult<Vec<String>> {
    Ok(vec![
        path_arg(input),
        "-resize".to_string(),
        format!("{}x{}", params.integer("width")?, params.integer("height")?),
        path_arg(output),
    ])
}

pub fn resize_transform(engine: Arc<dyn ImageEngine>) -> TransformDescriptor {
    TransformDescriptor::new(
        "resizeTransform",
        ParameterSchema::with_output("resized", Some("cloud-maker-outputs-resized"))
            .param(ParamSpec::integer("width", 200))
            .param(ParamSpec::integer("height", 200)),
        TransformOp::simple(ConvertCommand::new(engine, resize_args)),
    )
}

pub fn rotate_args(
    input: &Path,
    output: &Path,
    params: &ResolvedParameters,
) -> CloudMakerResult<Vec<String>> {
    Ok(vec![
        path_arg(input),
        "-rotate".to_string(),
        params.integer("degrees")?.to_string(),
        path_arg(output),
    ])
}

pub fn rotate_transform(engine: Arc<dyn ImageEngine>) -> TransformDescriptor {
    TransformDescriptor::new(
        "rotateTransform",
        ParameterSchema::with_output("rotated", Some("cloud-maker-outputs-rotated"))
            .param(ParamSpec::integer("degrees", 90)),
        TransformOp::simple(ConvertCommand::new(engine, rotate_args)),
    )
}

/// `x` mirrors top to bottom, `y` left to right
pub fn reflect_args(
    input: &Path,
    output: &Path,
    params: &ResolvedParameters,
) -> CloudMakerResult<Vec<String>> {
    let flag = match params.require_text("axis")?.as_str() {
        "x" => "-flip",
        "y" => "-flop",
        other => {
            return Err(CloudMakerError::ApplyFailed(format!("Unknown axis {}", other)));
        }
    };
    Ok(vec![path_arg(input), flag.to_string(), path_arg(output)])
}

pub fn reflect_transform(engine: Arc<dyn ImageEngine>) -> TransformDescriptor {
    TransformDescriptor::new(
        "reflectTransform",
        ParameterSchema::with_output("reflected", Some("cloud-maker-outputs-reflected"))
            .param(ParamSpec::choice("axis", "x", AXES)),
        TransformOp::simple(ConvertCommand::new(engine, reflect_args)),
    )
}

pub fn filter_args(
    input: &Path,
    output: &Path,
    params: &ResolvedParameters,
) -> CloudMakerResult<Vec<String>> {
    let filter: Vec<String> = match params.require_text("filterName")?.to_lowercase().as_str() {
        "sepia" => vec!["-sepia-tone".into(), "80%".into()],
        "grayscale" => vec!["-colorspace".into(), "Gray".into()],
        "colorize" => vec!["-modulate".into(), format!("100,100,{}", params.integer("hue")?)],
        other => {
            return Err(CloudMakerError::ApplyFailed(format!("Unknown filter {}", other)));
        }
    };

    let mut args = vec![path_arg(input)];
    args.extend(filter);
    args.push(path_arg(output));
    Ok(args)
}

pub fn filter_transform(engine: Arc<dyn ImageEngine>) -> TransformDescriptor {
    TransformDescriptor::new(
        "filterTransform",
        ParameterSchema::with_output("filtered", Some("cloud-maker-outputs-filtered"))
            .param(ParamSpec::choice_ignore_case("filterName", "sepia", FILTERS))
            .param(ParamSpec::bounded_integer("hue", 100, 0, 200)),
        TransformOp::simple(ConvertCommand::new(engine, filter_args)),
    )
}

/// Border as a percentage of the image size, in a Google palette color
pub fn border_args(
    input: &Path,
    output: &Path,
    params: &ResolvedParameters,
) -> CloudMakerResult<Vec<String>> {
    let color = params.require_text("color")?;
    let hex = google_color(&color)
        .ok_or_else(|| CloudMakerError::ApplyFailed(format!("Unknown border color {}", color)))?;
    let width = params.integer("width")?;

    Ok(vec![
        path_arg(input),
        "-bordercolor".to_string(),
        hex.to_string(),
        "-border".to_string(),
        format!("{}%x{}%", width, width),
        path_arg(output),
    ])
}

pub fn border_transform(engine: Arc<dyn ImageEngine>) -> TransformDescriptor {
    TransformDescriptor::new(
        "borderTransform",
        ParameterSchema::with_output("bordered", Some("cloud-maker-outputs-bordered"))
            .param(ParamSpec::choice_ignore_case("color", "blue", BORDER_COLORS))
            .param(ParamSpec::bounded_integer("width", "1", 1, 100)),
        TransformOp::simple(ConvertCommand::new(engine, border_args)),
    )
}

pub fn blur_args(
    input: &Path,
    output: &Path,
    _params: &ResolvedParameters,
) -> CloudMakerResult<Vec<String>> {
    Ok(vec![
        path_arg(input),
        "-channel".to_string(),
        "RGBA".to_string(),
        "-blur".to_string(),
        "0x24".to_string(),
        path_arg(output),
    ])
}

pub fn blur_schema() -> ParameterSchema {
    ParameterSchema::with_output("blurred", Some("cloud-maker-outputs-blurred"))
}

pub fn blur_transform(engine: Arc<dyn ImageEngine>) -> TransformDescriptor {
    TransformDescriptor::new(
        "blurTransform",
        blur_schema(),
        TransformOp::simple(ConvertCommand::new(engine, blur_args)),
    )
}
