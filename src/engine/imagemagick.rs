use super::{ImageEngine, ImageInfo};
use crate::app_log;
use crate::error::{CloudMakerError, CloudMakerResult};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// Engine backed by the ImageMagick command line tools
pub struct ImageMagick {
    convert_bin: String,
    identify_bin: String,
}

impl ImageMagick {
    pub fn new(convert_bin: impl Into<String>, identify_bin: impl Into<String>) -> Self {
        Self {
            convert_bin: convert_bin.into(),
            identify_bin: identify_bin.into(),
        }
    }

    async fn run(&self, program: &str, args: &[String]) -> CloudMakerResult<String> {
        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                CloudMakerError::ApplyFailed(format!("Failed to spawn {}: {}", program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            app_log!(
                LogLevel::Error,
                "engine",
                "ImageMagick command failed for arguments {:?}: {}",
                args,
                stderr.trim()
            );
            return Err(CloudMakerError::ApplyFailed(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                stderr.trim()
            )));
        }

        app_log!(LogLevel::Debug, "engine", "ImageMagick command was successful: {:?}", args);
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for ImageMagick {
    fn default() -> Self {
        Self::new("convert", "identify")
    }
}

#[async_trait]
impl ImageEngine for ImageMagick {
    async fn convert(&self, args: &[String]) -> CloudMakerResult<()> {
        self.run(&self.convert_bin, args).await.map(|_| ())
    }

    async fn identify(&self, path: &Path) -> CloudMakerResult<ImageInfo> {
        let args = vec![
            "-format".to_string(),
            "%m %w %h".to_string(),
            // First frame only, animated inputs report one line per frame
            format!("{}[0]", path.display()),
        ];
        let stdout = self.run(&self.identify_bin, &args).await?;
        parse_identify(&stdout)
    }
}

/// Parse `identify -format "%m %w %h"` output
fn parse_identify(output: &str) -> CloudMakerResult<ImageInfo> {
    let malformed =
        || CloudMakerError::ApplyFailed(format!("Unexpected identify output: {:?}", output));
    let mut parts = output.split_whitespace();
    let format = parts.next().ok_or_else(malformed)?.to_string();
    let width = parts.next().and_then(|w| w.parse().ok()).ok_or_else(malformed)?;
    let height = parts.next().and_then(|h| h.parse().ok()).ok_or_else(malformed)?;
    Ok(ImageInfo {
        format,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identify() {
        let info = parse_identify("PNG 640 480\n").unwrap();
        assert_eq!(
            info,
            ImageInfo {
                format: "PNG".to_string(),
                width: 640,
                height: 480
            }
        );
    }

    #[test]
    fn test_parse_identify_rejects_garbage() {
        assert!(matches!(
            parse_identify("identify: no decode delegate"),
            Err(CloudMakerError::ApplyFailed(_))
        ));
        assert!(parse_identify("").is_err());
    }

    #[tokio::test]
    async fn test_missing_binary_is_apply_failure() {
        let engine =
            ImageMagick::new("cloud-maker-no-such-convert", "cloud-maker-no-such-identify");
        let result = engine.convert(&["in.png".to_string(), "out.png".to_string()]).await;
        assert!(matches!(result, Err(CloudMakerError::ApplyFailed(_))));
    }
}
