//! Service configuration loaded once from the environment (`.env` honoured).

use crate::error::{CloudMakerError, CloudMakerResult};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Once;
use std::time::Duration;

static DOTENV: Once = Once::new();

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_STEP_TIMEOUT_SECS: u64 = 120;
const DEFAULT_VISION_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Which object storage backend serves bucket reads and writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Buckets are directories under `root`
    Filesystem { root: PathBuf },
    /// Google Cloud Storage JSON API
    Gcs,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    /// Pipeline-wide output bucket used when a request does not name one
    pub default_output_bucket: Option<String>,
    /// Bucket uploads usually arrive in; reported at startup only
    pub input_bucket: Option<String>,
    pub scratch_root: PathBuf,
    pub step_timeout: Option<Duration>,
    pub storage: StorageBackend,
    pub access_token: Option<String>,
    pub vision_api_key: Option<String>,
    pub vision_endpoint: String,
    pub convert_bin: String,
    pub identify_bin: String,
    pub compat_shape_rewrite: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 8080))),
            default_output_bucket: None,
            input_bucket: None,
            scratch_root: env::temp_dir().join("cloud-maker"),
            step_timeout: Some(Duration::from_secs(DEFAULT_STEP_TIMEOUT_SECS)),
            storage: StorageBackend::Filesystem {
                root: PathBuf::from("./buckets"),
            },
            access_token: None,
            vision_api_key: None,
            vision_endpoint: DEFAULT_VISION_ENDPOINT.to_string(),
            convert_bin: "convert".to_string(),
            identify_bin: "identify".to_string(),
            compat_shape_rewrite: false,
        }
    }
}

impl ServiceConfig {
    /// Read the configuration from process environment variables
    pub fn from_env() -> CloudMakerResult<Self> {
        DOTENV.call_once(|| {
            let _ = dotenvy::dotenv();
        });
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> CloudMakerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = match non_empty("CLOUD_MAKER_BIND_ADDR") {
            Some(v) => v.parse().map_err(|e| {
                CloudMakerError::ConfigError(format!("CLOUD_MAKER_BIND_ADDR '{}': {}", v, e))
            })?,
            None => defaults.bind_addr,
        };

        let step_timeout = match non_empty("CLOUD_MAKER_STEP_TIMEOUT_SECS") {
            Some(v) => {
                let secs: u64 = v.trim().parse().map_err(|_| {
                    CloudMakerError::ConfigError(format!(
                        "CLOUD_MAKER_STEP_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                        v
                    ))
                })?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => defaults.step_timeout,
        };

        let storage = match non_empty("CLOUD_MAKER_STORAGE").as_deref() {
            None | Some("fs") => StorageBackend::Filesystem {
                root: non_empty("CLOUD_MAKER_STORAGE_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./buckets")),
            },
            Some("gcs") => StorageBackend::Gcs,
            Some(other) => {
                return Err(CloudMakerError::ConfigError(format!(
                    "CLOUD_MAKER_STORAGE must be 'fs' or 'gcs', got '{}'",
                    other
                )))
            }
        };

        let compat_shape_rewrite = match non_empty("CLOUD_MAKER_COMPAT_SHAPE_REWRITE") {
            Some(v) => parse_bool(&v).ok_or_else(|| {
                CloudMakerError::ConfigError(format!(
                    "CLOUD_MAKER_COMPAT_SHAPE_REWRITE must be a boolean, got '{}'",
                    v
                ))
            })?,
            None => defaults.compat_shape_rewrite,
        };

        Ok(Self {
            bind_addr,
            default_output_bucket: non_empty("OUTPUT_BUCKET"),
            input_bucket: non_empty("INPUT_BUCKET"),
            scratch_root: non_empty("CLOUD_MAKER_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_root),
            step_timeout,
            storage,
            access_token: non_empty("GCS_ACCESS_TOKEN"),
            vision_api_key: non_empty("VISION_API_KEY"),
            vision_endpoint: non_empty("VISION_ENDPOINT").unwrap_or(defaults.vision_endpoint),
            convert_bin: non_empty("IMAGEMAGICK_CONVERT").unwrap_or(defaults.convert_bin),
            identify_bin: non_empty("IMAGEMAGICK_IDENTIFY").unwrap_or(defaults.identify_bin),
            compat_shape_rewrite,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
