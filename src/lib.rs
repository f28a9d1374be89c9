pub mod config;
pub mod engine;
pub mod error;
pub mod logger;
pub mod mock;
pub mod pipeline;
pub mod server;
pub mod storage;
pub mod vision;

use config::ServiceConfig;
use error::CloudMakerResult;

/// Load configuration and serve pipeline requests
pub async fn run() -> CloudMakerResult<()> {
    let config = ServiceConfig::from_env()?;

    app_log!(
        LogLevel::Info,
        "startup",
        "Starting cloud-maker (storage: {:?}, input: {}, output: {}, step timeout: {:?})",
        config.storage,
        config.input_bucket.as_deref().unwrap_or("<any>"),
        config.default_output_bucket.as_deref().unwrap_or("<none>"),
        config.step_timeout
    );

    server::start_server(config).await
}
