//! HTTP surface of the pipeline service

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::app_log;
use crate::config::ServiceConfig;
use crate::engine::ImageMagick;
use crate::error::{CloudMakerError, CloudMakerResult};
use crate::logger::{LogLevel, LOGGER};
use crate::pipeline::request::validate_source;
use crate::pipeline::{
    Artifact, ArtifactLocation, Pipeline, PipelineContext, RequestValidator, TransformRegistry,
};
use crate::storage::{self, ObjectStore};
use crate::vision::{AnnotationService, CloudVisionClient};

/// Requests only carry a source descriptor and a step list
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Server state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub registry: Arc<TransformRegistry>,
    pub store: Arc<dyn ObjectStore>,
    pub vision: Arc<dyn AnnotationService>,
}

impl AppState {
    pub fn new(
        config: ServiceConfig,
        registry: Arc<TransformRegistry>,
        store: Arc<dyn ObjectStore>,
        vision: Arc<dyn AnnotationService>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            store,
            vision,
        }
    }

    /// Wire the real collaborators named by `config`
    pub fn from_config(config: ServiceConfig) -> CloudMakerResult<Self> {
        let client = reqwest::Client::builder().build()?;
        let store = storage::from_config(&config, client.clone())?;
        let vision: Arc<dyn AnnotationService> = Arc::new(CloudVisionClient::new(
            client,
            config.vision_endpoint.clone(),
            config.vision_api_key.clone(),
            config.access_token.clone(),
        ));
        let engine = Arc::new(ImageMagick::new(
            config.convert_bin.clone(),
            config.identify_bin.clone(),
        ));
        let registry = Arc::new(TransformRegistry::builtin(engine, vision.clone()));
        Ok(Self::new(config, registry, store, vision))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(run_pipeline))
        .route("/check-safety", post(check_safety))
        .route("/health", get(|| async { "OK" }))
        .route("/logs", get(get_logs).delete(clear_logs))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured address and serve until the process stops
pub async fn start_server(config: ServiceConfig) -> CloudMakerResult<()> {
    let bind_addr = config.bind_addr;
    let state = AppState::from_config(config)?;

    let listener = tokio::net::TcpListener::bind(bind_addr).await.map_err(|e| {
        app_log!(LogLevel::Error, "server", "Failed to bind {}: {}", bind_addr, e);
        e
    })?;

    app_log!(
        LogLevel::Info,
        "server",
        "Pipeline server listening on http://{} ({} transforms)",
        bind_addr,
        state.registry.len()
    );

    axum::serve(listener, router(state)).await?;

    app_log!(LogLevel::Info, "server", "Pipeline server stopped gracefully");
    Ok(())
}

fn error_response(error: CloudMakerError) -> Response {
    let (status, level) = if error.is_client_error() {
        (StatusCode::BAD_REQUEST, LogLevel::Warn)
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, LogLevel::Error)
    };
    app_log!(
        level,
        "server",
        "Request failed with {}: {}",
        status.as_u16(),
        error
    );
    (status, error.to_string()).into_response()
}

/// An empty body reads as JSON `null` so it is reported as a missing body
fn parse_body(body: &Bytes) -> CloudMakerResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body)
        .map_err(|e| CloudMakerError::shape(format!("Invalid request: Malformed JSON body: {}", e)))
}

async fn run_pipeline(State(state): State<AppState>, body: Bytes) -> Response {
    let result = match parse_body(&body) {
        Ok(body) => process_request(&state, &body).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(location) => Json(location).into_response(),
        Err(e) => error_response(e),
    }
}

/// Validate, run and persist one pipeline request
pub async fn process_request(state: &AppState, body: &Value) -> CloudMakerResult<ArtifactLocation> {
    let validated = RequestValidator::new(&state.registry)
        .with_shape_rewrite(state.config.compat_shape_rewrite)
        .validate(body)?;

    let output_bucket = validated
        .output_bucket
        .or_else(|| state.config.default_output_bucket.clone())
        .ok_or_else(|| CloudMakerError::shape("Invalid request: Missing outputBucketName."))?;

    let invocation_id = Uuid::new_v4().to_string();
    let scratch_dir = state.config.scratch_root.join(&invocation_id);
    let mut context = PipelineContext::new(
        invocation_id.clone(),
        output_bucket.clone(),
        scratch_dir.clone(),
        state.store.clone(),
    )
    .with_step_timeout(state.config.step_timeout);

    let pipeline = Pipeline::builder(format!("request-{}", invocation_id), state.registry.clone())
        .add_steps(validated.steps)
        .build();

    let result = match pipeline
        .run(Artifact::remote(validated.source), &mut context)
        .await
    {
        Ok(output) => persist_final(&output, &output_bucket, state.store.as_ref()).await,
        Err(e) => Err(e),
    };

    remove_scratch_dir(&scratch_dir).await;
    result
}

/// Make sure the final artifact exists in the output bucket
pub async fn persist_final(
    artifact: &Artifact,
    output_bucket: &str,
    store: &dyn ObjectStore,
) -> CloudMakerResult<ArtifactLocation> {
    if artifact.bucket() == output_bucket {
        return Ok(artifact.location().clone());
    }

    let target = artifact.location().in_bucket(output_bucket);
    match artifact.local_path().filter(|path| path.is_file()) {
        Some(local) => store.upload(local, &target).await?,
        None => store.copy(artifact.location(), &target).await?,
    }
    Ok(target)
}

async fn remove_scratch_dir(scratch_dir: &Path) {
    match tokio::fs::remove_dir_all(scratch_dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => app_log!(
            LogLevel::Warn,
            "server",
            "Failed to remove scratch dir {}: {}",
            scratch_dir.display(),
            e
        ),
    }
}

/// Whether the source image is flagged as unsafe
async fn check_safety(State(state): State<AppState>, body: Bytes) -> Response {
    let result: CloudMakerResult<bool> = async {
        let body = parse_body(&body)?;
        let source = validate_source(&body)?;
        state.vision.check_safety(&source).await
    }
    .await;

    match result {
        Ok(is_unsafe) => Json(json!(is_unsafe)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_logs() -> impl IntoResponse {
    Json(LOGGER.get_logs())
}

async fn clear_logs() -> StatusCode {
    LOGGER.clear_logs();
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockObjectStore;
    use tempfile::TempDir;

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(&Bytes::from_static(b"")).unwrap(), Value::Null);
        assert_eq!(parse_body(&Bytes::from_static(b" \n")).unwrap(), Value::Null);
        assert_eq!(parse_body(&Bytes::from_static(b"{\"a\":1}")).unwrap(), json!({"a": 1}));

        let err = parse_body(&Bytes::from_static(b"{oops")).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_error_status_mapping() {
        let response = error_response(CloudMakerError::UnknownTransform("sharpen".into()));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = error_response(CloudMakerError::FetchFailed("gone".into()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_persist_final_in_output_bucket_is_noop() {
        let store = MockObjectStore::new();
        let artifact = Artifact::remote(ArtifactLocation::new("outputs", "resized-cat.png"));

        let location = persist_final(&artifact, "outputs", &store).await.unwrap();

        assert_eq!(location, *artifact.location());
        assert_eq!(store.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_persist_final_uploads_local_file() {
        let temp = TempDir::new().unwrap();
        let local = temp.path().join("blurred-cat.png");
        tokio::fs::write(&local, b"blurred").await.unwrap();
        let store = MockObjectStore::new();
        let artifact = Artifact::materialized(
            ArtifactLocation::new("cloud-maker-outputs-blurred", "blurred-cat.png"),
            local,
        );

        let location = persist_final(&artifact, "final", &store).await.unwrap();

        assert_eq!(location, ArtifactLocation::new("final", "blurred-cat.png"));
        assert_eq!(store.upload_count(), 1);
        assert_eq!(store.get(&location), Some(b"blurred".to_vec()));
    }

    #[tokio::test]
    async fn test_persist_final_copies_remote_artifact() {
        let store = MockObjectStore::new();
        let source = ArtifactLocation::new("uploads", "cat.png");
        store.insert(&source, b"cat".to_vec());

        let location = persist_final(&Artifact::remote(source), "final", &store)
            .await
            .unwrap();

        assert_eq!(location, ArtifactLocation::new("final", "cat.png"));
        assert!(store.contains(&location));
        assert_eq!(store.upload_count(), 0);
    }
}
