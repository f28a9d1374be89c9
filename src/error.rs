use thiserror::Error;

/// Central error type for the Cloud Maker service
#[derive(Error, Debug)]
pub enum CloudMakerError {
    // ============================================================================
    // Request Errors (reported as 400, pipeline never starts)
    // ============================================================================
    #[error("{0}")]
    RequestShape(String),

    #[error("No function exists with name {0}")]
    UnknownTransform(String),

    #[error("Parameter {key} not expected for function {transform}. Expected one of {expected}")]
    UnexpectedParameter {
        transform: String,
        key: String,
        expected: String,
    },

    #[error("Parameter {key} with value {value} was rejected by {transform}")]
    RejectedParameter {
        transform: String,
        key: String,
        value: String,
    },

    // ============================================================================
    // Execution Errors (reported as 500)
    // ============================================================================
    #[error("Failed to fetch blob: {0}")]
    FetchFailed(String),

    #[error("Failed to upload blob: {0}")]
    UploadFailed(String),

    #[error("Image operation failed: {0}")]
    ApplyFailed(String),

    #[error("Annotation request failed: {0}")]
    AnnotationFailed(String),

    #[error("Step '{step}' timed out after {millis}ms")]
    StepTimeout { step: String, millis: u128 },

    #[error("Step {index} ({step}) failed: {source}")]
    StepFailed {
        step: String,
        index: usize,
        #[source]
        source: Box<CloudMakerError>,
    },

    // ============================================================================
    // Generic/System Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Mutex lock error")]
    LockError,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CloudMakerError {
    /// Whether the error was caused by the caller's request rather than by execution
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CloudMakerError::RequestShape(_)
                | CloudMakerError::UnknownTransform(_)
                | CloudMakerError::UnexpectedParameter { .. }
                | CloudMakerError::RejectedParameter { .. }
        )
    }

    /// Shorthand for a request-shape error
    pub fn shape(message: impl Into<String>) -> Self {
        CloudMakerError::RequestShape(message.into())
    }
}

// Implement conversion from PoisonError for Mutex locks
impl<T> From<std::sync::PoisonError<T>> for CloudMakerError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        CloudMakerError::LockError
    }
}

// Implement conversion to String for HTTP response bodies
impl From<CloudMakerError> for String {
    fn from(error: CloudMakerError) -> Self {
        error.to_string()
    }
}

// Helper type alias for Results
pub type CloudMakerResult<T> = Result<T, CloudMakerError>;
