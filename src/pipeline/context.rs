use super::cache::LocalArtifactCache;
use crate::storage::ObjectStore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Everything a step needs besides its artifact and parameters
///
/// One context exists per pipeline invocation. It replaces any process-wide
/// mutable state: the default output bucket, the scratch directory and the
/// step timeout are fixed when the invocation starts.
///
/// # Example
/// ```no_run
/// use cloud_maker::mock::MockObjectStore;
/// use cloud_maker::pipeline::PipelineContext;
/// use std::sync::Arc;
///
/// let context = PipelineContext::new(
///     "invocation-123",
///     "cloud-maker-outputs",
///     "/tmp/cloud-maker/invocation-123",
///     Arc::new(MockObjectStore::new()),
/// );
/// assert_eq!(context.default_output_bucket(), "cloud-maker-outputs");
/// ```
#[derive(Clone)]
pub struct PipelineContext {
    /// Id used to correlate log lines of one invocation
    invocation_id: String,

    /// Bucket receiving step outputs unless a step names its own
    default_output_bucket: String,

    /// Per-invocation local files
    cache: LocalArtifactCache,

    step_timeout: Option<Duration>,

    /// Metadata about the pipeline execution
    metadata: HashMap<String, String>,
}

impl PipelineContext {
    pub fn new(
        invocation_id: impl Into<String>,
        default_output_bucket: impl Into<String>,
        scratch_dir: impl Into<PathBuf>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            default_output_bucket: default_output_bucket.into(),
            cache: LocalArtifactCache::new(scratch_dir, store),
            step_timeout: None,
            metadata: HashMap::new(),
        }
    }

    /// Fail any step that runs longer than `timeout`
    pub fn with_step_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    pub fn default_output_bucket(&self) -> &str {
        &self.default_output_bucket
    }

    pub fn cache(&self) -> &LocalArtifactCache {
        &self.cache
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        self.cache.store()
    }

    pub fn scratch_dir(&self) -> &Path {
        self.cache.scratch_dir()
    }

    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout
    }

    /// Set metadata
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Get metadata
    pub fn get_metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(|s| s.as_str())
    }

    /// Get all metadata
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }
}
