use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Where a blob lives in object storage
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactLocation {
    pub bucket: String,
    pub name: String,
}

impl ArtifactLocation {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
        }
    }

    /// `gs://bucket/name` form understood by the annotation service
    pub fn uri(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.name)
    }

    /// Same blob name in another bucket
    pub fn in_bucket(&self, bucket: impl Into<String>) -> Self {
        Self::new(bucket, self.name.clone())
    }
}

impl fmt::Display for ArtifactLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri())
    }
}

/// The image at one point in the pipeline
///
/// Every step produces a new value; artifacts are never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    location: ArtifactLocation,
    #[serde(skip)]
    local_path: Option<PathBuf>,
}

impl Artifact {
    /// An artifact known only by its storage location
    pub fn remote(location: ArtifactLocation) -> Self {
        Self {
            location,
            local_path: None,
        }
    }

    /// An artifact whose bytes are also materialized at `local_path`
    pub fn materialized(location: ArtifactLocation, local_path: PathBuf) -> Self {
        Self {
            location,
            local_path: Some(local_path),
        }
    }

    pub fn location(&self) -> &ArtifactLocation {
        &self.location
    }

    pub fn bucket(&self) -> &str {
        &self.location.bucket
    }

    pub fn name(&self) -> &str {
        &self.location.name
    }

    pub fn local_path(&self) -> Option<&Path> {
        self.local_path.as_deref()
    }

    /// Content identity: artifacts sharing a blob base name share a cache entry
    pub fn identity(&self) -> &str {
        base_name(&self.location.name)
    }
}

/// Final path component of a blob name
pub fn base_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Name of the blob a step writes for an input blob
///
/// `prefix-base` when a prefix is given, `base.out` otherwise.
pub fn output_file_name(prefix: Option<&str>, input_name: &str) -> String {
    let base = base_name(input_name);
    match prefix.filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{}-{}", prefix, base),
        None => format!("{}.out", base),
    }
}

/// Replace everything from the last `.` with `extension` (which includes its dot)
pub fn change_extension(name: &str, extension: &str) -> String {
    let base = base_name(name);
    let base_start = name.len() - base.len();
    let stem_end = base_start + base.rfind('.').unwrap_or(base.len());
    format!("{}{}", &name[..stem_end], extension)
}
