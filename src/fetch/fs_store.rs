//! Filesystem-backed object store
//!
//! Buckets are directories under a root and keys are relative paths inside
//! them. The modification token combines the file's mtime with its length.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Component, Path, PathBuf};

use super::{FetchError, ObjectLocation, ObjectStore};

#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a location to a path, refusing anything that escapes the bucket
    fn resolve(&self, location: &ObjectLocation) -> Result<PathBuf, FetchError> {
        for (value, what) in [(&location.bucket, "bucket"), (&location.key, "key")] {
            let path = Path::new(value);
            if value.is_empty() {
                return Err(FetchError::InvalidKey {
                    key: location.to_string(),
                    reason: format!("empty {}", what),
                });
            }
            if path
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
            {
                return Err(FetchError::InvalidKey {
                    key: location.to_string(),
                    reason: format!("{} must be a plain relative path", what),
                });
            }
        }
        Ok(self.root.join(&location.bucket).join(&location.key))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn probe(&self, location: &ObjectLocation) -> Result<String, FetchError> {
        let path = self.resolve(location)?;
        let metadata = tokio::fs::metadata(&path).await.map_err(|e| FetchError::Probe {
            location: location.to_string(),
            message: e.to_string(),
        })?;
        let modified = metadata.modified().map_err(|e| FetchError::Probe {
            location: location.to_string(),
            message: e.to_string(),
        })?;

        let modified: DateTime<Utc> = modified.into();
        Ok(format!(
            "{}/{}",
            modified.to_rfc3339_opts(SecondsFormat::Nanos, true),
            metadata.len()
        ))
    }

    async fn download(&self, location: &ObjectLocation) -> Result<Vec<u8>, FetchError> {
        let path = self.resolve(location)?;
        tokio::fs::read(&path).await.map_err(|e| FetchError::Download {
            location: location.to_string(),
            message: e.to_string(),
        })
    }
}
