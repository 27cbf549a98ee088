//! Conditional object fetching
//!
//! Probes an object's modification token and downloads the content only
//! when the token differs from the last one seen.

use async_trait::async_trait;
use thiserror::Error;

pub mod fs_store;

pub use fs_store::FsObjectStore;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Can't get object metadata for {location}: {message}")]
    Probe { location: String, message: String },

    #[error("Can't download {location}: {message}")]
    Download { location: String, message: String },

    #[error("Invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },
}

/// Where a state blob lives in the object store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.bucket, self.key)
    }
}

/// Read access to an object store.
///
/// Token equality is the only change signal; the token format is opaque.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Metadata-only request returning the current modification token
    async fn probe(&self, location: &ObjectLocation) -> Result<String, FetchError>;

    /// Full content download
    async fn download(&self, location: &ObjectLocation) -> Result<Vec<u8>, FetchError>;
}

/// Result of a conditional fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Unchanged { token: String },
    Changed { content: Vec<u8>, token: String },
}

impl FetchOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, FetchOutcome::Changed { .. })
    }

    pub fn token(&self) -> &str {
        match self {
            FetchOutcome::Unchanged { token } | FetchOutcome::Changed { token, .. } => token,
        }
    }
}

/// Download `location` only if its token differs from `previous_token`.
///
/// Callers force a download by passing an empty previous token.
pub async fn fetch_if_changed<S>(
    store: &S,
    location: &ObjectLocation,
    previous_token: &str,
) -> Result<FetchOutcome, FetchError>
where
    S: ObjectStore + ?Sized,
{
    let token = store.probe(location).await?;
    if !previous_token.is_empty() && token == previous_token {
        return Ok(FetchOutcome::Unchanged { token });
    }

    let content = store.download(location).await?;
    Ok(FetchOutcome::Changed { content, token })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStore {
        token: String,
        downloads: AtomicUsize,
    }

    #[async_trait]
    impl ObjectStore for CountingStore {
        async fn probe(&self, _location: &ObjectLocation) -> Result<String, FetchError> {
            Ok(self.token.clone())
        }

        async fn download(&self, _location: &ObjectLocation) -> Result<Vec<u8>, FetchError> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            Ok(b"content".to_vec())
        }
    }

    fn store(token: &str) -> CountingStore {
        CountingStore {
            token: token.to_string(),
            downloads: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn test_same_token_skips_download() {
        let store = store("t1");
        let outcome = fetch_if_changed(&store, &ObjectLocation::new("b", "k"), "t1")
            .await
            .unwrap();

        assert_eq!(outcome, FetchOutcome::Unchanged { token: "t1".to_string() });
        assert!(!outcome.changed());
        assert_eq!(store.downloads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_new_token_downloads() {
        let store = store("t2");
        let outcome = fetch_if_changed(&store, &ObjectLocation::new("b", "k"), "t1")
            .await
            .unwrap();

        assert_eq!(
            outcome,
            FetchOutcome::Changed {
                content: b"content".to_vec(),
                token: "t2".to_string()
            }
        );
        assert_eq!(outcome.token(), "t2");
        assert_eq!(store.downloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_previous_token_always_downloads() {
        let store = store("");
        let outcome = fetch_if_changed(&store, &ObjectLocation::new("b", "k"), "")
            .await
            .unwrap();
        assert!(outcome.changed());
        assert_eq!(store.downloads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_location_display() {
        assert_eq!(ObjectLocation::new("states", "net/tfstate").to_string(), "states:net/tfstate");
    }
}
