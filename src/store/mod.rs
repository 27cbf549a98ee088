//! Record persistence
//!
//! A `Store` keeps JSON documents in named tables. Typed access goes
//! through `RecordStore`, implemented for every store, with each model
//! naming its table via `Record`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::models::{ComplianceFeature, ForeignResource, TrackedState, ValidationLogEntry};

pub mod json_dir;
pub mod memory;

pub use json_dir::JsonStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed record {table}/{id}: {source}")]
    Serialization {
        table: &'static str,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid record id '{id}'")]
    InvalidId { id: String },

    #[error("Record not found: {table}/{id}")]
    NotFound { table: &'static str, id: String },
}

/// A persisted model type
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TABLE: &'static str;

    fn id(&self) -> &str;
}

impl Record for TrackedState {
    const TABLE: &'static str = "states";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for ForeignResource {
    const TABLE: &'static str = "foreign_resources";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for ValidationLogEntry {
    const TABLE: &'static str = "logs";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for ComplianceFeature {
    const TABLE: &'static str = "features";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Ids become file names, so path separators and hidden names are refused.
///
/// `JsonStore` keeps its staging files as dotfiles, so an id with a leading
/// dot could be saved but never listed.
pub fn validate_id(id: &str) -> Result<(), StoreError> {
    let valid = !id.is_empty() && !id.starts_with('.') && !id.contains(['/', '\\', '\0']);
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidId { id: id.to_string() })
    }
}

/// Untyped table storage.
///
/// `put` replaces any existing document with the same id. `list` returns
/// documents ordered by id.
#[async_trait]
pub trait Store: Send + Sync {
    async fn put(&self, table: &'static str, id: &str, document: serde_json::Value) -> Result<(), StoreError>;

    async fn get(&self, table: &'static str, id: &str) -> Result<Option<serde_json::Value>, StoreError>;

    async fn list(&self, table: &'static str) -> Result<Vec<(String, serde_json::Value)>, StoreError>;

    /// Returns whether a document was removed
    async fn delete(&self, table: &'static str, id: &str) -> Result<bool, StoreError>;
}

/// Typed access on top of any `Store`
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn save<T: Record>(&self, record: &T) -> Result<(), StoreError>;

    async fn load<T: Record>(&self, id: &str) -> Result<Option<T>, StoreError>;

    async fn load_all<T: Record>(&self) -> Result<Vec<T>, StoreError>;

    async fn remove<T: Record>(&self, id: &str) -> Result<bool, StoreError>;

    /// Like `load_all`, but documents that do not decode as `T` are logged
    /// and skipped
    async fn load_all_lossy<T: Record>(&self) -> Result<Vec<T>, StoreError>;

    /// Like `load`, but a missing record is an error
    async fn require<T: Record>(&self, id: &str) -> Result<T, StoreError> {
        self.load::<T>(id).await?.ok_or_else(|| StoreError::NotFound {
            table: T::TABLE,
            id: id.to_string(),
        })
    }
}

#[async_trait]
impl<S> RecordStore for S
where
    S: Store + ?Sized,
{
    async fn save<T: Record>(&self, record: &T) -> Result<(), StoreError> {
        let document = serde_json::to_value(record).map_err(|source| StoreError::Serialization {
            table: T::TABLE,
            id: record.id().to_string(),
            source,
        })?;
        self.put(T::TABLE, record.id(), document).await
    }

    async fn load<T: Record>(&self, id: &str) -> Result<Option<T>, StoreError> {
        match self.get(T::TABLE, id).await? {
            Some(document) => decode::<T>(id, document).map(Some),
            None => Ok(None),
        }
    }

    async fn load_all<T: Record>(&self) -> Result<Vec<T>, StoreError> {
        self.list(T::TABLE)
            .await?
            .into_iter()
            .map(|(id, document)| decode::<T>(&id, document))
            .collect()
    }

    async fn remove<T: Record>(&self, id: &str) -> Result<bool, StoreError> {
        self.delete(T::TABLE, id).await
    }

    async fn load_all_lossy<T: Record>(&self) -> Result<Vec<T>, StoreError> {
        let mut records = Vec::new();
        for (id, document) in self.list(T::TABLE).await? {
            match decode::<T>(&id, document) {
                Ok(record) => records.push(record),
                Err(e) => log::warn!("Skipping unreadable record: {}", e),
            }
        }
        Ok(records)
    }
}

fn decode<T: Record>(id: &str, document: serde_json::Value) -> Result<T, StoreError> {
    serde_json::from_value(document).map_err(|source| StoreError::Serialization {
        table: T::TABLE,
        id: id.to_string(),
        source,
    })
}
