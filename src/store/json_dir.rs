//! Directory-backed JSON store
//!
//! Layout: `<data_dir>/<table>/<id>.json`. Writes go to a sibling
//! temporary file first and are renamed into place, so readers never see
//! a half-written record.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{validate_id, Store, StoreError};

const RECORD_EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct JsonStore {
    data_dir: PathBuf,
}

impl JsonStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn table_dir(&self, table: &str) -> PathBuf {
        self.data_dir.join(table)
    }

    fn record_path(&self, table: &str, id: &str) -> Result<PathBuf, StoreError> {
        validate_id(id)?;
        Ok(self.table_dir(table).join(format!("{}.{}", id, RECORD_EXTENSION)))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait]
impl Store for JsonStore {
    async fn put(&self, table: &'static str, id: &str, document: serde_json::Value) -> Result<(), StoreError> {
        let path = self.record_path(table, id)?;
        let dir = self.table_dir(table);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_error(&dir, e))?;

        let bytes = serde_json::to_vec_pretty(&document).map_err(|source| StoreError::Serialization {
            table,
            id: id.to_string(),
            source,
        })?;

        let staging = dir.join(format!(".{}.{}.tmp", id, uuid::Uuid::new_v4()));
        tokio::fs::write(&staging, &bytes)
            .await
            .map_err(|e| io_error(&staging, e))?;
        if let Err(e) = tokio::fs::rename(&staging, &path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(io_error(&path, e));
        }
        Ok(())
    }

    async fn get(&self, table: &'static str, id: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let path = self.record_path(table, id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Serialization {
                table,
                id: id.to_string(),
                source,
            })
    }

    async fn list(&self, table: &'static str) -> Result<Vec<(String, serde_json::Value)>, StoreError> {
        let dir = self.table_dir(table);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&dir, e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(&dir, e))? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !stem.starts_with('.') {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();

        let mut documents = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get(table, &id).await {
                Ok(Some(document)) => documents.push((id, document)),
                // Removed between read_dir and read
                Ok(None) => {}
                Err(e @ StoreError::Serialization { .. }) => {
                    log::warn!("Skipping unreadable record: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(documents)
    }

    async fn delete(&self, table: &'static str, id: &str) -> Result<bool, StoreError> {
        let path = self.record_path(table, id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}
