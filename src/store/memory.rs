//! In-process store used by tests and one-shot commands

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use super::{validate_id, Store, StoreError};

type Table = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<&'static str, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_tables<R>(&self, f: impl FnOnce(&mut HashMap<&'static str, Table>) -> R) -> R {
        // A poisoned lock only means another test thread panicked mid-write
        let mut tables = match self.tables.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut tables)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn put(&self, table: &'static str, id: &str, document: serde_json::Value) -> Result<(), StoreError> {
        validate_id(id)?;
        self.with_tables(|tables| {
            tables.entry(table).or_default().insert(id.to_string(), document);
        });
        Ok(())
    }

    async fn get(&self, table: &'static str, id: &str) -> Result<Option<serde_json::Value>, StoreError> {
        validate_id(id)?;
        Ok(self.with_tables(|tables| tables.get(table).and_then(|t| t.get(id)).cloned()))
    }

    async fn list(&self, table: &'static str) -> Result<Vec<(String, serde_json::Value)>, StoreError> {
        Ok(self.with_tables(|tables| {
            tables
                .get(table)
                .map(|t| t.iter().map(|(id, doc)| (id.clone(), doc.clone())).collect())
                .unwrap_or_default()
        }))
    }

    async fn delete(&self, table: &'static str, id: &str) -> Result<bool, StoreError> {
        validate_id(id)?;
        Ok(self.with_tables(|tables| {
            tables
                .get_mut(table)
                .map(|t| t.remove(id).is_some())
                .unwrap_or(false)
        }))
    }
}
