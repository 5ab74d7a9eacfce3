use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::backend::{KeyValueStore, LabelIndex};
use crate::error::{RecordError, Result};
use crate::types::Record;

/// Process-local backend. Used by tests and single-node development setups.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: RwLock<BTreeMap<String, Record>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryBackend {
    async fn create(&self, record: &Record) -> Result<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.name) {
            return Err(RecordError::AlreadyExists {
                name: record.name.clone(),
            });
        }
        records.insert(record.name.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<Record>> {
        Ok(self.records.read().await.get(name).cloned())
    }

    async fn update(&self, record: &Record) -> Result<()> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.name) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(RecordError::NotFound {
                name: record.name.clone(),
            }),
        }
    }

    async fn delete(&self, name: &str) -> Result<()> {
        match self.records.write().await.remove(name) {
            Some(_) => Ok(()),
            None => Err(RecordError::NotFound {
                name: name.to_string(),
            }),
        }
    }
}

#[async_trait]
impl LabelIndex for MemoryBackend {
    async fn list_by_label(&self, key: &str, value: &str) -> Result<Vec<Record>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.has_label(key, value))
            .cloned()
            .collect())
    }
}
