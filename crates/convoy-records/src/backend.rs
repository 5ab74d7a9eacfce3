use async_trait::async_trait;

use crate::error::Result;
use crate::types::Record;

/// Point operations on named records.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Insert a new record. Fails with `AlreadyExists` if the name is taken.
    async fn create(&self, record: &Record) -> Result<()>;

    /// Fetch a record by name, `None` when absent.
    async fn get(&self, name: &str) -> Result<Option<Record>>;

    /// Replace labels and payload of an existing record. Fails with `NotFound`.
    async fn update(&self, record: &Record) -> Result<()>;

    /// Remove a record. Fails with `NotFound`.
    async fn delete(&self, name: &str) -> Result<()>;
}

/// Coarse secondary index over record labels.
#[async_trait]
pub trait LabelIndex: Send + Sync {
    /// Every record whose labels contain `key=value`, in name order.
    async fn list_by_label(&self, key: &str, value: &str) -> Result<Vec<Record>>;
}

/// A complete backend: point access plus label listing.
pub trait RecordBackend: KeyValueStore + LabelIndex {}

impl<T: KeyValueStore + LabelIndex> RecordBackend for T {}
