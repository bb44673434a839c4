use async_trait::async_trait;
use serde_json::Value;

use super::Collection;
use crate::errors::Result;

/// A document store addressed by collection and record id.
///
/// Documents are plain JSON objects whose fields match the serialized `Item` and
/// `Member` records. The sync service bounds every call with a timeout and never
/// lets a failure here undo a local write.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Whether writes leave this process at all.
    fn is_remote(&self) -> bool;

    /// Replaces the whole document.
    async fn put(&self, collection: Collection, id: &str, document: Value) -> Result<()>;

    /// Overwrites only the given top-level fields.
    async fn merge(&self, collection: Collection, id: &str, fields: Value) -> Result<()>;

    /// Fetches one document, `None` if it does not exist.
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>>;

    /// Removes a document; removing a missing one is not an error.
    async fn delete(&self, collection: Collection, id: &str) -> Result<()>;

    /// Fetches every document in the collection.
    async fn list(&self, collection: Collection) -> Result<Vec<Value>>;
}

/// Local-only mode: the local cache is the store of record, so there is nothing
/// further to write to and nothing to listen to.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalBackend;

#[async_trait]
impl StorageBackend for LocalBackend {
    fn is_remote(&self) -> bool {
        false
    }

    async fn put(&self, _collection: Collection, _id: &str, _document: Value) -> Result<()> {
        Ok(())
    }

    async fn merge(&self, _collection: Collection, _id: &str, _fields: Value) -> Result<()> {
        Ok(())
    }

    async fn get(&self, _collection: Collection, _id: &str) -> Result<Option<Value>> {
        Ok(None)
    }

    async fn delete(&self, _collection: Collection, _id: &str) -> Result<()> {
        Ok(())
    }

    async fn list(&self, _collection: Collection) -> Result<Vec<Value>> {
        Ok(Vec::new())
    }
}
