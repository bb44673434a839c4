//! Local durable cache - one JSON array per collection in `SQLite`.
//!
//! Reads and writes replace the whole array for a key (last writer wins). Each
//! write bumps the key's revision and stamps it with this process's writer
//! token so the [`super::KeyWatcher`] of another process can pick it up.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use super::Collection;
use crate::core::{Item, Member};
use crate::entities::{KvEntry, KvEntryModel, kv_entry};
use crate::errors::Result;

/// Handle to the local cache. Cheap to clone; clones share a writer token.
#[derive(Debug, Clone)]
pub struct LocalCache {
    db: DatabaseConnection,
    writer: String,
}

impl LocalCache {
    /// Wraps an open connection whose tables already exist.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            writer: crate::core::new_id(),
        }
    }

    /// Token identifying writes made by this process.
    #[must_use]
    pub fn writer(&self) -> &str {
        &self.writer
    }

    /// Raw row for a collection, if it was ever written.
    pub async fn entry(&self, collection: Collection) -> Result<Option<KvEntryModel>> {
        KvEntry::find_by_id(collection.storage_key().to_string())
            .one(&self.db)
            .await
            .map_err(Into::into)
    }

    /// Decodes a collection; `None` when the key has never been written.
    pub async fn load<T: DeserializeOwned>(&self, collection: Collection) -> Result<Option<Vec<T>>> {
        match self.entry(collection).await? {
            Some(entry) => Ok(Some(serde_json::from_str(&entry.value)?)),
            None => Ok(None),
        }
    }

    /// Replaces a collection and returns the new revision.
    pub async fn store<T: Serialize>(&self, collection: Collection, records: &[T]) -> Result<i64> {
        let value = serde_json::to_string(records)?;
        let now = Utc::now();
        let revision = match self.entry(collection).await? {
            Some(existing) => {
                let revision = existing.revision + 1;
                let mut active: kv_entry::ActiveModel = existing.into();
                active.value = Set(value);
                active.revision = Set(revision);
                active.writer = Set(self.writer.clone());
                active.updated_at = Set(now);
                active.update(&self.db).await?;
                revision
            }
            None => {
                kv_entry::ActiveModel {
                    key: Set(collection.storage_key().to_string()),
                    value: Set(value),
                    revision: Set(1),
                    writer: Set(self.writer.clone()),
                    updated_at: Set(now),
                }
                .insert(&self.db)
                .await?;
                1
            }
        };
        debug!(
            "Stored {} {} records at revision {}",
            records.len(),
            collection.remote_name(),
            revision
        );
        Ok(revision)
    }

    /// All items, newest-first as stored; empty if none were ever saved.
    pub async fn items(&self) -> Result<Vec<Item>> {
        let items = self.load(Collection::Items).await?.unwrap_or_default();
        trace!("Loaded items from local cache: {:?}", items);
        Ok(items)
    }

    /// Stored members; `None` if the roster was never written.
    pub async fn members(&self) -> Result<Option<Vec<Member>>> {
        self.load(Collection::Members).await
    }

    /// Another handle on the same database with its own writer token, as a
    /// second process would have.
    #[must_use]
    pub fn as_other_process(&self) -> Self {
        Self::new(self.db.clone())
    }
}
