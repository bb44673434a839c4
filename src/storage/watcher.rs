//! Cross-process change detection for one cache key.
//!
//! Reports writes made by other processes sharing the same database file and
//! stays silent about this process's own writes, which reach local subscribers
//! through the bus instead.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{Collection, LocalCache};
use crate::errors::Result;

/// Polls one key's revision and yields foreign writes.
#[derive(Debug)]
pub struct KeyWatcher {
    cache: LocalCache,
    collection: Collection,
    last_revision: i64,
}

impl KeyWatcher {
    /// Starts watching from the key's current revision.
    pub async fn new(cache: LocalCache, collection: Collection) -> Result<Self> {
        let last_revision = cache
            .entry(collection)
            .await?
            .map_or(0, |entry| entry.revision);
        Ok(Self {
            cache,
            collection,
            last_revision,
        })
    }

    /// Returns the new raw value if another process wrote the key since the last poll.
    pub async fn poll(&mut self) -> Result<Option<String>> {
        let Some(entry) = self.cache.entry(self.collection).await? else {
            return Ok(None);
        };
        if entry.revision == self.last_revision {
            return Ok(None);
        }
        self.last_revision = entry.revision;
        if entry.writer == self.cache.writer() {
            return Ok(None);
        }
        debug!(
            "Foreign write to {} at revision {}",
            self.collection.storage_key(),
            entry.revision
        );
        Ok(Some(entry.value))
    }

    /// Runs the watcher on a background task, calling `on_change` per foreign write.
    pub fn spawn<F>(mut self, interval: Duration, mut on_change: F) -> JoinHandle<()>
    where
        F: FnMut(String) + Send + 'static,
    {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match self.poll().await {
                    Ok(Some(value)) => on_change(value),
                    Ok(None) => {}
                    Err(e) => warn!(
                        "Watching {} failed: {}",
                        self.collection.storage_key(),
                        e
                    ),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::default_members;
    use crate::test_utils::setup_test_cache;

    #[tokio::test]
    async fn test_own_writes_are_ignored() -> Result<()> {
        let cache = setup_test_cache().await?;
        let mut watcher = KeyWatcher::new(cache.clone(), Collection::Members).await?;
        cache.store(Collection::Members, &default_members()).await?;
        assert!(watcher.poll().await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_foreign_writes_are_reported_once() -> Result<()> {
        let cache = setup_test_cache().await?;
        cache.store(Collection::Members, &default_members()).await?;
        let mut watcher = KeyWatcher::new(cache.clone(), Collection::Members).await?;
        assert!(watcher.poll().await?.is_none());

        let other = cache.as_other_process();
        other.store(Collection::Members, &default_members()[..1]).await?;

        let value = watcher.poll().await?.unwrap();
        assert!(value.contains("\"u1\""));
        assert!(!value.contains("\"u2\""));
        assert!(watcher.poll().await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_other_keys_do_not_trigger() -> Result<()> {
        let cache = setup_test_cache().await?;
        let mut watcher = KeyWatcher::new(cache.clone(), Collection::Items).await?;
        cache
            .as_other_process()
            .store(Collection::Members, &default_members())
            .await?;
        assert!(watcher.poll().await?.is_none());
        Ok(())
    }
}
