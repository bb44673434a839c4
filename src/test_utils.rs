//! Shared test utilities.
//!
//! In-memory cache setup, record builders with sensible defaults, and fake
//! collaborators (`FakeRemote`, `FakeAssistant`) for exercising the service.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::assistant::Assistant;
use crate::config::{SyncConfig, database};
use crate::core::{Item, ItemDraft, ItemStatus, Member, default_members};
use crate::errors::{Error, Result};
use crate::storage::{Collection, LocalBackend, LocalCache, StorageBackend};
use crate::sync::GroceryService;

/// Creates an in-memory `SQLite` cache with its table initialized.
pub async fn setup_test_cache() -> Result<LocalCache> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    database::create_tables(&db).await?;
    Ok(LocalCache::new(db))
}

/// Fast timings so listener and timeout tests finish quickly.
#[must_use]
pub fn fast_sync() -> SyncConfig {
    SyncConfig {
        remote_timeout: Duration::from_millis(100),
        poll_interval: Duration::from_millis(10),
    }
}

/// A fixed timestamp for deterministic records.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0)
        .single()
        .unwrap_or_default()
}

/// A fridge item with the given quantity, price and sharers.
///
/// # Defaults
/// * `name`: "Test item"
/// * `unit`: "pcs"
/// * `paid_by`: empty
#[must_use]
pub fn item_with(quantity: f64, total_price: f64, shared_by: &[&str]) -> Item {
    Item {
        id: crate::core::new_id(),
        name: "Test item".to_string(),
        quantity,
        unit: "pcs".to_string(),
        total_price,
        unit_price: total_price / quantity,
        status: ItemStatus::InFridge,
        shared_by: shared_by.iter().map(ToString::to_string).collect(),
        paid_by: Vec::new(),
        date_added: now(),
    }
}

/// A consumed single-unit item.
#[must_use]
pub fn used_item(total_price: f64, shared_by: &[&str]) -> Item {
    Item {
        status: ItemStatus::Used,
        ..item_with(1.0, total_price, shared_by)
    }
}

/// A member whose id and name are both `id`.
#[must_use]
pub fn member(id: &str) -> Member {
    Member {
        id: id.to_string(),
        name: id.to_string(),
        color_tag: "bg-gray-500".to_string(),
    }
}

/// Local-only service over a fresh in-memory cache.
pub async fn local_service() -> Result<GroceryService> {
    let cache = setup_test_cache().await?;
    Ok(GroceryService::new(
        cache,
        Arc::new(LocalBackend),
        fast_sync(),
        default_members(),
    ))
}

/// Local-only service whose cache already holds the default roster.
pub async fn seeded_local_service() -> Result<GroceryService> {
    let service = local_service().await?;
    service
        .cache()
        .store(Collection::Members, &default_members())
        .await?;
    Ok(service)
}

/// Remote-mode service whose backend is `remote`.
pub async fn remote_service(remote: &Arc<FakeRemote>) -> Result<GroceryService> {
    let cache = setup_test_cache().await?;
    let backend: Arc<dyn StorageBackend> = remote.clone();
    Ok(GroceryService::new(cache, backend, fast_sync(), default_members()))
}

/// In-memory document store that can be made to fail or stall.
#[derive(Debug, Default)]
pub struct FakeRemote {
    items: Mutex<BTreeMap<String, Value>>,
    members: Mutex<BTreeMap<String, Value>>,
    failing: AtomicBool,
    hanging: AtomicBool,
    writes: AtomicUsize,
}

impl FakeRemote {
    /// A healthy, empty store.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes every call return an error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Makes every call stall far beyond any test timeout.
    pub fn set_hanging(&self, hanging: bool) {
        self.hanging.store(hanging, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Snapshot of one stored document.
    #[must_use]
    pub fn document(&self, collection: Collection, id: &str) -> Option<Value> {
        self.store(collection)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Writes a document directly, as another device would.
    pub fn insert(&self, collection: Collection, id: &str, document: Value) {
        self.store(collection)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), document);
    }

    fn store(&self, collection: Collection) -> &Mutex<BTreeMap<String, Value>> {
        match collection {
            Collection::Items => &self.items,
            Collection::Members => &self.members,
        }
    }

    async fn gate(&self) -> Result<()> {
        if self.hanging.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Remote {
                message: "503 Service Unavailable: offline".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FakeRemote {
    fn is_remote(&self) -> bool {
        true
    }

    async fn put(&self, collection: Collection, id: &str, document: Value) -> Result<()> {
        self.gate().await?;
        self.insert(collection, id, document);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn merge(&self, collection: Collection, id: &str, fields: Value) -> Result<()> {
        self.gate().await?;
        let mut store = self
            .store(collection)
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = store
            .entry(id.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if let (Value::Object(target), Value::Object(fields)) = (entry, fields) {
            for (key, value) in fields {
                target.insert(key, value);
            }
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>> {
        self.gate().await?;
        Ok(self.document(collection, id))
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        self.gate().await?;
        self.store(collection)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list(&self, collection: Collection) -> Result<Vec<Value>> {
        self.gate().await?;
        Ok(self
            .store(collection)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect())
    }
}

/// Assistant returning canned answers, or failing on demand.
#[derive(Debug, Default)]
pub struct FakeAssistant {
    /// Drafts returned by `parse_grocery_text`
    pub drafts: Vec<ItemDraft>,
    /// Text returned by `suggest_recipe`
    pub recipe: String,
    /// Fail every call
    pub failing: bool,
    /// Ingredients seen by the last recipe call
    pub seen_ingredients: Mutex<Vec<String>>,
}

#[async_trait]
impl Assistant for FakeAssistant {
    async fn parse_grocery_text(&self, _text: &str, _member_names: &[String]) -> Result<Vec<ItemDraft>> {
        if self.failing {
            return Err(Error::Assistant {
                message: "model unavailable".to_string(),
            });
        }
        Ok(self.drafts.clone())
    }

    async fn suggest_recipe(&self, ingredients: &[String]) -> Result<String> {
        *self
            .seen_ingredients
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = ingredients.to_vec();
        if self.failing {
            return Err(Error::Assistant {
                message: "model unavailable".to_string(),
            });
        }
        Ok(self.recipe.clone())
    }
}
