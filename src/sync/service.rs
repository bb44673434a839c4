//! Grocery service - every mutation and subscription goes through here.
//!
//! Each mutation validates its input, applies a read-modify-write to the local
//! cache, publishes the new snapshot on the in-process bus, and only then hands
//! the matching document write to the backend on a tracked background task. A
//! remote failure or timeout is logged and never reverts the local change.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, instrument, warn};

use super::bus::{ChangeBus, Subscription};
use crate::assistant::Assistant;
use crate::config::{AppConfig, SyncConfig, database, members};
use crate::core::{
    Balances, DashboardStats, Item, ItemEdit, ItemStatus, Member, NewItem, SplitOutcome,
    compute_balances, dashboard_stats, drafts_to_items, item::toggle_paid, use_quantity,
};
use crate::errors::{Error, Result};
use crate::storage::{Collection, KeyWatcher, LocalBackend, LocalCache, RemoteBackend, StorageBackend};

/// Shown when there is nothing in the fridge to cook with.
pub const EMPTY_FRIDGE_MESSAGE: &str = "Add items to your fridge to get suggestions!";
/// Shown when no assistant is configured.
pub const NO_ASSISTANT_MESSAGE: &str = "Please configure API Key for recipe suggestions.";
/// Shown when the assistant fails.
pub const RECIPE_FALLBACK: &str = "Could not generate recipe.";

const RECIPE_INGREDIENT_LIMIT: usize = 5;

/// Result of importing items from free text.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportOutcome {
    /// These items were created in the fridge
    Added(Vec<Item>),
    /// Nothing usable came back; the user should fall back to manual entry
    ParseFailed,
}

/// Picks the backend once, from whether a remote store is configured.
pub fn select_backend(config: &AppConfig) -> Result<Arc<dyn StorageBackend>> {
    match &config.remote {
        Some(remote) => Ok(Arc::new(RemoteBackend::new(remote)?)),
        None => Ok(Arc::new(LocalBackend)),
    }
}

/// Runs `future` under `limit`, turning an elapsed timer into [`Error::Timeout`].
pub async fn with_timeout<T, F>(operation: &str, limit: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| Error::Timeout {
            operation: operation.to_string(),
            millis: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        })?
}

fn sort_newest_first(items: &mut [Item]) {
    items.sort_by(|a, b| b.date_added.cmp(&a.date_added));
}

fn item_id(item: &Item) -> &str {
    &item.id
}

fn member_id(member: &Member) -> &str {
    &member.id
}

/// What an unconfirmed remote write was doing to its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unsynced {
    Upsert,
    Delete,
}

/// Records whose latest remote write has not been confirmed.
///
/// Each mark carries a ticket so that an older write finishing late cannot
/// clear the mark of a newer one.
#[derive(Debug, Default)]
struct UnsyncedRecords {
    next_ticket: u64,
    marks: HashMap<(Collection, String), (Unsynced, u64)>,
}

impl UnsyncedRecords {
    fn mark(&mut self, collection: Collection, id: String, kind: Unsynced) -> u64 {
        self.next_ticket += 1;
        self.marks.insert((collection, id), (kind, self.next_ticket));
        self.next_ticket
    }

    fn confirm(&mut self, collection: Collection, id: String, ticket: u64) {
        let key = (collection, id);
        if self.marks.get(&key).is_some_and(|(_, t)| *t == ticket) {
            self.marks.remove(&key);
        }
    }

    fn forget(&mut self, collection: Collection, id: String) {
        self.marks.remove(&(collection, id));
    }

    fn pending(&self, collection: Collection) -> Vec<(String, Unsynced)> {
        self.marks
            .iter()
            .filter(|((c, _), _)| *c == collection)
            .map(|((_, id), (kind, _))| (id.clone(), *kind))
            .collect()
    }
}

/// Lays local records that never reached the remote store over a remote snapshot.
fn reconcile<T: Clone>(
    mut remote: Vec<T>,
    local: &[T],
    unsynced: &[(String, Unsynced)],
    id_of: fn(&T) -> &str,
) -> Vec<T> {
    for (id, kind) in unsynced {
        let position = remote.iter().position(|r| id_of(r) == id.as_str());
        match kind {
            Unsynced::Delete => {
                if let Some(idx) = position {
                    remote.remove(idx);
                }
            }
            Unsynced::Upsert => {
                let Some(record) = local.iter().find(|r| id_of(r) == id.as_str()) else {
                    continue;
                };
                match position {
                    Some(idx) => remote[idx] = record.clone(),
                    None => remote.push(record.clone()),
                }
            }
        }
    }
    remote
}

fn reap(pending: &mut JoinSet<()>) {
    while let Some(joined) = pending.try_join_next() {
        if let Err(e) = joined {
            error!("Remote write task failed: {}", e);
        }
    }
}

fn decode_documents<T: DeserializeOwned>(collection: Collection, documents: Vec<Value>) -> Vec<T> {
    documents
        .into_iter()
        .filter_map(|doc| match serde_json::from_value(doc) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping malformed {} document: {}", collection.remote_name(), e);
                None
            }
        })
        .collect()
}

/// The ledger and sync engine for one process.
///
/// Cloning is cheap and clones share the cache, backend, bus and pending remote
/// writes.
#[derive(Clone)]
pub struct GroceryService {
    cache: LocalCache,
    backend: Arc<dyn StorageBackend>,
    bus: Arc<ChangeBus>,
    sync: SyncConfig,
    seed_members: Arc<Vec<Member>>,
    pending: Arc<Mutex<JoinSet<()>>>,
    in_flight: Arc<AtomicUsize>,
    unsynced: Arc<Mutex<UnsyncedRecords>>,
}

impl std::fmt::Debug for GroceryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroceryService")
            .field("remote", &self.backend.is_remote())
            .field("sync", &self.sync)
            .finish_non_exhaustive()
    }
}

impl GroceryService {
    /// Assembles a service from its parts.
    #[must_use]
    pub fn new(
        cache: LocalCache,
        backend: Arc<dyn StorageBackend>,
        sync: SyncConfig,
        seed_members: Vec<Member>,
    ) -> Self {
        Self {
            cache,
            backend,
            bus: Arc::new(ChangeBus::new()),
            sync,
            seed_members: Arc::new(seed_members),
            pending: Arc::new(Mutex::new(JoinSet::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            unsynced: Arc::new(Mutex::new(UnsyncedRecords::default())),
        }
    }

    /// Opens the cache, loads the seed roster and selects the backend.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let db = database::create_connection(&config.database_url).await?;
        let seed = members::load_seed_members(&config.members_path)?;
        let backend = select_backend(config)?;
        Ok(Self::new(LocalCache::new(db), backend, config.sync, seed))
    }

    /// Whether a remote store is in use.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.backend.is_remote()
    }

    /// The local cache handle.
    #[must_use]
    pub const fn cache(&self) -> &LocalCache {
        &self.cache
    }

    // --- Reads ---

    /// Current items from the local cache.
    pub async fn items(&self) -> Result<Vec<Item>> {
        self.cache.items().await
    }

    /// Current members from the local cache; empty if none were ever stored.
    pub async fn members(&self) -> Result<Vec<Member>> {
        Ok(self.cache.members().await?.unwrap_or_default())
    }

    /// Outstanding balances as seen by `viewer_id`.
    pub async fn balances(&self, viewer_id: &str) -> Result<Balances> {
        let items = self.items().await?;
        let members = self.members().await?;
        Ok(compute_balances(&items, &members, viewer_id))
    }

    /// Dashboard figures as seen by `viewer_id`.
    pub async fn dashboard(&self, viewer_id: &str) -> Result<DashboardStats> {
        let items = self.items().await?;
        let members = self.members().await?;
        Ok(dashboard_stats(&items, &members, viewer_id))
    }

    // --- Local writes ---

    async fn write_items<F>(&self, change: F) -> Result<Vec<Item>>
    where
        F: FnOnce(&mut Vec<Item>),
    {
        let mut items = self.cache.items().await?;
        change(&mut items);
        self.cache.store(Collection::Items, &items).await?;
        self.bus.publish_items(items.clone());
        Ok(items)
    }

    async fn write_members<F>(&self, change: F) -> Result<Vec<Member>>
    where
        F: FnOnce(&mut Vec<Member>),
    {
        let mut members = self.cache.members().await?.unwrap_or_default();
        change(&mut members);
        self.cache.store(Collection::Members, &members).await?;
        self.bus.publish_members(members.clone());
        Ok(members)
    }

    async fn find_item(&self, id: &str) -> Result<Item> {
        self.cache
            .items()
            .await?
            .into_iter()
            .find(|i| i.id == id)
            .ok_or_else(|| Error::ItemNotFound { id: id.to_string() })
    }

    fn upsert(items: &mut Vec<Item>, item: Item) {
        match items.iter_mut().find(|i| i.id == item.id) {
            Some(existing) => *existing = item,
            None => items.insert(0, item),
        }
    }

    // --- Remote writes ---

    /// Starts the remote write for one record.
    ///
    /// The record stays marked unsynced until the write is confirmed, so remote
    /// snapshots cannot drop it in the meantime.
    fn spawn_remote<F, Fut>(&self, collection: Collection, id: &str, kind: Unsynced, write: F)
    where
        F: FnOnce(Arc<dyn StorageBackend>, String) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        if !self.backend.is_remote() {
            return;
        }
        let operation = match kind {
            Unsynced::Upsert => format!("save {} {id}", collection.remote_name()),
            Unsynced::Delete => format!("delete {} {id}", collection.remote_name()),
        };
        let ticket = self
            .unsynced
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .mark(collection, id.to_string(), kind);
        let unsynced = Arc::clone(&self.unsynced);
        let limit = self.sync.remote_timeout;
        let in_flight = Arc::clone(&self.in_flight);
        let id = id.to_string();
        let future = write(Arc::clone(&self.backend), id.clone());
        in_flight.fetch_add(1, Ordering::SeqCst);

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        reap(&mut pending);
        pending.spawn(async move {
            match with_timeout(&operation, limit, future).await {
                Ok(()) => {
                    unsynced
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .confirm(collection, id, ticket);
                    debug!("{} synced", operation);
                }
                Err(e) => warn!("{} failed, kept locally for the next sync: {}", operation, e),
            }
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });
    }

    fn put_document(&self, collection: Collection, id: String, document: Value) {
        self.spawn_remote(collection, &id, Unsynced::Upsert, move |backend, id| async move {
            backend.put(collection, &id, document).await
        });
    }

    fn merge_item(&self, id: &str, fields: Value) {
        self.spawn_remote(Collection::Items, id, Unsynced::Upsert, move |backend, id| async move {
            backend.merge(Collection::Items, &id, fields).await
        });
    }

    fn delete_document(&self, collection: Collection, id: &str) {
        self.spawn_remote(collection, id, Unsynced::Delete, move |backend, id| async move {
            backend.delete(collection, &id).await
        });
    }

    fn unsynced(&self, collection: Collection) -> Vec<(String, Unsynced)> {
        self.unsynced
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pending(collection)
    }

    /// Sends unconfirmed records again, as they currently stand locally.
    fn resend<T: Serialize>(
        &self,
        collection: Collection,
        unsynced: &[(String, Unsynced)],
        local: &[T],
        id_of: fn(&T) -> &str,
    ) {
        for (id, kind) in unsynced {
            match kind {
                Unsynced::Delete => self.delete_document(collection, id),
                Unsynced::Upsert => match local.iter().find(|r| id_of(r) == id.as_str()) {
                    Some(record) => match serde_json::to_value(record) {
                        Ok(document) => self.put_document(collection, id.clone(), document),
                        Err(e) => error!("Failed to encode {} {}: {}", collection.remote_name(), id, e),
                    },
                    None => self
                        .unsynced
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .forget(collection, id.clone()),
                },
            }
        }
    }

    /// Number of remote writes still running. Finished ones are released first.
    #[must_use]
    pub fn pending_remote_writes(&self) -> usize {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        reap(&mut pending);
        pending.len()
    }

    /// Waits for every remote write started so far to finish or time out.
    pub async fn flush_remote(&self) {
        let mut pending = {
            let mut guard = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        while let Some(joined) = pending.join_next().await {
            if let Err(e) = joined {
                error!("Remote write task failed: {}", e);
            }
        }
    }

    // --- Item mutations ---

    /// Inserts a new item at the top, or replaces the item with the same id.
    #[instrument(skip(self, item), fields(item_id = %item.id))]
    pub async fn save_item(&self, item: Item) -> Result<()> {
        let id = item.id.clone();
        let document = serde_json::to_value(&item)?;
        self.write_items(|items| Self::upsert(items, item)).await?;
        self.put_document(Collection::Items, id, document);
        Ok(())
    }

    /// Validates manual entry and saves it as a new fridge item.
    pub async fn add_item(&self, new: NewItem) -> Result<Item> {
        let item = Item::create(new, Utc::now())?;
        self.save_item(item.clone()).await?;
        Ok(item)
    }

    /// Replaces an existing item's details; the remote copy is field-merged.
    #[instrument(skip(self, item), fields(item_id = %item.id))]
    pub async fn update_item_details(&self, item: Item) -> Result<()> {
        self.find_item(&item.id).await?;
        let fields = serde_json::to_value(&item)?;
        let id = item.id.clone();
        self.write_items(|items| Self::upsert(items, item)).await?;
        self.merge_item(&id, fields);
        Ok(())
    }

    /// Applies an edit-form change to an item.
    pub async fn edit_item(&self, id: &str, edit: ItemEdit) -> Result<Item> {
        let edited = self.find_item(id).await?.edited(edit)?;
        self.update_item_details(edited.clone()).await?;
        Ok(edited)
    }

    /// Plain status change. Returning a used item to the fridge clears its
    /// sharing and payments.
    #[instrument(skip(self))]
    pub async fn update_item_status(&self, id: &str, status: ItemStatus) -> Result<Item> {
        let current = self.find_item(id).await?;
        let next = current.with_status(status);
        if next == current {
            return Ok(next);
        }
        if next.shared_by == current.shared_by && next.paid_by == current.paid_by {
            let updated = next.clone();
            self.write_items(|items| Self::upsert(items, updated)).await?;
            self.merge_item(id, json!({ "status": status }));
        } else {
            self.update_item_details(next.clone()).await?;
        }
        Ok(next)
    }

    /// Uses part or all of a fridge item, charging it to `shared_by`.
    ///
    /// Both resulting records land in the local cache in a single write so no
    /// snapshot ever shows only half of a split.
    #[instrument(skip(self, shared_by))]
    pub async fn use_item(
        &self,
        id: &str,
        used_quantity: f64,
        shared_by: Vec<String>,
    ) -> Result<SplitOutcome> {
        let item = self.find_item(id).await?;
        let outcome = use_quantity(&item, used_quantity, shared_by, Utc::now())?;

        match &outcome {
            SplitOutcome::FullyUsed(used) => {
                self.update_item_details(used.clone()).await?;
            }
            SplitOutcome::Split {
                consumed,
                remainder,
            } => {
                let (new_record, reduced) = (consumed.clone(), remainder.clone());
                self.write_items(|items| {
                    Self::upsert(items, reduced);
                    Self::upsert(items, new_record);
                })
                .await?;
                self.put_document(
                    Collection::Items,
                    consumed.id.clone(),
                    serde_json::to_value(consumed)?,
                );
                self.merge_item(&remainder.id, serde_json::to_value(remainder)?);
            }
        }
        Ok(outcome)
    }

    /// Removes an item in any state. Unknown ids are ignored.
    #[instrument(skip(self))]
    pub async fn delete_item(&self, id: &str) -> Result<()> {
        self.write_items(|items| items.retain(|i| i.id != id)).await?;
        self.delete_document(Collection::Items, id);
        Ok(())
    }

    /// Marks or unmarks one member's share of an item as paid.
    ///
    /// The remote copy is read, toggled and merged back so concurrent changes to
    /// other fields are not clobbered.
    #[instrument(skip(self))]
    pub async fn mark_share_paid(&self, item_id: &str, member_id: &str, paid: bool) -> Result<Item> {
        let updated = self.find_item(item_id).await?.with_share_paid(member_id, paid)?;
        let local = updated.clone();
        self.write_items(|items| Self::upsert(items, local)).await?;

        let member_id = member_id.to_string();
        let toggle = move |backend: Arc<dyn StorageBackend>, item_id: String| async move {
            let Some(document) = backend.get(Collection::Items, &item_id).await? else {
                debug!("Item {} not in remote store; skipping paid toggle", item_id);
                return Ok(());
            };
            let remote_paid: Vec<String> = document
                .get("paidBy")
                .cloned()
                .map(serde_json::from_value)
                .transpose()?
                .unwrap_or_default();
            let paid_by = toggle_paid(&remote_paid, &member_id, paid);
            backend
                .merge(Collection::Items, &item_id, json!({ "paidBy": paid_by }))
                .await
        };
        self.spawn_remote(Collection::Items, item_id, Unsynced::Upsert, toggle);
        Ok(updated)
    }

    /// Marks every share of every consumed item as paid.
    #[instrument(skip(self))]
    pub async fn settle_all(&self) -> Result<Vec<Item>> {
        let mut settled = Vec::new();
        self.write_items(|items| {
            for item in items.iter_mut() {
                if let Some(next) = item.settled() {
                    if next != *item {
                        settled.push(next.clone());
                    }
                    *item = next;
                }
            }
        })
        .await?;
        for item in &settled {
            self.merge_item(&item.id, json!({ "paidBy": item.paid_by }));
        }
        info!("Settled {} items", settled.len());
        Ok(settled)
    }

    // --- Member mutations ---

    /// Adds a member, or replaces the one with the same id.
    #[instrument(skip(self, member), fields(member_id = %member.id))]
    pub async fn save_member(&self, member: Member) -> Result<()> {
        let id = member.id.clone();
        let document = serde_json::to_value(&member)?;
        self.write_members(|members| {
            match members.iter_mut().find(|m| m.id == member.id) {
                Some(existing) => *existing = member,
                None => members.push(member),
            }
        })
        .await?;
        self.put_document(Collection::Members, id, document);
        Ok(())
    }

    /// Creates a member with a fresh id.
    pub async fn add_member(&self, name: &str, color_tag: &str) -> Result<Member> {
        let member = Member::new(name, color_tag)?;
        self.save_member(member.clone()).await?;
        Ok(member)
    }

    /// Renames a member or changes its tag.
    pub async fn edit_member(&self, id: &str, name: &str, color_tag: &str) -> Result<Member> {
        let existing = self
            .members()
            .await?
            .into_iter()
            .find(|m| m.id == id)
            .ok_or_else(|| Error::MemberNotFound { id: id.to_string() })?;
        let edited = existing.edit(name, color_tag)?;
        self.save_member(edited.clone()).await?;
        Ok(edited)
    }

    /// Removes a member. Items that still reference the id are left alone.
    #[instrument(skip(self))]
    pub async fn delete_member(&self, id: &str) -> Result<()> {
        self.write_members(|members| members.retain(|m| m.id != id))
            .await?;
        self.delete_document(Collection::Members, id);
        Ok(())
    }

    // --- Assistant ---

    /// Parses free text into fridge items and saves them.
    ///
    /// Assistant failures and empty results both come back as
    /// [`ImportOutcome::ParseFailed`]; nothing is written in that case.
    #[instrument(skip(self, assistant, text))]
    pub async fn import_from_text(&self, assistant: &dyn Assistant, text: &str) -> Result<ImportOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(ImportOutcome::ParseFailed);
        }
        let members = self.members().await?;
        let names: Vec<String> = members.iter().map(|m| m.name.clone()).collect();

        let drafts = match assistant.parse_grocery_text(text, &names).await {
            Ok(drafts) => drafts,
            Err(e) => {
                warn!("Assistant parsing failed: {}", e);
                return Ok(ImportOutcome::ParseFailed);
            }
        };
        if drafts.is_empty() {
            return Ok(ImportOutcome::ParseFailed);
        }

        let items = drafts_to_items(drafts, &members, Utc::now());
        for item in &items {
            self.save_item(item.clone()).await?;
        }
        info!("Imported {} items from text", items.len());
        Ok(ImportOutcome::Added(items))
    }

    /// Suggests a recipe from what is in the fridge. Always yields some text.
    pub async fn suggest_recipe(&self, assistant: Option<&dyn Assistant>) -> Result<String> {
        let ingredients: Vec<String> = self
            .items()
            .await?
            .into_iter()
            .filter(|i| i.status == ItemStatus::InFridge)
            .map(|i| i.name)
            .take(RECIPE_INGREDIENT_LIMIT)
            .collect();
        if ingredients.is_empty() {
            return Ok(EMPTY_FRIDGE_MESSAGE.to_string());
        }
        let Some(assistant) = assistant else {
            return Ok(NO_ASSISTANT_MESSAGE.to_string());
        };
        match assistant.suggest_recipe(&ingredients).await {
            Ok(text) if !text.trim().is_empty() => Ok(text),
            Ok(_) => Ok(RECIPE_FALLBACK.to_string()),
            Err(e) => {
                warn!("Recipe suggestion failed: {}", e);
                Ok(RECIPE_FALLBACK.to_string())
            }
        }
    }

    // --- Subscriptions ---

    /// Subscribes to item snapshots.
    ///
    /// The current local snapshot is delivered first. Writes by other processes
    /// sharing the cache arrive through a key watcher; in remote mode a listener
    /// also re-delivers the remote collection whenever it changes.
    pub async fn subscribe_items(&self) -> Result<Subscription<Item>> {
        let items = self.cache.items().await?;
        self.bus.publish_items(items);

        let mut listeners = vec![self.watch_foreign(Collection::Items).await?];
        if self.backend.is_remote() {
            listeners.push(self.listen_remote_items());
        }
        Ok(Subscription::new(self.bus.items(), listeners))
    }

    /// Subscribes to member snapshots.
    ///
    /// If no roster was ever stored locally, the seed roster is stored first. In
    /// remote mode an empty remote roster is seeded by the listener.
    pub async fn subscribe_members(&self) -> Result<Subscription<Member>> {
        let members = match self.cache.members().await? {
            Some(members) => members,
            None => {
                info!("No members stored; seeding {} defaults", self.seed_members.len());
                let seed = self.seed_members.as_ref().clone();
                self.cache.store(Collection::Members, &seed).await?;
                seed
            }
        };
        self.bus.publish_members(members);

        let mut listeners = vec![self.watch_foreign(Collection::Members).await?];
        if self.backend.is_remote() {
            listeners.push(self.listen_remote_members());
        }
        Ok(Subscription::new(self.bus.members(), listeners))
    }

    async fn watch_foreign(&self, collection: Collection) -> Result<JoinHandle<()>> {
        let watcher = KeyWatcher::new(self.cache.clone(), collection).await?;
        let bus = Arc::clone(&self.bus);
        Ok(watcher.spawn(self.sync.poll_interval, move |raw| {
            let published = match collection {
                Collection::Items => serde_json::from_str::<Vec<Item>>(&raw)
                    .map(|items| bus.publish_items(items)),
                Collection::Members => serde_json::from_str::<Vec<Member>>(&raw)
                    .map(|members| bus.publish_members(members)),
            };
            if let Err(e) = published {
                warn!("Ignoring unreadable foreign write to {}: {}", collection.storage_key(), e);
            }
        }))
    }

    /// Fetches a remote collection under the sync timeout, unless local writes
    /// are still on their way there.
    async fn fetch_remote(&self, collection: Collection) -> Result<Option<Vec<Value>>> {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            return Ok(None);
        }
        let operation = format!("list {}", collection.remote_name());
        let documents = with_timeout(
            &operation,
            self.sync.remote_timeout,
            self.backend.list(collection),
        )
        .await?;
        Ok(Some(documents))
    }

    /// Caches and publishes a remote items snapshot, keeping unsynced local work.
    async fn apply_remote_items(&self, remote: Vec<Item>, last: &mut Option<Vec<Item>>) -> Result<()> {
        let unsynced = self.unsynced(Collection::Items);
        let mut items = remote;
        if !unsynced.is_empty() {
            let local = self.cache.items().await?;
            items = reconcile(items, &local, &unsynced, item_id);
            info!("Re-sending {} unsynced items", unsynced.len());
            self.resend(Collection::Items, &unsynced, &local, item_id);
        }
        sort_newest_first(&mut items);
        if last.as_ref() == Some(&items) {
            return Ok(());
        }
        debug!("Remote items snapshot with {} documents", items.len());
        self.cache.store(Collection::Items, &items).await?;
        self.bus.publish_items(items.clone());
        *last = Some(items);
        Ok(())
    }

    /// Caches and publishes a remote roster, keeping unsynced local work.
    async fn apply_remote_members(
        &self,
        remote: Vec<Member>,
        last: &mut Option<Vec<Member>>,
    ) -> Result<()> {
        let unsynced = self.unsynced(Collection::Members);
        let mut members = remote;
        if !unsynced.is_empty() {
            let local = self.members().await?;
            members = reconcile(members, &local, &unsynced, member_id);
            info!("Re-sending {} unsynced members", unsynced.len());
            self.resend(Collection::Members, &unsynced, &local, member_id);
        }
        if last.as_ref() == Some(&members) {
            return Ok(());
        }
        self.cache.store(Collection::Members, &members).await?;
        self.bus.publish_members(members.clone());
        *last = Some(members);
        Ok(())
    }

    fn listen_remote_items(&self) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut last: Option<Vec<Item>> = None;
            let mut ticker = tokio::time::interval(service.sync.poll_interval);
            loop {
                ticker.tick().await;
                match service.fetch_remote(Collection::Items).await {
                    Ok(Some(documents)) => {
                        let items: Vec<Item> = decode_documents(Collection::Items, documents);
                        if let Err(e) = service.apply_remote_items(items, &mut last).await {
                            error!("Failed to apply remote items: {}", e);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => error!("Remote items subscription error: {}", e),
                }
            }
        })
    }

    fn listen_remote_members(&self) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut last: Option<Vec<Member>> = None;
            let mut ticker = tokio::time::interval(service.sync.poll_interval);
            loop {
                ticker.tick().await;
                match service.fetch_remote(Collection::Members).await {
                    Ok(Some(documents)) => {
                        let members: Vec<Member> = decode_documents(Collection::Members, documents);
                        let unsynced = service.unsynced(Collection::Members);
                        if members.is_empty() && last.is_none() && unsynced.is_empty() {
                            info!("Remote roster empty; seeding defaults");
                            for member in service.seed_members.iter() {
                                if let Err(e) = service.save_member(member.clone()).await {
                                    error!("Failed to seed member {}: {}", member.id, e);
                                }
                            }
                            last = Some(service.seed_members.as_ref().clone());
                            continue;
                        }
                        if let Err(e) = service.apply_remote_members(members, &mut last).await {
                            error!("Failed to apply remote members: {}", e);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        error!("Remote members subscription error: {}", e);
                        if last.is_none() {
                            match service.members().await {
                                Ok(local) => service.bus.publish_members(local),
                                Err(e) => error!("Local roster fallback failed: {}", e),
                            }
                        }
                    }
                }
            }
        })
    }
}
