//! Durable storage for the item and member collections.
//!
//! The [`LocalCache`] is always present and always written first. A
//! [`StorageBackend`] is the store of record behind it: [`RemoteBackend`] for a
//! networked document store, [`LocalBackend`] when the cache is all there is.

/// The `StorageBackend` seam and the local-only implementation
pub mod backend;
/// `SQLite`-backed key-value cache
pub mod local;
/// HTTP document store backend
pub mod remote;
/// Cross-process change detection on cache keys
pub mod watcher;

pub use backend::{LocalBackend, StorageBackend};
pub use local::LocalCache;
pub use remote::RemoteBackend;
pub use watcher::KeyWatcher;

/// The two persisted collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Grocery items
    Items,
    /// Household members
    Members,
}

impl Collection {
    /// Collection name in the remote document store.
    #[must_use]
    pub const fn remote_name(self) -> &'static str {
        match self {
            Self::Items => "items",
            Self::Members => "members",
        }
    }

    /// Fixed key of the collection in the local cache.
    #[must_use]
    pub const fn storage_key(self) -> &'static str {
        match self {
            Self::Items => "grocesplit_items",
            Self::Members => "grocesplit_users",
        }
    }
}
