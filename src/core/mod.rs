//! Core business logic - framework-agnostic grocery, ledger and split operations.
//!
//! Nothing in here performs I/O. The sync service feeds snapshots in and
//! persists whatever records come out.

/// Assistant draft parsing and mapping
pub mod import;
/// Item records and the status state machine
pub mod item;
/// Balance and dashboard computation
pub mod ledger;
/// Household members
pub mod member;
/// Partial consumption
pub mod split;

pub use import::{ItemDraft, drafts_to_items, parse_drafts};
pub use item::{Item, ItemEdit, ItemStatus, NewItem};
pub use ledger::{Balances, DashboardStats, UnpaidShare, compute_balances, dashboard_stats};
pub use member::{Member, default_members};
pub use split::{SplitOutcome, use_quantity};

/// Generates a fresh random record id (128-bit, hyphenated).
#[must_use]
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
