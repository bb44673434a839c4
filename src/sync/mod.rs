//! Sync engine - the grocery service and its change notification bus.

/// In-process snapshot channels and subscriptions
pub mod bus;
/// Mutation and subscription orchestration
pub mod service;


pub use bus::{ChangeBus, Subscription};
pub use service::{GroceryService, ImportOutcome, select_backend, with_timeout};
