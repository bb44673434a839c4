//! Unified error type for the ledger, storage and sync layers.

use thiserror::Error;

/// All failures the crate can report.
///
/// Domain validation failures carry the offending value so callers can show it.
/// Remote failures are normally logged and swallowed by the sync service; they
/// only surface from the backends themselves.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or was invalid
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description
        message: String,
    },

    /// Local cache database failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Stored or received JSON could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote store answered with an error
    #[error("Remote store error: {message}")]
    Remote {
        /// Status and body summary
        message: String,
    },

    /// A remote call did not finish within the configured bound
    #[error("{operation} timed out after {millis}ms")]
    Timeout {
        /// What was being attempted
        operation: String,
        /// Timeout that elapsed
        millis: u64,
    },

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable could not be read
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Quantity was zero, negative or not a number
    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity {
        /// The rejected quantity
        quantity: f64,
    },

    /// Price was negative or not a number
    #[error("Invalid price: {price}")]
    InvalidPrice {
        /// The rejected price
        price: f64,
    },

    /// A name was blank
    #[error("Name must not be empty")]
    EmptyName,

    /// No item with this id exists in the local cache
    #[error("Item not found: {id}")]
    ItemNotFound {
        /// Requested item id
        id: String,
    },

    /// No member with this id exists in the local cache
    #[error("Member not found: {id}")]
    MemberNotFound {
        /// Requested member id
        id: String,
    },

    /// Attempt to mark a share paid for a member who does not share the item
    #[error("Member {member_id} does not share item {item_id}")]
    NotSharing {
        /// Item being settled
        item_id: String,
        /// Member that is not in the item's sharing set
        member_id: String,
    },

    /// The item is not in a state that allows this operation
    #[error("Cannot move item from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: String,
        /// Requested status or operation
        to: String,
    },

    /// The text-parsing or recipe assistant failed
    #[error("Assistant error: {message}")]
    Assistant {
        /// Failure description
        message: String,
    },
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
