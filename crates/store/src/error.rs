use common::OrderId;
use domain::OrderStatus;
use thiserror::Error;

/// Errors that can occur when interacting with the checkout stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The order was not in the status the commit expected.
    /// Another request already moved it.
    #[error(
        "Concurrency conflict for order {order_id}: expected status {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        order_id: OrderId,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    /// A row the operation needs does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A row with the same unique key already exists.
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    /// A ticket QR code collided with an existing one.
    #[error("Duplicate ticket QR code: {0}")]
    DuplicateQrCode(String),

    /// A seat, ticket-type unit or promo use the commit claims is no longer
    /// available. Nothing was written.
    #[error("Sold out: {0}")]
    SoldOut(String),

    /// A stored value could not be turned back into a domain value.
    #[error("Invalid stored value: {0}")]
    Decode(String),

    /// The backing store cannot be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns true if the error came from a lost optimistic-concurrency race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::ConcurrencyConflict { .. })
    }

    /// Returns true if the commit lost a seat, capacity or promo limit.
    pub fn is_sold_out(&self) -> bool {
        matches!(self, StoreError::SoldOut(_))
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
