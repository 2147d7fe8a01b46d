//! Checkout error types.

use common::{EventId, OrderId, SeatId, TicketTypeId};
use domain::{DomainError, PromoRejection};
use store::StoreError;
use thiserror::Error;

use crate::services::GatewayError;

/// A request the checkout refuses for business reasons.
///
/// These are expected outcomes (a seat was taken, a code expired), reported
/// to the caller as client errors and never logged above `info`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutFailure {
    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    #[error("Event is not on sale: {0}")]
    EventNotPublished(EventId),

    #[error("Seats not found: {}", join(.0))]
    SeatsNotFound(Vec<SeatId>),

    /// Some seat is sold, blocked or held by another session.
    #[error("One or more seats are no longer available")]
    SeatsUnavailable,

    #[error("Invalid seat selection: {0}")]
    InvalidSeatSelection(String),

    /// The event sells several ticket types and none was chosen.
    #[error("A ticket type must be selected for event {0}")]
    TicketTypeRequired(EventId),

    #[error("Ticket type not found: {0}")]
    TicketTypeNotFound(TicketTypeId),

    #[error("Event {0} has no ticket types on sale")]
    NoTicketTypes(EventId),

    /// A seat, unit or promo use was claimed by another order between
    /// checkout creation and issuance.
    #[error("Sold out before the order could be issued: {0}")]
    SoldOut(String),

    #[error("Only {remaining} units left, {requested} requested")]
    InsufficientCapacity { requested: u32, remaining: u32 },

    #[error("Unknown promo code: {0}")]
    UnknownPromoCode(String),

    #[error("Promo code rejected: {0}")]
    PromoCodeRejected(PromoRejection),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

fn join(seats: &[SeatId]) -> String {
    seats
        .iter()
        .map(SeatId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors returned by checkout operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The request was refused; see [`CheckoutFailure`].
    #[error(transparent)]
    Rejected(#[from] CheckoutFailure),

    /// The payment gateway failed or answered something unusable.
    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Persistence failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A domain rule was violated by data the checkout produced itself.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Stored records contradict each other (payment without order,
    /// order without reservation metadata).
    #[error("Consistency error: {0}")]
    Consistency(String),
}

impl CheckoutError {
    /// Returns the business failure, if this is one.
    pub fn failure(&self) -> Option<&CheckoutFailure> {
        match self {
            CheckoutError::Rejected(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
