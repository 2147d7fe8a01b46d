//! Domain error types.

use common::{OrderId, TicketTypeId};
use thiserror::Error;

use crate::catalog::PromoRejection;

/// Errors raised by pure domain rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A status change the state machine does not allow.
    #[error("Invalid state transition: cannot {action} {entity} in {current_state} state")]
    InvalidStateTransition {
        entity: &'static str,
        current_state: &'static str,
        action: &'static str,
    },

    /// A generated or supplied identifier violates gateway constraints.
    #[error("Invalid {kind}: {reason}")]
    InvalidIdentifier { kind: &'static str, reason: String },

    /// Quantities must be positive.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// A quantity multiplied past what the amount or count can hold.
    #[error("Quantity {quantity} overflows {what}")]
    QuantityOverflow { what: &'static str, quantity: u32 },

    /// The order carries no reservation metadata.
    #[error("Order {order_id} has no reservation metadata")]
    MissingReservation { order_id: OrderId },

    /// The order's reservation metadata cannot be used.
    #[error("Order {order_id} has malformed reservation metadata: {reason}")]
    MalformedReservation { order_id: OrderId, reason: String },

    /// Ticket-type issuance was asked for with the wrong (or no) ticket type.
    #[error("Order {order_id} expects ticket type {expected}")]
    TicketTypeMismatch {
        order_id: OrderId,
        expected: TicketTypeId,
    },

    /// The promo code cannot be applied.
    #[error("Promo code rejected: {0}")]
    PromoRejected(PromoRejection),
}
