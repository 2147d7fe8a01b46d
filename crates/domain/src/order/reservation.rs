//! Reservation metadata carried by an order until the gateway calls back.

use common::{OrderId, SeatId, SessionId, TicketTypeId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// What the order bought, recorded at checkout and read back verbatim when
/// the gateway returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderReservation {
    /// Specific seats held by a checkout session.
    Seats {
        session_id: SessionId,
        seat_ids: Vec<SeatId>,
    },
    /// A quantity of a non-seated ticket type.
    TicketType { ticket_type_id: TicketTypeId },
}

impl OrderReservation {
    /// The seat-holding session, if this is a seat purchase.
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            OrderReservation::Seats { session_id, .. } => Some(session_id),
            OrderReservation::TicketType { .. } => None,
        }
    }

    /// The purchased seats; empty for ticket-type purchases.
    pub fn seat_ids(&self) -> &[SeatId] {
        match self {
            OrderReservation::Seats { seat_ids, .. } => seat_ids,
            OrderReservation::TicketType { .. } => &[],
        }
    }

    /// Checks the metadata is usable for issuance.
    pub fn validate(&self, order_id: OrderId) -> Result<(), DomainError> {
        if let OrderReservation::Seats {
            session_id,
            seat_ids,
        } = self
        {
            if session_id.is_blank() {
                return Err(DomainError::MalformedReservation {
                    order_id,
                    reason: "empty session id".to_string(),
                });
            }
            if seat_ids.is_empty() {
                return Err(DomainError::MalformedReservation {
                    order_id,
                    reason: "no seats recorded".to_string(),
                });
            }
            if seat_ids.iter().any(SeatId::is_blank) {
                return Err(DomainError::MalformedReservation {
                    order_id,
                    reason: "blank seat id".to_string(),
                });
            }
        }
        Ok(())
    }
}
