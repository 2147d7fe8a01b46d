//! Issued tickets.

use chrono::{DateTime, Utc};
use common::{EventId, OrderId, SeatId, TicketId, TicketTypeId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    #[default]
    Active,
    Cancelled,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Active => "ACTIVE",
            TicketStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(TicketStatus::Active),
            "CANCELLED" => Ok(TicketStatus::Cancelled),
            other => Err(format!("unknown ticket status: {other}")),
        }
    }
}

/// Proof of entitlement to attend. Never deleted, only cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    /// Opaque, unique across all tickets.
    pub qr_code: String,
    pub status: TicketStatus,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub seat_id: Option<SeatId>,
    pub ticket_type_id: Option<TicketTypeId>,
    pub user_id: UserId,
    pub order_id: OrderId,
    pub event_id: EventId,
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    /// Records a scan at the door.
    pub fn mark_used(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status != TicketStatus::Active || self.is_used {
            return Err(DomainError::InvalidStateTransition {
                entity: "ticket",
                current_state: if self.is_used {
                    "USED"
                } else {
                    self.status.as_str()
                },
                action: "use",
            });
        }
        self.is_used = true;
        self.used_at = Some(now);
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), DomainError> {
        if self.status == TicketStatus::Cancelled {
            return Err(DomainError::InvalidStateTransition {
                entity: "ticket",
                current_state: self.status.as_str(),
                action: "cancel",
            });
        }
        self.status = TicketStatus::Cancelled;
        Ok(())
    }
}
