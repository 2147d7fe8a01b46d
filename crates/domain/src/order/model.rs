//! The order record and its lifecycle transitions.

use chrono::{DateTime, Utc};
use common::{EventId, OrderId, PromoCodeId, TicketTypeId, UserId};
use serde::{Deserialize, Serialize};

use super::reservation::OrderReservation;
use super::state::OrderStatus;
use crate::error::DomainError;
use crate::identifiers::OrderNumber;
use crate::money::{Currency, Money};
use crate::pricing::PriceBreakdown;

/// Contact details of the person buying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerInfo {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Everything needed to open a pending order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub event_id: EventId,
    pub buyer: BuyerInfo,
    pub currency: Currency,
    pub quantity: u32,
    pub price: PriceBreakdown,
    pub promo_code_id: Option<PromoCodeId>,
    pub reservation: OrderReservation,
}

/// A purchase intent.
///
/// Orders are created `Pending`, take exactly one terminal transition and
/// are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub status: OrderStatus,
    pub user_id: UserId,
    pub event_id: EventId,
    pub buyer: BuyerInfo,
    pub currency: Currency,
    pub quantity: u32,
    pub base_amount: Money,
    pub discount_amount: Money,
    pub commission_amount: Money,
    pub total_amount: Money,
    pub ticket_type_id: Option<TicketTypeId>,
    pub promo_code_id: Option<PromoCodeId>,
    /// Read back verbatim when the gateway returns.
    pub reservation: Option<OrderReservation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Opens a pending order.
    pub fn new_pending(new: NewOrder, now: DateTime<Utc>) -> Result<Self, DomainError> {
        if new.quantity == 0 {
            return Err(DomainError::InvalidQuantity {
                quantity: new.quantity,
            });
        }

        let id = OrderId::new();
        new.reservation.validate(id)?;

        let ticket_type_id = match &new.reservation {
            OrderReservation::TicketType { ticket_type_id } => Some(*ticket_type_id),
            OrderReservation::Seats { .. } => None,
        };

        Ok(Self {
            id,
            order_number: new.order_number,
            status: OrderStatus::Pending,
            user_id: new.user_id,
            event_id: new.event_id,
            buyer: new.buyer,
            currency: new.currency,
            quantity: new.quantity,
            base_amount: new.price.base,
            discount_amount: new.price.discount,
            commission_amount: new.price.commission,
            total_amount: new.price.total,
            ticket_type_id,
            promo_code_id: new.promo_code_id,
            reservation: Some(new.reservation),
            created_at: now,
            updated_at: now,
            paid_at: None,
        })
    }

    /// Returns true if nothing has to be charged.
    pub fn is_free(&self) -> bool {
        self.total_amount.is_zero()
    }

    /// Returns the reservation metadata or a consistency error.
    pub fn require_reservation(&self) -> Result<&OrderReservation, DomainError> {
        let reservation = self
            .reservation
            .as_ref()
            .ok_or(DomainError::MissingReservation { order_id: self.id })?;
        reservation.validate(self.id)?;
        Ok(reservation)
    }

    /// Transitions `Pending -> Paid`.
    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if !self.status.can_pay() {
            return Err(self.invalid_transition("pay"));
        }
        self.status = OrderStatus::Paid;
        self.paid_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Transitions `Pending -> Cancelled`.
    pub fn mark_cancelled(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if !self.status.can_cancel() {
            return Err(self.invalid_transition("cancel"));
        }
        self.status = OrderStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    fn invalid_transition(&self, action: &'static str) -> DomainError {
        DomainError::InvalidStateTransition {
            entity: "order",
            current_state: self.status.as_str(),
            action,
        }
    }
}
