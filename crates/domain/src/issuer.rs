//! Expansion of a paid order into ticket records.
//!
//! The issuer decides *what* must be written when an order is paid. It does
//! not write anything: the resulting [`IssuancePlan`] is applied by the
//! store in one transaction together with the order and payment updates.

use chrono::{DateTime, Utc};
use common::{PromoCodeId, SeatId, SessionId, TicketId, TicketTypeId};
use uuid::Uuid;

use crate::catalog::TicketType;
use crate::error::DomainError;
use crate::order::{Order, OrderReservation};
use crate::ticket::{Ticket, TicketStatus};

/// Ticket rows and the side effects that must accompany them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuancePlan {
    pub tickets: Vec<Ticket>,
    /// Seats whose persisted status flips to `SOLD`.
    pub seats_to_mark_sold: Vec<SeatId>,
    /// Units to add to a ticket type's sold counter.
    pub ticket_type_units: Option<(TicketTypeId, u32)>,
    /// Promo code whose usage counter is bumped.
    pub promo_code_id: Option<PromoCodeId>,
    /// Seat hold to drop once the plan is committed.
    pub release_session: Option<SessionId>,
}

impl IssuancePlan {
    pub fn ticket_count(&self) -> usize {
        self.tickets.len()
    }
}

/// Builds issuance plans.
#[derive(Debug, Clone, Copy, Default)]
pub struct TicketIssuer;

impl TicketIssuer {
    /// Expands `order` into tickets.
    ///
    /// Seat orders get one ticket per reserved seat. Ticket-type orders get
    /// `quantity × tickets_generated` tickets and need the ticket type the
    /// order was placed for.
    pub fn issue(
        order: &Order,
        ticket_type: Option<&TicketType>,
        now: DateTime<Utc>,
    ) -> Result<IssuancePlan, DomainError> {
        let reservation = order.require_reservation()?;
        let stamp = now
            .timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp_millis());

        match reservation {
            OrderReservation::Seats {
                session_id,
                seat_ids,
            } => {
                let tickets = seat_ids
                    .iter()
                    .enumerate()
                    .map(|(index, seat_id)| {
                        Self::ticket(order, Some(seat_id.clone()), None, stamp, index, now)
                    })
                    .collect();

                Ok(IssuancePlan {
                    tickets,
                    seats_to_mark_sold: seat_ids.clone(),
                    ticket_type_units: None,
                    promo_code_id: order.promo_code_id,
                    release_session: Some(session_id.clone()),
                })
            }
            OrderReservation::TicketType { ticket_type_id } => {
                let ticket_type = ticket_type
                    .filter(|tt| tt.id == *ticket_type_id)
                    .ok_or(DomainError::TicketTypeMismatch {
                        order_id: order.id,
                        expected: *ticket_type_id,
                    })?;

                let count = ticket_type.tickets_for(order.quantity)? as usize;
                let tickets = (0..count)
                    .map(|index| Self::ticket(order, None, Some(ticket_type.id), stamp, index, now))
                    .collect();

                Ok(IssuancePlan {
                    tickets,
                    seats_to_mark_sold: Vec::new(),
                    ticket_type_units: Some((ticket_type.id, order.quantity)),
                    promo_code_id: order.promo_code_id,
                    release_session: None,
                })
            }
        }
    }

    fn ticket(
        order: &Order,
        seat_id: Option<SeatId>,
        ticket_type_id: Option<TicketTypeId>,
        stamp: i64,
        index: usize,
        now: DateTime<Utc>,
    ) -> Ticket {
        Ticket {
            id: TicketId::new(),
            qr_code: qr_code(order, stamp, index),
            status: TicketStatus::Active,
            is_used: false,
            used_at: None,
            seat_id,
            ticket_type_id,
            user_id: order.user_id.clone(),
            order_id: order.id,
            event_id: order.event_id,
            created_at: now,
        }
    }
}

/// `<event>-<user>-<nanos>-<index>-<random>`; the index makes codes unique
/// within a batch, the random part across batches.
fn qr_code(order: &Order, stamp: i64, index: usize) -> String {
    let user: String = order
        .user_id
        .as_str()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(32)
        .collect();
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}-{}-{}",
        order.event_id.as_uuid().simple(),
        user,
        stamp,
        index,
        &random[..12]
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use common::{EventId, UserId};

    use super::*;
    use crate::identifiers::OrderNumber;
    use crate::money::{Currency, Money};
    use crate::order::{BuyerInfo, NewOrder};
    use crate::pricing::{CommissionPolicy, PriceBreakdown};

    fn order(reservation: OrderReservation, quantity: u32) -> Order {
        Order::new_pending(
            NewOrder {
                order_number: OrderNumber::generate("ORD", Utc::now()),
                user_id: UserId::new("user_2abc"),
                event_id: EventId::new(),
                buyer: BuyerInfo {
                    name: "Ana".to_string(),
                    email: "ana@example.com".to_string(),
                    phone: None,
                },
                currency: Currency::Clp,
                quantity,
                price: PriceBreakdown::compute(Money::new(10_000), None, &CommissionPolicy::none()),
                promo_code_id: Some(PromoCodeId::new()),
                reservation,
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn ticket_type(event_id: EventId, tickets_generated: u32) -> TicketType {
        TicketType {
            id: TicketTypeId::new(),
            event_id,
            name: "General".to_string(),
            price: Money::new(10_000),
            capacity: 100,
            tickets_generated,
            sold_units: 0,
        }
    }

    #[test]
    fn test_seat_order_gets_one_ticket_per_seat() {
        let seats = vec![SeatId::new("A1"), SeatId::new("A2")];
        let order = order(
            OrderReservation::Seats {
                session_id: SessionId::new("s1"),
                seat_ids: seats.clone(),
            },
            2,
        );

        let plan = TicketIssuer::issue(&order, None, Utc::now()).unwrap();

        assert_eq!(plan.ticket_count(), 2);
        assert_eq!(plan.seats_to_mark_sold, seats);
        assert_eq!(plan.release_session, Some(SessionId::new("s1")));
        assert_eq!(plan.promo_code_id, order.promo_code_id);
        let linked: Vec<_> = plan.tickets.iter().filter_map(|t| t.seat_id.clone()).collect();
        assert_eq!(linked, seats);
        assert!(plan.tickets.iter().all(|t| t.order_id == order.id));
    }

    #[test]
    fn test_ticket_type_order_multiplies_quantity() {
        let event_id = EventId::new();
        let mut tt = ticket_type(event_id, 2);
        let mut order = order(OrderReservation::TicketType { ticket_type_id: tt.id }, 3);
        order.event_id = event_id;
        tt.event_id = event_id;

        let plan = TicketIssuer::issue(&order, Some(&tt), Utc::now()).unwrap();

        assert_eq!(plan.ticket_count(), 6);
        assert_eq!(plan.ticket_type_units, Some((tt.id, 3)));
        assert!(plan.seats_to_mark_sold.is_empty());
        assert!(plan.release_session.is_none());
        assert!(plan.tickets.iter().all(|t| t.ticket_type_id == Some(tt.id)));
    }

    #[test]
    fn test_qr_codes_are_unique_within_a_batch() {
        let tt = ticket_type(EventId::new(), 1);
        let order = order(OrderReservation::TicketType { ticket_type_id: tt.id }, 50);
        let now = Utc::now();

        let plan = TicketIssuer::issue(&order, Some(&tt), now).unwrap();
        let codes: HashSet<_> = plan.tickets.iter().map(|t| t.qr_code.as_str()).collect();
        assert_eq!(codes.len(), 50);

        let again = TicketIssuer::issue(&order, Some(&tt), now).unwrap();
        assert!(again.tickets.iter().all(|t| !codes.contains(t.qr_code.as_str())));
    }

    #[test]
    fn test_wrong_ticket_type_is_rejected() {
        let tt = ticket_type(EventId::new(), 1);
        let order = order(
            OrderReservation::TicketType {
                ticket_type_id: TicketTypeId::new(),
            },
            1,
        );
        assert!(matches!(
            TicketIssuer::issue(&order, Some(&tt), Utc::now()),
            Err(DomainError::TicketTypeMismatch { .. })
        ));
        assert!(TicketIssuer::issue(&order, None, Utc::now()).is_err());
    }

    #[test]
    fn test_missing_metadata_is_a_consistency_error() {
        let mut order = order(
            OrderReservation::Seats {
                session_id: SessionId::new("s1"),
                seat_ids: vec![SeatId::new("A1")],
            },
            1,
        );
        order.reservation = None;
        assert!(matches!(
            TicketIssuer::issue(&order, None, Utc::now()),
            Err(DomainError::MissingReservation { .. })
        ));
    }
}
