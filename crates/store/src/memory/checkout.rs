use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{EventId, OrderId, PaymentId, PromoCodeId, SeatId, SectionId, TicketTypeId};
use domain::{
    Event, Order, OrderNumber, Payment, PromoCode, Seat, SeatStatus, Section, Ticket, TicketType,
};
use tokio::sync::RwLock;

use crate::{CatalogSeeder, CheckoutStore, OrderCommit, Result, StoreError};

#[derive(Clone, Default)]
struct State {
    events: HashMap<EventId, Event>,
    sections: HashMap<SectionId, Section>,
    seats: HashMap<SeatId, Seat>,
    ticket_types: HashMap<TicketTypeId, TicketType>,
    promo_codes: HashMap<PromoCodeId, PromoCode>,
    orders: HashMap<OrderId, Order>,
    payments: HashMap<PaymentId, Payment>,
    tickets: Vec<Ticket>,
    qr_codes: HashSet<String>,
}

impl State {
    /// Applies a commit to this state. Callers stage on a copy so a failure
    /// part-way through leaves the live state untouched.
    fn apply(&mut self, commit: OrderCommit, fail_after_tickets: bool) -> Result<()> {
        let order_id = commit.order.id;
        let current = self
            .orders
            .get(&order_id)
            .ok_or_else(|| StoreError::not_found("order", order_id))?;
        if current.status != commit.expected_status {
            return Err(StoreError::ConcurrencyConflict {
                order_id,
                expected: commit.expected_status,
                actual: current.status,
            });
        }

        for ticket in commit.tickets {
            if !self.qr_codes.insert(ticket.qr_code.clone()) {
                return Err(StoreError::DuplicateQrCode(ticket.qr_code));
            }
            self.tickets.push(ticket);
        }

        if fail_after_tickets {
            return Err(StoreError::Unavailable(
                "connection lost during order commit".to_string(),
            ));
        }

        for seat_id in &commit.seats_to_mark_sold {
            let seat = self
                .seats
                .get_mut(seat_id)
                .ok_or_else(|| StoreError::not_found("seat", seat_id))?;
            if seat.status != SeatStatus::Available {
                return Err(StoreError::SoldOut(format!(
                    "seat {seat_id} is {}",
                    seat.status.as_str()
                )));
            }
            seat.status = SeatStatus::Sold;
        }

        if let Some((ticket_type_id, units)) = commit.ticket_type_units {
            let ticket_type = self
                .ticket_types
                .get_mut(&ticket_type_id)
                .ok_or_else(|| StoreError::not_found("ticket type", ticket_type_id))?;
            if units > ticket_type.remaining() {
                return Err(StoreError::SoldOut(format!(
                    "ticket type {ticket_type_id} has {} units left, {units} claimed",
                    ticket_type.remaining()
                )));
            }
            ticket_type.sold_units += units;
        }

        if let Some(promo_code_id) = commit.promo_code_id {
            let promo = self
                .promo_codes
                .get_mut(&promo_code_id)
                .ok_or_else(|| StoreError::not_found("promo code", promo_code_id))?;
            if promo.max_uses.is_some_and(|max| promo.used_count >= max) {
                return Err(StoreError::SoldOut(format!(
                    "promo code {} reached its usage limit",
                    promo.code
                )));
            }
            promo.used_count += 1;
        }

        for payment in commit.payments {
            if !self.payments.contains_key(&payment.id) {
                return Err(StoreError::not_found("payment", payment.id));
            }
            self.payments.insert(payment.id, payment);
        }

        self.orders.insert(order_id, commit.order);
        Ok(())
    }
}

/// In-memory checkout store.
///
/// Commits are staged on a copy of the whole state and swapped in only once
/// every write succeeded, mirroring a database transaction.
#[derive(Clone, Default)]
pub struct InMemoryCheckoutStore {
    state: Arc<RwLock<State>>,
    unavailable: Arc<AtomicBool>,
    fail_on_commit: Arc<AtomicBool>,
}

impl InMemoryCheckoutStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call fail as if the database were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes the next commits fail after tickets were staged and before the
    /// order status is written.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.fail_on_commit.store(fail, Ordering::SeqCst);
    }

    /// Total number of tickets stored.
    pub async fn ticket_count(&self) -> usize {
        self.state.read().await.tickets.len()
    }

    /// Total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns a seat row.
    pub async fn seat(&self, seat_id: &SeatId) -> Option<Seat> {
        self.state.read().await.seats.get(seat_id).cloned()
    }

    /// Overwrites an order row as-is. Used to simulate tampered data.
    pub async fn overwrite_order(&self, order: Order) {
        self.state.write().await.orders.insert(order.id, order);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("checkout store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CheckoutStore for InMemoryCheckoutStore {
    async fn get_event(&self, event_id: EventId) -> Result<Option<Event>> {
        self.check_available()?;
        Ok(self.state.read().await.events.get(&event_id).cloned())
    }

    async fn get_sections(&self, section_ids: &[SectionId]) -> Result<Vec<Section>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(section_ids
            .iter()
            .filter_map(|id| state.sections.get(id))
            .cloned()
            .collect())
    }

    async fn get_seats(&self, seat_ids: &[SeatId]) -> Result<Vec<Seat>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(seat_ids
            .iter()
            .filter_map(|id| state.seats.get(id))
            .cloned()
            .collect())
    }

    async fn get_ticket_type(&self, ticket_type_id: TicketTypeId) -> Result<Option<TicketType>> {
        self.check_available()?;
        Ok(self
            .state
            .read()
            .await
            .ticket_types
            .get(&ticket_type_id)
            .cloned())
    }

    async fn ticket_types_for_event(&self, event_id: EventId) -> Result<Vec<TicketType>> {
        self.check_available()?;
        let state = self.state.read().await;
        let mut types: Vec<_> = state
            .ticket_types
            .values()
            .filter(|tt| tt.event_id == event_id)
            .cloned()
            .collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(types)
    }

    async fn find_promo_code(&self, event_id: EventId, code: &str) -> Result<Option<PromoCode>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .promo_codes
            .values()
            .find(|promo| promo.event_id == event_id && promo.matches(code))
            .cloned())
    }

    async fn insert_order(&self, order: &Order) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.write().await;
        if state
            .orders
            .values()
            .any(|o| o.order_number == order.order_number)
        {
            return Err(StoreError::AlreadyExists {
                entity: "order number",
                id: order.order_number.to_string(),
            });
        }
        state.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        self.check_available()?;
        Ok(self.state.read().await.orders.get(&order_id).cloned())
    }

    async fn find_order_by_number(&self, order_number: &OrderNumber) -> Result<Option<Order>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .find(|o| &o.order_number == order_number)
            .cloned())
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.write().await;
        if !state.orders.contains_key(&payment.order_id) {
            return Err(StoreError::not_found("order", payment.order_id));
        }
        state.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn find_payment_by_token(&self, token: &str) -> Result<Option<Payment>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state.payments.values().find(|p| p.token == token).cloned())
    }

    async fn payments_for_order(&self, order_id: OrderId) -> Result<Vec<Payment>> {
        self.check_available()?;
        let state = self.state.read().await;
        let mut payments: Vec<_> = state
            .payments
            .values()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }

    async fn tickets_for_order(&self, order_id: OrderId) -> Result<Vec<Ticket>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .tickets
            .iter()
            .filter(|t| t.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn commit_order(&self, commit: OrderCommit) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let mut staged = state.clone();
        staged.apply(commit, self.fail_on_commit.load(Ordering::SeqCst))?;
        *state = staged;
        Ok(())
    }

    async fn pending_orders_created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>> {
        self.check_available()?;
        let state = self.state.read().await;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|o| o.status == domain::OrderStatus::Pending && o.created_at < cutoff)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }
}

#[async_trait]
impl CatalogSeeder for InMemoryCheckoutStore {
    async fn save_event(&self, event: &Event) -> Result<()> {
        self.state
            .write()
            .await
            .events
            .insert(event.id, event.clone());
        Ok(())
    }

    async fn save_section(&self, section: &Section) -> Result<()> {
        self.state
            .write()
            .await
            .sections
            .insert(section.id, section.clone());
        Ok(())
    }

    async fn save_seat(&self, seat: &Seat) -> Result<()> {
        self.state
            .write()
            .await
            .seats
            .insert(seat.id.clone(), seat.clone());
        Ok(())
    }

    async fn save_ticket_type(&self, ticket_type: &TicketType) -> Result<()> {
        self.state
            .write()
            .await
            .ticket_types
            .insert(ticket_type.id, ticket_type.clone());
        Ok(())
    }

    async fn save_promo_code(&self, promo_code: &PromoCode) -> Result<()> {
        self.state
            .write()
            .await
            .promo_codes
            .insert(promo_code.id, promo_code.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use common::{SessionId, UserId};
    use domain::{
        BuyerInfo, CommissionPolicy, Currency, Money, NewOrder, OrderReservation, OrderStatus,
        PaymentAuthorization, PaymentStatus, PriceBreakdown, TicketIssuer,
    };

    use super::*;

    async fn seeded() -> (InMemoryCheckoutStore, Event, Vec<Seat>) {
        let store = InMemoryCheckoutStore::new();
        let event = Event {
            id: EventId::new(),
            title: "Festival".to_string(),
            is_published: true,
            currency: Currency::Clp,
        };
        let section = Section {
            id: SectionId::new(),
            event_id: event.id,
            name: "Platea".to_string(),
            price: Money::new(10_000),
        };
        store.save_event(&event).await.unwrap();
        store.save_section(&section).await.unwrap();
        let mut seats = Vec::new();
        for label in ["A1", "A2"] {
            let seat = Seat {
                id: SeatId::new(label),
                event_id: event.id,
                section_id: section.id,
                label: label.to_string(),
                price: None,
                status: SeatStatus::Available,
            };
            store.save_seat(&seat).await.unwrap();
            seats.push(seat);
        }
        (store, event, seats)
    }

    fn pending_order(event: &Event, seats: &[Seat]) -> Order {
        Order::new_pending(
            NewOrder {
                order_number: OrderNumber::generate("ORD", Utc::now()),
                user_id: UserId::new("user_1"),
                event_id: event.id,
                buyer: BuyerInfo {
                    name: "Ana".to_string(),
                    email: "ana@example.com".to_string(),
                    phone: None,
                },
                currency: Currency::Clp,
                quantity: seats.len() as u32,
                price: PriceBreakdown::compute(Money::new(20_000), None, &CommissionPolicy::none()),
                promo_code_id: None,
                reservation: OrderReservation::Seats {
                    session_id: SessionId::new("s1"),
                    seat_ids: seats.iter().map(|s| s.id.clone()).collect(),
                },
            },
            Utc::now(),
        )
        .unwrap()
    }

    async fn paid_commit(store: &InMemoryCheckoutStore, order: &Order, token: &str) -> OrderCommit {
        let mut payment = Payment::pending(order, token, Utc::now());
        store.insert_payment(&payment).await.unwrap();
        payment
            .approve(
                PaymentAuthorization {
                    authorization_code: Some("1213".to_string()),
                    response_code: 0,
                    payment_type_code: Some("VN".to_string()),
                    transaction_date: None,
                },
                Utc::now(),
            )
            .unwrap();

        let plan = TicketIssuer::issue(order, None, Utc::now()).unwrap();
        let mut paid = order.clone();
        paid.mark_paid(Utc::now()).unwrap();
        OrderCommit::paid(paid, vec![payment], plan)
    }

    #[tokio::test]
    async fn test_commit_applies_every_write() {
        let (store, event, seats) = seeded().await;
        let order = pending_order(&event, &seats);
        store.insert_order(&order).await.unwrap();

        let commit = paid_commit(&store, &order, "tok_1").await;
        store.commit_order(commit).await.unwrap();

        let stored = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Paid);
        assert_eq!(store.tickets_for_order(order.id).await.unwrap().len(), 2);
        assert_eq!(
            store.seat(&SeatId::new("A1")).await.unwrap().status,
            SeatStatus::Sold
        );
        let payment = store.find_payment_by_token("tok_1").await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Approved);
    }

    #[tokio::test]
    async fn test_second_commit_conflicts() {
        let (store, event, seats) = seeded().await;
        let order = pending_order(&event, &seats);
        store.insert_order(&order).await.unwrap();

        let commit = paid_commit(&store, &order, "tok_1").await;
        store.commit_order(commit.clone()).await.unwrap();
        let err = store.commit_order(commit).await.unwrap_err();

        assert!(matches!(
            err,
            StoreError::ConcurrencyConflict {
                actual: OrderStatus::Paid,
                ..
            }
        ));
        assert_eq!(store.ticket_count().await, 2);
    }

    #[tokio::test]
    async fn test_failed_commit_applies_nothing() {
        let (store, event, seats) = seeded().await;
        let order = pending_order(&event, &seats);
        store.insert_order(&order).await.unwrap();
        let commit = paid_commit(&store, &order, "tok_1").await;

        store.set_fail_on_commit(true);
        assert!(store.commit_order(commit).await.is_err());

        assert_eq!(store.ticket_count().await, 0);
        let stored = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        assert_eq!(
            store.seat(&SeatId::new("A1")).await.unwrap().status,
            SeatStatus::Available
        );
    }

    #[tokio::test]
    async fn test_seat_cannot_be_sold_to_a_second_order() {
        let (store, event, seats) = seeded().await;
        let first = pending_order(&event, &seats[..1]);
        let second = pending_order(&event, &seats[..1]);
        store.insert_order(&first).await.unwrap();
        store.insert_order(&second).await.unwrap();

        let commit = paid_commit(&store, &first, "tok_1").await;
        store.commit_order(commit).await.unwrap();

        let commit = paid_commit(&store, &second, "tok_2").await;
        let err = store.commit_order(commit).await.unwrap_err();

        assert!(err.is_sold_out());
        assert_eq!(store.ticket_count().await, 1);
        let stored = store.get_order(second.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        let payment = store.find_payment_by_token("tok_2").await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_ticket_type_capacity_is_enforced_at_commit() {
        let (store, event, seats) = seeded().await;
        let ticket_type = TicketType {
            id: TicketTypeId::new(),
            event_id: event.id,
            name: "General".to_string(),
            price: Money::new(5_000),
            capacity: 3,
            tickets_generated: 1,
            sold_units: 2,
        };
        store.save_ticket_type(&ticket_type).await.unwrap();
        let order = pending_order(&event, &seats);
        store.insert_order(&order).await.unwrap();

        let mut commit = paid_commit(&store, &order, "tok_1").await;
        commit.seats_to_mark_sold.clear();
        commit.ticket_type_units = Some((ticket_type.id, 2));
        let err = store.commit_order(commit).await.unwrap_err();

        assert!(err.is_sold_out());
        let stored = store.get_ticket_type(ticket_type.id).await.unwrap().unwrap();
        assert_eq!(stored.sold_units, 2);
        assert_eq!(store.ticket_count().await, 0);
    }

    #[tokio::test]
    async fn test_exhausted_promo_code_is_not_redeemed_again() {
        let (store, event, seats) = seeded().await;
        let promo = PromoCode {
            id: PromoCodeId::new(),
            event_id: event.id,
            code: "UNAVEZ".to_string(),
            discount: domain::Discount::Percentage(10),
            max_uses: Some(1),
            used_count: 1,
            valid_from: None,
            valid_until: None,
            is_active: true,
        };
        store.save_promo_code(&promo).await.unwrap();
        let order = pending_order(&event, &seats);
        store.insert_order(&order).await.unwrap();

        let mut commit = paid_commit(&store, &order, "tok_1").await;
        commit.promo_code_id = Some(promo.id);
        let err = store.commit_order(commit).await.unwrap_err();

        assert!(err.is_sold_out());
        assert_eq!(
            store.seat(&SeatId::new("A1")).await.unwrap().status,
            SeatStatus::Available
        );
        let stored = store.find_promo_code(event.id, "UNAVEZ").await.unwrap().unwrap();
        assert_eq!(stored.used_count, 1);
    }

    #[tokio::test]
    async fn test_promo_lookup_is_case_insensitive() {
        let (store, event, _) = seeded().await;
        let promo = PromoCode {
            id: PromoCodeId::new(),
            event_id: event.id,
            code: "VERANO".to_string(),
            discount: domain::Discount::Percentage(10),
            max_uses: None,
            used_count: 0,
            valid_from: None,
            valid_until: None,
            is_active: true,
        };
        store.save_promo_code(&promo).await.unwrap();

        assert!(store.find_promo_code(event.id, "verano").await.unwrap().is_some());
        assert!(store.find_promo_code(EventId::new(), "verano").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pending_orders_before_cutoff() {
        let (store, event, seats) = seeded().await;
        let order = pending_order(&event, &seats);
        store.insert_order(&order).await.unwrap();

        let later = order.created_at + chrono::Duration::seconds(1);
        assert_eq!(store.pending_orders_created_before(later).await.unwrap().len(), 1);
        assert!(store
            .pending_orders_created_before(order.created_at)
            .await
            .unwrap()
            .is_empty());
    }
}
