//! Order, payment and ticket persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{EventId, OrderId, PromoCodeId, SeatId, SectionId, TicketTypeId};
use domain::{
    Event, IssuancePlan, Order, OrderNumber, OrderStatus, Payment, PromoCode, Seat, Section,
    Ticket, TicketType,
};

use crate::Result;

/// Everything written when an order leaves `Pending`.
///
/// A commit is applied as one transaction guarded by `expected_status`: if
/// the stored order is no longer in that status nothing is written and the
/// store returns [`crate::StoreError::ConcurrencyConflict`].
#[derive(Debug, Clone)]
pub struct OrderCommit {
    /// The order carrying its new status and timestamps.
    pub order: Order,
    pub expected_status: OrderStatus,
    /// Payment rows to overwrite with their terminal status.
    pub payments: Vec<Payment>,
    pub tickets: Vec<Ticket>,
    pub seats_to_mark_sold: Vec<SeatId>,
    pub ticket_type_units: Option<(TicketTypeId, u32)>,
    pub promo_code_id: Option<PromoCodeId>,
}

impl OrderCommit {
    /// A paid order with its issued tickets.
    pub fn paid(order: Order, payments: Vec<Payment>, plan: IssuancePlan) -> Self {
        Self {
            order,
            expected_status: OrderStatus::Pending,
            payments,
            tickets: plan.tickets,
            seats_to_mark_sold: plan.seats_to_mark_sold,
            ticket_type_units: plan.ticket_type_units,
            promo_code_id: plan.promo_code_id,
        }
    }

    /// A cancelled order; nothing besides the status rows changes.
    pub fn cancelled(order: Order, payments: Vec<Payment>) -> Self {
        Self {
            order,
            expected_status: OrderStatus::Pending,
            payments,
            tickets: Vec::new(),
            seats_to_mark_sold: Vec::new(),
            ticket_type_units: None,
            promo_code_id: None,
        }
    }
}

/// Persistence the checkout flow depends on.
#[async_trait]
pub trait CheckoutStore: Send + Sync {
    async fn get_event(&self, event_id: EventId) -> Result<Option<Event>>;

    /// Returns the sections that exist among `section_ids`.
    async fn get_sections(&self, section_ids: &[SectionId]) -> Result<Vec<Section>>;

    /// Returns the seats that exist among `seat_ids`, in no particular order.
    async fn get_seats(&self, seat_ids: &[SeatId]) -> Result<Vec<Seat>>;

    async fn get_ticket_type(&self, ticket_type_id: TicketTypeId) -> Result<Option<TicketType>>;

    async fn ticket_types_for_event(&self, event_id: EventId) -> Result<Vec<TicketType>>;

    /// Looks a promo code up by its case-insensitive code within an event.
    async fn find_promo_code(&self, event_id: EventId, code: &str) -> Result<Option<PromoCode>>;

    async fn insert_order(&self, order: &Order) -> Result<()>;

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>>;

    async fn find_order_by_number(&self, order_number: &OrderNumber) -> Result<Option<Order>>;

    async fn insert_payment(&self, payment: &Payment) -> Result<()>;

    async fn find_payment_by_token(&self, token: &str) -> Result<Option<Payment>>;

    async fn payments_for_order(&self, order_id: OrderId) -> Result<Vec<Payment>>;

    async fn tickets_for_order(&self, order_id: OrderId) -> Result<Vec<Ticket>>;

    /// Applies an [`OrderCommit`] atomically.
    async fn commit_order(&self, commit: OrderCommit) -> Result<()>;

    /// Pending orders created strictly before `cutoff`, oldest first.
    async fn pending_orders_created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>>;
}

/// Writes catalog rows. Catalog administration lives outside this service,
/// so this is used for seeding and tests.
#[async_trait]
pub trait CatalogSeeder: Send + Sync {
    async fn save_event(&self, event: &Event) -> Result<()>;
    async fn save_section(&self, section: &Section) -> Result<()>;
    async fn save_seat(&self, seat: &Seat) -> Result<()>;
    async fn save_ticket_type(&self, ticket_type: &TicketType) -> Result<()>;
    async fn save_promo_code(&self, promo_code: &PromoCode) -> Result<()>;
}
