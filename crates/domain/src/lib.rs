//! Domain layer for the SorykPass checkout core.
//!
//! Pure records and rules, no I/O:
//! - catalog records (events, seats, ticket types, promo codes)
//! - orders, payments and tickets with their status machines
//! - price computation and gateway identifier generation
//! - ticket issuance plans

pub mod catalog;
pub mod error;
pub mod identifiers;
pub mod issuer;
pub mod money;
pub mod order;
pub mod payment;
pub mod pricing;
pub mod ticket;

pub use catalog::{Discount, Event, PromoCode, PromoRejection, Seat, SeatStatus, Section, TicketType};
pub use error::DomainError;
pub use identifiers::{GatewaySessionId, MAX_BUY_ORDER_LEN, MAX_GATEWAY_SESSION_LEN, OrderNumber};
pub use issuer::{IssuancePlan, TicketIssuer};
pub use money::{Currency, Money};
pub use order::{BuyerInfo, NewOrder, Order, OrderReservation, OrderStatus};
pub use payment::{Payment, PaymentAuthorization, PaymentStatus};
pub use pricing::{CommissionPolicy, PriceBreakdown};
pub use ticket::{Ticket, TicketStatus};
