//! Shared identifiers and time source for the checkout workspace.

pub mod clock;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use types::{
    EventId, OrderId, PaymentId, PromoCodeId, SeatId, SectionId, SessionId, TicketId,
    TicketTypeId, UserId,
};
