//! Checkout core: seat holds, payment orchestration and ticket issuance.
//!
//! A checkout runs in three steps:
//! 1. Hold the selected seats for the browser session
//! 2. Open a pending order and a gateway transaction
//! 3. On the gateway's return, commit the order as paid (issuing tickets and
//!    marking seats sold) or cancel it, then drop the hold
//!
//! The seat-lock store is the only arbiter of who holds a seat, and every
//! order settlement is one store transaction guarded by the order status.

pub mod error;
pub mod orchestrator;
pub mod reservation;
pub mod services;
pub mod types;

pub use error::{CheckoutError, CheckoutFailure, Result};
pub use orchestrator::PaymentOrchestrator;
pub use reservation::{DEFAULT_SEAT_LOCK_TTL_SECS, SeatReservationManager};
pub use services::{
    CommitResponse, CreateTransaction, GatewayError, InMemoryPaymentGateway,
    InMemoryTicketNotifier, LogTicketNotifier, MockOutcome, NotifyError, PaymentGateway,
    TicketNotifier, TransactionRedirect, WebpayCredentials, WebpayEnvironment, WebpayGateway,
};
pub use types::{
    CheckoutCreated, CheckoutRequest, CheckoutSelection, CheckoutSettings, FailureReason,
    GatewayReturn, OrderSummary, ReturnOutcome,
};
