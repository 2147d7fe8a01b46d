//! External services the checkout calls: the payment gateway and ticket
//! delivery.

pub mod gateway;
pub mod notifier;
pub mod webpay;

pub use gateway::{
    AUTHORIZED, CommitResponse, CreateTransaction, GatewayError, InMemoryPaymentGateway,
    MockOutcome, PaymentGateway, TransactionRedirect,
};
pub use notifier::{InMemoryTicketNotifier, LogTicketNotifier, NotifyError, TicketNotifier};
pub use webpay::{WebpayCredentials, WebpayEnvironment, WebpayGateway};
