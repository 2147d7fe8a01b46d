//! HTTP route handlers.

pub mod checkout;
pub mod orders;
pub mod payment;
pub mod reservations;
pub mod system;
