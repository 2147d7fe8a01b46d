//! In-memory store implementations for tests and local development.

mod checkout;
mod seat_lock;

pub use checkout::InMemoryCheckoutStore;
pub use seat_lock::InMemorySeatLockStore;
