//! Persistence for the checkout core.
//!
//! Two stores sit behind traits so the services never see a concrete
//! backend:
//! - [`SeatLockStore`]: expiring per-seat locks, the sole arbiter of seat
//!   exclusivity
//! - [`CheckoutStore`]: catalog reads plus orders, payments and tickets, with
//!   [`CheckoutStore::commit_order`] as the atomic multi-row primitive
//!
//! Each has an in-memory implementation (tests, local development) and a
//! PostgreSQL one.

pub mod checkout;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod seat_lock;

pub use checkout::{CatalogSeeder, CheckoutStore, OrderCommit};
pub use error::{Result, StoreError};
pub use memory::{InMemoryCheckoutStore, InMemorySeatLockStore};
pub use postgres::{PostgresCheckoutStore, PostgresSeatLockStore, connect, run_migrations};
pub use seat_lock::{SeatLock, SeatLockStore};
