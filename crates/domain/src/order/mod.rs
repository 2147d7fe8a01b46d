//! Orders: the record, its status machine and its reservation metadata.

mod model;
mod reservation;
mod state;

pub use model::{BuyerInfo, NewOrder, Order};
pub use reservation::OrderReservation;
pub use state::OrderStatus;
