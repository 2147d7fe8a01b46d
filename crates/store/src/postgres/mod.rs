//! PostgreSQL store implementations.

mod checkout;
mod seat_lock;

pub use checkout::PostgresCheckoutStore;
pub use seat_lock::PostgresSeatLockStore;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::Result;

/// Opens a connection pool.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Runs the database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}
