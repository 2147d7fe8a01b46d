use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{SeatId, SessionId};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{Result, SeatLock, SeatLockStore};

/// PostgreSQL-backed seat-lock store.
///
/// `seat_locks.seat_id` is the primary key, so a seat can carry one lock row
/// at most. Batch acquisition upserts every seat inside one transaction and
/// rolls back as soon as one seat is held live by someone else.
#[derive(Clone)]
pub struct PostgresSeatLockStore {
    pool: PgPool,
}

impl PostgresSeatLockStore {
    /// Creates a new PostgreSQL seat-lock store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_lock(row: PgRow) -> Result<SeatLock> {
        Ok(SeatLock {
            seat_id: SeatId::new(row.try_get::<String, _>("seat_id")?),
            session_id: SessionId::new(row.try_get::<String, _>("session_id")?),
            expires_at: row.try_get("expires_at")?,
        })
    }
}

fn as_strings(seat_ids: &[SeatId]) -> Vec<String> {
    seat_ids.iter().map(|id| id.as_str().to_string()).collect()
}

#[async_trait]
impl SeatLockStore for PostgresSeatLockStore {
    #[tracing::instrument(skip(self, seat_ids), fields(seats = seat_ids.len()))]
    async fn try_acquire(
        &self,
        session: &SessionId,
        seat_ids: &[SeatId],
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        // A fixed lock order keeps two overlapping batches from deadlocking.
        let mut ordered = seat_ids.to_vec();
        ordered.sort();
        ordered.dedup();

        let mut tx = self.pool.begin().await?;
        for seat_id in &ordered {
            let result = sqlx::query(
                r#"
                INSERT INTO seat_locks (seat_id, session_id, expires_at)
                VALUES ($1, $2, $3)
                ON CONFLICT (seat_id) DO UPDATE SET
                    session_id = EXCLUDED.session_id,
                    expires_at = EXCLUDED.expires_at
                WHERE seat_locks.session_id = EXCLUDED.session_id
                   OR seat_locks.expires_at <= $4
                "#,
            )
            .bind(seat_id.as_str())
            .bind(session.as_str())
            .bind(expires_at)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                tx.rollback().await?;
                tracing::debug!(%seat_id, "seat held by another session");
                return Ok(false);
            }
        }
        tx.commit().await?;
        Ok(true)
    }

    async fn live_locks(&self, seat_ids: &[SeatId], now: DateTime<Utc>) -> Result<Vec<SeatLock>> {
        let rows = sqlx::query(
            r#"
            SELECT seat_id, session_id, expires_at
            FROM seat_locks
            WHERE seat_id = ANY($1) AND expires_at > $2
            "#,
        )
        .bind(as_strings(seat_ids))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_lock).collect()
    }

    async fn session_locks(
        &self,
        session: &SessionId,
        now: DateTime<Utc>,
    ) -> Result<Vec<SeatLock>> {
        let rows = sqlx::query(
            r#"
            SELECT seat_id, session_id, expires_at
            FROM seat_locks
            WHERE session_id = $1 AND expires_at > $2
            ORDER BY seat_id ASC
            "#,
        )
        .bind(session.as_str())
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_lock).collect()
    }

    async fn release(&self, session: &SessionId, seat_ids: Option<&[SeatId]>) -> Result<usize> {
        let result = match seat_ids {
            Some(ids) => {
                sqlx::query("DELETE FROM seat_locks WHERE session_id = $1 AND seat_id = ANY($2)")
                    .bind(session.as_str())
                    .bind(as_strings(ids))
                    .execute(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("DELETE FROM seat_locks WHERE session_id = $1")
                    .bind(session.as_str())
                    .execute(&self.pool)
                    .await?
            }
        };
        Ok(result.rows_affected() as usize)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let result = sqlx::query("DELETE FROM seat_locks WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }
}
