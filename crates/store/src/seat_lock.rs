//! Session-scoped, expiring seat locks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{SeatId, SessionId};
use serde::{Deserialize, Serialize};

use crate::Result;

/// A temporary hold on one seat for one checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatLock {
    pub seat_id: SeatId,
    pub session_id: SessionId,
    pub expires_at: DateTime<Utc>,
}

impl SeatLock {
    /// A lock is live until its expiry instant; expired locks are treated as
    /// absent everywhere.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// Returns true if the lock blocks `session` from the seat at `now`.
    pub fn blocks(&self, session: &SessionId, now: DateTime<Utc>) -> bool {
        self.is_live(now) && &self.session_id != session
    }
}

/// Keyed lock store; the sole arbiter of seat exclusivity.
///
/// Implementations must make [`SeatLockStore::try_acquire`] a single atomic
/// conditional batch. Time is always passed in so callers control the clock.
#[async_trait]
pub trait SeatLockStore: Send + Sync {
    /// Acquires or refreshes locks on all `seat_ids` for `session`.
    ///
    /// Succeeds only if no seat has a live lock held by another session; on
    /// success every lock expires at `expires_at`. On conflict returns
    /// `false` and leaves every existing lock untouched.
    async fn try_acquire(
        &self,
        session: &SessionId,
        seat_ids: &[SeatId],
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Live locks on any of `seat_ids`, whoever holds them.
    async fn live_locks(&self, seat_ids: &[SeatId], now: DateTime<Utc>) -> Result<Vec<SeatLock>>;

    /// Live locks held by `session`.
    async fn session_locks(&self, session: &SessionId, now: DateTime<Utc>)
    -> Result<Vec<SeatLock>>;

    /// Deletes the session's locks on `seat_ids`, or all of them for `None`.
    ///
    /// Idempotent; returns the number of locks removed.
    async fn release(&self, session: &SessionId, seat_ids: Option<&[SeatId]>) -> Result<usize>;

    /// Deletes expired locks. Storage hygiene only.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}
