use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{SeatId, SessionId};
use tokio::sync::RwLock;

use crate::{Result, SeatLock, SeatLockStore, StoreError};

/// In-memory seat-lock store.
///
/// A batch acquire runs under one write guard, which makes it atomic with
/// respect to every other call on the same store.
#[derive(Clone, Default)]
pub struct InMemorySeatLockStore {
    locks: Arc<RwLock<HashMap<SeatId, SeatLock>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemorySeatLockStore {
    /// Creates a new empty lock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call fail as if the store were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored locks, expired ones included.
    pub async fn lock_count(&self) -> usize {
        self.locks.read().await.len()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("seat-lock store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SeatLockStore for InMemorySeatLockStore {
    async fn try_acquire(
        &self,
        session: &SessionId,
        seat_ids: &[SeatId],
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.check_available()?;
        let mut locks = self.locks.write().await;

        let conflict = seat_ids.iter().any(|seat_id| {
            locks
                .get(seat_id)
                .is_some_and(|lock| lock.blocks(session, now))
        });
        if conflict {
            return Ok(false);
        }

        for seat_id in seat_ids {
            locks.insert(
                seat_id.clone(),
                SeatLock {
                    seat_id: seat_id.clone(),
                    session_id: session.clone(),
                    expires_at,
                },
            );
        }
        Ok(true)
    }

    async fn live_locks(&self, seat_ids: &[SeatId], now: DateTime<Utc>) -> Result<Vec<SeatLock>> {
        self.check_available()?;
        let locks = self.locks.read().await;
        Ok(seat_ids
            .iter()
            .filter_map(|seat_id| locks.get(seat_id))
            .filter(|lock| lock.is_live(now))
            .cloned()
            .collect())
    }

    async fn session_locks(
        &self,
        session: &SessionId,
        now: DateTime<Utc>,
    ) -> Result<Vec<SeatLock>> {
        self.check_available()?;
        let locks = self.locks.read().await;
        let mut held: Vec<_> = locks
            .values()
            .filter(|lock| &lock.session_id == session && lock.is_live(now))
            .cloned()
            .collect();
        held.sort_by(|a, b| a.seat_id.cmp(&b.seat_id));
        Ok(held)
    }

    async fn release(&self, session: &SessionId, seat_ids: Option<&[SeatId]>) -> Result<usize> {
        self.check_available()?;
        let mut locks = self.locks.write().await;
        let before = locks.len();
        locks.retain(|seat_id, lock| {
            let owned = &lock.session_id == session;
            let selected = seat_ids.is_none_or(|ids| ids.contains(seat_id));
            !(owned && selected)
        });
        Ok(before - locks.len())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        self.check_available()?;
        let mut locks = self.locks.write().await;
        let before = locks.len();
        locks.retain(|_, lock| lock.is_live(now));
        Ok(before - locks.len())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn seats(ids: &[&str]) -> Vec<SeatId> {
        ids.iter().map(|id| SeatId::new(*id)).collect()
    }

    #[tokio::test]
    async fn test_conflicting_batch_leaves_nothing_behind() {
        let store = InMemorySeatLockStore::new();
        let now = Utc::now();
        let until = now + Duration::minutes(10);
        let s1 = SessionId::new("s1");
        let s2 = SessionId::new("s2");

        assert!(store.try_acquire(&s1, &seats(&["A1"]), until, now).await.unwrap());
        assert!(!store.try_acquire(&s2, &seats(&["A1", "B1"]), until, now).await.unwrap());

        assert!(store.live_locks(&seats(&["B1"]), now).await.unwrap().is_empty());
        assert_eq!(store.lock_count().await, 1);
    }

    #[tokio::test]
    async fn test_same_session_refreshes() {
        let store = InMemorySeatLockStore::new();
        let now = Utc::now();
        let s1 = SessionId::new("s1");

        store
            .try_acquire(&s1, &seats(&["A1"]), now + Duration::minutes(1), now)
            .await
            .unwrap();
        let later = now + Duration::minutes(10);
        assert!(store.try_acquire(&s1, &seats(&["A1"]), later, now).await.unwrap());

        let held = store.session_locks(&s1, now).await.unwrap();
        assert_eq!(held[0].expires_at, later);
    }

    #[tokio::test]
    async fn test_expired_lock_can_be_taken_over() {
        let store = InMemorySeatLockStore::new();
        let now = Utc::now();
        let s1 = SessionId::new("s1");
        let s2 = SessionId::new("s2");
        store
            .try_acquire(&s1, &seats(&["A1"]), now + Duration::seconds(5), now)
            .await
            .unwrap();

        let after = now + Duration::seconds(6);
        assert!(store.session_locks(&s1, after).await.unwrap().is_empty());
        assert!(store
            .try_acquire(&s2, &seats(&["A1"]), after + Duration::minutes(10), after)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_release_only_touches_own_locks() {
        let store = InMemorySeatLockStore::new();
        let now = Utc::now();
        let until = now + Duration::minutes(10);
        let s1 = SessionId::new("s1");
        let s2 = SessionId::new("s2");
        store.try_acquire(&s1, &seats(&["A1", "A2"]), until, now).await.unwrap();
        store.try_acquire(&s2, &seats(&["B1"]), until, now).await.unwrap();

        assert_eq!(store.release(&s1, Some(&seats(&["A2", "B1"]))).await.unwrap(), 1);
        assert_eq!(store.release(&s1, None).await.unwrap(), 1);
        assert_eq!(store.release(&s1, None).await.unwrap(), 0);
        assert_eq!(store.session_locks(&s2, now).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = InMemorySeatLockStore::new();
        let now = Utc::now();
        store
            .try_acquire(&SessionId::new("s1"), &seats(&["A1"]), now, now)
            .await
            .unwrap();
        store
            .try_acquire(
                &SessionId::new("s2"),
                &seats(&["A2"]),
                now + Duration::minutes(1),
                now,
            )
            .await
            .unwrap();
        assert_eq!(store.purge_expired(now).await.unwrap(), 1);
        assert_eq!(store.lock_count().await, 1);
    }

    #[tokio::test]
    async fn test_unavailable_store_errors() {
        let store = InMemorySeatLockStore::new();
        store.set_unavailable(true);
        let result = store
            .try_acquire(&SessionId::new("s1"), &seats(&["A1"]), Utc::now(), Utc::now())
            .await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
