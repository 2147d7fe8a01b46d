//! Session-scoped seat holds.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common::{Clock, SeatId, SessionId};
use store::{CheckoutStore, SeatLockStore};

use crate::error::{CheckoutFailure, Result};

/// Default lifetime of a seat hold.
pub const DEFAULT_SEAT_LOCK_TTL_SECS: i64 = 600;

/// Holds seats for a checkout session until they are paid for, released or
/// the hold expires.
///
/// The lock store decides who holds a seat. The persisted seat status only
/// says whether the seat was already sold or withheld.
#[derive(Clone)]
pub struct SeatReservationManager {
    locks: Arc<dyn SeatLockStore>,
    store: Arc<dyn CheckoutStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl SeatReservationManager {
    /// Creates a manager using the default hold lifetime.
    pub fn new(
        locks: Arc<dyn SeatLockStore>,
        store: Arc<dyn CheckoutStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            locks,
            store,
            clock,
            ttl: Duration::seconds(DEFAULT_SEAT_LOCK_TTL_SECS),
        }
    }

    /// Sets how long a hold lives after its last refresh.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// True if every seat exists, is not sold or blocked, and nobody holds it.
    pub async fn are_seats_available(&self, seat_ids: &[SeatId]) -> Result<bool> {
        self.check_availability(None, seat_ids).await
    }

    /// Like [`Self::are_seats_available`], but seats held by `session`
    /// count as available.
    pub async fn are_seats_available_for(
        &self,
        session: &SessionId,
        seat_ids: &[SeatId],
    ) -> Result<bool> {
        self.check_availability(Some(session), seat_ids).await
    }

    async fn check_availability(
        &self,
        session: Option<&SessionId>,
        seat_ids: &[SeatId],
    ) -> Result<bool> {
        validate_selection(seat_ids)?;
        if !self.all_sellable(seat_ids).await? {
            return Ok(false);
        }

        let now = self.clock.now();
        let locks = self.locks.live_locks(seat_ids, now).await?;
        Ok(locks
            .iter()
            .all(|lock| session.is_some_and(|s| lock.session_id == *s)))
    }

    async fn all_sellable(&self, seat_ids: &[SeatId]) -> Result<bool> {
        let seats = self.store.get_seats(seat_ids).await?;
        Ok(seats.len() == seat_ids.len() && seats.iter().all(|seat| seat.is_available()))
    }

    /// Holds every seat for `session`, or none of them.
    ///
    /// Seats the session already holds are refreshed. Returns `false` when
    /// some seat is unknown, sold, blocked or held by another session; in
    /// that case no hold was created or refreshed.
    #[tracing::instrument(skip(self, seat_ids), fields(session_id = %session, seats = seat_ids.len()))]
    pub async fn reserve_seats(&self, session: &SessionId, seat_ids: &[SeatId]) -> Result<bool> {
        validate_session(session)?;
        validate_selection(seat_ids)?;

        if !self.all_sellable(seat_ids).await? {
            tracing::info!("seat not sellable");
            metrics::counter!("seat_reservation_conflicts_total").increment(1);
            return Ok(false);
        }

        let now = self.clock.now();
        let acquired = self
            .locks
            .try_acquire(session, seat_ids, now + self.ttl, now)
            .await?;

        if acquired {
            metrics::counter!("seat_reservations_total").increment(1);
            tracing::debug!("seats held");
        } else {
            metrics::counter!("seat_reservation_conflicts_total").increment(1);
            tracing::info!("seat held by another session");
        }
        Ok(acquired)
    }

    /// Seats currently held by `session`, or `None` if it holds nothing.
    pub async fn get_session_reservations(
        &self,
        session: &SessionId,
    ) -> Result<Option<Vec<SeatId>>> {
        let locks = self.locks.session_locks(session, self.clock.now()).await?;
        if locks.is_empty() {
            return Ok(None);
        }
        Ok(Some(locks.into_iter().map(|lock| lock.seat_id).collect()))
    }

    /// When the earliest of the session's holds runs out.
    pub async fn reservation_expiry(&self, session: &SessionId) -> Result<Option<DateTime<Utc>>> {
        let locks = self.locks.session_locks(session, self.clock.now()).await?;
        Ok(locks.iter().map(|lock| lock.expires_at).min())
    }

    /// Drops every hold of `session`. Idempotent.
    #[tracing::instrument(skip(self), fields(session_id = %session))]
    pub async fn release_reservation(&self, session: &SessionId) -> Result<usize> {
        let released = self.locks.release(session, None).await?;
        tracing::debug!(released, "session released");
        Ok(released)
    }

    /// Drops the holds of `session` on `seat_ids` only. Idempotent.
    pub async fn release_seats(&self, session: &SessionId, seat_ids: &[SeatId]) -> Result<usize> {
        Ok(self.locks.release(session, Some(seat_ids)).await?)
    }

    /// Deletes expired holds. Expired holds are already ignored, so this only
    /// reclaims storage.
    pub async fn purge_expired(&self) -> Result<usize> {
        Ok(self.locks.purge_expired(self.clock.now()).await?)
    }
}

fn validate_session(session: &SessionId) -> Result<()> {
    if session.is_blank() {
        return Err(CheckoutFailure::InvalidRequest("sessionId must not be empty".to_string()).into());
    }
    Ok(())
}

/// Rejects empty selections, blank ids and duplicates.
pub(crate) fn validate_selection(seat_ids: &[SeatId]) -> Result<()> {
    if seat_ids.is_empty() {
        return Err(CheckoutFailure::InvalidSeatSelection("no seats selected".to_string()).into());
    }
    let mut seen = HashSet::with_capacity(seat_ids.len());
    for seat_id in seat_ids {
        if seat_id.is_blank() {
            return Err(
                CheckoutFailure::InvalidSeatSelection("blank seat id".to_string()).into(),
            );
        }
        if !seen.insert(seat_id) {
            return Err(CheckoutFailure::InvalidSeatSelection(format!(
                "seat {seat_id} selected twice"
            ))
            .into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use common::{EventId, ManualClock, SectionId};
    use domain::{Currency, Event, Money, Seat, SeatStatus, Section};
    use store::{CatalogSeeder, InMemoryCheckoutStore, InMemorySeatLockStore};

    use super::*;
    use crate::error::CheckoutError;

    struct Harness {
        manager: SeatReservationManager,
        store: InMemoryCheckoutStore,
        locks: InMemorySeatLockStore,
        clock: ManualClock,
    }

    async fn harness() -> Harness {
        let store = InMemoryCheckoutStore::new();
        let locks = InMemorySeatLockStore::new();
        let clock = ManualClock::default();

        let event = Event {
            id: EventId::new(),
            title: "Teatro".to_string(),
            is_published: true,
            currency: Currency::Clp,
        };
        let section = Section {
            id: SectionId::new(),
            event_id: event.id,
            name: "Platea".to_string(),
            price: Money::new(5000),
        };
        store.save_event(&event).await.unwrap();
        store.save_section(&section).await.unwrap();
        for (label, status) in [
            ("A1", SeatStatus::Available),
            ("A2", SeatStatus::Available),
            ("A3", SeatStatus::Available),
            ("S1", SeatStatus::Sold),
            ("B1", SeatStatus::Blocked),
        ] {
            store
                .save_seat(&Seat {
                    id: SeatId::new(label),
                    event_id: event.id,
                    section_id: section.id,
                    label: label.to_string(),
                    price: None,
                    status,
                })
                .await
                .unwrap();
        }

        let manager = SeatReservationManager::new(
            Arc::new(locks.clone()),
            Arc::new(store.clone()),
            Arc::new(clock.clone()),
        );
        Harness {
            manager,
            store,
            locks,
            clock,
        }
    }

    fn seats(ids: &[&str]) -> Vec<SeatId> {
        ids.iter().map(|id| SeatId::new(*id)).collect()
    }

    #[tokio::test]
    async fn test_hold_excludes_other_sessions() {
        let h = harness().await;
        let a = SessionId::new("a");
        let b = SessionId::new("b");

        assert!(h.manager.reserve_seats(&a, &seats(&["A1", "A2"])).await.unwrap());
        assert!(!h.manager.reserve_seats(&b, &seats(&["A2"])).await.unwrap());
        assert!(!h.manager.are_seats_available(&seats(&["A1"])).await.unwrap());
        assert!(h.manager.are_seats_available_for(&a, &seats(&["A1"])).await.unwrap());
        assert!(!h.manager.are_seats_available_for(&b, &seats(&["A1"])).await.unwrap());
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let h = harness().await;
        let a = SessionId::new("a");
        let b = SessionId::new("b");

        assert!(h.manager.reserve_seats(&a, &seats(&["A2"])).await.unwrap());
        assert!(!h.manager.reserve_seats(&b, &seats(&["A1", "A2", "A3"])).await.unwrap());

        assert_eq!(h.manager.get_session_reservations(&b).await.unwrap(), None);
        assert!(h.manager.are_seats_available(&seats(&["A1", "A3"])).await.unwrap());
        assert_eq!(h.locks.lock_count().await, 1);
    }

    #[tokio::test]
    async fn test_holds_expire_after_ttl() {
        let h = harness().await;
        let manager = h.manager.clone().with_ttl(Duration::seconds(600));
        let a = SessionId::new("a");
        let b = SessionId::new("b");

        assert!(manager.reserve_seats(&a, &seats(&["A1"])).await.unwrap());
        h.clock.advance(Duration::seconds(599));
        assert!(!manager.reserve_seats(&b, &seats(&["A1"])).await.unwrap());

        h.clock.advance(Duration::seconds(2));
        assert_eq!(manager.get_session_reservations(&a).await.unwrap(), None);
        assert!(manager.reserve_seats(&b, &seats(&["A1"])).await.unwrap());
    }

    #[tokio::test]
    async fn test_refresh_extends_expiry() {
        let h = harness().await;
        let a = SessionId::new("a");

        assert!(h.manager.reserve_seats(&a, &seats(&["A1"])).await.unwrap());
        let first = h.manager.reservation_expiry(&a).await.unwrap().unwrap();

        h.clock.advance(Duration::seconds(300));
        assert!(h.manager.reserve_seats(&a, &seats(&["A1", "A2"])).await.unwrap());
        let second = h.manager.reservation_expiry(&a).await.unwrap().unwrap();

        assert_eq!(second - first, Duration::seconds(300));
        assert_eq!(
            h.manager.get_session_reservations(&a).await.unwrap(),
            Some(seats(&["A1", "A2"]))
        );
    }

    #[tokio::test]
    async fn test_sold_blocked_and_unknown_seats_are_refused() {
        let h = harness().await;
        let a = SessionId::new("a");

        for selection in [seats(&["A1", "S1"]), seats(&["B1"]), seats(&["Z9"])] {
            assert!(!h.manager.reserve_seats(&a, &selection).await.unwrap());
            assert!(!h.manager.are_seats_available(&selection).await.unwrap());
        }
        assert_eq!(h.locks.lock_count().await, 0);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let h = harness().await;
        let a = SessionId::new("a");

        assert!(h.manager.reserve_seats(&a, &seats(&["A1", "A2"])).await.unwrap());
        assert_eq!(h.manager.release_seats(&a, &seats(&["A1"])).await.unwrap(), 1);
        assert_eq!(
            h.manager.get_session_reservations(&a).await.unwrap(),
            Some(seats(&["A2"]))
        );

        assert_eq!(h.manager.release_reservation(&a).await.unwrap(), 1);
        assert_eq!(h.manager.release_reservation(&a).await.unwrap(), 0);
        assert_eq!(h.manager.get_session_reservations(&a).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_selections_are_business_errors() {
        let h = harness().await;
        let a = SessionId::new("a");

        for selection in [vec![], seats(&["A1", "A1"]), seats(&[" "])] {
            let err = h.manager.reserve_seats(&a, &selection).await.unwrap_err();
            assert!(matches!(
                err,
                CheckoutError::Rejected(CheckoutFailure::InvalidSeatSelection(_))
            ));
        }

        let err = h
            .manager
            .reserve_seats(&SessionId::new(""), &seats(&["A1"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Rejected(CheckoutFailure::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_store_outage_is_an_error() {
        let h = harness().await;
        h.locks.set_unavailable(true);
        let err = h
            .manager
            .reserve_seats(&SessionId::new("a"), &seats(&["A1"]))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Store(_)));

        h.locks.set_unavailable(false);
        h.store.set_unavailable(true);
        assert!(h.manager.are_seats_available(&seats(&["A1"])).await.is_err());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let h = harness().await;
        assert!(h
            .manager
            .reserve_seats(&SessionId::new("a"), &seats(&["A1"]))
            .await
            .unwrap());
        h.clock.advance(Duration::seconds(DEFAULT_SEAT_LOCK_TTL_SECS + 1));
        assert_eq!(h.manager.purge_expired().await.unwrap(), 1);
        assert_eq!(h.locks.lock_count().await, 0);
    }
}
