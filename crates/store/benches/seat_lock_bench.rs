use chrono::{Duration, Utc};
use common::{SeatId, SessionId};
use criterion::{Criterion, criterion_group, criterion_main};
use futures_util::future::join_all;
use store::{InMemorySeatLockStore, SeatLockStore};

fn seats(prefix: &str, count: usize) -> Vec<SeatId> {
    (0..count).map(|i| SeatId::new(format!("{prefix}{i}"))).collect()
}

fn bench_acquire_batch(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let seat_ids = seats("A", 6);

    c.bench_function("seat_locks/acquire_batch_6", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemorySeatLockStore::new();
                let now = Utc::now();
                store
                    .try_acquire(
                        &SessionId::generate(),
                        &seat_ids,
                        now + Duration::minutes(10),
                        now,
                    )
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_contended_acquire(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let seat_ids = seats("B", 4);

    c.bench_function("seat_locks/contended_acquire_32_sessions", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemorySeatLockStore::new();
                let now = Utc::now();
                let until = now + Duration::minutes(10);
                let sessions: Vec<_> = (0..32).map(|_| SessionId::generate()).collect();

                let attempts = sessions
                    .iter()
                    .map(|session| store.try_acquire(session, &seat_ids, until, now));
                let winners = join_all(attempts)
                    .await
                    .into_iter()
                    .filter(|r| matches!(r, Ok(true)))
                    .count();
                assert_eq!(winners, 1);
            });
        });
    });
}

fn bench_live_lock_lookup(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemorySeatLockStore::new();
    let now = Utc::now();
    rt.block_on(async {
        for chunk in seats("C", 1_000).chunks(4) {
            store
                .try_acquire(&SessionId::generate(), chunk, now + Duration::minutes(10), now)
                .await
                .unwrap();
        }
    });
    let probe = seats("C", 8);

    c.bench_function("seat_locks/live_locks_of_1000", |b| {
        b.iter(|| {
            rt.block_on(async {
                store.live_locks(&probe, now).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_acquire_batch,
    bench_contended_acquire,
    bench_live_lock_lookup
);
criterion_main!(benches);
