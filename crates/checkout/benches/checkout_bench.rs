use std::sync::Arc;

use checkout::{
    CheckoutRequest, CheckoutSelection, CheckoutSettings, GatewayReturn, InMemoryPaymentGateway,
    LogTicketNotifier, PaymentOrchestrator, SeatReservationManager,
};
use common::{EventId, SeatId, SectionId, SessionId, SystemClock, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{BuyerInfo, Currency, Event, Money, Seat, SeatStatus, Section};
use store::{CatalogSeeder, InMemoryCheckoutStore, InMemorySeatLockStore};

const SEATS: usize = 4;

async fn setup() -> PaymentOrchestrator {
    let store = InMemoryCheckoutStore::new();
    let event = Event {
        id: EventId::new(),
        title: "Bench".to_string(),
        is_published: true,
        currency: Currency::Clp,
    };
    let section = Section {
        id: SectionId::new(),
        event_id: event.id,
        name: "Cancha".to_string(),
        price: Money::new(15_000),
    };
    store.save_event(&event).await.unwrap();
    store.save_section(&section).await.unwrap();
    for i in 0..SEATS {
        store
            .save_seat(&Seat {
                id: SeatId::new(format!("S{i}")),
                event_id: event.id,
                section_id: section.id,
                label: format!("Seat {i}"),
                price: None,
                status: SeatStatus::Available,
            })
            .await
            .unwrap();
    }

    let clock = Arc::new(SystemClock);
    let reservations = SeatReservationManager::new(
        Arc::new(InMemorySeatLockStore::new()),
        Arc::new(store.clone()),
        clock.clone(),
    );
    PaymentOrchestrator::new(
        Arc::new(store),
        reservations,
        Arc::new(InMemoryPaymentGateway::new()),
        Arc::new(LogTicketNotifier),
        clock,
        CheckoutSettings::default(),
    )
}

fn request() -> CheckoutRequest {
    CheckoutRequest {
        user_id: UserId::new("bench"),
        session_id: Some(SessionId::generate()),
        buyer: BuyerInfo {
            name: "Bench".to_string(),
            email: "bench@example.com".to_string(),
            phone: None,
        },
        promo_code: None,
        selection: CheckoutSelection::Seats {
            event_id: None,
            seat_ids: (0..SEATS).map(|i| SeatId::new(format!("S{i}"))).collect(),
        },
    }
}

fn bench_checkout_and_return(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("checkout/create_and_approve_4_seats", |b| {
        b.iter(|| {
            rt.block_on(async {
                let orchestrator = setup().await;
                let created = orchestrator.create_checkout(request()).await.unwrap();
                let checkout::CheckoutCreated::Redirect { token, .. } = created else {
                    panic!("expected a redirect");
                };
                orchestrator
                    .handle_gateway_return(GatewayReturn::Commit { token })
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_checkout_and_return);
criterion_main!(benches);
