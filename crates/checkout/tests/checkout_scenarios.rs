//! End-to-end checkout scenarios against the in-memory stores and gateway.

use std::sync::Arc;

use checkout::{
    CheckoutCreated, CheckoutError, CheckoutFailure, CheckoutRequest, CheckoutSelection,
    CheckoutSettings, FailureReason, GatewayReturn, InMemoryPaymentGateway,
    InMemoryTicketNotifier, MockOutcome, PaymentOrchestrator, ReturnOutcome,
    SeatReservationManager,
};
use chrono::Duration;
use common::{
    Clock, EventId, ManualClock, PromoCodeId, SeatId, SectionId, SessionId, TicketTypeId, UserId,
};
use domain::{
    BuyerInfo, CommissionPolicy, Currency, Discount, Event, Money, OrderStatus, PaymentStatus,
    PromoCode, Seat, SeatStatus, Section, TicketType,
};
use store::{CatalogSeeder, CheckoutStore, InMemoryCheckoutStore, InMemorySeatLockStore};

struct TestHarness {
    orchestrator: PaymentOrchestrator,
    reservations: SeatReservationManager,
    store: InMemoryCheckoutStore,
    locks: InMemorySeatLockStore,
    gateway: InMemoryPaymentGateway,
    notifier: InMemoryTicketNotifier,
    clock: ManualClock,
    event: Event,
}

impl TestHarness {
    async fn new() -> Self {
        Self::with_commission(CommissionPolicy::none()).await
    }

    async fn with_commission(commission: CommissionPolicy) -> Self {
        let store = InMemoryCheckoutStore::new();
        let locks = InMemorySeatLockStore::new();
        let gateway = InMemoryPaymentGateway::new();
        let notifier = InMemoryTicketNotifier::new();
        let clock = ManualClock::default();

        let event = Event {
            id: EventId::new(),
            title: "Festival de Verano".to_string(),
            is_published: true,
            currency: Currency::Clp,
        };
        store.save_event(&event).await.unwrap();

        let section = Section {
            id: SectionId::new(),
            event_id: event.id,
            name: "Platea".to_string(),
            price: Money::new(10_000),
        };
        store.save_section(&section).await.unwrap();
        for label in ["A1", "A2", "A3", "B1"] {
            store
                .save_seat(&Seat {
                    id: SeatId::new(label),
                    event_id: event.id,
                    section_id: section.id,
                    label: label.to_string(),
                    price: None,
                    status: SeatStatus::Available,
                })
                .await
                .unwrap();
        }

        let reservations = SeatReservationManager::new(
            Arc::new(locks.clone()),
            Arc::new(store.clone()),
            Arc::new(clock.clone()),
        );
        let orchestrator = PaymentOrchestrator::new(
            Arc::new(store.clone()),
            reservations.clone(),
            Arc::new(gateway.clone()),
            Arc::new(notifier.clone()),
            Arc::new(clock.clone()),
            CheckoutSettings {
                commission,
                ..CheckoutSettings::default()
            },
        );

        Self {
            orchestrator,
            reservations,
            store,
            locks,
            gateway,
            notifier,
            clock,
            event,
        }
    }

    async fn add_ticket_type(&self, price: i64, capacity: u32, tickets_generated: u32) -> TicketType {
        let ticket_type = TicketType {
            id: TicketTypeId::new(),
            event_id: self.event.id,
            name: format!("General {price}"),
            price: Money::new(price),
            capacity,
            tickets_generated,
            sold_units: 0,
        };
        self.store.save_ticket_type(&ticket_type).await.unwrap();
        ticket_type
    }

    async fn add_promo(&self, code: &str, discount: Discount) -> PromoCode {
        let promo = PromoCode {
            id: PromoCodeId::new(),
            event_id: self.event.id,
            code: code.to_string(),
            discount,
            max_uses: Some(1),
            used_count: 0,
            valid_from: None,
            valid_until: None,
            is_active: true,
        };
        self.store.save_promo_code(&promo).await.unwrap();
        promo
    }

    async fn seat_status(&self, id: &str) -> SeatStatus {
        self.store.seat(&SeatId::new(id)).await.unwrap().status
    }
}

fn seats(ids: &[&str]) -> Vec<SeatId> {
    ids.iter().map(|id| SeatId::new(*id)).collect()
}

fn buyer() -> BuyerInfo {
    BuyerInfo {
        name: "Camila Rojas".to_string(),
        email: "camila@example.com".to_string(),
        phone: Some("+56911112222".to_string()),
    }
}

fn seat_request(session: &str, seat_ids: &[&str]) -> CheckoutRequest {
    CheckoutRequest {
        user_id: UserId::new("user_1"),
        session_id: Some(SessionId::new(session)),
        buyer: buyer(),
        promo_code: None,
        selection: CheckoutSelection::Seats {
            event_id: None,
            seat_ids: seats(seat_ids),
        },
    }
}

fn ticket_type_request(event_id: EventId, ticket_type_id: Option<TicketTypeId>, quantity: u32) -> CheckoutRequest {
    CheckoutRequest {
        user_id: UserId::new("user_2"),
        session_id: None,
        buyer: buyer(),
        promo_code: None,
        selection: CheckoutSelection::TicketType {
            event_id,
            ticket_type_id,
            quantity,
        },
    }
}

fn redirect_token(created: &CheckoutCreated) -> String {
    match created {
        CheckoutCreated::Redirect { token, .. } => token.clone(),
        other => panic!("expected a gateway redirect, got {other:?}"),
    }
}

fn commit(token: &str) -> GatewayReturn {
    GatewayReturn::Commit {
        token: token.to_string(),
    }
}

mod reservations {
    use super::*;

    #[tokio::test]
    async fn test_conflicting_sessions_and_release() {
        let h = TestHarness::new().await;
        let s1 = SessionId::new("s1");
        let s2 = SessionId::new("s2");
        let s3 = SessionId::new("s3");

        assert!(h.reservations.reserve_seats(&s1, &seats(&["A1", "A2"])).await.unwrap());
        assert!(!h.reservations.reserve_seats(&s2, &seats(&["A2", "B1"])).await.unwrap());

        // B1 was not left behind by the failed batch.
        assert!(h.reservations.are_seats_available(&seats(&["B1"])).await.unwrap());
        assert!(h.reservations.reserve_seats(&s3, &seats(&["B1"])).await.unwrap());

        h.reservations.release_reservation(&s1).await.unwrap();
        assert!(h.reservations.reserve_seats(&s2, &seats(&["A2"])).await.unwrap());
        assert_eq!(
            h.reservations.get_session_reservations(&s2).await.unwrap(),
            Some(seats(&["A2"]))
        );
    }

    #[tokio::test]
    async fn test_concurrent_reservations_have_one_winner() {
        let h = TestHarness::new().await;

        let attempts = (0..16).map(|i| {
            let reservations = h.reservations.clone();
            async move {
                reservations
                    .reserve_seats(&SessionId::new(format!("s{i}")), &seats(&["A3"]))
                    .await
                    .unwrap()
            }
        });
        let results = futures_util::future::join_all(attempts).await;

        assert_eq!(results.iter().filter(|won| **won).count(), 1);
        assert_eq!(h.locks.lock_count().await, 1);
    }

    #[tokio::test]
    async fn test_checkout_hold_expires() {
        let h = TestHarness::new().await;
        h.orchestrator
            .create_checkout(seat_request("s1", &["A1"]))
            .await
            .unwrap();

        let err = h
            .orchestrator
            .create_checkout(seat_request("s2", &["A1"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Rejected(CheckoutFailure::SeatsUnavailable)
        ));

        h.clock.advance(Duration::seconds(601));
        assert!(h
            .orchestrator
            .create_checkout(seat_request("s2", &["A1"]))
            .await
            .is_ok());
    }
}

mod checkout_creation {
    use super::*;

    #[tokio::test]
    async fn test_seat_checkout_opens_pending_order_and_payment() {
        let h = TestHarness::with_commission(CommissionPolicy::new(600, Money::zero())).await;

        let created = h
            .orchestrator
            .create_checkout(seat_request("s1", &["A1", "A2"]))
            .await
            .unwrap();
        let CheckoutCreated::Redirect {
            order_id,
            token,
            payment_url,
            ..
        } = &created
        else {
            panic!("expected a redirect");
        };
        assert!(payment_url.contains(token.as_str()));

        let order = h.store.get_order(*order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.base_amount, Money::new(20_000));
        assert_eq!(order.commission_amount, Money::new(1200));
        assert_eq!(order.total_amount, Money::new(21_200));
        assert!(order.order_number.as_str().len() <= domain::MAX_BUY_ORDER_LEN);

        let payment = h.store.find_payment_by_token(token).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.order_id, *order_id);
        assert_eq!(h.gateway.amount_for(token), Some(Money::new(21_200)));

        assert_eq!(
            h.reservations
                .get_session_reservations(&SessionId::new("s1"))
                .await
                .unwrap(),
            Some(seats(&["A1", "A2"]))
        );
    }

    #[tokio::test]
    async fn test_commission_is_charged_on_discounted_base() {
        let h = TestHarness::with_commission(CommissionPolicy::new(1000, Money::zero())).await;
        let ticket_type = h.add_ticket_type(5000, 10, 1).await;
        h.add_promo("MIL", Discount::Fixed(Money::new(1000))).await;

        let mut request = ticket_type_request(h.event.id, Some(ticket_type.id), 1);
        request.promo_code = Some("mil".to_string());
        let created = h.orchestrator.create_checkout(request).await.unwrap();

        let order = h.store.get_order(created.order_id()).await.unwrap().unwrap();
        assert_eq!(order.discount_amount, Money::new(1000));
        assert_eq!(order.commission_amount, Money::new(400));
        assert_eq!(order.total_amount, Money::new(4400));
    }

    #[tokio::test]
    async fn test_free_ticket_type_order_skips_gateway() {
        let h = TestHarness::new().await;
        h.add_ticket_type(0, 100, 1).await;

        let created = h
            .orchestrator
            .create_checkout(ticket_type_request(h.event.id, None, 1))
            .await
            .unwrap();
        let CheckoutCreated::Free {
            order_id,
            tickets_generated,
            ..
        } = created
        else {
            panic!("expected a free order");
        };

        assert_eq!(tickets_generated, 1);
        assert_eq!(h.gateway.create_calls(), 0);
        let order = h.store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(h.store.tickets_for_order(order_id).await.unwrap().len(), 1);
        assert_eq!(h.notifier.sent(), vec![(order_id, 1)]);
    }

    #[tokio::test]
    async fn test_full_discount_on_seats_is_free_and_sells_seats() {
        let h = TestHarness::new().await;
        let promo = h.add_promo("GRATIS", Discount::Percentage(100)).await;

        let mut request = seat_request("s1", &["A1", "A2"]);
        request.promo_code = Some("GRATIS".to_string());
        let created = h.orchestrator.create_checkout(request).await.unwrap();

        assert!(matches!(
            created,
            CheckoutCreated::Free {
                tickets_generated: 2,
                ..
            }
        ));
        assert_eq!(h.seat_status("A1").await, SeatStatus::Sold);
        assert_eq!(h.locks.lock_count().await, 0);

        // Single-use code is now exhausted.
        let mut again = seat_request("s2", &["A3"]);
        again.promo_code = Some(promo.code.clone());
        let err = h.orchestrator.create_checkout(again).await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Rejected(CheckoutFailure::PromoCodeRejected(_))
        ));
    }

    #[tokio::test]
    async fn test_ticket_pack_generates_tickets_per_unit() {
        let h = TestHarness::new().await;
        let pack = h.add_ticket_type(0, 10, 2).await;

        let created = h
            .orchestrator
            .create_checkout(ticket_type_request(h.event.id, Some(pack.id), 3))
            .await
            .unwrap();

        assert!(matches!(
            created,
            CheckoutCreated::Free {
                tickets_generated: 6,
                ..
            }
        ));
        let stored = h.store.get_ticket_type(pack.id).await.unwrap().unwrap();
        assert_eq!(stored.sold_units, 3);
    }

    #[tokio::test]
    async fn test_business_rejections() {
        let h = TestHarness::new().await;
        let general = h.add_ticket_type(5000, 2, 1).await;

        let cases = vec![
            (
                seat_request("s1", &["A1", "Z9"]),
                "Seats not found: Z9",
            ),
            (
                ticket_type_request(h.event.id, Some(general.id), 3),
                "Only 2 units left, 3 requested",
            ),
            (
                ticket_type_request(EventId::new(), None, 1),
                "Event not found",
            ),
            (
                ticket_type_request(h.event.id, Some(TicketTypeId::new()), 1),
                "Ticket type not found",
            ),
            (
                CheckoutRequest {
                    session_id: None,
                    ..seat_request("s1", &["A1"])
                },
                "sessionId is required",
            ),
        ];

        for (request, expected) in cases {
            let err = h.orchestrator.create_checkout(request).await.unwrap_err();
            assert!(err.failure().is_some(), "{err} should be a business failure");
            assert!(err.to_string().contains(expected), "{err} vs {expected}");
        }
        assert_eq!(h.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_unpublished_event_is_refused() {
        let h = TestHarness::new().await;
        let mut event = h.event.clone();
        event.is_published = false;
        h.store.save_event(&event).await.unwrap();

        let err = h
            .orchestrator
            .create_checkout(seat_request("s1", &["A1"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Rejected(CheckoutFailure::EventNotPublished(_))
        ));
        assert_eq!(h.locks.lock_count().await, 0);
    }

    #[tokio::test]
    async fn test_several_ticket_types_need_a_choice() {
        let h = TestHarness::new().await;
        h.add_ticket_type(5000, 10, 1).await;
        h.add_ticket_type(8000, 10, 1).await;

        let err = h
            .orchestrator
            .create_checkout(ticket_type_request(h.event.id, None, 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Rejected(CheckoutFailure::TicketTypeRequired(_))
        ));
    }

    #[tokio::test]
    async fn test_gateway_outage_cancels_order_and_keeps_hold() {
        let h = TestHarness::new().await;
        h.gateway.set_fail_on_create(true);

        let err = h
            .orchestrator
            .create_checkout(seat_request("s1", &["A1"]))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Gateway(_)));

        let cancelled = h
            .store
            .pending_orders_created_before(h.clock.now() + Duration::seconds(1))
            .await
            .unwrap();
        assert!(cancelled.is_empty());
        assert_eq!(h.store.order_count().await, 1);
        assert_eq!(
            h.reservations
                .get_session_reservations(&SessionId::new("s1"))
                .await
                .unwrap(),
            Some(seats(&["A1"]))
        );

        // The same session can retry once the gateway is back.
        h.gateway.set_fail_on_create(false);
        assert!(h
            .orchestrator
            .create_checkout(seat_request("s1", &["A1"]))
            .await
            .is_ok());
    }
}

mod payment_return {
    use super::*;

    #[tokio::test]
    async fn test_approved_payment_issues_tickets() {
        let h = TestHarness::new().await;
        let created = h
            .orchestrator
            .create_checkout(seat_request("s1", &["A1", "A2"]))
            .await
            .unwrap();
        let token = redirect_token(&created);

        let outcome = h
            .orchestrator
            .handle_gateway_return(commit(&token))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReturnOutcome::Success {
                order_id: created.order_id()
            }
        );

        let summary = h.orchestrator.order_summary(created.order_id()).await.unwrap();
        assert_eq!(summary.order.status, OrderStatus::Paid);
        assert!(summary.order.paid_at.is_some());
        assert_eq!(summary.tickets.len(), 2);
        assert_eq!(summary.payments[0].status, PaymentStatus::Approved);
        assert_eq!(summary.payments[0].response_code, Some(0));
        assert!(summary.payments[0].authorization_code.is_some());

        assert_eq!(h.seat_status("A1").await, SeatStatus::Sold);
        assert_eq!(h.seat_status("A2").await, SeatStatus::Sold);
        assert_eq!(
            h.reservations
                .get_session_reservations(&SessionId::new("s1"))
                .await
                .unwrap(),
            None
        );
        assert_eq!(h.notifier.sent(), vec![(created.order_id(), 2)]);

        // Sold seats cannot be held again.
        assert!(!h
            .reservations
            .reserve_seats(&SessionId::new("s9"), &seats(&["A1"]))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_rejected_payment_cancels_order() {
        let h = TestHarness::new().await;
        h.gateway.set_outcome(MockOutcome::Reject(-1));
        let created = h
            .orchestrator
            .create_checkout(seat_request("s1", &["A1", "A2"]))
            .await
            .unwrap();
        let token = redirect_token(&created);

        let outcome = h
            .orchestrator
            .handle_gateway_return(commit(&token))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReturnOutcome::failure(FailureReason::TransactionFailed, Some(created.order_id()))
        );

        let summary = h.orchestrator.order_summary(created.order_id()).await.unwrap();
        assert_eq!(summary.order.status, OrderStatus::Cancelled);
        assert!(summary.tickets.is_empty());
        assert_eq!(summary.payments[0].status, PaymentStatus::Rejected);
        assert_eq!(summary.payments[0].response_code, Some(-1));

        assert_eq!(h.seat_status("A1").await, SeatStatus::Available);
        assert!(h.reservations.are_seats_available(&seats(&["A1", "A2"])).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_return_is_a_no_op() {
        let h = TestHarness::new().await;
        let created = h
            .orchestrator
            .create_checkout(seat_request("s1", &["A1", "A2"]))
            .await
            .unwrap();
        let token = redirect_token(&created);

        let first = h.orchestrator.handle_gateway_return(commit(&token)).await.unwrap();
        let second = h.orchestrator.handle_gateway_return(commit(&token)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(h.gateway.commit_calls(), 1);
        assert_eq!(h.store.ticket_count().await, 2);
        assert_eq!(h.notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_returns_issue_tickets_once() {
        let h = TestHarness::new().await;
        let created = h
            .orchestrator
            .create_checkout(seat_request("s1", &["A1", "A2", "A3"]))
            .await
            .unwrap();
        let token = redirect_token(&created);

        let returns = (0..8).map(|_| {
            let orchestrator = h.orchestrator.clone();
            let token = token.clone();
            tokio::spawn(async move { orchestrator.handle_gateway_return(commit(&token)).await })
        });
        let outcomes = futures_util::future::join_all(returns).await;

        for outcome in outcomes {
            assert_eq!(
                outcome.unwrap().unwrap(),
                ReturnOutcome::Success {
                    order_id: created.order_id()
                }
            );
        }
        assert_eq!(h.store.ticket_count().await, 3);
    }

    #[tokio::test]
    async fn test_commit_failure_leaves_nothing_applied() {
        let h = TestHarness::new().await;
        let created = h
            .orchestrator
            .create_checkout(seat_request("s1", &["A1", "A2"]))
            .await
            .unwrap();
        let token = redirect_token(&created);

        h.store.set_fail_on_commit(true);
        assert!(h.orchestrator.handle_gateway_return(commit(&token)).await.is_err());

        assert_eq!(h.store.ticket_count().await, 0);
        let order = h.store.get_order(created.order_id()).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(h.seat_status("A1").await, SeatStatus::Available);

        // A retried return completes the order.
        h.store.set_fail_on_commit(false);
        let outcome = h.orchestrator.handle_gateway_return(commit(&token)).await.unwrap();
        assert!(matches!(outcome, ReturnOutcome::Success { .. }));
        assert_eq!(h.store.ticket_count().await, 2);
    }

    #[tokio::test]
    async fn test_gateway_error_leaves_order_pending() {
        let h = TestHarness::new().await;
        let created = h
            .orchestrator
            .create_checkout(seat_request("s1", &["A1"]))
            .await
            .unwrap();
        let token = redirect_token(&created);

        h.gateway.set_fail_on_commit(true);
        let outcome = h.orchestrator.handle_gateway_return(commit(&token)).await.unwrap();
        assert_eq!(
            outcome,
            ReturnOutcome::failure(FailureReason::ConfirmationError, Some(created.order_id()))
        );
        let order = h.store.get_order(created.order_id()).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_unknown_token_and_missing_token() {
        let h = TestHarness::new().await;

        let outcome = h
            .orchestrator
            .handle_gateway_return(commit("not-a-token"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReturnOutcome::failure(FailureReason::PaymentNotFound, None)
        );

        let outcome = h
            .orchestrator
            .handle_gateway_return(GatewayReturn::Missing)
            .await
            .unwrap();
        assert_eq!(outcome, ReturnOutcome::failure(FailureReason::NoToken, None));
    }

    #[tokio::test]
    async fn test_buyer_cancellation_releases_hold() {
        let h = TestHarness::new().await;
        let created = h
            .orchestrator
            .create_checkout(seat_request("s1", &["A1"]))
            .await
            .unwrap();
        let token = redirect_token(&created);

        let outcome = h
            .orchestrator
            .handle_gateway_return(GatewayReturn::from_fields(
                None,
                Some(token.clone()),
                Some(created.order_number().to_string()),
            ))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReturnOutcome::failure(FailureReason::TransactionCancelled, Some(created.order_id()))
        );

        let summary = h.orchestrator.order_summary(created.order_id()).await.unwrap();
        assert_eq!(summary.order.status, OrderStatus::Cancelled);
        assert_eq!(summary.payments[0].status, PaymentStatus::Cancelled);
        assert_eq!(h.gateway.commit_calls(), 0);
        assert!(h.reservations.are_seats_available(&seats(&["A1"])).await.unwrap());

        // A late commit for the cancelled order changes nothing.
        let outcome = h.orchestrator.handle_gateway_return(commit(&token)).await.unwrap();
        assert_eq!(
            outcome,
            ReturnOutcome::failure(FailureReason::TransactionCancelled, Some(created.order_id()))
        );
        assert_eq!(h.store.ticket_count().await, 0);
    }

    #[tokio::test]
    async fn test_timed_out_form_cancels_by_buy_order() {
        let h = TestHarness::new().await;
        let created = h
            .orchestrator
            .create_checkout(seat_request("s1", &["A1"]))
            .await
            .unwrap();

        let outcome = h
            .orchestrator
            .handle_gateway_return(GatewayReturn::from_fields(
                None,
                None,
                Some(created.order_number().to_string()),
            ))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReturnOutcome::failure(FailureReason::TransactionCancelled, Some(created.order_id()))
        );

        let summary = h.orchestrator.order_summary(created.order_id()).await.unwrap();
        assert_eq!(summary.order.status, OrderStatus::Cancelled);
        assert_eq!(summary.payments[0].status, PaymentStatus::Cancelled);
        assert!(h
            .reservations
            .reserve_seats(&SessionId::new("s2"), &seats(&["A1"]))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_ticket_type_payment_bumps_sold_units() {
        let h = TestHarness::new().await;
        let general = h.add_ticket_type(7000, 50, 1).await;
        let created = h
            .orchestrator
            .create_checkout(ticket_type_request(h.event.id, None, 4))
            .await
            .unwrap();
        let token = redirect_token(&created);

        h.orchestrator.handle_gateway_return(commit(&token)).await.unwrap();

        let stored = h.store.get_ticket_type(general.id).await.unwrap().unwrap();
        assert_eq!(stored.sold_units, 4);
        assert_eq!(h.store.ticket_count().await, 4);
    }

    #[tokio::test]
    async fn test_failed_delivery_does_not_fail_payment() {
        let h = TestHarness::new().await;
        h.notifier.set_fail(true);
        let created = h
            .orchestrator
            .create_checkout(seat_request("s1", &["B1"]))
            .await
            .unwrap();
        let token = redirect_token(&created);

        let outcome = h.orchestrator.handle_gateway_return(commit(&token)).await.unwrap();
        assert!(matches!(outcome, ReturnOutcome::Success { .. }));
        assert_eq!(h.store.ticket_count().await, 1);
    }

    #[tokio::test]
    async fn test_missing_reservation_metadata_is_a_confirmation_error() {
        let h = TestHarness::new().await;
        let created = h
            .orchestrator
            .create_checkout(seat_request("s1", &["A1"]))
            .await
            .unwrap();
        let token = redirect_token(&created);

        let mut order = h.store.get_order(created.order_id()).await.unwrap().unwrap();
        order.reservation = None;
        h.store.overwrite_order(order).await;

        let outcome = h.orchestrator.handle_gateway_return(commit(&token)).await.unwrap();
        assert_eq!(
            outcome,
            ReturnOutcome::failure(FailureReason::ConfirmationError, Some(created.order_id()))
        );
        assert_eq!(h.store.ticket_count().await, 0);
    }
}

mod sold_out_at_commit {
    use super::*;

    #[tokio::test]
    async fn test_seat_resold_after_hold_expiry_is_not_issued_twice() {
        let h = TestHarness::new().await;
        let first = h
            .orchestrator
            .create_checkout(seat_request("sA", &["A1"]))
            .await
            .unwrap();
        let first_token = redirect_token(&first);

        h.clock.advance(Duration::seconds(601));
        let second = h
            .orchestrator
            .create_checkout(seat_request("sB", &["A1"]))
            .await
            .unwrap();
        let outcome = h
            .orchestrator
            .handle_gateway_return(commit(&redirect_token(&second)))
            .await
            .unwrap();
        assert!(matches!(outcome, ReturnOutcome::Success { .. }));

        let outcome = h
            .orchestrator
            .handle_gateway_return(commit(&first_token))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReturnOutcome::failure(FailureReason::ConfirmationError, Some(first.order_id()))
        );

        let summary = h.orchestrator.order_summary(first.order_id()).await.unwrap();
        assert_eq!(summary.order.status, OrderStatus::Cancelled);
        assert!(summary.tickets.is_empty());
        assert_eq!(summary.payments[0].status, PaymentStatus::Approved);
        assert_eq!(h.store.ticket_count().await, 1);
        assert_eq!(h.seat_status("A1").await, SeatStatus::Sold);

        // A repeated return reports the same outcome.
        let outcome = h
            .orchestrator
            .handle_gateway_return(commit(&first_token))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReturnOutcome::failure(FailureReason::ConfirmationError, Some(first.order_id()))
        );
    }

    #[tokio::test]
    async fn test_expired_hold_taken_by_unpaid_session_blocks_late_payment() {
        let h = TestHarness::new().await;
        let first = h
            .orchestrator
            .create_checkout(seat_request("sA", &["A1"]))
            .await
            .unwrap();

        h.clock.advance(Duration::seconds(601));
        let second = h
            .orchestrator
            .create_checkout(seat_request("sB", &["A1"]))
            .await
            .unwrap();

        let outcome = h
            .orchestrator
            .handle_gateway_return(commit(&redirect_token(&first)))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReturnOutcome::failure(FailureReason::ConfirmationError, Some(first.order_id()))
        );
        assert_eq!(h.seat_status("A1").await, SeatStatus::Available);

        // The session now holding the seat can still pay for it.
        let outcome = h
            .orchestrator
            .handle_gateway_return(commit(&redirect_token(&second)))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReturnOutcome::Success {
                order_id: second.order_id()
            }
        );
        assert_eq!(h.store.ticket_count().await, 1);
    }

    #[tokio::test]
    async fn test_expired_hold_still_free_is_renewed_at_payment() {
        let h = TestHarness::new().await;
        let created = h
            .orchestrator
            .create_checkout(seat_request("sA", &["A1"]))
            .await
            .unwrap();

        h.clock.advance(Duration::seconds(601));
        let outcome = h
            .orchestrator
            .handle_gateway_return(commit(&redirect_token(&created)))
            .await
            .unwrap();

        assert!(matches!(outcome, ReturnOutcome::Success { .. }));
        assert_eq!(h.seat_status("A1").await, SeatStatus::Sold);
    }

    #[tokio::test]
    async fn test_ticket_type_capacity_is_not_oversold() {
        let h = TestHarness::new().await;
        let general = h.add_ticket_type(7000, 1, 1).await;
        let first = h
            .orchestrator
            .create_checkout(ticket_type_request(h.event.id, None, 1))
            .await
            .unwrap();
        let second = h
            .orchestrator
            .create_checkout(ticket_type_request(h.event.id, None, 1))
            .await
            .unwrap();

        let outcome = h
            .orchestrator
            .handle_gateway_return(commit(&redirect_token(&first)))
            .await
            .unwrap();
        assert!(matches!(outcome, ReturnOutcome::Success { .. }));

        let outcome = h
            .orchestrator
            .handle_gateway_return(commit(&redirect_token(&second)))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReturnOutcome::failure(FailureReason::ConfirmationError, Some(second.order_id()))
        );

        let stored = h.store.get_ticket_type(general.id).await.unwrap().unwrap();
        assert_eq!(stored.sold_units, 1);
        assert_eq!(h.store.ticket_count().await, 1);
        let summary = h.orchestrator.order_summary(second.order_id()).await.unwrap();
        assert_eq!(summary.order.status, OrderStatus::Cancelled);
        assert_eq!(summary.payments[0].status, PaymentStatus::Approved);
    }

    #[tokio::test]
    async fn test_single_use_promo_is_redeemed_once() {
        let h = TestHarness::new().await;
        h.add_promo("UNICO", Discount::Percentage(10)).await;
        let mut first_request = seat_request("s1", &["A1"]);
        first_request.promo_code = Some("UNICO".to_string());
        let mut second_request = seat_request("s2", &["B1"]);
        second_request.promo_code = Some("unico".to_string());

        let first = h.orchestrator.create_checkout(first_request).await.unwrap();
        let second = h.orchestrator.create_checkout(second_request).await.unwrap();

        h.orchestrator
            .handle_gateway_return(commit(&redirect_token(&first)))
            .await
            .unwrap();
        let outcome = h
            .orchestrator
            .handle_gateway_return(commit(&redirect_token(&second)))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReturnOutcome::failure(FailureReason::ConfirmationError, Some(second.order_id()))
        );

        let promo = h.store.find_promo_code(h.event.id, "UNICO").await.unwrap().unwrap();
        assert_eq!(promo.used_count, 1);
        assert_eq!(h.seat_status("B1").await, SeatStatus::Available);
        assert!(h.reservations.are_seats_available(&seats(&["B1"])).await.unwrap());
    }
}

mod housekeeping {
    use super::*;

    #[tokio::test]
    async fn test_sweeper_cancels_only_old_pending_orders() {
        let h = TestHarness::new().await;
        let old = h
            .orchestrator
            .create_checkout(seat_request("s1", &["A1"]))
            .await
            .unwrap();

        h.clock.advance(Duration::minutes(90));
        let recent = h
            .orchestrator
            .create_checkout(seat_request("s2", &["A2"]))
            .await
            .unwrap();

        let cancelled = h
            .orchestrator
            .cancel_abandoned_orders(Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(cancelled, 1);

        let old = h.orchestrator.order_summary(old.order_id()).await.unwrap();
        assert_eq!(old.order.status, OrderStatus::Cancelled);
        assert_eq!(old.payments[0].status, PaymentStatus::Cancelled);

        let recent = h.orchestrator.order_summary(recent.order_id()).await.unwrap();
        assert_eq!(recent.order.status, OrderStatus::Pending);
        // The expired hold of s1 was purged, the live one of s2 kept.
        assert_eq!(h.locks.lock_count().await, 1);
    }

    #[tokio::test]
    async fn test_summary_of_unknown_order() {
        let h = TestHarness::new().await;
        let err = h
            .orchestrator
            .order_summary(common::OrderId::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Rejected(CheckoutFailure::OrderNotFound(_))
        ));
    }
}
