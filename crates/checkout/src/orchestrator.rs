//! Payment orchestration, from a seat selection to issued tickets.
//!
//! An order moves `Pending -> Paid` or `Pending -> Cancelled` exactly once.
//! Every terminal transition goes through [`CheckoutStore::commit_order`]
//! guarded by the `Pending` status, so two concurrent gateway returns for
//! the same token cannot both issue tickets: the loser sees a conflict,
//! re-reads the order and answers with the winner's outcome.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::Duration;
use common::{Clock, EventId, OrderId, SeatId, SectionId, SessionId, TicketTypeId};
use domain::{
    Event, GatewaySessionId, Money, NewOrder, Order, OrderNumber, OrderReservation, OrderStatus,
    Payment, PaymentStatus, PriceBreakdown, PromoCode, TicketIssuer, TicketType,
};
use store::{CheckoutStore, OrderCommit, StoreError};

use crate::error::{CheckoutError, CheckoutFailure, Result};
use crate::reservation::{SeatReservationManager, validate_selection};
use crate::services::{CommitResponse, CreateTransaction, PaymentGateway, TicketNotifier};
use crate::types::{
    CheckoutCreated, CheckoutRequest, CheckoutSelection, CheckoutSettings, FailureReason,
    GatewayReturn, OrderSummary, ReturnOutcome,
};

/// A validated, priced selection that has not been held or stored yet.
struct Selection {
    event: Event,
    quantity: u32,
    base: Money,
    reservation: OrderReservation,
    session: SessionId,
    ticket_type: Option<TicketType>,
}

/// Result of trying to move a pending order to a terminal status.
enum Settlement {
    Applied { tickets: usize },
    /// Someone else settled the order first.
    Superseded(Order),
    /// A seat, ticket-type unit or promo use went to another order. Nothing
    /// was committed.
    SoldOut(String),
}

fn consistency_error(order_id: Option<OrderId>, message: String) -> CheckoutError {
    tracing::error!(consistency_error = true, order_id = ?order_id, "{message}");
    CheckoutError::Consistency(message)
}

/// Coordinates seat holds, orders, the payment gateway and ticket issuance.
#[derive(Clone)]
pub struct PaymentOrchestrator {
    store: Arc<dyn CheckoutStore>,
    reservations: SeatReservationManager,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn TicketNotifier>,
    clock: Arc<dyn Clock>,
    settings: CheckoutSettings,
}

impl PaymentOrchestrator {
    pub fn new(
        store: Arc<dyn CheckoutStore>,
        reservations: SeatReservationManager,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn TicketNotifier>,
        clock: Arc<dyn Clock>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            store,
            reservations,
            gateway,
            notifier,
            clock,
            settings,
        }
    }

    /// The seat reservation manager this orchestrator holds seats with.
    pub fn reservations(&self) -> &SeatReservationManager {
        &self.reservations
    }

    pub fn settings(&self) -> &CheckoutSettings {
        &self.settings
    }

    // ---- checkout creation ----

    /// Opens a pending order for `request` and starts its payment.
    ///
    /// Seats are held (or their hold refreshed) for the request's session.
    /// Orders with nothing to charge are paid and ticketed right away
    /// without calling the gateway.
    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutCreated> {
        validate_request(&request)?;

        let selection = match &request.selection {
            CheckoutSelection::Seats { event_id, seat_ids } => {
                let session = request
                    .session_id
                    .clone()
                    .filter(|s| !s.is_blank())
                    .ok_or_else(|| {
                        CheckoutFailure::InvalidRequest(
                            "sessionId is required to buy seats".to_string(),
                        )
                    })?;
                self.select_seats(session, *event_id, seat_ids).await?
            }
            CheckoutSelection::TicketType {
                event_id,
                ticket_type_id,
                quantity,
            } => {
                let session = request
                    .session_id
                    .clone()
                    .filter(|s| !s.is_blank())
                    .unwrap_or_else(SessionId::generate);
                self.select_ticket_type(session, *event_id, *ticket_type_id, *quantity)
                    .await?
            }
        };

        let now = self.clock.now();
        let promo = self
            .resolve_promo(selection.event.id, request.promo_code.as_deref(), now)
            .await?;

        if let OrderReservation::Seats { seat_ids, .. } = &selection.reservation
            && !self
                .reservations
                .reserve_seats(&selection.session, seat_ids)
                .await?
        {
            return Err(CheckoutFailure::SeatsUnavailable.into());
        }

        let price = PriceBreakdown::compute(
            selection.base,
            promo.as_ref().map(|p| &p.discount),
            &self.settings.commission,
        );
        let order = Order::new_pending(
            NewOrder {
                order_number: OrderNumber::generate(&self.settings.order_prefix, now),
                user_id: request.user_id,
                event_id: selection.event.id,
                buyer: request.buyer,
                currency: selection.event.currency,
                quantity: selection.quantity,
                price,
                promo_code_id: promo.as_ref().map(|p| p.id),
                reservation: selection.reservation,
            },
            now,
        )?;
        self.store.insert_order(&order).await?;
        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total_amount,
            "order created"
        );

        if order.is_free() {
            return self
                .complete_free_order(order, selection.ticket_type.as_ref())
                .await;
        }
        self.open_payment(order, &selection.session).await
    }

    async fn select_seats(
        &self,
        session: SessionId,
        event_id: Option<EventId>,
        seat_ids: &[SeatId],
    ) -> Result<Selection> {
        validate_selection(seat_ids)?;

        let seats = self.store.get_seats(seat_ids).await?;
        if seats.len() != seat_ids.len() {
            let found: HashSet<&SeatId> = seats.iter().map(|s| &s.id).collect();
            let missing = seat_ids
                .iter()
                .filter(|id| !found.contains(id))
                .cloned()
                .collect();
            return Err(CheckoutFailure::SeatsNotFound(missing).into());
        }

        let Some(event_id) = event_id.or_else(|| seats.first().map(|s| s.event_id)) else {
            return Err(CheckoutFailure::InvalidSeatSelection("no seats selected".to_string()).into());
        };
        if seats.iter().any(|s| s.event_id != event_id) {
            return Err(CheckoutFailure::InvalidSeatSelection(
                "all seats must belong to the same event".to_string(),
            )
            .into());
        }
        let event = self.load_event(event_id).await?;

        if seats.iter().any(|s| !s.is_available()) {
            return Err(CheckoutFailure::SeatsUnavailable.into());
        }

        let section_ids: Vec<SectionId> = seats
            .iter()
            .map(|s| s.section_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let sections: HashMap<_, _> = self
            .store
            .get_sections(&section_ids)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        let mut base = Money::zero();
        for seat in &seats {
            let section = sections.get(&seat.section_id).ok_or_else(|| {
                consistency_error(
                    None,
                    format!("seat {} references missing section {}", seat.id, seat.section_id),
                )
            })?;
            base += seat.effective_price(section);
        }

        Ok(Selection {
            event,
            quantity: seats.len() as u32,
            base,
            reservation: OrderReservation::Seats {
                session_id: session.clone(),
                seat_ids: seat_ids.to_vec(),
            },
            session,
            ticket_type: None,
        })
    }

    async fn select_ticket_type(
        &self,
        session: SessionId,
        event_id: EventId,
        ticket_type_id: Option<TicketTypeId>,
        quantity: u32,
    ) -> Result<Selection> {
        if quantity == 0 {
            return Err(CheckoutFailure::InvalidRequest(
                "quantity must be greater than 0".to_string(),
            )
            .into());
        }
        let event = self.load_event(event_id).await?;

        let ticket_type = match ticket_type_id {
            Some(id) => self
                .store
                .get_ticket_type(id)
                .await?
                .filter(|tt| tt.event_id == event_id)
                .ok_or(CheckoutFailure::TicketTypeNotFound(id))?,
            None => {
                let mut types = self.store.ticket_types_for_event(event_id).await?;
                match types.len() {
                    0 => return Err(CheckoutFailure::NoTicketTypes(event_id).into()),
                    1 => types.remove(0),
                    _ => return Err(CheckoutFailure::TicketTypeRequired(event_id).into()),
                }
            }
        };

        let remaining = ticket_type.remaining();
        if remaining < quantity {
            return Err(CheckoutFailure::InsufficientCapacity {
                requested: quantity,
                remaining,
            }
            .into());
        }

        let base = ticket_type
            .price
            .multiply(quantity)
            .map_err(|e| CheckoutFailure::InvalidRequest(e.to_string()))?;

        Ok(Selection {
            event,
            quantity,
            base,
            reservation: OrderReservation::TicketType {
                ticket_type_id: ticket_type.id,
            },
            session,
            ticket_type: Some(ticket_type),
        })
    }

    async fn load_event(&self, event_id: EventId) -> Result<Event> {
        let event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or(CheckoutFailure::EventNotFound(event_id))?;
        if !event.is_published {
            return Err(CheckoutFailure::EventNotPublished(event_id).into());
        }
        Ok(event)
    }

    async fn resolve_promo(
        &self,
        event_id: EventId,
        code: Option<&str>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<PromoCode>> {
        let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) else {
            return Ok(None);
        };
        let promo = self
            .store
            .find_promo_code(event_id, code)
            .await?
            .ok_or_else(|| CheckoutFailure::UnknownPromoCode(code.to_string()))?;
        promo
            .validate(now)
            .map_err(CheckoutFailure::PromoCodeRejected)?;
        Ok(Some(promo))
    }

    async fn complete_free_order(
        &self,
        order: Order,
        ticket_type: Option<&TicketType>,
    ) -> Result<CheckoutCreated> {
        match self.pay_order(&order, Vec::new(), ticket_type).await? {
            Settlement::Applied { tickets } => {
                metrics::counter!("checkouts_created_total", "kind" => "free").increment(1);
                tracing::info!(order_id = %order.id, tickets, "free order issued");
                Ok(CheckoutCreated::Free {
                    order_id: order.id,
                    order_number: order.order_number,
                    tickets_generated: tickets,
                })
            }
            Settlement::Superseded(current) => Err(consistency_error(
                Some(order.id),
                format!("new order was already {}", current.status),
            )),
            Settlement::SoldOut(reason) => {
                tracing::info!(order_id = %order.id, %reason, "free order sold out");
                if self.cancel_pending(&order, true).await?.is_none() {
                    metrics::counter!("orders_sold_out_total", "kind" => "free").increment(1);
                }
                Err(CheckoutFailure::SoldOut(reason).into())
            }
        }
    }

    async fn open_payment(&self, order: Order, session: &SessionId) -> Result<CheckoutCreated> {
        let request = CreateTransaction {
            buy_order: order.order_number.clone(),
            session_id: GatewaySessionId::generate(session, self.clock.now()),
            amount: order.total_amount,
            return_url: self.settings.return_url.clone(),
        };

        let redirect = match self.gateway.create(request).await {
            Ok(redirect) => redirect,
            Err(e) => {
                tracing::error!(order_id = %order.id, error = %e, "gateway refused to open transaction");
                metrics::counter!("gateway_errors_total", "operation" => "create").increment(1);
                // Seat holds stay so the buyer can retry before they expire.
                self.abandon(order).await;
                return Err(e.into());
            }
        };

        let payment = Payment::pending(&order, redirect.token.clone(), self.clock.now());
        self.store.insert_payment(&payment).await?;
        metrics::counter!("checkouts_created_total", "kind" => "paid").increment(1);

        Ok(CheckoutCreated::Redirect {
            order_id: order.id,
            order_number: order.order_number,
            payment_url: redirect.payment_url(),
            token: redirect.token,
        })
    }

    async fn abandon(&self, mut order: Order) {
        let order_id = order.id;
        if order.mark_cancelled(self.clock.now()).is_err() {
            return;
        }
        if let Err(e) = self
            .store
            .commit_order(OrderCommit::cancelled(order, Vec::new()))
            .await
        {
            tracing::warn!(%order_id, error = %e, "failed to cancel order");
        }
    }

    // ---- gateway return ----

    /// Settles the order behind a gateway return.
    ///
    /// Returns for orders that are already settled change nothing and
    /// report the settled outcome again.
    #[tracing::instrument(skip(self, input))]
    pub async fn handle_gateway_return(&self, input: GatewayReturn) -> Result<ReturnOutcome> {
        let started = Instant::now();
        let outcome = match input {
            GatewayReturn::Commit { token } => self.confirm_payment(&token).await,
            GatewayReturn::Cancelled { token, buy_order } => {
                self.cancel_payment(token.as_deref(), buy_order.as_deref())
                    .await
            }
            GatewayReturn::Missing => {
                tracing::warn!("payment return without a token");
                Ok(ReturnOutcome::failure(FailureReason::NoToken, None))
            }
        };
        metrics::histogram!("payment_return_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        outcome
    }

    #[tracing::instrument(skip(self))]
    async fn confirm_payment(&self, token: &str) -> Result<ReturnOutcome> {
        let Some(payment) = self.store.find_payment_by_token(token).await? else {
            tracing::error!(consistency_error = true, token, "no payment for gateway token");
            return Ok(ReturnOutcome::failure(FailureReason::PaymentNotFound, None));
        };
        let Some(order) = self.store.get_order(payment.order_id).await? else {
            tracing::error!(
                consistency_error = true,
                token,
                order_id = %payment.order_id,
                "payment references a missing order"
            );
            return Ok(ReturnOutcome::failure(FailureReason::PaymentNotFound, None));
        };
        let order_id = order.id;

        if order.status.is_terminal() {
            tracing::info!(%order_id, status = %order.status, "order already settled");
            return self.settled_outcome(&order).await;
        }
        if payment.status.is_terminal() {
            consistency_error(
                Some(order_id),
                format!("payment is {} while its order is pending", payment.status),
            );
            return Ok(ReturnOutcome::failure(
                FailureReason::ConfirmationError,
                Some(order_id),
            ));
        }

        let response = match self.gateway.commit(token).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(%order_id, token, error = %e, "gateway commit failed");
                metrics::counter!("gateway_errors_total", "operation" => "commit").increment(1);
                if let Some(current) = self.store.get_order(order_id).await?
                    && current.status.is_terminal()
                {
                    return self.settled_outcome(&current).await;
                }
                return Ok(ReturnOutcome::failure(
                    FailureReason::ConfirmationError,
                    Some(order_id),
                ));
            }
        };

        let settled = if response.is_approved() {
            self.approve(order, payment, &response).await
        } else {
            self.reject(order, payment, response.response_code).await
        };
        match settled {
            Err(CheckoutError::Consistency(_)) => Ok(ReturnOutcome::failure(
                FailureReason::ConfirmationError,
                Some(order_id),
            )),
            other => other,
        }
    }

    async fn approve(
        &self,
        order: Order,
        mut payment: Payment,
        response: &CommitResponse,
    ) -> Result<ReturnOutcome> {
        if let Some(amount) = response.amount
            && amount != order.total_amount.amount()
        {
            return Err(consistency_error(
                Some(order.id),
                format!(
                    "gateway authorized {amount} but the order totals {}",
                    order.total_amount
                ),
            ));
        }

        let ticket_type = match order.ticket_type_id {
            Some(id) => Some(self.store.get_ticket_type(id).await?.ok_or_else(|| {
                consistency_error(Some(order.id), format!("ticket type {id} no longer exists"))
            })?),
            None => None,
        };

        payment.approve(response.authorization(), self.clock.now())?;
        match self
            .pay_order(&order, vec![payment.clone()], ticket_type.as_ref())
            .await?
        {
            Settlement::Applied { tickets } => {
                metrics::counter!("payments_approved_total").increment(1);
                tracing::info!(order_id = %order.id, tickets, "payment approved");
                Ok(ReturnOutcome::Success { order_id: order.id })
            }
            Settlement::Superseded(current) => self.settled_outcome(&current).await,
            Settlement::SoldOut(reason) => self.refund_required(order, payment, reason).await,
        }
    }

    /// Cancels an order whose payment went through but whose seats, units or
    /// promo use were taken by another order. The payment stays approved so
    /// it can be refunded.
    async fn refund_required(
        &self,
        order: Order,
        payment: Payment,
        reason: String,
    ) -> Result<ReturnOutcome> {
        let mut cancelled = order.clone();
        cancelled.mark_cancelled(self.clock.now())?;

        if let Some(current) = self
            .commit_or_reread(OrderCommit::cancelled(cancelled, vec![payment.clone()]))
            .await?
        {
            return self.settled_outcome(&current).await;
        }
        self.release_order_hold(&order).await;

        metrics::counter!("payments_refund_required_total").increment(1);
        tracing::error!(
            consistency_error = true,
            refund_required = true,
            order_id = %order.id,
            payment_id = %payment.id,
            amount = %payment.amount,
            %reason,
            "approved payment for a sold-out order"
        );
        Ok(ReturnOutcome::failure(
            FailureReason::ConfirmationError,
            Some(order.id),
        ))
    }

    async fn reject(
        &self,
        order: Order,
        mut payment: Payment,
        response_code: i32,
    ) -> Result<ReturnOutcome> {
        let now = self.clock.now();
        let mut cancelled = order.clone();
        cancelled.mark_cancelled(now)?;
        payment.reject(response_code, now)?;

        if let Some(current) = self
            .commit_or_reread(OrderCommit::cancelled(cancelled, vec![payment]))
            .await?
        {
            return self.settled_outcome(&current).await;
        }
        self.release_order_hold(&order).await;

        metrics::counter!("payments_rejected_total").increment(1);
        tracing::info!(order_id = %order.id, response_code, "payment rejected");
        Ok(ReturnOutcome::failure(
            FailureReason::TransactionFailed,
            Some(order.id),
        ))
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_payment(
        &self,
        token: Option<&str>,
        buy_order: Option<&str>,
    ) -> Result<ReturnOutcome> {
        let payment = match token {
            Some(token) => self.store.find_payment_by_token(token).await?,
            None => None,
        };
        let order = match (payment, buy_order.and_then(|b| OrderNumber::parse(b).ok())) {
            (Some(payment), _) => self.store.get_order(payment.order_id).await?,
            (None, Some(number)) => self.store.find_order_by_number(&number).await?,
            (None, None) => None,
        };

        let Some(order) = order else {
            tracing::warn!("cancelled payment return for an unknown order");
            return Ok(ReturnOutcome::failure(
                FailureReason::TransactionCancelled,
                None,
            ));
        };
        if order.status.is_terminal() {
            return self.settled_outcome(&order).await;
        }

        if let Some(current) = self.cancel_pending(&order, true).await? {
            return self.settled_outcome(&current).await;
        }
        metrics::counter!("payments_cancelled_total").increment(1);
        tracing::info!(order_id = %order.id, "payment cancelled by the buyer");
        Ok(ReturnOutcome::failure(
            FailureReason::TransactionCancelled,
            Some(order.id),
        ))
    }

    /// The redirect outcome of an order that was settled earlier.
    async fn settled_outcome(&self, order: &Order) -> Result<ReturnOutcome> {
        let outcome = match order.status {
            OrderStatus::Paid => ReturnOutcome::Success { order_id: order.id },
            OrderStatus::Cancelled => {
                let payments = self.store.payments_for_order(order.id).await?;
                let reason = if payments
                    .iter()
                    .any(|p| p.status == PaymentStatus::Approved)
                {
                    FailureReason::ConfirmationError
                } else if payments
                    .iter()
                    .any(|p| p.status == PaymentStatus::Rejected)
                {
                    FailureReason::TransactionFailed
                } else {
                    FailureReason::TransactionCancelled
                };
                ReturnOutcome::failure(reason, Some(order.id))
            }
            OrderStatus::Pending => {
                ReturnOutcome::failure(FailureReason::ConfirmationError, Some(order.id))
            }
        };
        Ok(outcome)
    }

    // ---- settlement ----

    /// Issues tickets and commits `order` as paid, then drops its seat hold
    /// and hands the tickets to the notifier.
    ///
    /// The seat hold is renewed first: it may have expired while the buyer
    /// was at the gateway, and another session may hold or have bought the
    /// seats since.
    async fn pay_order(
        &self,
        order: &Order,
        payments: Vec<Payment>,
        ticket_type: Option<&TicketType>,
    ) -> Result<Settlement> {
        if let Some(OrderReservation::Seats {
            session_id,
            seat_ids,
        }) = &order.reservation
            && !self.reservations.reserve_seats(session_id, seat_ids).await?
        {
            return Ok(Settlement::SoldOut(format!(
                "seat hold of session {session_id} was lost"
            )));
        }

        let now = self.clock.now();
        let plan = TicketIssuer::issue(order, ticket_type, now)
            .map_err(|e| consistency_error(Some(order.id), e.to_string()))?;

        let mut paid = order.clone();
        paid.mark_paid(now)?;

        let tickets = plan.tickets.clone();
        let sold_seats = plan.seats_to_mark_sold.clone();
        let release = plan.release_session.clone();

        match self
            .commit_or_reread(OrderCommit::paid(paid.clone(), payments, plan))
            .await
        {
            Ok(None) => {}
            Ok(Some(current)) => return Ok(Settlement::Superseded(current)),
            Err(CheckoutError::Store(e)) if e.is_sold_out() => {
                return Ok(Settlement::SoldOut(e.to_string()));
            }
            Err(e) => return Err(e),
        }
        metrics::counter!("tickets_issued_total").increment(tickets.len() as u64);

        if let Some(session) = release {
            self.release_hold(&session, &sold_seats).await;
        }
        if let Err(e) = self.notifier.tickets_issued(&paid, &tickets).await {
            tracing::warn!(order_id = %paid.id, error = %e, "ticket delivery failed");
        }
        Ok(Settlement::Applied {
            tickets: tickets.len(),
        })
    }

    /// Cancels a pending order and its pending payments.
    ///
    /// Returns the stored order when another writer settled it first.
    async fn cancel_pending(&self, order: &Order, release_hold: bool) -> Result<Option<Order>> {
        let now = self.clock.now();
        let mut payments = self.store.payments_for_order(order.id).await?;
        payments.retain(|p| p.status == PaymentStatus::Pending);
        for payment in &mut payments {
            payment.cancel(now)?;
        }

        let mut cancelled = order.clone();
        cancelled.mark_cancelled(now)?;
        if let Some(current) = self
            .commit_or_reread(OrderCommit::cancelled(cancelled, payments))
            .await?
        {
            return Ok(Some(current));
        }
        if release_hold {
            self.release_order_hold(order).await;
        }
        Ok(None)
    }

    async fn commit_or_reread(&self, commit: OrderCommit) -> Result<Option<Order>> {
        let order_id = commit.order.id;
        match self.store.commit_order(commit).await {
            Ok(()) => Ok(None),
            Err(StoreError::ConcurrencyConflict { actual, .. }) => {
                tracing::info!(%order_id, %actual, "order settled concurrently");
                let current = self.store.get_order(order_id).await?.ok_or_else(|| {
                    consistency_error(Some(order_id), "order vanished after a conflict".to_string())
                })?;
                Ok(Some(current))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn release_order_hold(&self, order: &Order) {
        if let Some(OrderReservation::Seats {
            session_id,
            seat_ids,
        }) = &order.reservation
        {
            self.release_hold(session_id, seat_ids).await;
        }
    }

    async fn release_hold(&self, session: &SessionId, seat_ids: &[SeatId]) {
        if let Err(e) = self.reservations.release_seats(session, seat_ids).await {
            tracing::warn!(session_id = %session, error = %e, "failed to release seat hold");
        }
    }

    // ---- housekeeping and reads ----

    /// Cancels orders that stayed pending for longer than `older_than`, and
    /// purges expired seat holds.
    ///
    /// Seat holds of swept orders are left to expire on their own, since the
    /// session may have started a newer checkout for the same seats.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_abandoned_orders(&self, older_than: Duration) -> Result<usize> {
        let cutoff = self.clock.now() - older_than;
        let orders = self.store.pending_orders_created_before(cutoff).await?;

        let mut cancelled = 0;
        for order in &orders {
            match self.cancel_pending(order, false).await {
                Ok(None) => cancelled += 1,
                Ok(Some(current)) => {
                    tracing::debug!(order_id = %order.id, status = %current.status, "order settled before sweep");
                }
                Err(e) => {
                    tracing::warn!(order_id = %order.id, error = %e, "failed to cancel abandoned order");
                }
            }
        }
        let purged = self.reservations.purge_expired().await?;

        metrics::counter!("abandoned_orders_cancelled_total").increment(cancelled as u64);
        tracing::info!(cancelled, purged, "abandoned orders swept");
        Ok(cancelled)
    }

    /// Order with its payments and tickets.
    pub async fn order_summary(&self, order_id: OrderId) -> Result<OrderSummary> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(CheckoutFailure::OrderNotFound(order_id))?;
        let payments = self.store.payments_for_order(order_id).await?;
        let tickets = self.store.tickets_for_order(order_id).await?;
        Ok(OrderSummary {
            order,
            payments,
            tickets,
        })
    }
}

fn validate_request(request: &CheckoutRequest) -> Result<()> {
    if request.user_id.is_blank() {
        return Err(CheckoutFailure::InvalidRequest("user id is required".to_string()).into());
    }
    if request.buyer.name.trim().is_empty() {
        return Err(CheckoutFailure::InvalidRequest("buyer name is required".to_string()).into());
    }
    if !request.buyer.email.contains('@') {
        return Err(CheckoutFailure::InvalidRequest("buyer email is invalid".to_string()).into());
    }
    Ok(())
}
