//! Inputs and outputs of the payment orchestrator.

use common::{EventId, OrderId, SeatId, SessionId, TicketTypeId, UserId};
use domain::{BuyerInfo, CommissionPolicy, Order, OrderNumber, Payment, Ticket};

/// What the buyer wants to purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutSelection {
    /// Specific seats, held by the request's session.
    Seats {
        /// When given, every seat must belong to this event.
        event_id: Option<EventId>,
        seat_ids: Vec<SeatId>,
    },
    /// Units of a non-seated ticket type.
    TicketType {
        event_id: EventId,
        /// Falls back to the event's only ticket type when absent.
        ticket_type_id: Option<TicketTypeId>,
        quantity: u32,
    },
}

/// A checkout request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub user_id: UserId,
    /// Required for seat checkouts.
    pub session_id: Option<SessionId>,
    pub buyer: BuyerInfo,
    pub promo_code: Option<String>,
    pub selection: CheckoutSelection,
}

/// Result of a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutCreated {
    /// The buyer must pay at `payment_url`.
    Redirect {
        order_id: OrderId,
        order_number: OrderNumber,
        token: String,
        payment_url: String,
    },
    /// Nothing to charge; the order is already paid and its tickets issued.
    Free {
        order_id: OrderId,
        order_number: OrderNumber,
        tickets_generated: usize,
    },
}

impl CheckoutCreated {
    pub fn order_id(&self) -> OrderId {
        match self {
            CheckoutCreated::Redirect { order_id, .. } | CheckoutCreated::Free { order_id, .. } => {
                *order_id
            }
        }
    }

    pub fn order_number(&self) -> &OrderNumber {
        match self {
            CheckoutCreated::Redirect { order_number, .. }
            | CheckoutCreated::Free { order_number, .. } => order_number,
        }
    }
}

/// The gateway's redirect back to us, normalized from query or form fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayReturn {
    /// The payment form finished; the transaction must be committed.
    Commit { token: String },
    /// The buyer aborted on the payment form, or the form failed. A form
    /// that timed out comes back with the buy order only.
    Cancelled {
        token: Option<String>,
        buy_order: Option<String>,
    },
    /// Neither a token nor a buy order.
    Missing,
}

impl GatewayReturn {
    /// Classifies the raw `token_ws`, `TBK_TOKEN` and `TBK_ORDEN_COMPRA`
    /// fields. Blank values count as absent.
    pub fn from_fields(
        token_ws: Option<String>,
        tbk_token: Option<String>,
        tbk_buy_order: Option<String>,
    ) -> Self {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let token_ws = present(token_ws);
        let tbk_token = present(tbk_token);
        let buy_order = present(tbk_buy_order);

        match (token_ws, tbk_token, buy_order) {
            (_, Some(token), buy_order) => GatewayReturn::Cancelled {
                token: Some(token),
                buy_order,
            },
            (Some(token), None, _) => GatewayReturn::Commit { token },
            (None, None, Some(buy_order)) => GatewayReturn::Cancelled {
                token: None,
                buy_order: Some(buy_order),
            },
            (None, None, None) => GatewayReturn::Missing,
        }
    }
}

/// Why a payment return did not end in a paid order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    NoToken,
    PaymentNotFound,
    TransactionFailed,
    TransactionCancelled,
    ConfirmationError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::NoToken => "no-token",
            FailureReason::PaymentNotFound => "payment-not-found",
            FailureReason::TransactionFailed => "transaction-failed",
            FailureReason::TransactionCancelled => "transaction-cancelled",
            FailureReason::ConfirmationError => "confirmation-error",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the buyer lands after the payment return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnOutcome {
    Success {
        order_id: OrderId,
    },
    Failure {
        reason: FailureReason,
        order_id: Option<OrderId>,
    },
}

impl ReturnOutcome {
    pub fn failure(reason: FailureReason, order_id: Option<OrderId>) -> Self {
        ReturnOutcome::Failure { reason, order_id }
    }

    /// Frontend path and query for this outcome.
    pub fn redirect_path(&self) -> String {
        match self {
            ReturnOutcome::Success { order_id } => {
                format!("/payment/success?orderId={order_id}")
            }
            ReturnOutcome::Failure {
                reason,
                order_id: Some(order_id),
            } => format!("/payment/error?reason={reason}&orderId={order_id}"),
            ReturnOutcome::Failure {
                reason,
                order_id: None,
            } => format!("/payment/error?reason={reason}"),
        }
    }
}

/// An order with everything recorded against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSummary {
    pub order: Order,
    pub payments: Vec<Payment>,
    pub tickets: Vec<Ticket>,
}

/// Tunables of the checkout flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSettings {
    /// Absolute URL of the payment return endpoint.
    pub return_url: String,
    /// Prefix of generated order numbers.
    pub order_prefix: String,
    pub commission: CommissionPolicy,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            return_url: "http://localhost:3000/payment/return".to_string(),
            order_prefix: "ORD".to_string(),
            commission: CommissionPolicy::none(),
        }
    }
}
