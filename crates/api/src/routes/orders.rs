//! Order lookup endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use checkout::{CheckoutError, CheckoutFailure, OrderSummary};
use chrono::{DateTime, Utc};
use common::{EventId, OrderId, PaymentId, SeatId, TicketId, TicketTypeId};
use domain::{Order, Payment, Ticket};
use serde::Serialize;

use crate::AppState;
use crate::error::ApiError;
use crate::routes::checkout::caller;

// -- Response types --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummaryResponse {
    pub success: bool,
    pub order: OrderResponse,
    pub payments: Vec<PaymentResponse>,
    pub tickets: Vec<TicketResponse>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: OrderId,
    pub order_number: String,
    pub status: &'static str,
    pub event_id: EventId,
    pub quantity: u32,
    pub currency: &'static str,
    pub base_amount: i64,
    pub discount_amount: i64,
    pub commission_amount: i64,
    pub total_amount: i64,
    pub buyer_name: String,
    pub buyer_email: String,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub id: PaymentId,
    pub status: &'static str,
    pub amount: i64,
    pub authorization_code: Option<String>,
    pub response_code: Option<i32>,
    pub payment_type_code: Option<String>,
    pub transaction_date: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketResponse {
    pub id: TicketId,
    pub qr_code: String,
    pub status: &'static str,
    pub is_used: bool,
    pub seat_id: Option<SeatId>,
    pub ticket_type_id: Option<TicketTypeId>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            order_number: order.order_number.to_string(),
            status: order.status.as_str(),
            event_id: order.event_id,
            quantity: order.quantity,
            currency: order.currency.as_str(),
            base_amount: order.base_amount.amount(),
            discount_amount: order.discount_amount.amount(),
            commission_amount: order.commission_amount.amount(),
            total_amount: order.total_amount.amount(),
            buyer_name: order.buyer.name.clone(),
            buyer_email: order.buyer.email.clone(),
            created_at: order.created_at,
            paid_at: order.paid_at,
        }
    }
}

impl From<&Payment> for PaymentResponse {
    fn from(payment: &Payment) -> Self {
        Self {
            id: payment.id,
            status: payment.status.as_str(),
            amount: payment.amount.amount(),
            authorization_code: payment.authorization_code.clone(),
            response_code: payment.response_code,
            payment_type_code: payment.payment_type_code.clone(),
            transaction_date: payment.transaction_date,
        }
    }
}

impl From<&Ticket> for TicketResponse {
    fn from(ticket: &Ticket) -> Self {
        Self {
            id: ticket.id,
            qr_code: ticket.qr_code.clone(),
            status: ticket.status.as_str(),
            is_used: ticket.is_used,
            seat_id: ticket.seat_id.clone(),
            ticket_type_id: ticket.ticket_type_id,
        }
    }
}

impl From<OrderSummary> for OrderSummaryResponse {
    fn from(summary: OrderSummary) -> Self {
        Self {
            success: true,
            order: OrderResponse::from(&summary.order),
            payments: summary.payments.iter().map(PaymentResponse::from).collect(),
            tickets: summary.tickets.iter().map(TicketResponse::from).collect(),
        }
    }
}

// -- Handlers --

/// GET /orders/{id}: the caller's order with its payments and tickets.
///
/// Orders of other users answer 404, like unknown ones.
#[tracing::instrument(skip(state, headers))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<OrderSummaryResponse>, ApiError> {
    let user_id = caller(&headers)?;
    let order_id = parse_order_id(&id)?;

    let summary = state.orchestrator.order_summary(order_id).await?;
    if summary.order.user_id != user_id {
        return Err(CheckoutError::from(CheckoutFailure::OrderNotFound(order_id)).into());
    }

    Ok(Json(summary.into()))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order id: {e}")))?;
    Ok(OrderId::from(uuid))
}
