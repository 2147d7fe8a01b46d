//! Checkout creation endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use checkout::{CheckoutCreated, CheckoutRequest, CheckoutSelection};
use common::{EventId, OrderId, SeatId, SessionId, TicketTypeId, UserId};
use domain::BuyerInfo;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

/// Header carrying the caller's identity, set by the upstream auth layer.
pub const USER_ID_HEADER: &str = "x-user-id";

// -- Request types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutRequest {
    pub session_id: Option<String>,
    pub buyer_info: Option<BuyerInfoRequest>,
    #[serde(default)]
    pub seat_ids: Vec<String>,
    /// Seat objects from the venue map, used when `seatIds` is empty.
    #[serde(default)]
    pub selected_seats: Vec<SelectedSeat>,
    pub event_id: Option<EventId>,
    pub ticket_type_id: Option<TicketTypeId>,
    pub quantity: Option<u32>,
    pub promo_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BuyerInfoRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SelectedSeat {
    Id(String),
    Detail { id: String },
}

impl SelectedSeat {
    fn id(&self) -> &str {
        match self {
            SelectedSeat::Id(id) | SelectedSeat::Detail { id } => id,
        }
    }
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub order_id: OrderId,
    pub order_number: String,
    pub is_free: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tickets_generated: Option<usize>,
}

impl From<CheckoutCreated> for CheckoutResponse {
    fn from(created: CheckoutCreated) -> Self {
        match created {
            CheckoutCreated::Redirect {
                order_id,
                order_number,
                token,
                payment_url,
            } => Self {
                success: true,
                payment_url: Some(payment_url),
                token: Some(token),
                order_id,
                order_number: order_number.to_string(),
                is_free: false,
                tickets_generated: None,
            },
            CheckoutCreated::Free {
                order_id,
                order_number,
                tickets_generated,
            } => Self {
                success: true,
                payment_url: None,
                token: None,
                order_id,
                order_number: order_number.to_string(),
                is_free: true,
                tickets_generated: Some(tickets_generated),
            },
        }
    }
}

// -- Handlers --

/// POST /checkout/create: opens an order for held seats or ticket-type
/// units and returns where to pay.
#[tracing::instrument(skip_all)]
pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<CreateCheckoutRequest>, JsonRejection>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let user_id = caller(&headers)?;
    let Json(body) = body?;
    let request = into_checkout_request(user_id, body)?;

    let created = state.orchestrator.create_checkout(request).await?;
    tracing::info!(order_id = %created.order_id(), order_number = %created.order_number(), "checkout created");
    Ok(Json(created.into()))
}

/// The authenticated caller, from the [`USER_ID_HEADER`] header.
pub(crate) fn caller(headers: &HeaderMap) -> Result<UserId, ApiError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(UserId::new)
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))
}

fn into_checkout_request(
    user_id: UserId,
    body: CreateCheckoutRequest,
) -> Result<CheckoutRequest, ApiError> {
    let buyer = body
        .buyer_info
        .ok_or_else(|| ApiError::BadRequest("buyerInfo is required".to_string()))?;

    let seat_ids: Vec<SeatId> = if body.seat_ids.is_empty() {
        body.selected_seats
            .iter()
            .map(|seat| SeatId::new(seat.id()))
            .collect()
    } else {
        body.seat_ids.into_iter().map(SeatId::new).collect()
    };

    let selection = if !seat_ids.is_empty() {
        CheckoutSelection::Seats {
            event_id: body.event_id,
            seat_ids,
        }
    } else if let Some(event_id) = body.event_id {
        CheckoutSelection::TicketType {
            event_id,
            ticket_type_id: body.ticket_type_id,
            quantity: body.quantity.unwrap_or(1),
        }
    } else {
        return Err(ApiError::BadRequest(
            "seatIds or eventId is required".to_string(),
        ));
    };

    Ok(CheckoutRequest {
        user_id,
        session_id: body
            .session_id
            .filter(|s| !s.trim().is_empty())
            .map(SessionId::new),
        buyer: BuyerInfo {
            name: buyer.name,
            email: buyer.email,
            phone: buyer.phone,
        },
        promo_code: body.promo_code.filter(|c| !c.trim().is_empty()),
        selection,
    })
}
