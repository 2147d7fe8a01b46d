//! Seat hold endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use common::{SeatId, SessionId};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveRequest {
    pub session_id: String,
    pub seat_ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseRequest {
    pub seat_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRequest {
    pub seat_ids: Vec<String>,
    pub session_id: Option<String>,
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationResponse {
    pub success: bool,
    pub session_id: SessionId,
    pub seat_ids: Vec<SeatId>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ReleaseResponse {
    pub success: bool,
    pub released: usize,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub available: bool,
}

// -- Handlers --

/// POST /reservations: holds every seat for the session, or none.
#[tracing::instrument(skip_all)]
pub async fn reserve(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ReserveRequest>, JsonRejection>,
) -> Result<Json<ReservationResponse>, ApiError> {
    let Json(body) = body?;
    let session = SessionId::new(body.session_id);
    let seat_ids = seat_ids(body.seat_ids);
    let reservations = state.orchestrator.reservations();

    if !reservations.reserve_seats(&session, &seat_ids).await? {
        return Err(ApiError::Conflict(
            "One or more seats are no longer available".to_string(),
        ));
    }

    let expires_at = reservations.reservation_expiry(&session).await?;
    Ok(Json(ReservationResponse {
        success: true,
        session_id: session,
        seat_ids,
        expires_at,
    }))
}

/// GET /reservations/{session_id}: seats the session currently holds.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ReservationResponse>, ApiError> {
    let session = SessionId::new(session_id);
    let reservations = state.orchestrator.reservations();

    let seat_ids = reservations
        .get_session_reservations(&session)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No active reservation for {session}")))?;
    let expires_at = reservations.reservation_expiry(&session).await?;

    Ok(Json(ReservationResponse {
        success: true,
        session_id: session,
        seat_ids,
        expires_at,
    }))
}

/// DELETE /reservations/{session_id}: drops the session's holds, or only
/// those on the `seatIds` given in the body.
#[tracing::instrument(skip(state, body))]
pub async fn release(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    body: Bytes,
) -> Result<Json<ReleaseResponse>, ApiError> {
    let session = SessionId::new(session_id);
    let request: ReleaseRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ReleaseRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid release body: {e}")))?
    };

    let reservations = state.orchestrator.reservations();
    let released = match request.seat_ids {
        Some(ids) => reservations.release_seats(&session, &seat_ids(ids)).await?,
        None => reservations.release_reservation(&session).await?,
    };

    Ok(Json(ReleaseResponse {
        success: true,
        released,
    }))
}

/// POST /seats/availability: whether the seats could be held right now.
pub async fn availability(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AvailabilityRequest>, JsonRejection>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let Json(body) = body?;
    let seat_ids = seat_ids(body.seat_ids);
    let reservations = state.orchestrator.reservations();

    let available = match body.session_id.filter(|s| !s.trim().is_empty()) {
        Some(session) => {
            reservations
                .are_seats_available_for(&SessionId::new(session), &seat_ids)
                .await?
        }
        None => reservations.are_seats_available(&seat_ids).await?,
    };
    Ok(Json(AvailabilityResponse { available }))
}

fn seat_ids(ids: Vec<String>) -> Vec<SeatId> {
    ids.into_iter().map(SeatId::new).collect()
}
