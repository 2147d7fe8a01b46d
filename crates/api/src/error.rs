//! API error types with HTTP response mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::{CheckoutError, CheckoutFailure};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// The caller's identity is missing.
    Unauthorized(String),
    /// The resource is held or changed by someone else.
    Conflict(String),
    /// Checkout service error.
    Checkout(CheckoutError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "success": false, "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    match &err {
        CheckoutError::Rejected(failure) => (failure_status(failure), err.to_string()),
        CheckoutError::Gateway(e) => {
            tracing::error!(error = %e, "payment gateway error");
            (
                StatusCode::BAD_GATEWAY,
                "Payment gateway unavailable, please try again".to_string(),
            )
        }
        CheckoutError::Consistency(detail) => {
            tracing::error!(consistency_error = true, error = %detail, "checkout consistency error");
            internal()
        }
        CheckoutError::Store(_) | CheckoutError::Domain(_) => {
            tracing::error!(error = %err, "checkout failed");
            internal()
        }
    }
}

fn failure_status(failure: &CheckoutFailure) -> StatusCode {
    match failure {
        CheckoutFailure::EventNotFound(_)
        | CheckoutFailure::EventNotPublished(_)
        | CheckoutFailure::OrderNotFound(_) => StatusCode::NOT_FOUND,
        CheckoutFailure::SeatsNotFound(_)
        | CheckoutFailure::SeatsUnavailable
        | CheckoutFailure::InvalidSeatSelection(_)
        | CheckoutFailure::TicketTypeRequired(_)
        | CheckoutFailure::TicketTypeNotFound(_)
        | CheckoutFailure::NoTicketTypes(_)
        | CheckoutFailure::InsufficientCapacity { .. }
        | CheckoutFailure::SoldOut(_)
        | CheckoutFailure::UnknownPromoCode(_)
        | CheckoutFailure::PromoCodeRejected(_)
        | CheckoutFailure::InvalidRequest(_) => StatusCode::BAD_REQUEST,
    }
}

fn internal() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
