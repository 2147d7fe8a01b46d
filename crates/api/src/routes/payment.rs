//! Payment gateway return endpoint.
//!
//! The gateway sends the buyer back here with GET query parameters or a POST
//! form, depending on how the payment form ended. Either way the buyer is
//! redirected to the frontend's success or error page; this endpoint never
//! answers with an error status.

use std::sync::Arc;

use axum::Form;
use axum::extract::rejection::{FormRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::response::Redirect;
use checkout::{FailureReason, GatewayReturn, ReturnOutcome};
use serde::Deserialize;

use crate::AppState;

/// Fields the gateway may send back.
#[derive(Debug, Default, Deserialize)]
pub struct ReturnParams {
    pub token_ws: Option<String>,
    #[serde(rename = "TBK_TOKEN")]
    pub tbk_token: Option<String>,
    #[serde(rename = "TBK_ORDEN_COMPRA")]
    pub tbk_buy_order: Option<String>,
    #[serde(rename = "TBK_ID_SESION")]
    pub tbk_session_id: Option<String>,
}

impl ReturnParams {
    /// Fills fields missing here from `other`.
    fn or(self, other: ReturnParams) -> ReturnParams {
        ReturnParams {
            token_ws: self.token_ws.or(other.token_ws),
            tbk_token: self.tbk_token.or(other.tbk_token),
            tbk_buy_order: self.tbk_buy_order.or(other.tbk_buy_order),
            tbk_session_id: self.tbk_session_id.or(other.tbk_session_id),
        }
    }
}

/// GET /payment/return
pub async fn return_get(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ReturnParams>, QueryRejection>,
) -> Redirect {
    let params = query.map(|Query(p)| p).unwrap_or_default();
    settle(&state, params).await
}

/// POST /payment/return
pub async fn return_post(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ReturnParams>, QueryRejection>,
    form: Result<Form<ReturnParams>, FormRejection>,
) -> Redirect {
    let query = query.map(|Query(p)| p).unwrap_or_default();
    let form = form.map(|Form(p)| p).unwrap_or_default();
    settle(&state, form.or(query)).await
}

#[tracing::instrument(skip_all, fields(gateway_session = ?params.tbk_session_id))]
async fn settle(state: &AppState, params: ReturnParams) -> Redirect {
    let input = GatewayReturn::from_fields(params.token_ws, params.tbk_token, params.tbk_buy_order);

    let outcome = match state.orchestrator.handle_gateway_return(input).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(error = %e, "payment return failed");
            ReturnOutcome::failure(FailureReason::ConfirmationError, None)
        }
    };

    let result = match &outcome {
        ReturnOutcome::Success { .. } => "success",
        ReturnOutcome::Failure { reason, .. } => reason.as_str(),
    };
    metrics::counter!("payment_return_redirects_total", "result" => result).increment(1);

    Redirect::to(&redirect_target(&state.frontend_url, &outcome))
}

fn redirect_target(frontend_url: &str, outcome: &ReturnOutcome) -> String {
    format!(
        "{}{}",
        frontend_url.trim_end_matches('/'),
        outcome.redirect_path()
    )
}

#[cfg(test)]
mod tests {
    use common::OrderId;

    use super::*;

    #[test]
    fn test_redirect_target_joins_frontend_url() {
        let order_id = OrderId::new();
        assert_eq!(
            redirect_target(
                "https://sorykpass.cl/",
                &ReturnOutcome::Success { order_id }
            ),
            format!("https://sorykpass.cl/payment/success?orderId={order_id}")
        );
        assert_eq!(
            redirect_target(
                "http://localhost:5173",
                &ReturnOutcome::failure(FailureReason::NoToken, None)
            ),
            "http://localhost:5173/payment/error?reason=no-token"
        );
    }

    #[test]
    fn test_form_fields_win_over_query() {
        let form = ReturnParams {
            tbk_token: Some("tbk".to_string()),
            ..Default::default()
        };
        let query = ReturnParams {
            token_ws: Some("ws".to_string()),
            tbk_token: Some("other".to_string()),
            ..Default::default()
        };

        let merged = form.or(query);
        assert_eq!(merged.tbk_token.as_deref(), Some("tbk"));
        assert_eq!(merged.token_ws.as_deref(), Some("ws"));
    }
}
