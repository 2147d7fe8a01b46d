//! Payment gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{GatewaySessionId, Money, OrderNumber, PaymentAuthorization};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status the gateway reports for an authorized transaction.
pub const AUTHORIZED: &str = "AUTHORIZED";

/// Errors talking to the payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("Gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with a non-2xx status.
    #[error("Gateway returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The gateway answered 2xx with a body we cannot use.
    #[error("Unexpected gateway response: {0}")]
    InvalidResponse(String),

    /// The gateway could not be reached.
    #[error("Gateway unavailable: {0}")]
    Unavailable(String),
}

/// A transaction to open with the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTransaction {
    pub buy_order: OrderNumber,
    pub session_id: GatewaySessionId,
    pub amount: Money,
    /// Where the gateway sends the buyer back once the payment form closes.
    pub return_url: String,
}

/// Token and form URL returned when a transaction is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRedirect {
    pub token: String,
    pub url: String,
}

impl TransactionRedirect {
    /// URL the browser is sent to, carrying the token.
    pub fn payment_url(&self) -> String {
        format!("{}?token_ws={}", self.url, self.token)
    }
}

fn missing_response_code() -> i32 {
    -1
}

/// Result of confirming a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default = "missing_response_code")]
    pub response_code: i32,
    #[serde(default)]
    pub authorization_code: Option<String>,
    #[serde(default)]
    pub payment_type_code: Option<String>,
    #[serde(default)]
    pub transaction_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub buy_order: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
}

impl CommitResponse {
    /// A payment is approved only when it is authorized with response code 0.
    pub fn is_approved(&self) -> bool {
        self.status == AUTHORIZED && self.response_code == 0
    }

    /// The fields recorded on an approved payment.
    pub fn authorization(&self) -> PaymentAuthorization {
        PaymentAuthorization {
            authorization_code: self.authorization_code.clone(),
            response_code: self.response_code,
            payment_type_code: self.payment_type_code.clone(),
            transaction_date: self.transaction_date,
        }
    }
}

/// Operations the checkout needs from the payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a transaction and returns the token and payment form URL.
    async fn create(&self, request: CreateTransaction)
    -> Result<TransactionRedirect, GatewayError>;

    /// Confirms the transaction behind `token` and reports its outcome.
    async fn commit(&self, token: &str) -> Result<CommitResponse, GatewayError>;
}

/// How the in-memory gateway answers commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockOutcome {
    #[default]
    Approve,
    /// Reports a `FAILED` transaction with this response code.
    Reject(i32),
}

#[derive(Debug, Clone)]
struct MockTransaction {
    buy_order: String,
    amount: Money,
    committed: Option<CommitResponse>,
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    transactions: HashMap<String, MockTransaction>,
    next_id: u32,
    outcome: MockOutcome,
    fail_on_create: bool,
    fail_on_commit: bool,
    create_calls: usize,
    commit_calls: usize,
}

/// In-memory payment gateway for tests and local runs.
///
/// Repeated commits of the same token return the first result, like the
/// gateway's transaction status lookup.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<Mutex<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a gateway that approves every transaction.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, InMemoryGatewayState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sets how subsequent commits are answered.
    pub fn set_outcome(&self, outcome: MockOutcome) {
        self.state().outcome = outcome;
    }

    /// Makes `create` fail as if the gateway were down.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state().fail_on_create = fail;
    }

    /// Makes `commit` fail as if the gateway were down.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.state().fail_on_commit = fail;
    }

    /// Number of `create` calls received, including failed ones.
    pub fn create_calls(&self) -> usize {
        self.state().create_calls
    }

    /// Number of `commit` calls received, including failed ones.
    pub fn commit_calls(&self) -> usize {
        self.state().commit_calls
    }

    /// Amount opened under `token`.
    pub fn amount_for(&self, token: &str) -> Option<Money> {
        self.state().transactions.get(token).map(|tx| tx.amount)
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create(
        &self,
        request: CreateTransaction,
    ) -> Result<TransactionRedirect, GatewayError> {
        let mut state = self.state();
        state.create_calls += 1;

        if state.fail_on_create {
            return Err(GatewayError::Unavailable(
                "simulated gateway outage".to_string(),
            ));
        }

        state.next_id += 1;
        let token = format!("mock-{:08}-{}", state.next_id, request.buy_order);
        state.transactions.insert(
            token.clone(),
            MockTransaction {
                buy_order: request.buy_order.to_string(),
                amount: request.amount,
                committed: None,
            },
        );

        Ok(TransactionRedirect {
            token,
            url: "https://webpay.mock/webpayserver/initTransaction".to_string(),
        })
    }

    async fn commit(&self, token: &str) -> Result<CommitResponse, GatewayError> {
        let mut state = self.state();
        state.commit_calls += 1;

        if state.fail_on_commit {
            return Err(GatewayError::Unavailable(
                "simulated gateway outage".to_string(),
            ));
        }

        let outcome = state.outcome;
        let tx = state
            .transactions
            .get_mut(token)
            .ok_or_else(|| GatewayError::Api {
                status: 422,
                body: format!("unknown token {token}"),
            })?;

        if let Some(previous) = &tx.committed {
            return Ok(previous.clone());
        }

        let response = match outcome {
            MockOutcome::Approve => CommitResponse {
                status: AUTHORIZED.to_string(),
                response_code: 0,
                authorization_code: Some("1213".to_string()),
                payment_type_code: Some("VD".to_string()),
                transaction_date: Some(Utc::now()),
                buy_order: Some(tx.buy_order.clone()),
                amount: Some(tx.amount.amount()),
            },
            MockOutcome::Reject(code) => CommitResponse {
                status: "FAILED".to_string(),
                response_code: code,
                authorization_code: None,
                payment_type_code: None,
                transaction_date: Some(Utc::now()),
                buy_order: Some(tx.buy_order.clone()),
                amount: Some(tx.amount.amount()),
            },
        };
        tx.committed = Some(response.clone());
        Ok(response)
    }
}
