//! Transbank Webpay Plus REST client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;

use super::gateway::{
    CommitResponse, CreateTransaction, GatewayError, PaymentGateway, TransactionRedirect,
};

const TRANSACTIONS_PATH: &str = "/rswebpaytransaction/api/webpay/v1.2/transactions";

/// Commerce code Transbank publishes for its integration environment.
pub const INTEGRATION_COMMERCE_CODE: &str = "597055555532";

/// API key Transbank publishes for its integration environment.
pub const INTEGRATION_API_KEY: &str =
    "579B532A7440BB0C9079DED94D31EA1615BACEB56610332264630D42D0A36B1C";

/// Which Webpay deployment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebpayEnvironment {
    Integration,
    Production,
}

impl WebpayEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            WebpayEnvironment::Integration => "https://webpay3gint.transbank.cl",
            WebpayEnvironment::Production => "https://webpay3g.transbank.cl",
        }
    }
}

/// Merchant credentials sent on every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebpayCredentials {
    pub commerce_code: String,
    pub api_key: String,
}

impl WebpayCredentials {
    /// The public integration credentials.
    pub fn integration() -> Self {
        Self {
            commerce_code: INTEGRATION_COMMERCE_CODE.to_string(),
            api_key: INTEGRATION_API_KEY.to_string(),
        }
    }
}

#[derive(Serialize)]
struct CreateBody<'a> {
    buy_order: &'a str,
    session_id: &'a str,
    amount: i64,
    return_url: &'a str,
}

/// Webpay Plus client.
#[derive(Debug, Clone)]
pub struct WebpayGateway {
    client: reqwest::Client,
    base_url: String,
}

impl WebpayGateway {
    /// Creates a client for `environment`.
    pub fn new(
        environment: WebpayEnvironment,
        credentials: &WebpayCredentials,
    ) -> Result<Self, GatewayError> {
        Self::with_base_url(environment.base_url(), credentials)
    }

    /// Creates a client against an arbitrary base URL.
    pub fn with_base_url(
        base_url: impl Into<String>,
        credentials: &WebpayCredentials,
    ) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "tbk-api-key-id",
            header_value(&credentials.commerce_code, "commerce code")?,
        );
        headers.insert(
            "tbk-api-key-secret",
            header_value(&credentials.api_key, "api key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn transactions_url(&self) -> String {
        format!("{}{}", self.base_url, TRANSACTIONS_PATH)
    }

    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(GatewayError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

fn header_value(value: &str, what: &str) -> Result<HeaderValue, GatewayError> {
    HeaderValue::from_str(value)
        .map_err(|_| GatewayError::InvalidResponse(format!("{what} is not a valid header value")))
}

#[async_trait]
impl PaymentGateway for WebpayGateway {
    #[tracing::instrument(skip(self, request), fields(buy_order = %request.buy_order))]
    async fn create(
        &self,
        request: CreateTransaction,
    ) -> Result<TransactionRedirect, GatewayError> {
        let body = CreateBody {
            buy_order: request.buy_order.as_str(),
            session_id: request.session_id.as_str(),
            amount: request.amount.amount(),
            return_url: &request.return_url,
        };

        let response = self
            .client
            .post(self.transactions_url())
            .json(&body)
            .send()
            .await?;
        let redirect: TransactionRedirect = Self::ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        if redirect.token.is_empty() || redirect.url.is_empty() {
            return Err(GatewayError::InvalidResponse(
                "missing token or url".to_string(),
            ));
        }
        Ok(redirect)
    }

    #[tracing::instrument(skip(self))]
    async fn commit(&self, token: &str) -> Result<CommitResponse, GatewayError> {
        let response = self
            .client
            .put(format!("{}/{}", self.transactions_url(), token))
            .send()
            .await?;

        Self::ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }
}
