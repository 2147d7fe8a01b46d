//! Gateway-facing identifiers.
//!
//! Webpay rejects a buy order longer than 26 characters and a session id
//! longer than 61. Both are generated here from a timestamp plus a random
//! suffix, and every constructor validates the limits before the value can
//! reach the gateway.

use chrono::{DateTime, Utc};
use common::SessionId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Maximum length of a buy order accepted by the gateway.
pub const MAX_BUY_ORDER_LEN: usize = 26;

/// Maximum length of a gateway session id.
pub const MAX_GATEWAY_SESSION_LEN: usize = 61;

const RANDOM_SUFFIX_LEN: usize = 6;

/// Human-readable order number, also sent to the gateway as the buy order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Generates `PREFIX-<base36 millis><random>` within the length limit.
    ///
    /// The timestamp and random part always survive; the prefix is cut to
    /// whatever room is left.
    pub fn generate(prefix: &str, now: DateTime<Utc>) -> Self {
        let body = format!(
            "{}{}",
            base36(now.timestamp_millis().max(0) as u64),
            random_suffix(RANDOM_SUFFIX_LEN)
        );
        let prefix: String = sanitize(prefix).to_ascii_uppercase();
        let room = MAX_BUY_ORDER_LEN.saturating_sub(body.len() + 1);

        let value = if prefix.is_empty() || room == 0 {
            body
        } else {
            format!("{}-{}", &prefix[..prefix.len().min(room)], body)
        };
        Self(value)
    }

    /// Validates an existing order number.
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        validate("buy order", &value, MAX_BUY_ORDER_LEN)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for OrderNumber {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<OrderNumber> for String {
    fn from(value: OrderNumber) -> Self {
        value.0
    }
}

/// Session identifier sent to the gateway alongside the buy order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GatewaySessionId(String);

impl GatewaySessionId {
    /// Derives a gateway session id from the checkout session.
    ///
    /// Long or oddly-shaped browser session ids are sanitized and truncated so
    /// the timestamp suffix always fits.
    pub fn generate(session: &SessionId, now: DateTime<Utc>) -> Self {
        let suffix = format!(
            "{}{}",
            base36(now.timestamp_millis().max(0) as u64),
            random_suffix(4)
        );
        let session = sanitize(session.as_str());
        let room = MAX_GATEWAY_SESSION_LEN.saturating_sub(suffix.len() + 1);

        let value = if session.is_empty() || room == 0 {
            suffix
        } else {
            format!("{}-{}", &session[..session.len().min(room)], suffix)
        };
        Self(value)
    }

    /// Validates an existing session id.
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        validate("gateway session id", &value, MAX_GATEWAY_SESSION_LEN)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GatewaySessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate(kind: &'static str, value: &str, max: usize) -> Result<(), DomainError> {
    if value.is_empty() {
        return Err(DomainError::InvalidIdentifier {
            kind,
            reason: "must not be empty".to_string(),
        });
    }
    if value.len() > max {
        return Err(DomainError::InvalidIdentifier {
            kind,
            reason: format!("{} characters exceeds the limit of {max}", value.len()),
        });
    }
    if !value.bytes().all(is_allowed) {
        return Err(DomainError::InvalidIdentifier {
            kind,
            reason: "only ASCII letters, digits, '-' and '_' are allowed".to_string(),
        });
    }
    Ok(())
}

fn is_allowed(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

fn sanitize(value: &str) -> String {
    value.bytes().filter(|b| is_allowed(*b)).map(char::from).collect()
}

fn base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::with_capacity(13);
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    out.into_iter().map(char::from).collect()
}

fn random_suffix(len: usize) -> String {
    Uuid::new_v4().simple().to_string()[..len].to_ascii_uppercase()
}
