//! Gateway transaction attempts.

use chrono::{DateTime, Utc};
use common::{OrderId, PaymentId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::money::{Currency, Money};
use crate::order::Order;

/// Status of a payment attempt. Transitions are one-way out of `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    /// The buyer aborted on the gateway's page, or the order was abandoned.
    Cancelled,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Approved => "APPROVED",
            PaymentStatus::Rejected => "REJECTED",
            PaymentStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "APPROVED" => Ok(PaymentStatus::Approved),
            "REJECTED" => Ok(PaymentStatus::Rejected),
            "CANCELLED" => Ok(PaymentStatus::Cancelled),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

/// What the gateway reported for an authorized transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAuthorization {
    pub authorization_code: Option<String>,
    pub response_code: i32,
    pub payment_type_code: Option<String>,
    pub transaction_date: Option<DateTime<Utc>>,
}

/// One gateway transaction attempt tied to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    /// Gateway token; unique across payments.
    pub token: String,
    /// The buy order sent to the gateway.
    pub transaction_id: String,
    pub amount: Money,
    pub currency: Currency,
    pub status: PaymentStatus,
    pub authorization_code: Option<String>,
    pub response_code: Option<i32>,
    pub payment_type_code: Option<String>,
    pub transaction_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Creates the pending attempt for `order` under the gateway's token.
    pub fn pending(order: &Order, token: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: PaymentId::new(),
            order_id: order.id,
            token: token.into(),
            transaction_id: order.order_number.to_string(),
            amount: order.total_amount,
            currency: order.currency,
            status: PaymentStatus::Pending,
            authorization_code: None,
            response_code: None,
            payment_type_code: None,
            transaction_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Records an approved commit.
    pub fn approve(
        &mut self,
        authorization: PaymentAuthorization,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.ensure_pending("approve")?;
        self.status = PaymentStatus::Approved;
        self.authorization_code = authorization.authorization_code;
        self.response_code = Some(authorization.response_code);
        self.payment_type_code = authorization.payment_type_code;
        self.transaction_date = authorization.transaction_date;
        self.updated_at = now;
        Ok(())
    }

    /// Records a rejected commit with the gateway's response code.
    pub fn reject(&mut self, response_code: i32, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_pending("reject")?;
        self.status = PaymentStatus::Rejected;
        self.response_code = Some(response_code);
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_pending("cancel")?;
        self.status = PaymentStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    fn ensure_pending(&self, action: &'static str) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::InvalidStateTransition {
                entity: "payment",
                current_state: self.status.as_str(),
                action,
            });
        }
        Ok(())
    }
}
