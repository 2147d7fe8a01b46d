//! Catalog records the checkout core reads: events, venue seating, ticket
//! types and promotional codes.

use chrono::{DateTime, Utc};
use common::{EventId, PromoCodeId, SeatId, SectionId, TicketTypeId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::DomainError;
use crate::money::{Currency, Money};

/// A ticketed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    /// Unpublished events cannot be purchased.
    pub is_published: bool,
    pub currency: Currency,
}

/// A priced area of the venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub event_id: EventId,
    pub name: String,
    /// Default price of every seat in the section.
    pub price: Money,
}

/// Persisted sale status of a seat.
///
/// This is a projection written at payment commit time. Temporary holds live
/// in the seat-lock store, never here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    #[default]
    Available,
    Sold,
    /// Withheld by the organizer (production, press, broken seat).
    Blocked,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Available => "AVAILABLE",
            SeatStatus::Sold => "SOLD",
            SeatStatus::Blocked => "BLOCKED",
        }
    }
}

impl std::fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SeatStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(SeatStatus::Available),
            "SOLD" => Ok(SeatStatus::Sold),
            "BLOCKED" => Ok(SeatStatus::Blocked),
            other => Err(format!("unknown seat status: {other}")),
        }
    }
}

/// A seat on an event's venue map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub id: SeatId,
    pub event_id: EventId,
    pub section_id: SectionId,
    /// Human-readable position, e.g. `"Row A, Seat 12"`.
    pub label: String,
    /// Overrides the section price when set.
    pub price: Option<Money>,
    pub status: SeatStatus,
}

impl Seat {
    /// Returns true if the seat can still be sold.
    pub fn is_available(&self) -> bool {
        self.status == SeatStatus::Available
    }

    /// Returns the seat's own price, falling back to its section's.
    pub fn effective_price(&self, section: &Section) -> Money {
        self.price.unwrap_or(section.price)
    }
}

/// A non-seated ticket category (general admission, early bird, 2x1 pack).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketType {
    pub id: TicketTypeId,
    pub event_id: EventId,
    pub name: String,
    /// Price of one purchasable unit.
    pub price: Money,
    /// Purchasable units on sale.
    pub capacity: u32,
    /// Tickets generated per purchased unit; a "2x1" pack generates 2.
    pub tickets_generated: u32,
    /// Units sold so far.
    pub sold_units: u32,
}

impl TicketType {
    /// Units still on sale.
    pub fn remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.sold_units)
    }

    /// Number of tickets `units` purchased units expand into.
    pub fn tickets_for(&self, units: u32) -> Result<u32, DomainError> {
        units
            .checked_mul(self.tickets_generated.max(1))
            .ok_or(DomainError::QuantityOverflow {
                what: "ticket count",
                quantity: units,
            })
    }
}

/// How a promo code reduces the price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Discount {
    /// A flat amount off.
    Fixed(Money),
    /// A percentage off, 0 to 100.
    Percentage(u8),
}

impl Discount {
    /// Amount taken off `base`, never more than `base` itself.
    pub fn amount_off(&self, base: Money) -> Money {
        let off = match self {
            Discount::Fixed(amount) => *amount,
            Discount::Percentage(percent) => base.percent_bps(u32::from((*percent).min(100)) * 100),
        };
        off.max(Money::zero()).min(base)
    }
}

/// Why a promo code was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PromoRejection {
    #[error("promo code is not active")]
    Inactive,
    #[error("promo code is not valid yet")]
    NotYetValid,
    #[error("promo code has expired")]
    Expired,
    #[error("promo code has reached its usage limit")]
    Exhausted,
}

/// A promotional code scoped to one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoCode {
    pub id: PromoCodeId,
    pub event_id: EventId,
    pub code: String,
    pub discount: Discount,
    /// `None` means unlimited.
    pub max_uses: Option<u32>,
    pub used_count: u32,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl PromoCode {
    /// Codes are matched case-insensitively.
    pub fn matches(&self, code: &str) -> bool {
        self.code.eq_ignore_ascii_case(code.trim())
    }

    /// Checks that the code may be redeemed at `now`.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), PromoRejection> {
        if !self.is_active {
            return Err(PromoRejection::Inactive);
        }
        if let Some(from) = self.valid_from
            && now < from
        {
            return Err(PromoRejection::NotYetValid);
        }
        if let Some(until) = self.valid_until
            && now > until
        {
            return Err(PromoRejection::Expired);
        }
        if let Some(max) = self.max_uses
            && self.used_count >= max
        {
            return Err(PromoRejection::Exhausted);
        }
        Ok(())
    }
}
