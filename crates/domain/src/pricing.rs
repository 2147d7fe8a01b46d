//! Checkout price computation.
//!
//! The order is: base amount, minus the promo discount (clamped to the
//! base), plus the service commission computed on the discounted base.

use serde::{Deserialize, Serialize};

use crate::catalog::Discount;
use crate::money::Money;

/// Service commission charged on top of the ticket price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommissionPolicy {
    /// Proportional part, in basis points (600 = 6%).
    pub rate_bps: u32,
    /// Flat part added per paid order.
    pub fixed: Money,
}

impl CommissionPolicy {
    /// No commission.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(rate_bps: u32, fixed: Money) -> Self {
        Self { rate_bps, fixed }
    }

    /// Commission owed on `base`. Free orders stay free.
    pub fn commission_on(&self, base: Money) -> Money {
        if !base.is_positive() {
            return Money::zero();
        }
        base.percent_bps(self.rate_bps) + self.fixed
    }
}

/// Breakdown of what the buyer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub base: Money,
    pub discount: Money,
    pub commission: Money,
    pub total: Money,
}

impl PriceBreakdown {
    /// Computes the breakdown for a base amount and an optional discount.
    pub fn compute(
        base: Money,
        discount: Option<&Discount>,
        commission: &CommissionPolicy,
    ) -> Self {
        let base = base.max(Money::zero());
        let discount = discount
            .map(|d| d.amount_off(base))
            .unwrap_or_else(Money::zero);
        let discounted = base.saturating_sub(discount);
        let commission = commission.commission_on(discounted);

        Self {
            base,
            discount,
            commission,
            total: discounted + commission,
        }
    }

    /// Base after the discount, before commission.
    pub fn discounted_base(&self) -> Money {
        self.base.saturating_sub(self.discount)
    }

    /// True when nothing has to be charged through the gateway.
    pub fn is_free(&self) -> bool {
        self.total.is_zero()
    }
}
