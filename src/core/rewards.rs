//! SwagBucks earning and redemption policy.
//!
//! Earn amounts are computed in integer arithmetic: the subtotal is taken in cents and
//! the rate in basis points, so `floor(subtotal * rate)` never drifts upward through
//! floating-point error. 1 SwagBuck is worth 1 CAD.

use crate::{
    config::RewardsConfig,
    errors::{Error, Result},
};

const BASIS_POINTS: i128 = 10_000;
const CENTS: i128 = 100;

/// Earning and redemption rules applied by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardPolicy {
    earning_rate_bps: i64,
    max_earn_per_order: i64,
    minimum_redemption: i64,
}

impl RewardPolicy {
    /// Builds the policy from configuration; the rate is rounded to whole basis points.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_config(config: &RewardsConfig) -> Self {
        Self {
            earning_rate_bps: (config.earning_rate * 10_000.0).round() as i64,
            max_earn_per_order: config.max_earn_per_order.max(0),
            minimum_redemption: config.minimum_redemption,
        }
    }

    /// Earning rate in basis points (1000 = 10%).
    #[must_use]
    pub const fn earning_rate_bps(&self) -> i64 {
        self.earning_rate_bps
    }

    /// Cap applied to every single order.
    #[must_use]
    pub const fn max_earn_per_order(&self) -> i64 {
        self.max_earn_per_order
    }

    /// Smallest accepted redemption.
    #[must_use]
    pub const fn minimum_redemption(&self) -> i64 {
        self.minimum_redemption
    }

    /// SwagBucks earned for an order subtotal: `floor(subtotal * rate)`, capped per order.
    ///
    /// # Errors
    /// `InvalidAmount` for negative or non-finite subtotals.
    #[allow(clippy::cast_possible_truncation)]
    pub fn earn_amount(&self, order_subtotal: f64) -> Result<i64> {
        if !order_subtotal.is_finite() || order_subtotal < 0.0 {
            return Err(Error::InvalidAmount {
                amount: order_subtotal,
            });
        }

        // `as` saturates huge subtotals at i128::MAX; a product past that is over any cap
        let cents = (order_subtotal * 100.0).round() as i128;
        let cap = i128::from(self.max_earn_per_order);
        let earned = cents
            .checked_mul(i128::from(self.earning_rate_bps))
            .map_or(cap, |scaled| scaled / (CENTS * BASIS_POINTS));
        Ok(i64::try_from(earned.clamp(0, cap)).unwrap_or(self.max_earn_per_order))
    }

    /// Checks a redemption request against the minimum.
    ///
    /// # Errors
    /// `InvalidAmount` for non-positive amounts, `BelowMinimum` under the minimum.
    #[allow(clippy::cast_precision_loss)]
    pub fn check_redemption(&self, amount: i64) -> Result<()> {
        if amount <= 0 {
            return Err(Error::InvalidAmount {
                amount: amount as f64,
            });
        }
        if amount < self.minimum_redemption {
            return Err(Error::BelowMinimum {
                amount,
                minimum: self.minimum_redemption,
            });
        }
        Ok(())
    }
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self::from_config(&RewardsConfig::default())
    }
}

/// Formats a SwagBucks amount as its CAD value, e.g. `$52.00 CAD`.
#[must_use]
pub fn format_swagbucks(amount: i64) -> String {
    if amount < 0 {
        format!("-${}.00 CAD", amount.unsigned_abs())
    } else {
        format!("${amount}.00 CAD")
    }
}
