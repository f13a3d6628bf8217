//! Swap fee resolution and slippage adjustment

use num_rational::BigRational;
use num_traits::{One, Signed, Zero};

use crate::amount::rational_from_f64;
use crate::config::{pair_key, FeeConfig};
use crate::error::{EngineError, Result};
use crate::ratio::{Price, Slippage};

/// Direction and kind of the position being adjusted, as far as fee policy
/// is concerned
#[derive(Debug, Clone, Copy)]
pub struct FeeContext {
    pub is_increasing_risk: bool,
    /// Earn-type (correlated-asset) positions swap without a service fee
    pub is_earn_position: bool,
}

/// Resolves the applicable swap fee rate for a token pair and direction
///
/// Pure lookup over the fee tables; the exact table contents are
/// configuration, not part of the algorithm's correctness.
pub struct FeeResolver<'a> {
    config: &'a FeeConfig,
}

impl<'a> FeeResolver<'a> {
    pub fn new(config: &'a FeeConfig) -> Self {
        Self { config }
    }

    /// Fee rate in `[0, 1)` for a collateral/debt pair
    pub fn resolve(
        &self,
        collateral_symbol: &str,
        debt_symbol: &str,
        context: &FeeContext,
    ) -> Result<BigRational> {
        if context.is_earn_position {
            return Ok(BigRational::zero());
        }

        let key = pair_key(collateral_symbol, debt_symbol);
        let reversed = pair_key(debt_symbol, collateral_symbol);

        // The table is direction-agnostic: a no-fee pair stays free both ways
        if self.config.no_fee_pairs.contains(&key) || self.config.no_fee_pairs.contains(&reversed)
        {
            return Ok(BigRational::zero());
        }

        let raw = self
            .config
            .pair_overrides
            .get(&key)
            .or_else(|| self.config.pair_overrides.get(&reversed))
            .copied()
            .unwrap_or(self.config.default_rate);

        let rate = rational_from_f64(raw)?;
        if rate.is_negative() || rate >= BigRational::one() {
            return Err(EngineError::Config(config::ConfigError::Message(format!(
                "fee rate for {} must be in [0, 1), got {}",
                key, raw
            ))));
        }
        Ok(rate)
    }
}

/// Worst-case execution price after applying the slippage tolerance
///
/// Buying collateral with debt (increasing risk) pays more per unit in the
/// worst case; selling collateral for debt (decreasing risk) receives less.
pub fn apply_slippage(price: &Price, slippage: &Slippage, is_increasing_risk: bool) -> Price {
    let factor = if is_increasing_risk {
        BigRational::one() + slippage.as_rational()
    } else {
        BigRational::one() - slippage.as_rational()
    };
    Price::new_unchecked(price.as_rational() * factor)
}
