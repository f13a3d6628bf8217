//! Lending position value objects
//!
//! A `Position` is an immutable snapshot of protocol state: collateral, debt,
//! the protocol's oracle price, and the risk category enforced for the pair.
//! Derived metrics are exact rational arithmetic over base units; transitions
//! always produce a new value.

use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use serde::{Deserialize, Serialize};

use crate::amount::{Amount, Rounding};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::ratio::{Price, RiskRatio};
use crate::simulator::{AdjustmentParams, RiskAdjustmentSimulator};
use crate::types::{SimulatedTransition, TokenAmount};

/// Protocol-enforced risk limits for a collateral/debt pair
///
/// Sourced from a protocol-data provider, immutable for the duration of a
/// simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionCategory {
    /// Maximum loan-to-value the protocol allows for new borrows
    #[serde(with = "crate::amount::rational_serde")]
    pub max_loan_to_value: BigRational,

    /// Loan-to-value at which the position becomes liquidatable
    #[serde(with = "crate::amount::rational_serde")]
    pub liquidation_threshold: BigRational,

    /// Minimum non-zero debt the protocol allows, in debt-token base units
    pub dust_limit: Amount,
}

impl PositionCategory {
    pub fn new(
        max_loan_to_value: BigRational,
        liquidation_threshold: BigRational,
        dust_limit: Amount,
    ) -> Result<Self> {
        for (name, value) in [
            ("max loan-to-value", &max_loan_to_value),
            ("liquidation threshold", &liquidation_threshold),
        ] {
            if value.is_negative() || *value > BigRational::one() {
                return Err(EngineError::invalid_risk_ratio(format!(
                    "{} must be in [0, 1], got {}",
                    name, value
                )));
            }
        }
        if dust_limit.is_negative() {
            return Err(EngineError::invalid_amount("dust limit must be non-negative"));
        }
        Ok(Self {
            max_loan_to_value,
            liquidation_threshold,
            dust_limit,
        })
    }
}

/// Immutable collateral/debt position snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    debt: TokenAmount,
    collateral: TokenAmount,
    /// Debt-token value per unit of collateral token (protocol oracle, not a
    /// tradeable market price)
    oracle_price: Price,
    category: PositionCategory,
}

impl Position {
    pub fn new(
        collateral: TokenAmount,
        debt: TokenAmount,
        oracle_price: Price,
        category: PositionCategory,
    ) -> Result<Self> {
        if collateral.amount.is_negative() {
            return Err(EngineError::invalid_amount(format!(
                "collateral must be non-negative, got {}",
                collateral.amount
            )));
        }
        if debt.amount.is_negative() {
            return Err(EngineError::invalid_amount(format!(
                "debt must be non-negative, got {}",
                debt.amount
            )));
        }
        if category.dust_limit.decimals() != debt.amount.decimals() {
            return Err(EngineError::precision(format!(
                "dust limit scale ({}) does not match debt scale ({})",
                category.dust_limit.decimals(),
                debt.amount.decimals()
            )));
        }
        Ok(Self {
            debt,
            collateral,
            oracle_price,
            category,
        })
    }

    pub fn debt(&self) -> &TokenAmount {
        &self.debt
    }

    pub fn collateral(&self) -> &TokenAmount {
        &self.collateral
    }

    pub fn oracle_price(&self) -> &Price {
        &self.oracle_price
    }

    pub fn category(&self) -> &PositionCategory {
        &self.category
    }

    /// Collateral value in debt-token units at the oracle price
    pub fn collateral_value(&self) -> BigRational {
        self.collateral.amount.units() * self.oracle_price.as_rational()
    }

    /// Current loan-to-value; `None` when undefined (debt against zero
    /// collateral)
    pub fn loan_to_value(&self) -> Option<BigRational> {
        let value = self.collateral_value();
        if value.is_zero() {
            if self.debt.amount.is_zero() {
                Some(BigRational::zero())
            } else {
                None
            }
        } else {
            Some(self.debt.amount.units() / value)
        }
    }

    /// Distance to liquidation; `None` when there is no debt (infinite)
    pub fn health_factor(&self) -> Option<BigRational> {
        if self.debt.amount.is_zero() {
            return None;
        }
        Some(
            self.collateral_value() * &self.category.liquidation_threshold
                / self.debt.amount.units(),
        )
    }

    /// Oracle price at which the health factor reaches 1; `None` without
    /// collateral or a liquidation threshold
    pub fn liquidation_price(&self) -> Option<BigRational> {
        let divisor = self.collateral.amount.units() * &self.category.liquidation_threshold;
        if divisor.is_zero() {
            return None;
        }
        Some(self.debt.amount.units() / divisor)
    }

    /// Additional debt the protocol would allow at the current oracle price
    pub fn max_debt_to_borrow(&self) -> Amount {
        let headroom =
            self.collateral_value() * &self.category.max_loan_to_value - self.debt.amount.units();
        if headroom.is_negative() {
            return Amount::zero(self.debt.amount.decimals());
        }
        Amount::from_units(&headroom, self.debt.amount.decimals(), Rounding::Down)
    }

    /// Collateral withdrawable without pushing LTV past the protocol maximum
    pub fn max_collateral_to_withdraw(&self) -> Amount {
        if self.debt.amount.is_zero() {
            return self.collateral.amount.clone();
        }
        let limit = self.oracle_price.as_rational() * &self.category.max_loan_to_value;
        if limit.is_zero() {
            // Debt outstanding and nothing may be borrowed against the pair
            return Amount::zero(self.collateral.amount.decimals());
        }
        let required = self.debt.amount.units() / limit;
        let headroom = self.collateral.amount.units() - required;
        if headroom.is_negative() {
            return Amount::zero(self.collateral.amount.decimals());
        }
        Amount::from_units(&headroom, self.collateral.amount.decimals(), Rounding::Down)
    }

    /// Whether both sides of the position sit at or below the dust limit,
    /// i.e. the position counts as closed
    pub fn is_at_or_below_dust_limit(&self) -> bool {
        let dust = self.category.dust_limit.units();
        self.debt.amount.units() <= dust && self.collateral_value() <= dust
    }

    /// The lowest risk ratio reachable by selling collateral at the given
    /// worst-case price to repay debt down to the dust limit
    ///
    /// Callers use this to validate a requested target before building a
    /// transaction.
    pub fn min_configurable_risk_ratio(&self, worst_case_price: &Price) -> Result<RiskRatio> {
        let dust = self.category.dust_limit.units();
        let repayable = self.debt.amount.units() - &dust;
        if !repayable.is_positive() {
            return Ok(RiskRatio::zero());
        }

        let collateral_sold = &repayable / worst_case_price.as_rational();
        let remaining = self.collateral.amount.units() - collateral_sold;
        if !remaining.is_positive() {
            return Err(EngineError::unreachable(
                "collateral cannot cover repayment down to the dust limit at the quoted price",
            ));
        }

        let ltv = dust / (remaining * self.oracle_price.as_rational());
        if ltv >= BigRational::one() {
            return Err(EngineError::unreachable(
                "unwinding to the dust limit would leave the position above 100% LTV",
            ));
        }
        RiskRatio::from_ltv(ltv)
    }

    /// Simulate the transition to a target risk ratio
    ///
    /// Thin entry point over [`RiskAdjustmentSimulator::adjust`].
    pub fn adjust_to_target_risk_ratio(
        &self,
        target: &RiskRatio,
        params: &AdjustmentParams,
        config: &EngineConfig,
    ) -> Result<SimulatedTransition> {
        RiskAdjustmentSimulator::new(config).adjust(self, target, params)
    }

    /// New position with extra collateral
    pub fn deposit(&self, amount: &Amount) -> Result<Position> {
        if amount.is_negative() {
            return Err(EngineError::invalid_amount("deposit must be non-negative"));
        }
        let mut next = self.clone();
        next.collateral.amount = self.collateral.amount.checked_add(amount)?;
        Ok(next)
    }

    /// New position with collateral removed
    pub fn withdraw(&self, amount: &Amount) -> Result<Position> {
        if amount.is_negative() {
            return Err(EngineError::invalid_amount("withdrawal must be non-negative"));
        }
        let remaining = self.collateral.amount.checked_sub(amount)?;
        if remaining.is_negative() {
            return Err(EngineError::insufficient_liquidity(
                amount,
                &self.collateral.amount,
            ));
        }
        let mut next = self.clone();
        next.collateral.amount = remaining;
        Ok(next)
    }

    /// New position with extra debt
    pub fn borrow(&self, amount: &Amount) -> Result<Position> {
        if amount.is_negative() {
            return Err(EngineError::invalid_amount("borrow must be non-negative"));
        }
        let mut next = self.clone();
        next.debt.amount = self.debt.amount.checked_add(amount)?;
        Ok(next)
    }

    /// New position with debt repaid
    pub fn repay(&self, amount: &Amount) -> Result<Position> {
        if amount.is_negative() {
            return Err(EngineError::invalid_amount("repayment must be non-negative"));
        }
        let remaining = self.debt.amount.checked_sub(amount)?;
        if remaining.is_negative() {
            return Err(EngineError::insufficient_liquidity(amount, &self.debt.amount));
        }
        let mut next = self.clone();
        next.debt.amount = remaining;
        Ok(next)
    }

    /// Same position re-priced at a different oracle quote
    pub(crate) fn with_oracle_price(&self, oracle_price: Price) -> Position {
        let mut next = self.clone();
        next.oracle_price = oracle_price;
        next
    }
}
