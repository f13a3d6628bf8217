//! Flashloan requirement and sizing
//!
//! A flashloan pre-funds the swap leg whenever the protocol will only
//! recognize the resulting deposit/borrow after the fact. Sizing carries the
//! provider premium plus a safety margin, and is capped by what the flashloan
//! provider allows against the post-adjustment collateral.

use num_rational::BigRational;
use num_traits::{One, Signed};
use tracing::warn;

use crate::amount::{rational_from_f64, Amount, Rounding};
use crate::config::FlashloanConfig;
use crate::error::{EngineError, Result};
use crate::ratio::Price;
use crate::types::Warning;

/// Flashloan facility terms supplied by the protocol-data provider
#[derive(Debug, Clone)]
pub struct FlashloanParams {
    /// Maximum loan-to-value the flashloan provider accepts against the
    /// position's collateral
    pub max_loan_to_value_fl: BigRational,
    pub token_symbol: String,
    pub token_decimals: u32,
}

impl FlashloanParams {
    pub fn new(
        max_loan_to_value_fl: BigRational,
        token_symbol: impl Into<String>,
        token_decimals: u32,
    ) -> Result<Self> {
        if max_loan_to_value_fl.is_negative() || max_loan_to_value_fl > BigRational::one() {
            return Err(EngineError::invalid_risk_ratio(format!(
                "flashloan max loan-to-value must be in [0, 1], got {}",
                max_loan_to_value_fl
            )));
        }
        Ok(Self {
            max_loan_to_value_fl,
            token_symbol: token_symbol.into(),
            token_decimals,
        })
    }
}

/// Sizing outcome: the amount to flash-borrow and the cap warning, if any
#[derive(Debug, Clone)]
pub struct FlashloanSizing {
    pub amount: Amount,
    pub warning: Option<Warning>,
}

/// Computes flashloan sizes for the simulator
pub struct FlashloanSizer<'a> {
    config: &'a FlashloanConfig,
}

impl<'a> FlashloanSizer<'a> {
    pub fn new(config: &'a FlashloanConfig) -> Self {
        Self { config }
    }

    /// Whether the swap leg must be pre-funded beyond the holder's own capital
    pub fn is_required(pre_fund_needed: &BigRational, user_funded: &BigRational) -> bool {
        pre_fund_needed > user_funded
    }

    /// Size the flashloan for a debt-denominated funding need
    ///
    /// The gross amount carries the provider premium and the safety margin,
    /// converted into flashloan-token units via `oracle_flashloan_to_debt`
    /// (debt-token value per flashloan token). If the result exceeds what the
    /// provider allows against the post-adjustment collateral it is capped
    /// and the cap is reported as a warning rather than a failure.
    pub fn size(
        &self,
        debt_denominated_need: &BigRational,
        flash_loan_fee: &BigRational,
        oracle_flashloan_to_debt: &Price,
        params: &FlashloanParams,
        post_adjustment_collateral_value: &BigRational,
    ) -> Result<FlashloanSizing> {
        let margin = rational_from_f64(self.config.safety_margin)?;
        let gross = debt_denominated_need
            * (BigRational::one() + flash_loan_fee + margin)
            / oracle_flashloan_to_debt.as_rational();

        let ceiling = &params.max_loan_to_value_fl * post_adjustment_collateral_value
            / oracle_flashloan_to_debt.as_rational();

        if gross > ceiling {
            let requested = Amount::from_units(&gross, params.token_decimals, Rounding::Up);
            let capped = Amount::from_units(&ceiling, params.token_decimals, Rounding::Down);
            warn!(
                requested = %requested,
                capped = %capped,
                token = %params.token_symbol,
                "flashloan size capped by provider max LTV"
            );
            return Ok(FlashloanSizing {
                amount: capped.clone(),
                warning: Some(Warning::FlashloanCapped { requested, capped }),
            });
        }

        Ok(FlashloanSizing {
            amount: Amount::from_units(&gross, params.token_decimals, Rounding::Up),
            warning: None,
        })
    }
}
