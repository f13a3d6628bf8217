//! Risk-adjustment simulator - the core closed-form solve
//!
//! Given a position and a target risk ratio, finds the single swap that moves
//! the position onto the target, the borrow/repay and deposit/withdraw deltas
//! around it, and the flashloan that finances it. One linear equation per
//! direction; exact rational arithmetic throughout, rounded to base units
//! only at the edges.

use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use tracing::{debug, warn};

use crate::amount::{rational_from_f64, Amount, Rounding};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::position::Position;
use crate::ratio::{Price, RiskRatio, Slippage};
use crate::types::{
    FeeSource, PositionDelta, ProtocolKind, SimulatedTransition, SwapSummary, TokenAmount,
    TransitionFlags, Warning,
};

use super::fees::{apply_slippage, FeeContext, FeeResolver};
use super::flashloan::{FlashloanParams, FlashloanSizer};

/// Price snapshot for one adjustment
///
/// All three are quotes the caller fetched as one consistent snapshot; the
/// engine never fetches anything itself.
#[derive(Debug, Clone)]
pub struct Prices {
    /// Tradeable swap-execution price, debt per collateral
    pub market: Price,
    /// Protocol oracle price, debt per collateral
    pub oracle: Price,
    /// Debt-token value per unit of the flashloan token
    pub oracle_flashloan_to_debt: Price,
}

/// Fee rates charged by external facilities
#[derive(Debug, Clone)]
pub struct Fees {
    /// Flashloan provider premium, as a fraction
    pub flash_loan: f64,
}

impl Fees {
    /// Premium looked up from the engine's per-protocol table
    pub fn for_protocol(protocol: ProtocolKind, config: &EngineConfig) -> Self {
        Self {
            flash_loan: config.flashloan.fee_rate_for(protocol),
        }
    }
}

/// Capital the user adds alongside the adjustment, in base units
#[derive(Debug, Clone)]
pub struct Deposits {
    pub debt: Amount,
    pub collateral: Amount,
}

impl Deposits {
    /// No user capital
    pub fn none(debt_decimals: u32, collateral_decimals: u32) -> Self {
        Self {
            debt: Amount::zero(debt_decimals),
            collateral: Amount::zero(collateral_decimals),
        }
    }
}

/// Everything the simulator needs besides the position and the target
#[derive(Debug, Clone)]
pub struct AdjustmentParams {
    pub prices: Prices,
    pub fees: Fees,
    pub slippage: Slippage,
    pub flashloan: FlashloanParams,
    pub deposited_by_user: Deposits,
    pub collect_swap_fee_from: FeeSource,
    pub is_earn_position: bool,
    pub protocol: ProtocolKind,
}

/// Stateless simulator for risk adjustments
///
/// Pure function of its inputs: identical calls produce identical
/// transitions, and nothing is retained between calls.
pub struct RiskAdjustmentSimulator<'a> {
    config: &'a EngineConfig,
    fee_resolver: FeeResolver<'a>,
    flashloan_sizer: FlashloanSizer<'a>,
}

impl<'a> RiskAdjustmentSimulator<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            fee_resolver: FeeResolver::new(&config.fees),
            flashloan_sizer: FlashloanSizer::new(&config.flashloan),
            config,
        }
    }

    /// Simulate the transition that moves `position` onto `target`
    pub fn adjust(
        &self,
        position: &Position,
        target: &RiskRatio,
        params: &AdjustmentParams,
    ) -> Result<SimulatedTransition> {
        let deposits = &params.deposited_by_user;
        self.validate_deposits(position, deposits)?;

        let current_ltv = position.loan_to_value();
        // A position holding debt against no collateral can only wind down
        let is_increasing_risk = match &current_ltv {
            Some(ltv) => target.loan_to_value() > ltv,
            None => false,
        };

        debug!(
            protocol = params.protocol.as_str(),
            target_ltv = target.to_f64_lossy(),
            current_ltv = current_ltv.as_ref().and_then(ToPrimitive::to_f64),
            is_increasing_risk,
            "simulating risk adjustment"
        );

        let fee_context = FeeContext {
            is_increasing_risk,
            is_earn_position: params.is_earn_position,
        };
        let fee = self.fee_resolver.resolve(
            &position.collateral().symbol,
            &position.debt().symbol,
            &fee_context,
        )?;
        let market_worst = apply_slippage(&params.prices.market, &params.slippage, is_increasing_risk);

        let mut warnings = Vec::new();
        self.check_target_reachable(position, target, &market_worst, &mut warnings);

        let transition = if is_increasing_risk {
            self.increase(position, target, params, &fee, &market_worst, warnings)?
        } else {
            self.decrease(position, target, params, &fee, &market_worst, warnings)?
        };
        Ok(transition)
    }

    fn validate_deposits(&self, position: &Position, deposits: &Deposits) -> Result<()> {
        if deposits.debt.is_negative() || deposits.collateral.is_negative() {
            return Err(EngineError::invalid_amount(
                "user deposits must be non-negative",
            ));
        }
        if deposits.debt.decimals() != position.debt().amount.decimals() {
            return Err(EngineError::precision(
                "debt deposit scale does not match the position's debt token",
            ));
        }
        if deposits.collateral.decimals() != position.collateral().amount.decimals() {
            return Err(EngineError::precision(
                "collateral deposit scale does not match the position's collateral token",
            ));
        }
        Ok(())
    }

    /// Attach a warning when the requested target cannot be reached from this
    /// position at the quoted worst-case price
    fn check_target_reachable(
        &self,
        position: &Position,
        target: &RiskRatio,
        market_worst: &Price,
        warnings: &mut Vec<Warning>,
    ) {
        let max = &position.category().max_loan_to_value;
        let min = match position.min_configurable_risk_ratio(market_worst) {
            Ok(min) => min.loan_to_value().clone(),
            // Envelope undefined (position cannot unwind at this price);
            // leave validation to the direction solve
            Err(_) => BigRational::zero(),
        };

        if target.loan_to_value() < &min || target.loan_to_value() > max {
            warn!(
                target_ltv = target.to_f64_lossy(),
                "target risk ratio outside the reachable range"
            );
            warnings.push(Warning::TargetOutsideReachableRange {
                target: target.loan_to_value().clone(),
                min,
                max: max.clone(),
            });
        }
    }

    fn increase(
        &self,
        position: &Position,
        target: &RiskRatio,
        params: &AdjustmentParams,
        fee: &BigRational,
        market_worst: &Price,
        mut warnings: Vec<Warning>,
    ) -> Result<SimulatedTransition> {
        let one = BigRational::one();
        let l = target.loan_to_value();
        let o = params.prices.oracle.as_rational();
        let m_nominal = params.prices.market.as_rational();
        let m_worst = market_worst.as_rational();

        let c0 = position.collateral().amount.units();
        let d0 = position.debt().amount.units();
        let u_c = params.deposited_by_user.collateral.units();
        let u_d = params.deposited_by_user.debt.units();

        // newDebt(X) = L * o * newCollateral(X), with the post-fee swap
        // proceeds priced at the worst-case market price so the target is
        // guaranteed even at worst execution
        let denominator = &one - l * o * (&one - fee) / m_worst;
        if !denominator.is_positive() {
            return Err(EngineError::unreachable(format!(
                "target multiple {:.2}x is not financeable at the worst-case market price",
                target.multiple().to_f64().unwrap_or(f64::NAN)
            )));
        }
        let numerator = l * o * (&c0 + &u_c) - &d0 + &u_d;
        let x = if numerator.is_negative() {
            BigRational::zero()
        } else {
            numerator / denominator
        };

        let debt_decimals = position.debt().amount.decimals();
        let collateral_decimals = position.collateral().amount.decimals();
        let debt_symbol = position.debt().symbol.clone();
        let collateral_symbol = position.collateral().symbol.clone();

        // Expected proceeds price at the nominal quote, the on-chain guard at
        // the worst case; both are part of the output
        let net_of_fee = &x * (&one - fee);
        let gain_expected = &net_of_fee / m_nominal;
        let gain_min = &net_of_fee / m_worst;

        let to_token_amount =
            Amount::from_units(&gain_expected, collateral_decimals, Rounding::Down);
        let min_to_token_amount = Amount::from_units(&gain_min, collateral_decimals, Rounding::Down);

        // New protocol borrow; a user deposit overshooting the whole swap
        // makes this a pure deposit flow
        let borrow_units = &x - &u_d;
        let borrow = if borrow_units.is_negative() {
            Amount::zero(debt_decimals)
        } else {
            Amount::from_units(&borrow_units, debt_decimals, Rounding::Up)
        };

        let swap = self.swap_summary(
            &x,
            &net_of_fee,
            fee,
            m_nominal,
            params.collect_swap_fee_from,
            to_token_amount.clone(),
            min_to_token_amount,
            debt_decimals,
            collateral_decimals,
            &debt_symbol,
            &collateral_symbol,
            true,
        )?;

        // Flashloan pre-funds the whole swap input
        let requires_flashloan = FlashloanSizer::is_required(&x, &u_d);
        let flashloan_amount = if requires_flashloan {
            let post_value = (&c0 + &u_c + &gain_expected) * o;
            let sizing = self.flashloan_sizer.size(
                &x,
                &rational_from_f64(params.fees.flash_loan)?,
                &params.prices.oracle_flashloan_to_debt,
                &params.flashloan,
                &post_value,
            )?;
            if let Some(warning) = sizing.warning {
                warnings.push(warning);
            }
            sizing.amount
        } else {
            Amount::zero(params.flashloan.token_decimals)
        };

        let next = position
            .with_oracle_price(params.prices.oracle.clone())
            .deposit(&params.deposited_by_user.collateral)?
            .deposit(&to_token_amount)?
            .borrow(&borrow)?;

        let delta_collateral = params
            .deposited_by_user
            .collateral
            .checked_add(&to_token_amount)?;

        Ok(SimulatedTransition {
            delta: PositionDelta {
                debt: borrow,
                collateral: delta_collateral,
                flashloan_amount,
            },
            flags: TransitionFlags {
                is_increasing_risk: true,
                requires_flashloan,
            },
            swap,
            position: next,
            warnings,
        })
    }

    fn decrease(
        &self,
        position: &Position,
        target: &RiskRatio,
        params: &AdjustmentParams,
        fee: &BigRational,
        market_worst: &Price,
        mut warnings: Vec<Warning>,
    ) -> Result<SimulatedTransition> {
        let one = BigRational::one();
        let l = target.loan_to_value();
        let o = params.prices.oracle.as_rational();
        let m_nominal = params.prices.market.as_rational();
        let m_worst = market_worst.as_rational();

        let c0 = position.collateral().amount.units();
        let d0 = position.debt().amount.units();
        let u_c = params.deposited_by_user.collateral.units();
        let u_d = params.deposited_by_user.debt.units();

        // newDebt(Y) = L * o * newCollateral(Y); Y is the collateral sold
        let denominator = m_worst * (&one - fee) - l * o;
        if !denominator.is_positive() {
            return Err(EngineError::unreachable(format!(
                "target {} cannot be reached by selling collateral at the worst-case market price",
                target
            )));
        }
        let numerator = &d0 - &u_d - l * o * (&c0 + &u_c);
        let y = if numerator.is_negative() {
            // Already at or below target once the deposits land
            BigRational::zero()
        } else {
            numerator / denominator
        };

        let available = &c0 + &u_c;
        if y > available {
            return Err(EngineError::unreachable(format!(
                "reaching {} requires selling {} collateral units but only {} are available",
                target,
                y.to_f64().unwrap_or(f64::NAN),
                available.to_f64().unwrap_or(f64::NAN)
            )));
        }

        let debt_decimals = position.debt().amount.decimals();
        let collateral_decimals = position.collateral().amount.decimals();
        let debt_symbol = position.debt().symbol.clone();
        let collateral_symbol = position.collateral().symbol.clone();

        // Sold collateral rounds up so the swap is never under-funded
        let sold = Amount::from_units(&y, collateral_decimals, Rounding::Up);

        let net_of_fee = &y * (&one - fee);
        let proceeds_expected = &net_of_fee * m_nominal;
        let proceeds_min = &net_of_fee * m_worst;

        let to_token_amount = Amount::from_units(&proceeds_expected, debt_decimals, Rounding::Down);
        let min_to_token_amount = Amount::from_units(&proceeds_min, debt_decimals, Rounding::Down);

        let swap = self.swap_summary(
            &y,
            &net_of_fee,
            fee,
            m_nominal,
            params.collect_swap_fee_from,
            to_token_amount.clone(),
            min_to_token_amount,
            collateral_decimals,
            debt_decimals,
            &collateral_symbol,
            &debt_symbol,
            false,
        )?;

        // Expected proceeds beyond the outstanding debt are returned to the
        // holder, not applied
        let outstanding = position
            .debt()
            .amount
            .checked_sub(&params.deposited_by_user.debt)?;
        let repay_from_swap = if outstanding.is_negative() {
            Amount::zero(debt_decimals)
        } else if to_token_amount.units() > outstanding.units() {
            outstanding.clone()
        } else {
            to_token_amount.clone()
        };

        // The repayment must be in hand before the protocol releases the
        // collateral being sold
        let requires_flashloan = repay_from_swap.is_positive();
        let flashloan_amount = if requires_flashloan {
            let post_value = (&available - &y) * o;
            let sizing = self.flashloan_sizer.size(
                &repay_from_swap.units(),
                &rational_from_f64(params.fees.flash_loan)?,
                &params.prices.oracle_flashloan_to_debt,
                &params.flashloan,
                &post_value,
            )?;
            if let Some(warning) = sizing.warning {
                warnings.push(warning);
            }
            sizing.amount
        } else {
            Amount::zero(params.flashloan.token_decimals)
        };

        let user_repay = if outstanding.is_negative() {
            // Deposit alone overpays the debt; repay it in full
            position.debt().amount.clone()
        } else {
            params.deposited_by_user.debt.clone()
        };

        let next = position
            .with_oracle_price(params.prices.oracle.clone())
            .deposit(&params.deposited_by_user.collateral)?
            .withdraw(&sold)?
            .repay(&user_repay)?
            .repay(&repay_from_swap)?;

        let delta_collateral = params.deposited_by_user.collateral.checked_sub(&sold)?;
        let delta_debt = user_repay.checked_add(&repay_from_swap)?.neg();

        Ok(SimulatedTransition {
            delta: PositionDelta {
                debt: delta_debt,
                collateral: delta_collateral,
                flashloan_amount,
            },
            flags: TransitionFlags {
                is_increasing_risk: false,
                requires_flashloan,
            },
            swap,
            position: next,
            warnings,
        })
    }

    /// Assemble the swap leg: amounts entering and leaving the swap, and the
    /// fee reported in the token it is deducted from
    #[allow(clippy::too_many_arguments)]
    fn swap_summary(
        &self,
        gross_input: &BigRational,
        net_input: &BigRational,
        fee: &BigRational,
        m_nominal: &BigRational,
        collect_fee_from: FeeSource,
        to_token_amount: Amount,
        min_to_token_amount: Amount,
        source_decimals: u32,
        target_decimals: u32,
        source_symbol: &str,
        target_symbol: &str,
        is_increasing_risk: bool,
    ) -> Result<SwapSummary> {
        let inflator = rational_from_f64(self.config.fees.fee_estimate_inflator)?;

        let (from_units, fee_units, fee_symbol, fee_decimals) = match collect_fee_from {
            // Fee deducted before the swap, in the source token
            FeeSource::SourceToken => (
                net_input.clone(),
                gross_input * fee * &inflator,
                source_symbol,
                source_decimals,
            ),
            // Fee deducted from the proceeds, in the target token
            FeeSource::TargetToken => {
                let raw_proceeds = if is_increasing_risk {
                    gross_input / m_nominal
                } else {
                    gross_input * m_nominal
                };
                (
                    gross_input.clone(),
                    raw_proceeds * fee * &inflator,
                    target_symbol,
                    target_decimals,
                )
            }
        };

        Ok(SwapSummary {
            from_token_amount: TokenAmount::new(
                Amount::from_units(&from_units, source_decimals, Rounding::Up),
                source_symbol,
            ),
            to_token_amount: TokenAmount::new(to_token_amount, target_symbol),
            min_to_token_amount: TokenAmount::new(min_to_token_amount, target_symbol),
            token_fee: TokenAmount::new(
                Amount::from_units(&fee_units, fee_decimals, Rounding::Up),
                fee_symbol,
            ),
            collect_fee_from,
        })
    }
}
