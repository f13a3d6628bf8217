//! Scenario-driven tests for the risk-adjustment simulator
//!
//! Each scenario builds full inputs inline and asserts on the shape of the
//! resulting transition, the way the strategy layers consume it.

use multiply_core::{
    parse_decimal, AdjustmentParams, Amount, Deposits, EngineConfig, EngineError, FeeSource, Fees,
    FlashloanParams, Position, PositionCategory, Price, ProtocolKind, RiskRatio,
    RiskAdjustmentSimulator, Slippage, TokenAmount, Warning,
};
use num_bigint::BigInt;
use num_traits::ToPrimitive;

fn units(n: i64, decimals: u32) -> Amount {
    Amount::from_base(BigInt::from(n) * BigInt::from(10u32).pow(decimals), decimals)
}

fn category(max_ltv: &str, threshold: &str, debt_decimals: u32) -> PositionCategory {
    PositionCategory::new(
        parse_decimal(max_ltv).unwrap(),
        parse_decimal(threshold).unwrap(),
        Amount::zero(debt_decimals),
    )
    .unwrap()
}

fn steth_eth_position(debt_eth: i64, collateral_steth: i64, oracle: &str) -> Position {
    Position::new(
        TokenAmount::new(units(collateral_steth, 18), "STETH"),
        TokenAmount::new(units(debt_eth, 18), "ETH"),
        Price::parse(oracle).unwrap(),
        category("0.8", "0.85", 18),
    )
    .unwrap()
}

fn eth_flashloan(max_ltv_fl: &str) -> FlashloanParams {
    FlashloanParams::new(parse_decimal(max_ltv_fl).unwrap(), "ETH", 18).unwrap()
}

fn open_two_x_params() -> AdjustmentParams {
    AdjustmentParams {
        prices: multiply_core::Prices {
            market: Price::parse("0.979").unwrap(),
            oracle: Price::parse("1").unwrap(),
            oracle_flashloan_to_debt: Price::identity(),
        },
        fees: Fees { flash_loan: 0.0 },
        slippage: Slippage::parse("0.001").unwrap(),
        flashloan: eth_flashloan("0.9"),
        deposited_by_user: Deposits {
            debt: units(1, 18),
            collateral: Amount::zero(18),
        },
        collect_swap_fee_from: FeeSource::SourceToken,
        is_earn_position: false,
        protocol: ProtocolKind::AaveV3,
    }
}

#[test]
fn opening_an_empty_position_to_two_x_takes_a_flashloan() {
    let config = EngineConfig::default();
    let position = steth_eth_position(0, 0, "1");
    let target = RiskRatio::from_multiple(parse_decimal("2").unwrap()).unwrap();

    let result = RiskAdjustmentSimulator::new(&config)
        .adjust(&position, &target, &open_two_x_params())
        .unwrap();

    assert!(result.flags.is_increasing_risk);
    assert!(result.flags.requires_flashloan);

    // STETH/ETH is a configured no-fee pair, so nothing is skimmed
    assert!(result.swap.token_fee.amount.is_zero());

    // The 2x target lands within the slippage tolerance
    let ltv = result.position.loan_to_value().unwrap().to_f64().unwrap();
    assert!((ltv - 0.5).abs() < 1e-3, "ltv was {}", ltv);

    // Swap input exceeds the 1 ETH deposit - that gap is the flashloan's job
    let swapped = result.swap.from_token_amount.amount.units();
    assert!(swapped > parse_decimal("2").unwrap());
    assert!(result.delta.flashloan_amount.units() >= swapped);

    // Guard amount is the pessimistic one
    assert!(
        result.swap.min_to_token_amount.amount.units()
            < result.swap.to_token_amount.amount.units()
    );
    assert!(result.warnings.is_empty());
}

#[test]
fn simulator_is_idempotent() {
    let config = EngineConfig::default();
    let position = steth_eth_position(0, 0, "1");
    let target = RiskRatio::from_multiple(parse_decimal("2").unwrap()).unwrap();
    let simulator = RiskAdjustmentSimulator::new(&config);

    let first = simulator
        .adjust(&position, &target, &open_two_x_params())
        .unwrap();
    let second = simulator
        .adjust(&position, &target, &open_two_x_params())
        .unwrap();
    assert_eq!(first, second);
}

#[test]
fn deleveraging_sells_collateral_and_repays() {
    let config = EngineConfig::default();
    // 100 WETH against 150k USDC at 3000: LTV 0.5
    let position = Position::new(
        TokenAmount::new(units(100, 18), "WETH"),
        TokenAmount::new(units(150_000, 6), "USDC"),
        Price::parse("3000").unwrap(),
        category("0.8", "0.85", 6),
    )
    .unwrap();
    let target = RiskRatio::from_ltv(parse_decimal("0.25").unwrap()).unwrap();

    let params = AdjustmentParams {
        prices: multiply_core::Prices {
            market: Price::parse("3010").unwrap(),
            oracle: Price::parse("3000").unwrap(),
            oracle_flashloan_to_debt: Price::identity(),
        },
        fees: Fees::for_protocol(ProtocolKind::AaveV3, &config),
        slippage: Slippage::parse("0.005").unwrap(),
        flashloan: FlashloanParams::new(parse_decimal("0.9").unwrap(), "USDC", 6).unwrap(),
        deposited_by_user: Deposits::none(6, 18),
        collect_swap_fee_from: FeeSource::TargetToken,
        is_earn_position: false,
        protocol: ProtocolKind::AaveV3,
    };

    let result = RiskAdjustmentSimulator::new(&config)
        .adjust(&position, &target, &params)
        .unwrap();

    assert!(!result.flags.is_increasing_risk);
    assert!(result.flags.requires_flashloan);

    // Collateral shrinks, debt shrinks
    assert!(result.delta.collateral.is_negative());
    assert!(result.delta.debt.is_negative());

    // WETH/USDC pays the default fee, reported in the target (debt) token
    assert_eq!(result.swap.token_fee.symbol, "USDC");
    assert!(result.swap.token_fee.amount.is_positive());

    // Expected execution overshoots the worst-case solve, so the simulated
    // LTV sits at or just under the target
    let ltv = result.position.loan_to_value().unwrap().to_f64().unwrap();
    assert!(ltv <= 0.25 + 1e-12, "ltv was {}", ltv);
    assert!(ltv > 0.24, "ltv was {}", ltv);

    // Conservation: deltas applied to the input reproduce the result
    let collateral = position
        .collateral()
        .amount
        .checked_add(&result.delta.collateral)
        .unwrap();
    let debt = position.debt().amount.checked_add(&result.delta.debt).unwrap();
    assert_eq!(collateral, result.position.collateral().amount);
    assert_eq!(debt, result.position.debt().amount);
}

#[test]
fn repaying_from_deposit_alone_needs_no_flashloan() {
    let config = EngineConfig::default();
    // LTV 0.5; a 20 ETH repayment brings it to exactly 0.3
    let position = steth_eth_position(50, 200, "0.5");
    let target = RiskRatio::from_ltv(parse_decimal("0.3").unwrap()).unwrap();

    let params = AdjustmentParams {
        prices: multiply_core::Prices {
            market: Price::parse("0.5").unwrap(),
            oracle: Price::parse("0.5").unwrap(),
            oracle_flashloan_to_debt: Price::identity(),
        },
        fees: Fees { flash_loan: 0.0 },
        slippage: Slippage::parse("0.001").unwrap(),
        flashloan: eth_flashloan("0.9"),
        deposited_by_user: Deposits {
            debt: units(20, 18),
            collateral: Amount::zero(18),
        },
        collect_swap_fee_from: FeeSource::SourceToken,
        is_earn_position: false,
        protocol: ProtocolKind::Spark,
    };

    let result = RiskAdjustmentSimulator::new(&config)
        .adjust(&position, &target, &params)
        .unwrap();

    assert!(!result.flags.is_increasing_risk);
    assert!(!result.flags.requires_flashloan);
    assert!(result.delta.flashloan_amount.is_zero());
    assert!(result.swap.from_token_amount.amount.is_zero());
    assert_eq!(result.delta.debt, units(20, 18).neg());
    assert_eq!(result.delta.collateral, Amount::zero(18));

    // No swap means no slippage: the target is hit exactly
    assert_eq!(
        result.position.loan_to_value().unwrap(),
        parse_decimal("0.3").unwrap()
    );
}

#[test]
fn target_beyond_protocol_max_ltv_is_a_warning_not_an_error() {
    let config = EngineConfig::default();
    let position = steth_eth_position(0, 0, "1");
    // 0.9 LTV against a 0.8 max
    let target = RiskRatio::from_ltv(parse_decimal("0.9").unwrap()).unwrap();

    let result = RiskAdjustmentSimulator::new(&config)
        .adjust(&position, &target, &open_two_x_params())
        .unwrap();

    assert!(result
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::TargetOutsideReachableRange { .. })));
    // Best-effort transition is still produced
    assert!(result.flags.is_increasing_risk);
    assert!(result.position.loan_to_value().is_some());
}

#[test]
fn unfinanceable_target_is_a_hard_error() {
    let config = EngineConfig::default();
    let position = steth_eth_position(0, 0, "1.2");

    // Oracle values collateral far above the market: levering up at 0.9 LTV
    // would need to buy collateral worth more than the debt it mints
    let mut params = open_two_x_params();
    params.prices = multiply_core::Prices {
        market: Price::parse("1").unwrap(),
        oracle: Price::parse("1.2").unwrap(),
        oracle_flashloan_to_debt: Price::identity(),
    };
    let target = RiskRatio::from_ltv(parse_decimal("0.9").unwrap()).unwrap();

    let result = RiskAdjustmentSimulator::new(&config).adjust(&position, &target, &params);
    assert!(matches!(
        result,
        Err(EngineError::UnreachableRiskRatio { .. })
    ));
}

#[test]
fn flashloan_capped_by_provider_max_ltv() {
    let config = EngineConfig::default();
    let position = steth_eth_position(0, 0, "1");
    let target = RiskRatio::from_multiple(parse_decimal("2").unwrap()).unwrap();

    let mut params = open_two_x_params();
    // Provider barely lends against the collateral
    params.flashloan = eth_flashloan("0.1");

    let result = RiskAdjustmentSimulator::new(&config)
        .adjust(&position, &target, &params)
        .unwrap();

    let warning = result
        .warnings
        .iter()
        .find(|w| matches!(w, Warning::FlashloanCapped { .. }))
        .expect("expected a FlashloanCapped warning");
    match warning {
        Warning::FlashloanCapped { requested, capped } => {
            assert!(requested.units() > capped.units());
            assert_eq!(&result.delta.flashloan_amount, capped);
        }
        _ => unreachable!(),
    }
}

#[test]
fn boundary_target_hits_minimum_safe_health_factor() {
    let config = EngineConfig::default();
    let position = steth_eth_position(40, 200, "0.5");
    // Push to the protocol maximum with no slippage and no fee
    let target = RiskRatio::from_ltv(parse_decimal("0.8").unwrap()).unwrap();

    let params = AdjustmentParams {
        prices: multiply_core::Prices {
            market: Price::parse("0.5").unwrap(),
            oracle: Price::parse("0.5").unwrap(),
            oracle_flashloan_to_debt: Price::identity(),
        },
        fees: Fees { flash_loan: 0.0 },
        slippage: Slippage::zero(),
        flashloan: eth_flashloan("0.9"),
        deposited_by_user: Deposits::none(18, 18),
        collect_swap_fee_from: FeeSource::SourceToken,
        is_earn_position: false,
        protocol: ProtocolKind::AaveV3,
    };

    let result = RiskAdjustmentSimulator::new(&config)
        .adjust(&position, &target, &params)
        .unwrap();

    // health factor = liquidation_threshold / max_ltv = 0.85 / 0.8
    let health = result.position.health_factor().unwrap().to_f64().unwrap();
    assert!((health - 0.85 / 0.8).abs() < 1e-9, "health was {}", health);
}

#[test]
fn transition_serializes_for_downstream_builders() {
    let config = EngineConfig::default();
    let position = steth_eth_position(0, 0, "1");
    let target = RiskRatio::from_multiple(parse_decimal("2").unwrap()).unwrap();

    let result = RiskAdjustmentSimulator::new(&config)
        .adjust(&position, &target, &open_two_x_params())
        .unwrap();

    let json = serde_json::to_string(&result).unwrap();
    let back: multiply_core::SimulatedTransition = serde_json::from_str(&json).unwrap();
    assert_eq!(back, result);
}
