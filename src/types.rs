//! Core value types for the risk-adjustment engine

use serde::{Deserialize, Serialize};

use num_rational::BigRational;

use crate::amount::Amount;
use crate::position::Position;

/// Lending protocol the position lives on
///
/// Closed set with explicit dispatch - protocol-specific behavior is selected
/// by matching on this tag, never by sniffing the shape of runtime data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolKind {
    AaveV2,
    AaveV3,
    Spark,
    Ajna,
    MorphoBlue,
}

impl ProtocolKind {
    /// Flashloan premium charged by the protocol's flashloan facility
    pub fn default_flashloan_fee_rate(&self) -> f64 {
        match self {
            ProtocolKind::AaveV2 => 0.0009, // 9 bps
            ProtocolKind::AaveV3 => 0.0005, // 5 bps
            ProtocolKind::Spark => 0.0,
            ProtocolKind::Ajna => 0.0,
            ProtocolKind::MorphoBlue => 0.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolKind::AaveV2 => "aave_v2",
            ProtocolKind::AaveV3 => "aave_v3",
            ProtocolKind::Spark => "spark",
            ProtocolKind::Ajna => "ajna",
            ProtocolKind::MorphoBlue => "morpho_blue",
        }
    }
}

/// Which side of the swap the protocol fee is deducted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeSource {
    /// Deducted pre-swap, from the amount entering the swap
    SourceToken,
    /// Deducted post-swap, from the amount received
    TargetToken,
}

/// An amount tagged with its token symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAmount {
    pub amount: Amount,
    pub symbol: String,
}

impl TokenAmount {
    pub fn new(amount: Amount, symbol: impl Into<String>) -> Self {
        Self {
            amount,
            symbol: symbol.into(),
        }
    }
}

/// Direction flags of a simulated transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionFlags {
    pub is_increasing_risk: bool,
    pub requires_flashloan: bool,
}

/// Signed deltas a transition applies to the position, plus the flashloan
/// that finances it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionDelta {
    /// Debt change in debt-token base units (negative means repayment)
    pub debt: Amount,
    /// Collateral change in collateral-token base units (negative means withdrawal)
    pub collateral: Amount,
    /// Flashloan size in flashloan-token base units (zero when not required)
    pub flashloan_amount: Amount,
}

/// The single swap a transition executes
///
/// `to_token_amount` is the expected receive at the nominal market price;
/// `min_to_token_amount` is the worst-case receive at the slippage-adjusted
/// price and is what the on-chain minimum-receive guard must use. Both are
/// retained distinctly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapSummary {
    pub from_token_amount: TokenAmount,
    pub to_token_amount: TokenAmount,
    pub min_to_token_amount: TokenAmount,
    /// Protocol fee, reported in the token it is deducted from and
    /// conservatively over-estimated
    pub token_fee: TokenAmount,
    pub collect_fee_from: FeeSource,
}

/// Economically-meaningful soft conditions attached to a transition
///
/// These are not failures: callers may still present the best-effort
/// transition to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Warning {
    /// The naive flashloan size exceeded what the provider allows against the
    /// available collateral and was capped
    FlashloanCapped { requested: Amount, capped: Amount },

    /// The requested target lies outside what the position can reach at the
    /// quoted worst-case price
    TargetOutsideReachableRange {
        #[serde(with = "crate::amount::rational_serde")]
        target: BigRational,
        #[serde(with = "crate::amount::rational_serde")]
        min: BigRational,
        #[serde(with = "crate::amount::rational_serde")]
        max: BigRational,
    },
}

/// Fully simulated position transition - the engine's output
///
/// Owned immutable value; applying `delta` to the input position reproduces
/// `position` exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedTransition {
    pub delta: PositionDelta,
    pub flags: TransitionFlags,
    pub swap: SwapSummary,
    pub position: Position,
    pub warnings: Vec<Warning>,
}
