//! Multiply Core
//!
//! Risk-adjustment engine for leveraged lending positions - the pure
//! arithmetic that turns a collateral/debt snapshot and a target risk level
//! into a fully simulated, flashloan-backed transition.
//!
//! ## Inputs:
//! 1. **Position state**: collateral, debt, oracle price, protocol risk limits
//! 2. **Market data**: swap quote, slippage tolerance, flashloan terms
//!
//! ## Output:
//! - **SimulatedTransition**: swap amounts, position deltas, flashloan size,
//!   warnings, and the resulting position - everything a protocol-specific
//!   strategy builder needs to assemble calldata
//!
//! The engine is synchronous and side-effect free: no I/O, no shared state,
//! no floating point in the arithmetic. Callers fetch prices and protocol
//! data first, then hand the engine a consistent snapshot.

pub mod amount;
pub mod config;
pub mod error;
pub mod position;
pub mod ratio;
pub mod simulator;
pub mod types;

pub use amount::{parse_decimal, Amount, Rounding};
pub use config::{EngineConfig, FeeConfig, FlashloanConfig};
pub use error::{EngineError, Result};
pub use position::{Position, PositionCategory};
pub use ratio::{Price, RiskRatio, Slippage};
pub use simulator::{
    apply_slippage, AdjustmentParams, Deposits, FeeContext, FeeResolver, Fees, FlashloanParams,
    FlashloanSizer, Prices, RiskAdjustmentSimulator,
};
pub use types::{
    FeeSource, PositionDelta, ProtocolKind, SimulatedTransition, SwapSummary, TokenAmount,
    TransitionFlags, Warning,
};

/// Version of the engine
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
