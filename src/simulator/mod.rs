//! Position transition simulation
//!
//! The closed-form risk-adjustment solve and its fee/flashloan helpers.

pub mod adjust;
pub mod fees;
pub mod flashloan;

pub use adjust::{AdjustmentParams, Deposits, Fees, Prices, RiskAdjustmentSimulator};
pub use fees::{apply_slippage, FeeContext, FeeResolver};
pub use flashloan::{FlashloanParams, FlashloanSizer, FlashloanSizing};
