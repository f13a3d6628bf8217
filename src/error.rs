//! Error types for the risk-adjustment engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Error taxonomy for the risk-adjustment engine
///
/// Malformed inputs fail immediately with one of these; economically-meaningful
/// edge cases (capped flashloan, target outside the reachable range) are
/// surfaced as [`crate::types::Warning`]s on the transition instead.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid risk ratio: {message}")]
    InvalidRiskRatio { message: String },

    #[error("Invalid price: {message}")]
    InvalidPrice { message: String },

    #[error("Invalid slippage: {message}")]
    InvalidSlippage { message: String },

    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },

    #[error("Unreachable risk ratio: {message}")]
    UnreachableRiskRatio { message: String },

    #[error("Insufficient liquidity: required={required}, available={available}")]
    InsufficientLiquidity { required: String, available: String },

    #[error("Precision overflow: {message}")]
    PrecisionOverflow { message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl EngineError {
    /// Create an invalid risk ratio error
    pub fn invalid_risk_ratio<S: Into<String>>(message: S) -> Self {
        Self::InvalidRiskRatio {
            message: message.into(),
        }
    }

    /// Create an invalid price error
    pub fn invalid_price<S: Into<String>>(message: S) -> Self {
        Self::InvalidPrice {
            message: message.into(),
        }
    }

    /// Create an invalid slippage error
    pub fn invalid_slippage<S: Into<String>>(message: S) -> Self {
        Self::InvalidSlippage {
            message: message.into(),
        }
    }

    /// Create an invalid amount error
    pub fn invalid_amount<S: Into<String>>(message: S) -> Self {
        Self::InvalidAmount {
            message: message.into(),
        }
    }

    /// Create an unreachable risk ratio error
    pub fn unreachable<S: Into<String>>(message: S) -> Self {
        Self::UnreachableRiskRatio {
            message: message.into(),
        }
    }

    /// Create an insufficient liquidity error
    pub fn insufficient_liquidity(required: impl ToString, available: impl ToString) -> Self {
        Self::InsufficientLiquidity {
            required: required.to_string(),
            available: available.to_string(),
        }
    }

    /// Create a precision overflow error
    pub fn precision<S: Into<String>>(message: S) -> Self {
        Self::PrecisionOverflow {
            message: message.into(),
        }
    }

    /// Check if this error indicates bad caller input (as opposed to an
    /// economically infeasible request)
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidRiskRatio { .. }
                | EngineError::InvalidPrice { .. }
                | EngineError::InvalidSlippage { .. }
                | EngineError::InvalidAmount { .. }
        )
    }
}
