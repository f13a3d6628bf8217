//! Risk ratios, prices, and slippage tolerances
//!
//! A position's risk level has two user-facing spellings - loan-to-value and
//! leverage multiple - normalized here to a single canonical LTV. Prices and
//! slippage tolerances are exact rationals validated at construction.

use std::fmt;

use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::amount::{parse_decimal, rational_serde};
use crate::error::{EngineError, Result};

/// Canonical risk level: loan-to-value in `[0, 1)`
///
/// `from_ltv` and `from_multiple` are mutually inverse:
/// `multiple = 1 / (1 - ltv)` and `ltv = 1 - 1 / multiple`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RiskRatio {
    loan_to_value: BigRational,
}

impl RiskRatio {
    /// Construct from a loan-to-value fraction
    pub fn from_ltv(loan_to_value: BigRational) -> Result<Self> {
        if loan_to_value.is_negative() || loan_to_value >= BigRational::one() {
            return Err(EngineError::invalid_risk_ratio(format!(
                "loan-to-value must be in [0, 1), got {}",
                loan_to_value
            )));
        }
        Ok(Self { loan_to_value })
    }

    /// Construct from a leverage multiple (total exposure over net equity)
    pub fn from_multiple(multiple: BigRational) -> Result<Self> {
        if multiple < BigRational::one() {
            return Err(EngineError::invalid_risk_ratio(format!(
                "multiple must be >= 1, got {}",
                multiple
            )));
        }
        let loan_to_value = BigRational::one() - multiple.recip();
        Ok(Self { loan_to_value })
    }

    /// Risk-free ratio (no debt)
    pub fn zero() -> Self {
        Self {
            loan_to_value: BigRational::zero(),
        }
    }

    /// Canonical loan-to-value value
    pub fn loan_to_value(&self) -> &BigRational {
        &self.loan_to_value
    }

    /// Leverage multiple, `1 / (1 - ltv)`
    pub fn multiple(&self) -> BigRational {
        (BigRational::one() - &self.loan_to_value).recip()
    }

    /// Lossy conversion for logging and display only
    pub fn to_f64_lossy(&self) -> f64 {
        self.loan_to_value.to_f64().unwrap_or(f64::NAN)
    }
}

impl fmt::Display for RiskRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ltv {:.6}", self.to_f64_lossy())
    }
}

/// Exchange rate between two tokens, strictly positive
///
/// The engine's convention is debt-token value per unit of collateral token
/// unless a field name says otherwise.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Price {
    value: BigRational,
}

impl Price {
    /// Construct a validated price
    pub fn new(value: BigRational) -> Result<Self> {
        if !value.is_positive() {
            return Err(EngineError::invalid_price(format!(
                "price must be positive, got {}",
                value
            )));
        }
        Ok(Self { value })
    }

    /// Parse from a plain decimal string, e.g. `"0.979"`
    pub fn parse(text: &str) -> Result<Self> {
        Self::new(parse_decimal(text)?)
    }

    /// Identity price (1:1), for flashloans taken in the debt token itself
    pub fn identity() -> Self {
        Self {
            value: BigRational::one(),
        }
    }

    pub(crate) fn new_unchecked(value: BigRational) -> Self {
        Self { value }
    }

    pub fn as_rational(&self) -> &BigRational {
        &self.value
    }

    /// Lossy conversion for logging and display only
    pub fn to_f64_lossy(&self) -> f64 {
        self.value.to_f64().unwrap_or(f64::NAN)
    }
}

/// Slippage tolerance in `[0, 1)` applied to a market price to bound
/// worst-case execution
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Slippage {
    value: BigRational,
}

impl Slippage {
    pub fn new(value: BigRational) -> Result<Self> {
        if value.is_negative() || value >= BigRational::one() {
            return Err(EngineError::invalid_slippage(format!(
                "slippage must be in [0, 1), got {}",
                value
            )));
        }
        Ok(Self { value })
    }

    /// Parse from a plain decimal string, e.g. `"0.001"`
    pub fn parse(text: &str) -> Result<Self> {
        Self::new(parse_decimal(text)?)
    }

    pub fn zero() -> Self {
        Self {
            value: BigRational::zero(),
        }
    }

    pub fn as_rational(&self) -> &BigRational {
        &self.value
    }
}

macro_rules! rational_newtype_serde {
    ($type:ty, $constructor:expr) => {
        impl Serialize for $type {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                let value = self.as_inner();
                serializer.serialize_str(&format!("{}/{}", value.numer(), value.denom()))
            }
        }

        impl<'de> Deserialize<'de> for $type {
            fn deserialize<D: Deserializer<'de>>(
                deserializer: D,
            ) -> std::result::Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                let value = rational_serde::parse(&text).map_err(serde::de::Error::custom)?;
                $constructor(value).map_err(serde::de::Error::custom)
            }
        }
    };
}

impl RiskRatio {
    fn as_inner(&self) -> &BigRational {
        &self.loan_to_value
    }
}

impl Price {
    fn as_inner(&self) -> &BigRational {
        &self.value
    }
}

impl Slippage {
    fn as_inner(&self) -> &BigRational {
        &self.value
    }
}

rational_newtype_serde!(RiskRatio, RiskRatio::from_ltv);
rational_newtype_serde!(Price, Price::new);
rational_newtype_serde!(Slippage, Slippage::new);
