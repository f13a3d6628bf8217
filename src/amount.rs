//! Base-unit token amounts
//!
//! Every quantity the engine handles is an arbitrary-precision integer scaled
//! by the token's decimal count (base units, e.g. wei). Unit-level values are
//! exact rationals; conversion back to base units always names its rounding
//! direction. No floating point enters the arithmetic.

use std::fmt;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Rounding direction for conversions into base units
///
/// `Down` rounds toward negative infinity, `Up` toward positive infinity, so
/// the direction keeps its meaning for negative (outgoing) amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rounding {
    Down,
    Up,
}

/// Token quantity in base units, tagged with its decimal scale
///
/// Amounts of different scales never mix silently: `checked_add`/`checked_sub`
/// fail with [`EngineError::PrecisionOverflow`] on a scale mismatch, and any
/// cross-token arithmetic has to go through an explicit price conversion at
/// the rational level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    /// Base units as a decimal string (kept exact across serialization)
    #[serde(with = "bigint_serde")]
    base: BigInt,

    /// Token decimal count (18 for ETH, 6 for USDC, ...)
    decimals: u32,
}

impl Amount {
    /// Create an amount from raw base units
    pub fn from_base(base: impl Into<BigInt>, decimals: u32) -> Self {
        Self {
            base: base.into(),
            decimals,
        }
    }

    /// Zero amount at the given scale
    pub fn zero(decimals: u32) -> Self {
        Self {
            base: BigInt::zero(),
            decimals,
        }
    }

    /// Convert an exact unit-level value into base units
    pub fn from_units(units: &BigRational, decimals: u32, rounding: Rounding) -> Self {
        let scaled = units * BigRational::from_integer(pow10(decimals));
        let base = match rounding {
            Rounding::Down => scaled.floor().to_integer(),
            Rounding::Up => scaled.ceil().to_integer(),
        };
        Self { base, decimals }
    }

    /// Exact unit-level value (base / 10^decimals)
    pub fn units(&self) -> BigRational {
        BigRational::new(self.base.clone(), pow10(self.decimals))
    }

    /// Raw base units
    pub fn base(&self) -> &BigInt {
        &self.base
    }

    /// Token decimal count
    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    pub fn is_zero(&self) -> bool {
        self.base.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.base.is_negative()
    }

    pub fn is_positive(&self) -> bool {
        self.base.is_positive()
    }

    /// Sum of two amounts at the same scale
    pub fn checked_add(&self, other: &Amount) -> Result<Amount> {
        self.require_same_scale(other)?;
        Ok(Amount {
            base: &self.base + &other.base,
            decimals: self.decimals,
        })
    }

    /// Difference of two amounts at the same scale
    pub fn checked_sub(&self, other: &Amount) -> Result<Amount> {
        self.require_same_scale(other)?;
        Ok(Amount {
            base: &self.base - &other.base,
            decimals: self.decimals,
        })
    }

    /// Negated amount
    pub fn neg(&self) -> Amount {
        Amount {
            base: -&self.base,
            decimals: self.decimals,
        }
    }

    /// Absolute value
    pub fn abs(&self) -> Amount {
        Amount {
            base: self.base.abs(),
            decimals: self.decimals,
        }
    }

    /// Lossy conversion for logging and display only
    pub fn to_f64_lossy(&self) -> f64 {
        self.units().to_f64().unwrap_or(f64::NAN)
    }

    fn require_same_scale(&self, other: &Amount) -> Result<()> {
        if self.decimals != other.decimals {
            return Err(EngineError::precision(format!(
                "base-unit arithmetic across decimal scales ({} vs {})",
                self.decimals, other.decimals
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = pow10(self.decimals);
        let magnitude = self.base.magnitude();
        let int = magnitude / scale.magnitude();
        let frac = magnitude % scale.magnitude();
        let sign = if self.base.is_negative() { "-" } else { "" };
        if frac.is_zero() {
            write!(f, "{}{}", sign, int)
        } else {
            let mut digits = frac.to_string();
            while digits.len() < self.decimals as usize {
                digits.insert(0, '0');
            }
            write!(f, "{}{}.{}", sign, int, digits.trim_end_matches('0'))
        }
    }
}

/// 10^exp as a big integer
pub fn pow10(exp: u32) -> BigInt {
    BigInt::from(10u32).pow(exp)
}

/// Parse a plain decimal string ("0.979", "-12.5", "200") into an exact rational
pub fn parse_decimal(text: &str) -> Result<BigRational> {
    let trimmed = text.trim();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(EngineError::invalid_amount(format!(
            "not a decimal number: {:?}",
            text
        )));
    }
    let joined = format!("{}{}", int_part, frac_part);
    let numer: BigInt = joined.parse().map_err(|_| {
        EngineError::invalid_amount(format!("not a decimal number: {:?}", text))
    })?;
    let denom = pow10(frac_part.len() as u32);
    Ok(BigRational::new(BigInt::from(sign) * numer, denom))
}

/// Convert a finite `f64` (configuration boundary only) into an exact rational
pub fn rational_from_f64(value: f64) -> Result<BigRational> {
    BigRational::from_float(value).ok_or_else(|| {
        EngineError::precision(format!("non-finite configuration value: {}", value))
    })
}

/// Serialize big integers as decimal strings so JSON/YAML consumers never
/// truncate them to native numbers
pub(crate) mod bigint_serde {
    use num_bigint::BigInt;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &BigInt, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigInt, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid base-unit integer: {}", text)))
    }
}

/// Serialize exact rationals as "numer/denom" strings; deserialization also
/// accepts plain decimal strings
pub(crate) mod rational_serde {
    use num_rational::BigRational;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &BigRational,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{}/{}", value.numer(), value.denom()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BigRational, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse(&text).map_err(serde::de::Error::custom)
    }

    pub(crate) fn parse(text: &str) -> Result<BigRational, String> {
        if let Some((numer, denom)) = text.split_once('/') {
            let numer = numer
                .trim()
                .parse()
                .map_err(|_| format!("invalid rational numerator: {}", text))?;
            let denom: num_bigint::BigInt = denom
                .trim()
                .parse()
                .map_err(|_| format!("invalid rational denominator: {}", text))?;
            if denom == num_bigint::BigInt::from(0) {
                return Err(format!("zero denominator: {}", text));
            }
            Ok(BigRational::new(numer, denom))
        } else {
            super::parse_decimal(text).map_err(|e| e.to_string())
        }
    }
}
