//! Engine configuration
//!
//! Immutable tuning tables passed by reference into the simulator - fee
//! policy, flashloan sizing margins, per-protocol flashloan premiums. Values
//! are plain fractions (f64 at the configuration boundary only; the engine
//! converts them to exact rationals before any arithmetic).

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::types::ProtocolKind;

/// Default swap fee rate charged by the service (20 bps)
pub const DEFAULT_SWAP_FEE_RATE: f64 = 0.002;

/// Conservative head-room multiplier applied to estimated swap fees so the
/// simulation never under-reports the on-chain charge
pub const DEFAULT_FEE_ESTIMATE_INFLATOR: f64 = 1.01;

/// Safety margin added when sizing a flashloan (10 bps)
pub const DEFAULT_FLASHLOAN_SAFETY_MARGIN: f64 = 0.001;

/// Swap fee policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeeConfig {
    /// Fee rate applied when no table entry matches
    pub default_rate: f64,

    /// Multiplier on reported fee estimates (>= 1)
    pub fee_estimate_inflator: f64,

    /// Correlated-asset pairs swapped without a service fee ("earn" pairs),
    /// keyed "COLLATERAL/DEBT"
    pub no_fee_pairs: Vec<String>,

    /// Per-pair fee overrides, keyed "COLLATERAL/DEBT"
    pub pair_overrides: HashMap<String, f64>,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            default_rate: DEFAULT_SWAP_FEE_RATE,
            fee_estimate_inflator: DEFAULT_FEE_ESTIMATE_INFLATOR,
            no_fee_pairs: vec![
                "STETH/ETH".to_string(),
                "WSTETH/ETH".to_string(),
                "RETH/ETH".to_string(),
                "CBETH/ETH".to_string(),
                "SDAI/DAI".to_string(),
            ],
            pair_overrides: HashMap::new(),
        }
    }
}

/// Flashloan sizing policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FlashloanConfig {
    /// Margin added on top of the flashloan premium when sizing
    pub safety_margin: f64,

    /// Flashloan premium per protocol; falls back to the protocol's
    /// built-in default when absent
    pub provider_fees: HashMap<ProtocolKind, f64>,
}

impl Default for FlashloanConfig {
    fn default() -> Self {
        let mut provider_fees = HashMap::new();
        for protocol in [
            ProtocolKind::AaveV2,
            ProtocolKind::AaveV3,
            ProtocolKind::Spark,
            ProtocolKind::Ajna,
            ProtocolKind::MorphoBlue,
        ] {
            provider_fees.insert(protocol, protocol.default_flashloan_fee_rate());
        }
        Self {
            safety_margin: DEFAULT_FLASHLOAN_SAFETY_MARGIN,
            provider_fees,
        }
    }
}

impl FlashloanConfig {
    /// Flashloan premium for a protocol, falling back to the built-in default
    pub fn fee_rate_for(&self, protocol: ProtocolKind) -> f64 {
        self.provider_fees
            .get(&protocol)
            .copied()
            .unwrap_or_else(|| protocol.default_flashloan_fee_rate())
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EngineConfig {
    pub fees: FeeConfig,
    pub flashloan: FlashloanConfig,
}

impl EngineConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(config::ConfigError::Foreign(Box::new(e))))?;

        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| EngineError::Config(config::ConfigError::Foreign(Box::new(e))))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file (for generating examples)
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)
            .map_err(|e| EngineError::Config(config::ConfigError::Foreign(Box::new(e))))?;

        std::fs::write(path, yaml)
            .map_err(|e| EngineError::Config(config::ConfigError::Foreign(Box::new(e))))?;

        Ok(())
    }

    /// Reject rates outside their meaningful ranges
    pub fn validate(&self) -> Result<()> {
        let in_unit_range = |rate: f64| (0.0..1.0).contains(&rate);

        if !in_unit_range(self.fees.default_rate) {
            return Err(config_error(format!(
                "default fee rate must be in [0, 1), got {}",
                self.fees.default_rate
            )));
        }
        for (pair, rate) in &self.fees.pair_overrides {
            if !in_unit_range(*rate) {
                return Err(config_error(format!(
                    "fee override for {} must be in [0, 1), got {}",
                    pair, rate
                )));
            }
        }
        if self.fees.fee_estimate_inflator < 1.0 {
            return Err(config_error(format!(
                "fee estimate inflator must be >= 1, got {}",
                self.fees.fee_estimate_inflator
            )));
        }
        if !in_unit_range(self.flashloan.safety_margin) {
            return Err(config_error(format!(
                "flashloan safety margin must be in [0, 1), got {}",
                self.flashloan.safety_margin
            )));
        }
        for (protocol, rate) in &self.flashloan.provider_fees {
            if !in_unit_range(*rate) {
                return Err(config_error(format!(
                    "flashloan fee for {} must be in [0, 1), got {}",
                    protocol.as_str(),
                    rate
                )));
            }
        }
        Ok(())
    }
}

/// Table key for a collateral/debt pair, e.g. `"STETH/ETH"`
pub fn pair_key(collateral_symbol: &str, debt_symbol: &str) -> String {
    format!(
        "{}/{}",
        collateral_symbol.to_uppercase(),
        debt_symbol.to_uppercase()
    )
}

fn config_error(message: String) -> EngineError {
    EngineError::Config(config::ConfigError::Message(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();

        assert_eq!(config.fees.default_rate, DEFAULT_SWAP_FEE_RATE);
        assert_eq!(
            config.fees.fee_estimate_inflator,
            DEFAULT_FEE_ESTIMATE_INFLATOR
        );
        assert!(config
            .fees
            .no_fee_pairs
            .contains(&"STETH/ETH".to_string()));
        assert_eq!(
            config.flashloan.safety_margin,
            DEFAULT_FLASHLOAN_SAFETY_MARGIN
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_flashloan_fee_fallback() {
        let mut config = FlashloanConfig::default();
        assert_eq!(config.fee_rate_for(ProtocolKind::AaveV2), 0.0009);

        // Explicit override wins
        config.provider_fees.insert(ProtocolKind::AaveV2, 0.0);
        assert_eq!(config.fee_rate_for(ProtocolKind::AaveV2), 0.0);

        // Absent entry falls back to the protocol default
        config.provider_fees.remove(&ProtocolKind::Spark);
        assert_eq!(config.fee_rate_for(ProtocolKind::Spark), 0.0);
    }

    #[test]
    fn test_pair_key_is_case_insensitive() {
        assert_eq!(pair_key("stEth", "eth"), "STETH/ETH");
    }

    #[test]
    fn test_validation_rejects_bad_rates() {
        let mut config = EngineConfig::default();
        config.fees.default_rate = 1.5;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.fees.fee_estimate_inflator = 0.5;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.flashloan.safety_margin = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_config() {
        let config = EngineConfig::default();
        let temp_path = std::env::temp_dir().join("test_multiply_core_config.yaml");

        config.save_to_file(&temp_path).unwrap();
        let loaded = EngineConfig::from_file(&temp_path).unwrap();

        assert_eq!(loaded.fees.default_rate, config.fees.default_rate);
        assert_eq!(loaded.fees.no_fee_pairs, config.fees.no_fee_pairs);
        assert_eq!(
            loaded.flashloan.provider_fees,
            config.flashloan.provider_fees
        );

        std::fs::remove_file(&temp_path).ok();
    }
}
