// 7.0 config.rs: every injected table and threshold in one place.
// 7.1 presets differ in where liquidation starts and how fast a margin call hands over:
//   standard: threshold at the critical band, call waits for the floor or the breach window
//   strict:   same threshold, call escalates in the pass that sees the breach
//   stop_out: threshold at 20%

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::commission::{CommissionTable, CommissionType};
use crate::liquidation::LiquidationConfig;
use crate::margin::MarginThresholds;
use crate::margin_call::EscalationPolicy;
use crate::slippage::SlippageTable;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskEngineConfig {
    #[serde(default)]
    pub slippage: SlippageTable,
    #[serde(default)]
    pub commission: CommissionTable,
    #[serde(default)]
    pub thresholds: MarginThresholds,
    #[serde(default)]
    pub escalation: EscalationPolicy,
    #[serde(default)]
    pub liquidation: LiquidationConfig,
}

impl RiskEngineConfig {
    /// Liquidation below the critical band (50%). A margin call below it waits for
    /// the 20% floor or the 30 minute breach window.
    pub fn standard() -> Self {
        Self::default()
    }

    /// Standard thresholds, but a breach below 50% liquidates without waiting.
    pub fn strict() -> Self {
        Self {
            escalation: EscalationPolicy {
                escalate_below_liquidation_threshold: true,
                ..EscalationPolicy::default()
            },
            ..Self::default()
        }
    }

    /// Liquidation only at the 20% stop-out level. Below critical the account
    /// stays on margin call until it recovers, times out or hits stop-out.
    pub fn stop_out() -> Self {
        Self {
            liquidation: LiquidationConfig::stop_out(),
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        // thresholds strictly descending and positive
        let t = &self.thresholds;
        if !(t.safe > t.warning && t.warning > t.critical && t.critical > Decimal::ZERO) {
            return Err(ConfigError::InvalidThresholds {
                reason: format!(
                    "expected safe > warning > critical > 0, got {} / {} / {}",
                    t.safe, t.warning, t.critical
                ),
            });
        }

        for (symbol, asset) in &self.slippage.assets {
            let invalid = |reason: &str| ConfigError::InvalidSlippage {
                symbol: symbol.clone(),
                reason: reason.to_string(),
            };
            if asset.price_step <= Decimal::ZERO {
                return Err(invalid("price step must be positive"));
            }
            if asset.min_slippage < Decimal::ZERO || asset.base_spread < Decimal::ZERO {
                return Err(invalid("spread and min slippage must not be negative"));
            }
            if asset.min_slippage > asset.max_slippage {
                return Err(invalid("min slippage above max"));
            }
            if asset.volatility_multiplier <= Decimal::ZERO || asset.after_hours_penalty <= Decimal::ZERO {
                return Err(invalid("multipliers must be positive"));
            }
        }

        for (asset_class, cfg) in &self.commission.classes {
            let invalid = |reason: &str| ConfigError::InvalidCommission {
                asset_class: asset_class.to_string(),
                reason: reason.to_string(),
            };
            if cfg.base_rate < Decimal::ZERO {
                return Err(invalid("rate must not be negative"));
            }
            if cfg.has_commission && cfg.commission_type == CommissionType::None {
                return Err(invalid("charged class needs a commission type"));
            }
            if let (Some(min), Some(max)) = (cfg.min_commission, cfg.max_commission) {
                if min > max {
                    return Err(invalid("min commission above max"));
                }
            }
            if cfg.tier_multipliers.values().any(|m| *m < Decimal::ZERO) {
                return Err(invalid("tier multiplier must not be negative"));
            }
        }

        let l = &self.liquidation;
        if l.worst_case_factor < Decimal::ONE {
            return Err(ConfigError::InvalidLiquidation {
                reason: "worst case factor below 1".to_string(),
            });
        }
        if l.liquidation_threshold <= Decimal::ZERO || l.liquidation_threshold > t.critical {
            return Err(ConfigError::InvalidLiquidation {
                reason: format!(
                    "liquidation threshold {} outside (0, {}]",
                    l.liquidation_threshold, t.critical
                ),
            });
        }
        if l.max_spread_pct <= Decimal::ZERO {
            return Err(ConfigError::InvalidLiquidation {
                reason: "max spread must be positive".to_string(),
            });
        }

        let e = &self.escalation;
        if e.sustained_breach_ms <= 0 {
            return Err(ConfigError::InvalidEscalation {
                reason: "sustained breach window must be positive".to_string(),
            });
        }
        if e.emergency_floor < Decimal::ZERO || e.emergency_floor > t.critical {
            return Err(ConfigError::InvalidEscalation {
                reason: format!("emergency floor {} outside [0, {}]", e.emergency_floor, t.critical),
            });
        }

        Ok(())
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid margin thresholds: {reason}")]
    InvalidThresholds { reason: String },

    #[error("Invalid slippage config for {symbol}: {reason}")]
    InvalidSlippage { symbol: String, reason: String },

    #[error("Invalid commission config for {asset_class}: {reason}")]
    InvalidCommission { asset_class: String, reason: String },

    #[error("Invalid liquidation config: {reason}")]
    InvalidLiquidation { reason: String },

    #[error("Invalid escalation policy: {reason}")]
    InvalidEscalation { reason: String },

    #[error("Config parse error: {0}")]
    Parse(String),
}

// Threshold presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdProfile {
    Standard,
    Strict,
    StopOut,
}

impl ThresholdProfile {
    pub fn config(&self) -> RiskEngineConfig {
        match self {
            ThresholdProfile::Standard => RiskEngineConfig::standard(),
            ThresholdProfile::Strict => RiskEngineConfig::strict(),
            ThresholdProfile::StopOut => RiskEngineConfig::stop_out(),
        }
    }
}
