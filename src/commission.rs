// 3.0 commission.rs: per-order fee by asset class and account tier.
// fee magnitude is side independent. netting against proceeds happens in the order path.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::EngineError;
use crate::types::{round_dp, Quote, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Stock,
    Forex,
    Crypto,
    Futures,
    Options,
    Commodity,
    Index,
}

impl AssetClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Stock => "stock",
            AssetClass::Forex => "forex",
            AssetClass::Crypto => "crypto",
            AssetClass::Futures => "futures",
            AssetClass::Options => "options",
            AssetClass::Commodity => "commodity",
            AssetClass::Index => "index",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionType {
    PerShare,
    PerContract,
    // rate is in percent of notional
    Percentage,
    Fixed,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountTier {
    Standard,
    Silver,
    Gold,
    Platinum,
    Vip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetCommissionConfig {
    pub has_commission: bool,
    pub commission_type: CommissionType,
    pub base_rate: Decimal,
    pub min_commission: Option<Decimal>,
    pub max_commission: Option<Decimal>,
    /// Discount factor per tier. Missing tiers pay full rate.
    #[serde(default)]
    pub tier_multipliers: HashMap<AccountTier, Decimal>,
}

impl AssetCommissionConfig {
    pub fn tier_multiplier(&self, tier: AccountTier) -> Decimal {
        self.tier_multipliers
            .get(&tier)
            .copied()
            .unwrap_or(Decimal::ONE)
    }

    pub fn free() -> Self {
        Self {
            has_commission: false,
            commission_type: CommissionType::None,
            base_rate: Decimal::ZERO,
            min_commission: None,
            max_commission: None,
            tier_multipliers: HashMap::new(),
        }
    }
}

fn standard_tiers() -> HashMap<AccountTier, Decimal> {
    HashMap::from([
        (AccountTier::Standard, dec!(1)),
        (AccountTier::Silver, dec!(0.9)),
        (AccountTier::Gold, dec!(0.8)),
        (AccountTier::Platinum, dec!(0.7)),
        (AccountTier::Vip, dec!(0.6)),
    ])
}

fn charged(
    commission_type: CommissionType,
    base_rate: Decimal,
    min_commission: Option<Decimal>,
    max_commission: Option<Decimal>,
) -> AssetCommissionConfig {
    AssetCommissionConfig {
        has_commission: true,
        commission_type,
        base_rate,
        min_commission,
        max_commission,
        tier_multipliers: standard_tiers(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionTable {
    pub classes: HashMap<AssetClass, AssetCommissionConfig>,
}

impl CommissionTable {
    pub fn empty() -> Self {
        Self {
            classes: HashMap::new(),
        }
    }

    pub fn with_class(mut self, asset_class: AssetClass, config: AssetCommissionConfig) -> Self {
        self.classes.insert(asset_class, config);
        self
    }

    pub fn get(&self, asset_class: AssetClass) -> Option<&AssetCommissionConfig> {
        self.classes.get(&asset_class)
    }
}

impl Default for CommissionTable {
    fn default() -> Self {
        Self::empty()
            .with_class(AssetClass::Stock, charged(CommissionType::PerShare, dec!(0.02), Some(dec!(1)), Some(dec!(50))))
            .with_class(AssetClass::Options, charged(CommissionType::PerContract, dec!(0.65), Some(dec!(1)), None))
            .with_class(AssetClass::Futures, charged(CommissionType::PerContract, dec!(2.25), None, None))
            .with_class(AssetClass::Crypto, charged(CommissionType::Percentage, dec!(0.1), None, None))
            .with_class(AssetClass::Commodity, charged(CommissionType::Percentage, dec!(0.05), Some(dec!(2)), None))
            .with_class(AssetClass::Index, charged(CommissionType::Fixed, dec!(5), None, None))
            // forex is priced through the spread
            .with_class(AssetClass::Forex, AssetCommissionConfig::free())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionResult {
    pub base_commission: Quote,
    pub tier_multiplier: Decimal,
    pub total_commission: Quote,
    pub commission_type: CommissionType,
}

impl CommissionResult {
    fn zero() -> Self {
        Self {
            base_commission: Quote::zero(),
            tier_multiplier: Decimal::ONE,
            total_commission: Quote::zero(),
            commission_type: CommissionType::None,
        }
    }
}

pub fn base_commission(
    commission_type: CommissionType,
    rate: Decimal,
    quantity: Decimal,
    execution_price: Decimal,
) -> Decimal {
    match commission_type {
        CommissionType::PerShare | CommissionType::PerContract => quantity * rate,
        CommissionType::Percentage => quantity * execution_price * rate / dec!(100),
        CommissionType::Fixed => rate,
        CommissionType::None => Decimal::ZERO,
    }
}

#[derive(Debug, Clone)]
pub struct CommissionModel {
    table: CommissionTable,
}

impl CommissionModel {
    pub fn new(table: CommissionTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &CommissionTable {
        &self.table
    }

    pub fn calculate_commission(
        &self,
        symbol: &str,
        asset_class: AssetClass,
        side: Side,
        quantity: Decimal,
        execution_price: Decimal,
        tier: AccountTier,
    ) -> Result<CommissionResult, EngineError> {
        if quantity <= Decimal::ZERO {
            return Err(EngineError::invalid("quantity", "must be positive"));
        }
        if execution_price <= Decimal::ZERO {
            return Err(EngineError::invalid("execution_price", "must be positive"));
        }

        let config = self
            .table
            .get(asset_class)
            .ok_or_else(|| EngineError::UnsupportedAssetClass {
                asset_class: asset_class.to_string(),
            })?;

        if !config.has_commission || config.commission_type == CommissionType::None {
            return Ok(CommissionResult::zero());
        }

        let base = base_commission(config.commission_type, config.base_rate, quantity, execution_price);
        let tier_multiplier = config.tier_multiplier(tier);

        let mut total = base * tier_multiplier;
        if let Some(min) = config.min_commission {
            total = total.max(min);
        }
        if let Some(max) = config.max_commission {
            total = total.min(max);
        }
        let total = round_dp(total, 2);

        tracing::debug!(
            symbol,
            %asset_class,
            side = %side,
            ?tier,
            %total,
            "commission computed"
        );

        Ok(CommissionResult {
            base_commission: Quote::new(base),
            tier_multiplier,
            total_commission: Quote::new(total),
            commission_type: config.commission_type,
        })
    }
}
