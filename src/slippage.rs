//! Slippage model.
//!
//! Estimates how far a fill lands from the quoted price. Slippage is measured in
//! price steps (pips for forex, cents for equities) and always moves the fill
//! against the trader: buys fill higher, sells fill lower.
//!
//! The base component is drawn from a seeded linear congruential generator so a
//! run can be replayed exactly from its seed. Volatility, order size and
//! after-hours multipliers stack on top, capped at twice the asset's max slippage.

use chrono::Utc;
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::EngineError;
use crate::market::{LiquidityTier, MarketConditions, MarketSnapshot, TradingSession};
use crate::types::{round_dp, Price, Side};

const HIGH_VOLATILITY_EVENT_FACTOR: Decimal = dec!(1.5);
const LOW_LIQUIDITY_FACTOR: Decimal = dec!(2);
const CEILING_FACTOR: Decimal = dec!(2);
const PRICE_DECIMALS: u32 = 8;

/// Per-symbol slippage parameters. Spread and bounds are in price steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSlippageConfig {
    pub base_spread: Decimal,
    pub min_slippage: Decimal,
    pub max_slippage: Decimal,
    pub volatility_multiplier: Decimal,
    pub price_step: Decimal,
    pub liquidity_tier: LiquidityTier,
    pub after_hours_penalty: Decimal,
    pub session: TradingSession,
}

impl AssetSlippageConfig {
    /// Hard cap on total slippage in price steps.
    pub fn ceiling(&self) -> Decimal {
        self.max_slippage * CEILING_FACTOR
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlippageTable {
    pub assets: HashMap<String, AssetSlippageConfig>,
}

impl SlippageTable {
    pub fn empty() -> Self {
        Self {
            assets: HashMap::new(),
        }
    }

    pub fn with_asset(mut self, symbol: impl Into<String>, config: AssetSlippageConfig) -> Self {
        self.assets.insert(symbol.into(), config);
        self
    }

    pub fn get(&self, symbol: &str) -> Option<&AssetSlippageConfig> {
        self.assets.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

#[allow(clippy::too_many_arguments)]
fn asset(
    base_spread: Decimal,
    min_slippage: Decimal,
    max_slippage: Decimal,
    volatility_multiplier: Decimal,
    price_step: Decimal,
    liquidity_tier: LiquidityTier,
    after_hours_penalty: Decimal,
    session: TradingSession,
) -> AssetSlippageConfig {
    AssetSlippageConfig {
        base_spread,
        min_slippage,
        max_slippage,
        volatility_multiplier,
        price_step,
        liquidity_tier,
        after_hours_penalty,
        session,
    }
}

impl Default for SlippageTable {
    fn default() -> Self {
        use LiquidityTier::*;
        use TradingSession::*;

        Self::empty()
            // forex majors, in pips
            .with_asset("EURUSD", asset(dec!(0.8), dec!(0.5), dec!(3), dec!(1.2), dec!(0.0001), VeryHigh, dec!(1.5), Forex))
            .with_asset("GBPUSD", asset(dec!(1.2), dec!(0.8), dec!(4), dec!(1.3), dec!(0.0001), VeryHigh, dec!(1.5), Forex))
            .with_asset("USDJPY", asset(dec!(0.9), dec!(0.5), dec!(3.5), dec!(1.2), dec!(0.01), VeryHigh, dec!(1.5), Forex))
            .with_asset("XAUUSD", asset(dec!(3), dec!(2), dec!(15), dec!(1.4), dec!(0.01), High, dec!(1.8), Forex))
            // us equities, in cents
            .with_asset("AAPL", asset(dec!(1), dec!(1), dec!(5), dec!(1.1), dec!(0.01), High, dec!(2), UsEquities))
            .with_asset("MSFT", asset(dec!(1), dec!(1), dec!(5), dec!(1.1), dec!(0.01), High, dec!(2), UsEquities))
            .with_asset("TSLA", asset(dec!(2), dec!(1), dec!(10), dec!(1.8), dec!(0.01), High, dec!(2.5), UsEquities))
            // crypto, in whole units of quote
            .with_asset("BTCUSD", asset(dec!(5), dec!(2), dec!(25), dec!(2), dec!(1), High, dec!(1), AlwaysOpen))
            .with_asset("ETHUSD", asset(dec!(0.5), dec!(0.2), dec!(3), dec!(2), dec!(0.1), Medium, dec!(1), AlwaysOpen))
            .with_asset("SOLUSD", asset(dec!(2), dec!(1), dec!(12), dec!(2.5), dec!(0.01), Low, dec!(1), AlwaysOpen))
    }
}

/// Seedable 32-bit linear congruential generator. One instance per evaluation
/// thread; never shared, so concurrent evaluations cannot disturb each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeededRng {
    state: u32,
}

impl SeededRng {
    const MULTIPLIER: u32 = 1_664_525;
    const INCREMENT: u32 = 1_013_904_223;

    pub fn new(seed: u64) -> Self {
        Self {
            state: (seed as u32) ^ ((seed >> 32) as u32),
        }
    }

    pub fn from_clock() -> Self {
        let now = Utc::now();
        let seed = (now.timestamp() as u64) << 32 | u64::from(now.timestamp_subsec_nanos());
        Self::new(seed)
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT);
        self.state
    }

    /// Uniform in [0, 1).
    pub fn next_decimal(&mut self) -> Decimal {
        Decimal::from(self.next_u32()) / Decimal::from(1u64 << 32)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlippageResult {
    pub base_slippage: Decimal,
    pub volatility_multiplier: Decimal,
    pub size_multiplier: Decimal,
    pub after_hours_penalty: Decimal,
    /// In price steps.
    pub total_slippage: Decimal,
    pub execution_price: Price,
    /// Absolute distance between quote and fill.
    pub slippage_in_price: Decimal,
}

/// Moves `price` against the trader by `distance`.
pub fn apply_slippage(price: Decimal, side: Side, distance: Decimal) -> Decimal {
    round_dp(price + side.sign() * distance, PRICE_DECIMALS)
}

#[derive(Debug, Clone)]
pub struct SlippageModel {
    table: SlippageTable,
}

impl SlippageModel {
    pub fn new(table: SlippageTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &SlippageTable {
        &self.table
    }

    pub fn config(&self, symbol: &str) -> Result<&AssetSlippageConfig, EngineError> {
        self.table
            .get(symbol)
            .ok_or_else(|| EngineError::UnsupportedAsset {
                symbol: symbol.to_string(),
            })
    }

    /// Derive conditions for `snapshot` using the symbol's trading session.
    pub fn conditions_for(
        &self,
        snapshot: &MarketSnapshot,
        average_volatility: Decimal,
        average_daily_volume: Decimal,
    ) -> Result<MarketConditions, EngineError> {
        let config = self.config(&snapshot.symbol)?;
        Ok(MarketConditions::from_snapshot(
            snapshot,
            config.session,
            average_volatility,
            average_daily_volume,
        ))
    }

    /// Seeded entry point. `None` seeds from the clock, which gives up replay.
    pub fn calculate_slippage(
        &self,
        symbol: &str,
        market_price: Decimal,
        order_quantity: Decimal,
        side: Side,
        conditions: &MarketConditions,
        seed: Option<u64>,
    ) -> Result<SlippageResult, EngineError> {
        let mut rng = match seed {
            Some(seed) => SeededRng::new(seed),
            None => SeededRng::from_clock(),
        };
        self.calculate_slippage_with_rng(symbol, market_price, order_quantity, side, conditions, &mut rng)
    }

    pub fn calculate_slippage_with_rng(
        &self,
        symbol: &str,
        market_price: Decimal,
        order_quantity: Decimal,
        side: Side,
        conditions: &MarketConditions,
        rng: &mut SeededRng,
    ) -> Result<SlippageResult, EngineError> {
        self.compute(symbol, market_price, order_quantity, side, conditions, rng, Decimal::ONE)
    }

    /// Normal slippage scaled by `factor` after the ceiling. Used for forced closures.
    #[allow(clippy::too_many_arguments)]
    pub fn calculate_worst_case(
        &self,
        symbol: &str,
        market_price: Decimal,
        order_quantity: Decimal,
        side: Side,
        conditions: &MarketConditions,
        factor: Decimal,
        rng: &mut SeededRng,
    ) -> Result<SlippageResult, EngineError> {
        if factor < Decimal::ONE {
            return Err(EngineError::invalid("worst_case_factor", "must be at least 1"));
        }
        self.compute(symbol, market_price, order_quantity, side, conditions, rng, factor)
    }

    #[allow(clippy::too_many_arguments)]
    fn compute(
        &self,
        symbol: &str,
        market_price: Decimal,
        order_quantity: Decimal,
        side: Side,
        conditions: &MarketConditions,
        rng: &mut SeededRng,
        factor: Decimal,
    ) -> Result<SlippageResult, EngineError> {
        let config = self.config(symbol)?;

        if market_price <= Decimal::ZERO {
            return Err(EngineError::invalid("market_price", "must be positive"));
        }
        if order_quantity <= Decimal::ZERO {
            return Err(EngineError::invalid("order_quantity", "must be positive"));
        }
        conditions.validate()?;

        let volatility_multiplier = volatility_multiplier(config, conditions);
        let size_multiplier = size_multiplier(config, order_quantity, conditions);
        let base_slippage = draw_base_slippage(config, rng);
        let after_hours_penalty = if conditions.is_after_hours {
            config.after_hours_penalty
        } else {
            Decimal::ONE
        };

        let ceiling = config.ceiling();
        // overflow only happens far past the ceiling
        let capped = base_slippage
            .checked_mul(volatility_multiplier)
            .and_then(|v| v.checked_mul(size_multiplier))
            .and_then(|v| v.checked_mul(after_hours_penalty))
            .map_or(ceiling, |raw| raw.min(ceiling));
        let total_slippage = capped * factor;

        let slippage_in_price = round_dp(total_slippage * config.price_step, PRICE_DECIMALS);
        let execution_price = Price::new(apply_slippage(market_price, side, slippage_in_price))
            .ok_or_else(|| EngineError::invalid("market_price", "slippage exceeds quoted price"))?;

        tracing::debug!(
            symbol,
            side = %side,
            %market_price,
            %total_slippage,
            %execution_price,
            "slippage computed"
        );

        Ok(SlippageResult {
            base_slippage,
            volatility_multiplier,
            size_multiplier,
            after_hours_penalty,
            total_slippage,
            execution_price,
            slippage_in_price,
        })
    }
}

fn volatility_multiplier(config: &AssetSlippageConfig, conditions: &MarketConditions) -> Decimal {
    let event = if conditions.is_high_volatility_event {
        HIGH_VOLATILITY_EVENT_FACTOR
    } else {
        Decimal::ONE
    };
    // saturates; compute caps the product at the ceiling
    conditions
        .current_volatility
        .checked_div(conditions.average_volatility)
        .and_then(|ratio| ratio.checked_mul(config.volatility_multiplier))
        .and_then(|v| v.checked_mul(event))
        .unwrap_or(Decimal::MAX)
        .max(Decimal::ONE)
}

// (size% / base)^1.5, doubled when liquidity is thin
fn size_multiplier(
    config: &AssetSlippageConfig,
    order_quantity: Decimal,
    conditions: &MarketConditions,
) -> Decimal {
    let liquidity = if conditions.is_low_liquidity {
        LOW_LIQUIDITY_FACTOR
    } else {
        Decimal::ONE
    };

    let scaled = order_quantity
        .checked_div(conditions.average_daily_volume)
        .and_then(|share| share.checked_mul(dec!(100)))
        .and_then(|pct| pct.checked_div(config.liquidity_tier.liquidity_base()))
        .and_then(|ratio| ratio.sqrt().and_then(|root| ratio.checked_mul(root)))
        .and_then(|pow| pow.checked_mul(liquidity))
        .unwrap_or(Decimal::MAX);
    scaled.max(Decimal::ONE)
}

fn draw_base_slippage(config: &AssetSlippageConfig, rng: &mut SeededRng) -> Decimal {
    if rng.next_decimal() < dec!(0.5) {
        config.base_spread
    } else {
        let span = config.max_slippage - config.min_slippage;
        config.min_slippage + rng.next_decimal() * span
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> SlippageModel {
        SlippageModel::new(SlippageTable::default())
    }

    fn calm() -> MarketConditions {
        MarketConditions::normal(dec!(10), dec!(1_000_000))
    }

    #[test]
    fn unknown_symbol_is_unsupported() {
        let result = model().calculate_slippage("DOGEUSD", dec!(1), dec!(1), Side::Buy, &calm(), Some(1));
        assert!(matches!(result, Err(EngineError::UnsupportedAsset { .. })));
    }

    #[test]
    fn non_positive_inputs_rejected() {
        let m = model();
        let price = m.calculate_slippage("EURUSD", dec!(0), dec!(1000), Side::Buy, &calm(), Some(1));
        assert!(matches!(price, Err(EngineError::InvalidInput { field: "market_price", .. })));

        let qty = m.calculate_slippage("EURUSD", dec!(1.085), dec!(-5), Side::Buy, &calm(), Some(1));
        assert!(matches!(qty, Err(EngineError::InvalidInput { field: "order_quantity", .. })));
    }

    #[test]
    fn same_seed_same_result() {
        let m = model();
        let a = m.calculate_slippage("TSLA", dec!(250), dec!(500), Side::Sell, &calm(), Some(42)).unwrap();
        let b = m.calculate_slippage("TSLA", dec!(250), dec!(500), Side::Sell, &calm(), Some(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn buy_fills_higher_sell_fills_lower() {
        let m = model();
        let buy = m.calculate_slippage("EURUSD", dec!(1.085), dec!(10_000), Side::Buy, &calm(), Some(7)).unwrap();
        let sell = m.calculate_slippage("EURUSD", dec!(1.085), dec!(10_000), Side::Sell, &calm(), Some(7)).unwrap();
        assert!(buy.execution_price.value() > dec!(1.085));
        assert!(sell.execution_price.value() < dec!(1.085));
        assert_eq!(buy.slippage_in_price, sell.slippage_in_price);
    }

    #[test]
    fn calm_small_order_has_unit_multipliers() {
        let result = model()
            .calculate_slippage("AAPL", dec!(150), dec!(100), Side::Buy, &MarketConditions::normal(dec!(20), dec!(50_000_000)), Some(3))
            .unwrap();
        // asset multiplier 1.1 at average vol
        assert_eq!(result.volatility_multiplier, dec!(1.1));
        assert_eq!(result.size_multiplier, Decimal::ONE);
        assert_eq!(result.after_hours_penalty, Decimal::ONE);
    }

    #[test]
    fn size_multiplier_follows_power_curve() {
        // EURUSD very high tier base 10%. order at 40% of ADV → (4)^1.5 = 8
        let conditions = MarketConditions::normal(dec!(10), dec!(1000));
        let result = model()
            .calculate_slippage("EURUSD", dec!(1.085), dec!(400), Side::Buy, &conditions, Some(9))
            .unwrap();
        assert_eq!(result.size_multiplier.round_dp(10), dec!(8));
    }

    #[test]
    fn extreme_conditions_hit_ceiling() {
        let conditions = MarketConditions {
            current_volatility: dec!(200),
            average_volatility: dec!(10),
            average_daily_volume: dec!(100),
            is_high_volatility_event: true,
            is_low_liquidity: true,
            is_after_hours: true,
        };
        let result = model()
            .calculate_slippage("GBPUSD", dec!(1.27), dec!(10_000), Side::Buy, &conditions, Some(11))
            .unwrap();
        assert_eq!(result.total_slippage, dec!(8)); // 2 * max 4
        assert_eq!(result.execution_price.value(), dec!(1.2708));
    }

    #[test]
    fn overflowing_inputs_saturate_to_ceiling() {
        let m = model();
        let wild_volatility = MarketConditions {
            current_volatility: Decimal::MAX,
            average_volatility: Decimal::ONE,
            ..calm()
        };
        let result = m
            .calculate_slippage("AAPL", dec!(150), dec!(100), Side::Buy, &wild_volatility, Some(2))
            .unwrap();
        assert_eq!(result.total_slippage, m.config("AAPL").unwrap().ceiling());

        let thin_book = MarketConditions {
            average_daily_volume: dec!(0.0001),
            ..calm()
        };
        let huge = Decimal::from_i128_with_scale(10i128.pow(26), 0);
        let result = m
            .calculate_slippage("AAPL", dec!(150), huge, Side::Sell, &thin_book, Some(2))
            .unwrap();
        assert_eq!(result.size_multiplier, Decimal::MAX);
        assert_eq!(result.total_slippage, m.config("AAPL").unwrap().ceiling());
    }

    #[test]
    fn after_hours_penalty_applied() {
        let mut conditions = calm();
        conditions.is_after_hours = true;
        let result = model()
            .calculate_slippage("AAPL", dec!(150), dec!(10), Side::Buy, &conditions, Some(5))
            .unwrap();
        assert_eq!(result.after_hours_penalty, dec!(2));
    }

    #[test]
    fn worst_case_scales_total() {
        let m = model();
        let normal = m
            .calculate_slippage_with_rng("BTCUSD", dec!(60000), dec!(1), Side::Sell, &calm(), &mut SeededRng::new(77))
            .unwrap();
        let worst = m
            .calculate_worst_case("BTCUSD", dec!(60000), dec!(1), Side::Sell, &calm(), dec!(1.5), &mut SeededRng::new(77))
            .unwrap();
        assert_eq!(worst.total_slippage, normal.total_slippage * dec!(1.5));
        assert!(worst.execution_price < normal.execution_price);
    }

    #[test]
    fn rng_is_uniform_unit_interval() {
        let mut rng = SeededRng::new(123);
        for _ in 0..1000 {
            let x = rng.next_decimal();
            assert!(x >= Decimal::ZERO && x < Decimal::ONE);
        }
    }

    #[test]
    fn rng_known_sequence() {
        let mut rng = SeededRng::new(0);
        assert_eq!(rng.next_u32(), 1_013_904_223);
        assert_eq!(rng.next_u32(), 1_196_435_762);
    }

    #[test]
    fn base_slippage_within_configured_range() {
        let m = model();
        let config = m.config("EURUSD").unwrap().clone();
        for seed in 0..200 {
            let r = m.calculate_slippage("EURUSD", dec!(1.1), dec!(1), Side::Buy, &calm(), Some(seed)).unwrap();
            let in_range = r.base_slippage >= config.min_slippage && r.base_slippage <= config.max_slippage;
            assert!(r.base_slippage == config.base_spread || in_range);
        }
    }
}
