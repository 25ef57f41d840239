// 2.0 market.rs: immutable market inputs. a snapshot is the quote the caller froze for one
// evaluation; conditions are the derived facts the slippage model multiplies against.

use chrono::{Datelike, Timelike, Weekday};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::{Price, Timestamp};

// current vol at or above this multiple of average counts as a high volatility event
const HIGH_VOLATILITY_EVENT_RATIO: Decimal = dec!(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidityTier {
    VeryHigh,
    High,
    Medium,
    Low,
}

impl LiquidityTier {
    /// Order size (as % of average daily volume) the tier absorbs before size impact kicks in.
    pub fn liquidity_base(&self) -> Decimal {
        match self {
            LiquidityTier::VeryHigh => dec!(10),
            LiquidityTier::High => dec!(5),
            LiquidityTier::Medium => dec!(2),
            LiquidityTier::Low => dec!(0.5),
        }
    }
}

/// A frozen quote for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub current_price: Price,
    pub bid: Price,
    pub ask: Price,
    /// Annualized volatility in percent.
    pub volatility: Decimal,
    pub liquidity_tier: LiquidityTier,
    pub timestamp: Timestamp,
}

impl MarketSnapshot {
    pub fn new(
        symbol: impl Into<String>,
        current_price: Price,
        bid: Price,
        ask: Price,
        volatility: Decimal,
        liquidity_tier: LiquidityTier,
        timestamp: Timestamp,
    ) -> Result<Self, EngineError> {
        if volatility < Decimal::ZERO {
            return Err(EngineError::invalid("volatility", "must not be negative"));
        }
        Ok(Self {
            symbol: symbol.into(),
            current_price,
            bid,
            ask,
            volatility,
            liquidity_tier,
            timestamp,
        })
    }

    pub fn mid(&self) -> Decimal {
        (self.bid.value() + self.ask.value()) / dec!(2)
    }

    pub fn spread(&self) -> Decimal {
        self.ask.value() - self.bid.value()
    }

    /// Spread as a percentage of mid.
    pub fn spread_pct(&self) -> Decimal {
        self.spread() / self.mid() * dec!(100)
    }
}

/// When an asset trades at regular liquidity. Times are UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradingSession {
    AlwaysOpen,
    // 14:30-21:00 UTC weekdays
    UsEquities,
    // closed Fri 22:00 to Sun 22:00 UTC
    Forex,
}

impl TradingSession {
    pub fn is_after_hours(&self, at: Timestamp) -> bool {
        let Some(dt) = at.to_datetime() else {
            return false;
        };
        let minute_of_day = dt.hour() * 60 + dt.minute();

        match self {
            TradingSession::AlwaysOpen => false,
            TradingSession::UsEquities => {
                let weekend = matches!(dt.weekday(), Weekday::Sat | Weekday::Sun);
                weekend || !(14 * 60 + 30..21 * 60).contains(&minute_of_day)
            }
            TradingSession::Forex => match dt.weekday() {
                Weekday::Fri => minute_of_day >= 22 * 60,
                Weekday::Sat => true,
                Weekday::Sun => minute_of_day < 22 * 60,
                _ => false,
            },
        }
    }
}

/// Inputs to the slippage multipliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConditions {
    pub current_volatility: Decimal,
    pub average_volatility: Decimal,
    /// Denominator for order size percentage, in units of the asset.
    pub average_daily_volume: Decimal,
    pub is_high_volatility_event: bool,
    pub is_low_liquidity: bool,
    pub is_after_hours: bool,
}

impl MarketConditions {
    /// Calm, regular-hours conditions at the average volatility.
    pub fn normal(average_volatility: Decimal, average_daily_volume: Decimal) -> Self {
        Self {
            current_volatility: average_volatility,
            average_volatility,
            average_daily_volume,
            is_high_volatility_event: false,
            is_low_liquidity: false,
            is_after_hours: false,
        }
    }

    pub fn from_snapshot(
        snapshot: &MarketSnapshot,
        session: TradingSession,
        average_volatility: Decimal,
        average_daily_volume: Decimal,
    ) -> Self {
        let is_high_volatility_event = average_volatility > Decimal::ZERO
            && snapshot.volatility >= average_volatility * HIGH_VOLATILITY_EVENT_RATIO;

        Self {
            current_volatility: snapshot.volatility,
            average_volatility,
            average_daily_volume,
            is_high_volatility_event,
            is_low_liquidity: snapshot.liquidity_tier == LiquidityTier::Low,
            is_after_hours: session.is_after_hours(snapshot.timestamp),
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.current_volatility < Decimal::ZERO {
            return Err(EngineError::invalid(
                "current_volatility",
                "must not be negative",
            ));
        }
        if self.average_volatility <= Decimal::ZERO {
            return Err(EngineError::invalid("average_volatility", "must be positive"));
        }
        if self.average_daily_volume <= Decimal::ZERO {
            return Err(EngineError::invalid(
                "average_daily_volume",
                "must be positive",
            ));
        }
        Ok(())
    }
}

/// Snapshot plus conditions for one symbol, as handed to liquidation pricing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedMarket {
    pub snapshot: MarketSnapshot,
    pub conditions: MarketConditions,
}

impl PricedMarket {
    pub fn new(snapshot: MarketSnapshot, conditions: MarketConditions) -> Self {
        Self { snapshot, conditions }
    }

    pub fn symbol(&self) -> &str {
        &self.snapshot.symbol
    }
}
