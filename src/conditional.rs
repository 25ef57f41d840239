//! Order condition evaluation.
//!
//! Decides whether a pending order fires against one market tick. Evaluation is
//! pure: the caller supplies the current price, the previous tick, and for
//! trailing stops the running high/low since the order was opened.
//!
//! Stop-style orders are edge-triggered. They fire only on the tick where the
//! level is newly crossed, so a price that sits past the level does not re-fire
//! the order on every update.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::{Price, Side};

/// Order type together with the prices that type needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "order_type", rename_all = "snake_case")]
pub enum OrderKind {
    Market,
    Limit { limit_price: Price },
    Stop { stop_price: Price },
    StopLimit { stop_price: Price, limit_price: Price },
    TrailingStop { trailing_amount: Decimal },
}

impl OrderKind {
    pub fn name(&self) -> &'static str {
        match self {
            OrderKind::Market => "market",
            OrderKind::Limit { .. } => "limit",
            OrderKind::Stop { .. } => "stop",
            OrderKind::StopLimit { .. } => "stop_limit",
            OrderKind::TrailingStop { .. } => "trailing_stop",
        }
    }
}

/// One pending instruction. Never mutated by evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawOrderCondition")]
pub struct OrderCondition {
    pub side: Side,
    pub quantity: Decimal,
    pub kind: OrderKind,
}

// wire shape, checked through OrderCondition::new on the way in
#[derive(Deserialize)]
struct RawOrderCondition {
    side: Side,
    quantity: Decimal,
    kind: OrderKind,
}

impl TryFrom<RawOrderCondition> for OrderCondition {
    type Error = EngineError;

    fn try_from(raw: RawOrderCondition) -> Result<Self, Self::Error> {
        Self::new(raw.side, raw.quantity, raw.kind)
    }
}

impl OrderCondition {
    pub fn new(side: Side, quantity: Decimal, kind: OrderKind) -> Result<Self, EngineError> {
        let order = Self { side, quantity, kind };
        order.validate()?;
        Ok(order)
    }

    /// Positive quantity, positive trail. Fields are public, so the order path checks again.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.quantity <= Decimal::ZERO {
            return Err(EngineError::invalid("quantity", "must be positive"));
        }
        if let OrderKind::TrailingStop { trailing_amount } = self.kind {
            if trailing_amount <= Decimal::ZERO {
                return Err(EngineError::invalid("trailing_amount", "must be positive"));
            }
        }
        Ok(())
    }

    pub fn market(side: Side, quantity: Decimal) -> Result<Self, EngineError> {
        Self::new(side, quantity, OrderKind::Market)
    }

    pub fn limit(side: Side, quantity: Decimal, limit_price: Price) -> Result<Self, EngineError> {
        Self::new(side, quantity, OrderKind::Limit { limit_price })
    }

    pub fn stop(side: Side, quantity: Decimal, stop_price: Price) -> Result<Self, EngineError> {
        Self::new(side, quantity, OrderKind::Stop { stop_price })
    }

    pub fn stop_limit(
        side: Side,
        quantity: Decimal,
        stop_price: Price,
        limit_price: Price,
    ) -> Result<Self, EngineError> {
        Self::new(side, quantity, OrderKind::StopLimit { stop_price, limit_price })
    }

    pub fn trailing_stop(
        side: Side,
        quantity: Decimal,
        trailing_amount: Decimal,
    ) -> Result<Self, EngineError> {
        Self::new(side, quantity, OrderKind::TrailingStop { trailing_amount })
    }
}

/// Price facts for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceContext {
    pub current_price: Price,
    pub previous_price: Option<Price>,
    pub highest_since_open: Option<Price>,
    pub lowest_since_open: Option<Price>,
}

impl PriceContext {
    pub fn tick(current_price: Price, previous_price: Option<Price>) -> Self {
        Self {
            current_price,
            previous_price,
            highest_since_open: None,
            lowest_since_open: None,
        }
    }

    pub fn with_extremes(mut self, highest: Price, lowest: Price) -> Self {
        self.highest_since_open = Some(highest);
        self.lowest_since_open = Some(lowest);
        self
    }

    /// Builds the context from every tick seen since the order opened, oldest first.
    pub fn from_history(prices: &[Price]) -> Option<Self> {
        let (&current, earlier) = prices.split_last()?;
        let highest = prices.iter().copied().max()?;
        let lowest = prices.iter().copied().min()?;
        Some(Self::tick(current, earlier.last().copied()).with_extremes(highest, lowest))
    }
}

/// Machine-readable outcome tag for the caller's logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    MarketOrder,
    LimitReached,
    LimitNotReached,
    StopTriggered,
    StopNotTriggered,
    StopLimitFilled,
    StopTriggeredLimitNotReached,
    TrailingStopTriggered,
    TrailingStopNotTriggered,
    NoPreviousPrice,
    NoReferencePrice,
}

impl MatchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchReason::MarketOrder => "market_order",
            MatchReason::LimitReached => "limit_reached",
            MatchReason::LimitNotReached => "limit_not_reached",
            MatchReason::StopTriggered => "stop_triggered",
            MatchReason::StopNotTriggered => "stop_not_triggered",
            MatchReason::StopLimitFilled => "stop_limit_filled",
            MatchReason::StopTriggeredLimitNotReached => "stop_triggered_limit_not_reached",
            MatchReason::TrailingStopTriggered => "trailing_stop_triggered",
            MatchReason::TrailingStopNotTriggered => "trailing_stop_not_triggered",
            MatchReason::NoPreviousPrice => "no_previous_price",
            MatchReason::NoReferencePrice => "no_reference_price",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionResult {
    pub matched: bool,
    /// Set when the fill price is fixed by the order itself (limit prices).
    pub execution_price: Option<Price>,
    pub should_trigger: bool,
    pub reason: MatchReason,
}

impl ConditionResult {
    fn waiting(reason: MatchReason) -> Self {
        Self {
            matched: false,
            execution_price: None,
            should_trigger: false,
            reason,
        }
    }

    fn market_fill(should_trigger: bool, reason: MatchReason) -> Self {
        Self {
            matched: true,
            execution_price: None,
            should_trigger,
            reason,
        }
    }

    fn limit_fill(price: Price, should_trigger: bool, reason: MatchReason) -> Self {
        Self {
            matched: true,
            execution_price: Some(price),
            should_trigger,
            reason,
        }
    }

    /// Matched without a fixed price, so the fill goes through the slippage model.
    pub fn needs_market_fill(&self) -> bool {
        self.matched && self.execution_price.is_none()
    }
}

// edge triggers: previous tick on the near side, current tick at or past the level
fn crossed_up(level: Decimal, current: Decimal, previous: Decimal) -> bool {
    current >= level && previous < level
}

fn crossed_down(level: Decimal, current: Decimal, previous: Decimal) -> bool {
    current <= level && previous > level
}

fn limit_reached(side: Side, current: Price, limit: Price) -> bool {
    match side {
        Side::Buy => current <= limit,
        Side::Sell => current >= limit,
    }
}

fn stop_crossed(side: Side, stop: Price, current: Price, previous: Price) -> bool {
    match side {
        Side::Buy => crossed_up(stop.value(), current.value(), previous.value()),
        Side::Sell => crossed_down(stop.value(), current.value(), previous.value()),
    }
}

pub fn evaluate_condition(order: &OrderCondition, ctx: &PriceContext) -> ConditionResult {
    let current = ctx.current_price;

    match order.kind {
        OrderKind::Market => ConditionResult::market_fill(false, MatchReason::MarketOrder),

        OrderKind::Limit { limit_price } => {
            if limit_reached(order.side, current, limit_price) {
                ConditionResult::limit_fill(limit_price, false, MatchReason::LimitReached)
            } else {
                ConditionResult::waiting(MatchReason::LimitNotReached)
            }
        }

        OrderKind::Stop { stop_price } => {
            let Some(previous) = ctx.previous_price else {
                return ConditionResult::waiting(MatchReason::NoPreviousPrice);
            };
            if stop_crossed(order.side, stop_price, current, previous) {
                ConditionResult::market_fill(true, MatchReason::StopTriggered)
            } else {
                ConditionResult::waiting(MatchReason::StopNotTriggered)
            }
        }

        OrderKind::StopLimit { stop_price, limit_price } => {
            let Some(previous) = ctx.previous_price else {
                return ConditionResult::waiting(MatchReason::NoPreviousPrice);
            };
            if !stop_crossed(order.side, stop_price, current, previous) {
                return ConditionResult::waiting(MatchReason::StopNotTriggered);
            }
            // limit checked against the same tick that crossed the stop
            if limit_reached(order.side, current, limit_price) {
                ConditionResult::limit_fill(limit_price, true, MatchReason::StopLimitFilled)
            } else {
                ConditionResult {
                    matched: false,
                    execution_price: None,
                    should_trigger: true,
                    reason: MatchReason::StopTriggeredLimitNotReached,
                }
            }
        }

        OrderKind::TrailingStop { trailing_amount } => {
            let Some(previous) = ctx.previous_price else {
                return ConditionResult::waiting(MatchReason::NoPreviousPrice);
            };
            let triggered = match order.side {
                Side::Buy => ctx.highest_since_open.map(|high| {
                    crossed_down(high.value() - trailing_amount, current.value(), previous.value())
                }),
                Side::Sell => ctx.lowest_since_open.map(|low| {
                    crossed_up(low.value() + trailing_amount, current.value(), previous.value())
                }),
            };
            match triggered {
                None => ConditionResult::waiting(MatchReason::NoReferencePrice),
                Some(true) => ConditionResult::market_fill(true, MatchReason::TrailingStopTriggered),
                Some(false) => ConditionResult::waiting(MatchReason::TrailingStopNotTriggered),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn p(v: Decimal) -> Price {
        Price::new_unchecked(v)
    }

    #[test]
    fn market_always_matches_without_price() {
        let order = OrderCondition::market(Side::Buy, dec!(1)).unwrap();
        let result = evaluate_condition(&order, &PriceContext::tick(p(dec!(100)), None));
        assert!(result.matched);
        assert!(result.needs_market_fill());
        assert_eq!(result.reason.as_str(), "market_order");
    }

    #[test]
    fn buy_limit_fills_at_limit() {
        let order = OrderCondition::limit(Side::Buy, dec!(1), p(dec!(100))).unwrap();

        let below = evaluate_condition(&order, &PriceContext::tick(p(dec!(99.5)), None));
        assert!(below.matched);
        assert_eq!(below.execution_price, Some(p(dec!(100))));

        let at = evaluate_condition(&order, &PriceContext::tick(p(dec!(100)), None));
        assert!(at.matched);

        let above = evaluate_condition(&order, &PriceContext::tick(p(dec!(100.5)), None));
        assert!(!above.matched);
        assert_eq!(above.reason, MatchReason::LimitNotReached);
    }

    #[test]
    fn sell_limit_needs_price_at_or_above() {
        let order = OrderCondition::limit(Side::Sell, dec!(1), p(dec!(100))).unwrap();
        assert!(evaluate_condition(&order, &PriceContext::tick(p(dec!(100.1)), None)).matched);
        assert!(!evaluate_condition(&order, &PriceContext::tick(p(dec!(99.9)), None)).matched);
    }

    #[test]
    fn buy_stop_is_edge_triggered() {
        let order = OrderCondition::stop(Side::Buy, dec!(10000), p(dec!(1.0850))).unwrap();

        let first = evaluate_condition(&order, &PriceContext::tick(p(dec!(1.0850)), Some(p(dec!(1.0840)))));
        assert!(first.matched);
        assert!(first.should_trigger);
        assert!(first.needs_market_fill());

        let second = evaluate_condition(&order, &PriceContext::tick(p(dec!(1.0855)), Some(p(dec!(1.0850)))));
        assert!(!second.matched);
        assert!(!second.should_trigger);
        assert_eq!(second.reason, MatchReason::StopNotTriggered);
    }

    #[test]
    fn sell_stop_mirrors() {
        let order = OrderCondition::stop(Side::Sell, dec!(1), p(dec!(95))).unwrap();
        let hit = evaluate_condition(&order, &PriceContext::tick(p(dec!(94)), Some(p(dec!(96)))));
        assert!(hit.should_trigger);
        let stay = evaluate_condition(&order, &PriceContext::tick(p(dec!(93)), Some(p(dec!(94)))));
        assert!(!stay.should_trigger);
    }

    #[test]
    fn stop_without_previous_tick_waits() {
        let order = OrderCondition::stop(Side::Buy, dec!(1), p(dec!(100))).unwrap();
        let result = evaluate_condition(&order, &PriceContext::tick(p(dec!(101)), None));
        assert!(!result.matched);
        assert_eq!(result.reason, MatchReason::NoPreviousPrice);
    }

    #[test]
    fn stop_limit_checks_limit_on_trigger_tick() {
        let order = OrderCondition::stop_limit(Side::Buy, dec!(1), p(dec!(100)), p(dec!(100.5))).unwrap();

        let filled = evaluate_condition(&order, &PriceContext::tick(p(dec!(100.2)), Some(p(dec!(99.8)))));
        assert!(filled.matched);
        assert_eq!(filled.execution_price, Some(p(dec!(100.5))));

        // gapped through the limit on the trigger tick
        let gapped = evaluate_condition(&order, &PriceContext::tick(p(dec!(101)), Some(p(dec!(99.8)))));
        assert!(!gapped.matched);
        assert!(gapped.should_trigger);
        assert_eq!(gapped.reason, MatchReason::StopTriggeredLimitNotReached);
    }

    #[test]
    fn buy_trailing_stop_fires_on_pullback_from_high() {
        let order = OrderCondition::trailing_stop(Side::Buy, dec!(1), dec!(5)).unwrap();
        let history = [p(dec!(100)), p(dec!(110)), p(dec!(106)), p(dec!(104))];
        let ctx = PriceContext::from_history(&history).unwrap();
        // high 110, trigger 105, previous 106 → current 104 crosses
        let result = evaluate_condition(&order, &ctx);
        assert!(result.should_trigger);
        assert_eq!(result.reason, MatchReason::TrailingStopTriggered);

        let next = PriceContext::tick(p(dec!(103)), Some(p(dec!(104)))).with_extremes(p(dec!(110)), p(dec!(100)));
        assert!(!evaluate_condition(&order, &next).should_trigger);
    }

    #[test]
    fn sell_trailing_stop_fires_on_bounce_from_low() {
        let order = OrderCondition::trailing_stop(Side::Sell, dec!(1), dec!(2)).unwrap();
        let ctx = PriceContext::tick(p(dec!(52)), Some(p(dec!(51)))).with_extremes(p(dec!(60)), p(dec!(50)));
        assert!(evaluate_condition(&order, &ctx).should_trigger);
    }

    #[test]
    fn trailing_stop_without_extremes_waits() {
        let order = OrderCondition::trailing_stop(Side::Buy, dec!(1), dec!(2)).unwrap();
        let ctx = PriceContext::tick(p(dec!(52)), Some(p(dec!(51))));
        assert_eq!(evaluate_condition(&order, &ctx).reason, MatchReason::NoReferencePrice);
    }

    #[test]
    fn invalid_orders_rejected() {
        assert!(OrderCondition::market(Side::Buy, dec!(0)).is_err());
        assert!(OrderCondition::trailing_stop(Side::Buy, dec!(1), dec!(0)).is_err());
    }

    #[test]
    fn deserialized_orders_are_checked() {
        let order = OrderCondition::trailing_stop(Side::Sell, dec!(5), dec!(2)).unwrap();
        let json = serde_json::to_string(&order).unwrap();
        let back: OrderCondition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, order);

        let zero_qty = r#"{ "side": "buy", "quantity": "0", "kind": { "order_type": "market" } }"#;
        let err = serde_json::from_str::<OrderCondition>(zero_qty).unwrap_err();
        assert!(err.to_string().contains("quantity"));

        let flat_trail = r#"{ "side": "sell", "quantity": "1", "kind": { "order_type": "trailing_stop", "trailing_amount": "0" } }"#;
        assert!(serde_json::from_str::<OrderCondition>(flat_trail).is_err());
    }

    #[test]
    fn hand_built_order_fails_validation() {
        let order = OrderCondition {
            side: Side::Buy,
            quantity: dec!(-1),
            kind: OrderKind::Market,
        };
        assert!(matches!(order.validate(), Err(EngineError::InvalidInput { field: "quantity", .. })));
    }

    #[test]
    fn order_kind_serializes_tagged() {
        let kind = OrderKind::Limit { limit_price: p(dec!(1.5)) };
        let json = serde_json::to_value(kind).unwrap();
        assert_eq!(json["order_type"], "limit");
        assert_eq!(kind.name(), "limit");
    }
}
