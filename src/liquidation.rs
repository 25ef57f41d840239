//! Liquidation decisions and outcome accounting.
//!
//! Liquidation is needed when the margin level drops below the configured
//! threshold. The margin to free is whatever brings the level back to 100%:
//! margin used minus equity.
//!
//! Positions are ranked by unrealized loss times notional, biggest first, and
//! taken greedily until the released margin covers the target. Ranking uses a
//! stable sort so equal priorities keep their input order.
//!
//! Closures are priced pessimistically (see `engine::liquidations`). Before any
//! fill the quotes are checked; a missing quote or a blown-out spread blocks the
//! whole run rather than closing at a price nobody would trust.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::account::AccountSnapshot;
use crate::error::EngineError;
use crate::margin::margin_level;
use crate::market::PricedMarket;
use crate::position::Position;
use crate::types::{round_dp, LiquidationId, PositionId, Price, Quote, Side, Timestamp, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidationReason {
    MarginCallTimeout,
    CriticalThreshold,
    ManualForced,
    RiskLimitBreach,
}

impl LiquidationReason {
    /// Reasons that run even when the level is above the liquidation threshold:
    /// external triggers and an expired margin call.
    pub fn bypasses_threshold(&self) -> bool {
        !matches!(self, LiquidationReason::CriticalThreshold)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidationStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Partial,
    Cancelled,
}

impl LiquidationStatus {
    pub fn is_final(&self) -> bool {
        !matches!(self, LiquidationStatus::Pending | LiquidationStatus::InProgress)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LiquidationStatus::Pending => "pending",
            LiquidationStatus::InProgress => "in_progress",
            LiquidationStatus::Completed => "completed",
            LiquidationStatus::Failed => "failed",
            LiquidationStatus::Partial => "partial",
            LiquidationStatus::Cancelled => "cancelled",
        }
    }

    /// Outcome status from closure counts.
    pub fn from_counts(closed: usize, failed: usize) -> Self {
        match (closed, failed) {
            (_, 0) => LiquidationStatus::Completed,
            (0, _) => LiquidationStatus::Failed,
            _ => LiquidationStatus::Partial,
        }
    }
}

impl fmt::Display for LiquidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationConfig {
    /// Liquidate when the margin level is strictly below this, in percent.
    pub liquidation_threshold: Decimal,
    /// Multiplier on normal slippage for forced closures.
    pub worst_case_factor: Decimal,
    /// Refuse to price when bid/ask spread exceeds this percentage of mid.
    pub max_spread_pct: Decimal,
}

impl Default for LiquidationConfig {
    fn default() -> Self {
        Self {
            liquidation_threshold: dec!(50),
            worst_case_factor: dec!(1.5),
            max_spread_pct: dec!(5),
        }
    }
}

impl LiquidationConfig {
    /// Liquidate only at the 20% stop-out level.
    pub fn stop_out() -> Self {
        Self {
            liquidation_threshold: dec!(20),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationAssessment {
    pub is_needed: bool,
    pub margin_level: Decimal,
    pub margin_to_free: Quote,
}

pub fn check_liquidation_needed(
    equity: Quote,
    margin_used: Quote,
    config: &LiquidationConfig,
) -> LiquidationAssessment {
    let level = margin_level(equity, margin_used);
    LiquidationAssessment {
        is_needed: level < config.liquidation_threshold,
        margin_level: level,
        margin_to_free: Quote::new((margin_used.value() - equity.value()).max(Decimal::ZERO)),
    }
}

/// loss * notional. Winners rank zero.
pub fn liquidation_priority(position: &Position) -> Decimal {
    position.loss().value() * position.notional_value.value()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationCandidate {
    /// Index into the input slice.
    pub index: usize,
    pub position_id: PositionId,
    pub loss: Quote,
    pub priority: Decimal,
    pub margin_required: Quote,
}

/// Greedy selection in priority order until `margin_to_free` is released.
/// Never returns a position twice or more positions than given.
pub fn select_positions_for_liquidation(
    positions: &[Position],
    margin_to_free: Quote,
) -> Vec<LiquidationCandidate> {
    let mut ranked: Vec<LiquidationCandidate> = positions
        .iter()
        .enumerate()
        .map(|(index, position)| LiquidationCandidate {
            index,
            position_id: position.id,
            loss: position.loss(),
            priority: liquidation_priority(position),
            margin_required: position.margin_required,
        })
        .collect();
    // stable: ties keep input order
    ranked.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut released = Quote::zero();
    let mut selected = Vec::new();
    for candidate in ranked {
        if released >= margin_to_free {
            break;
        }
        released = released.add(candidate.margin_required);
        selected.push(candidate);
    }
    selected
}

/// Blocks the run if any symbol lacks a quote or has an unreliable spread.
pub fn verify_pricing<'a>(
    symbols: impl IntoIterator<Item = &'a str>,
    markets: &HashMap<String, PricedMarket>,
    max_spread_pct: Decimal,
) -> Result<(), EngineError> {
    for symbol in symbols {
        let market = markets.get(symbol).ok_or_else(|| EngineError::UnsafePricing {
            symbol: symbol.to_string(),
            reason: "no market quote".to_string(),
        })?;
        let snapshot = &market.snapshot;
        if snapshot.bid > snapshot.ask {
            return Err(EngineError::UnsafePricing {
                symbol: symbol.to_string(),
                reason: format!("crossed quote bid {} ask {}", snapshot.bid, snapshot.ask),
            });
        }
        let spread_pct = snapshot.spread_pct();
        if spread_pct > max_spread_pct {
            return Err(EngineError::UnsafePricing {
                symbol: symbol.to_string(),
                reason: format!(
                    "spread {}% exceeds {}%",
                    round_dp(spread_pct, 4),
                    max_spread_pct
                ),
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedPosition {
    pub position_id: PositionId,
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub entry_price: Price,
    pub market_price: Price,
    pub exit_price: Price,
    pub realized_pnl: Quote,
    pub realized_pnl_pct: Decimal,
    /// Pnl the account was carrying for this position before the close.
    pub unrealized_pnl_before: Quote,
    pub slippage_in_price: Decimal,
    /// slippage_in_price * quantity.
    pub slippage_cost: Quote,
    pub margin_released: Quote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedPosition {
    pub position_id: PositionId,
    pub symbol: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationExecutionResult {
    pub status: LiquidationStatus,
    pub positions_closed: usize,
    pub positions_failed: usize,
    pub total_realized_pnl: Quote,
    /// Sum of losing closures as a positive amount.
    pub total_realized_loss: Quote,
    pub total_slippage: Quote,
    pub average_liquidation_price: Option<Decimal>,
    pub margin_released: Quote,
    pub initial_equity: Quote,
    pub final_equity: Quote,
    pub initial_margin_level: Decimal,
    pub final_margin_level: Decimal,
    pub closed: Vec<ClosedPosition>,
    pub failed: Vec<FailedPosition>,
}

impl LiquidationExecutionResult {
    /// Totals and post-closure figures for `account` after the given closures.
    pub fn aggregate(
        account: &AccountSnapshot,
        closed: Vec<ClosedPosition>,
        failed: Vec<FailedPosition>,
    ) -> Self {
        let total_realized_pnl: Quote = closed.iter().map(|c| c.realized_pnl).sum();
        let total_realized_loss: Quote = closed
            .iter()
            .filter(|c| c.realized_pnl.is_negative())
            .map(|c| c.realized_pnl.abs())
            .sum();
        let total_slippage: Quote = closed.iter().map(|c| c.slippage_cost).sum();
        let margin_released: Quote = closed.iter().map(|c| c.margin_released).sum();

        let average_liquidation_price = (!closed.is_empty()).then(|| {
            let sum: Decimal = closed.iter().map(|c| c.exit_price.value()).sum();
            round_dp(sum / Decimal::from(closed.len()), 8)
        });

        // realized replaces the unrealized figure already inside equity
        let equity_change: Quote = closed
            .iter()
            .map(|c| c.realized_pnl.sub(c.unrealized_pnl_before))
            .sum();
        let final_equity = account.equity.add(equity_change);
        let final_margin_used =
            Quote::new((account.margin_used.value() - margin_released.value()).max(Decimal::ZERO));

        Self {
            status: LiquidationStatus::from_counts(closed.len(), failed.len()),
            positions_closed: closed.len(),
            positions_failed: failed.len(),
            total_realized_pnl,
            total_realized_loss,
            total_slippage,
            average_liquidation_price,
            margin_released,
            initial_equity: account.equity,
            final_equity,
            initial_margin_level: account.margin_level(),
            final_margin_level: margin_level(final_equity, final_margin_used),
            closed,
            failed,
        }
    }

    pub fn ensure_complete(&self) -> Result<(), EngineError> {
        if self.positions_failed > 0 {
            return Err(EngineError::PartialExecution {
                closed: self.positions_closed,
                failed: self.positions_failed,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationMetrics {
    /// Most negative realized pnl.
    pub worst_loss: Option<Quote>,
    /// Least negative (or most positive) realized pnl.
    pub best_loss: Option<Quote>,
    pub average_slippage: Quote,
    /// final - initial margin level. None when the account ends with no margin in use.
    pub margin_recovered: Option<Decimal>,
    /// 0-100. 100 means the run landed exactly on a 100% margin level.
    pub execution_quality: Decimal,
}

const QUALITY_PENALTY_PER_POINT: Decimal = dec!(0.5);
const QUALITY_LEVEL_CAP: Decimal = dec!(200);

pub fn calculate_liquidation_metrics(result: &LiquidationExecutionResult) -> LiquidationMetrics {
    let worst_loss = result.closed.iter().map(|c| c.realized_pnl).min();
    let best_loss = result.closed.iter().map(|c| c.realized_pnl).max();

    let average_slippage = if result.closed.is_empty() {
        Quote::zero()
    } else {
        Quote::new(result.total_slippage.value() / Decimal::from(result.closed.len())).round(2)
    };

    let unbounded = result.final_margin_level == Decimal::MAX;
    let margin_recovered = (!unbounded)
        .then(|| round_dp(result.final_margin_level - result.initial_margin_level, 2));

    let final_level = result
        .final_margin_level
        .clamp(Decimal::ZERO, QUALITY_LEVEL_CAP);
    let penalty = (final_level - dec!(100)).abs() * QUALITY_PENALTY_PER_POINT;
    let execution_quality = round_dp((dec!(100) - penalty).clamp(Decimal::ZERO, dec!(100)), 2);

    LiquidationMetrics {
        worst_loss,
        best_loss,
        average_slippage,
        margin_recovered,
        execution_quality,
    }
}

/// Audit record for one liquidation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationEvent {
    pub id: LiquidationId,
    pub user_id: UserId,
    pub reason: LiquidationReason,
    pub status: LiquidationStatus,
    pub initial_margin_level: Decimal,
    pub final_margin_level: Option<Decimal>,
    pub initial_equity: Quote,
    pub final_equity: Option<Quote>,
    pub closed_positions: Vec<PositionId>,
    pub failed_positions: Vec<FailedPosition>,
    pub total_realized_pnl: Quote,
    pub total_slippage: Quote,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl LiquidationEvent {
    pub fn new(id: LiquidationId, account: &AccountSnapshot, reason: LiquidationReason, now: Timestamp) -> Self {
        Self {
            id,
            user_id: account.user_id,
            reason,
            status: LiquidationStatus::Pending,
            initial_margin_level: account.margin_level(),
            final_margin_level: None,
            initial_equity: account.equity,
            final_equity: None,
            closed_positions: Vec::new(),
            failed_positions: Vec::new(),
            total_realized_pnl: Quote::zero(),
            total_slippage: Quote::zero(),
            created_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    fn invalid(&self, to: &str) -> EngineError {
        EngineError::InvalidTransition {
            entity: "liquidation",
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }

    pub fn start(&mut self, now: Timestamp) -> Result<(), EngineError> {
        if self.status != LiquidationStatus::Pending {
            return Err(self.invalid("in_progress"));
        }
        self.status = LiquidationStatus::InProgress;
        self.started_at = Some(now);
        Ok(())
    }

    /// Copies the outcome in. Only the status and finalization fields change.
    pub fn finalize(&mut self, result: &LiquidationExecutionResult, now: Timestamp) -> Result<(), EngineError> {
        if self.status != LiquidationStatus::InProgress {
            return Err(self.invalid(result.status.as_str()));
        }
        self.status = result.status;
        self.final_margin_level = Some(result.final_margin_level);
        self.final_equity = Some(result.final_equity);
        self.closed_positions = result.closed.iter().map(|c| c.position_id).collect();
        self.failed_positions = result.failed.clone();
        self.total_realized_pnl = result.total_realized_pnl;
        self.total_slippage = result.total_slippage;
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn cancel(&mut self, now: Timestamp) -> Result<(), EngineError> {
        if self.status.is_final() {
            return Err(self.invalid("cancelled"));
        }
        self.status = LiquidationStatus::Cancelled;
        self.completed_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{LiquidityTier, MarketConditions, MarketSnapshot};
    use crate::types::Leverage;

    fn p(v: Decimal) -> Price {
        Price::new_unchecked(v)
    }

    // position with an exact loss and notional, margin at 10x
    fn position(id: u64, loss: Decimal, notional: Decimal) -> Position {
        Position {
            id: PositionId(id),
            symbol: format!("SYM{id}"),
            side: Side::Buy,
            quantity: dec!(1),
            entry_price: p(notional + loss),
            current_price: p(notional),
            unrealized_pnl: Quote::new(-loss),
            margin_required: Quote::new(notional / dec!(10)),
            notional_value: Quote::new(notional),
            leverage: Leverage::new(dec!(10)).unwrap(),
        }
    }

    fn priced(symbol: &str, bid: Decimal, ask: Decimal) -> PricedMarket {
        PricedMarket {
            snapshot: MarketSnapshot::new(
                symbol,
                p((bid + ask) / dec!(2)),
                p(bid),
                p(ask),
                dec!(10),
                LiquidityTier::High,
                Timestamp::from_millis(0),
            )
            .unwrap(),
            conditions: MarketConditions::normal(dec!(10), dec!(1_000_000)),
        }
    }

    #[test]
    fn necessity_check() {
        let config = LiquidationConfig::default();
        let a = check_liquidation_needed(Quote::new(dec!(4000)), Quote::new(dec!(10000)), &config);
        assert!(a.is_needed);
        assert_eq!(a.margin_level, dec!(40));
        assert_eq!(a.margin_to_free.value(), dec!(6000));

        let at_threshold = check_liquidation_needed(Quote::new(dec!(5000)), Quote::new(dec!(10000)), &config);
        assert!(!at_threshold.is_needed);

        let healthy = check_liquidation_needed(Quote::new(dec!(15000)), Quote::new(dec!(10000)), &config);
        assert!(healthy.margin_to_free.is_zero());
    }

    #[test]
    fn stop_out_profile_liquidates_later() {
        let config = LiquidationConfig::stop_out();
        let a = check_liquidation_needed(Quote::new(dec!(4000)), Quote::new(dec!(10000)), &config);
        assert!(!a.is_needed);
        let b = check_liquidation_needed(Quote::new(dec!(1900)), Quote::new(dec!(10000)), &config);
        assert!(b.is_needed);
    }

    #[test]
    fn biggest_worst_exposure_first() {
        let b = position(2, dec!(200), dec!(10000));
        let a = position(1, dec!(1000), dec!(50000));
        let selected = select_positions_for_liquidation(&[b, a], Quote::new(dec!(100_000)));
        let ids: Vec<_> = selected.iter().map(|c| c.position_id).collect();
        assert_eq!(ids, vec![PositionId(1), PositionId(2)]);
        assert_eq!(selected[0].priority, dec!(50_000_000));
    }

    #[test]
    fn greedy_stops_once_target_covered() {
        let positions = vec![
            position(1, dec!(1000), dec!(50000)), // releases 5000
            position(2, dec!(500), dec!(20000)),  // 2000
            position(3, dec!(100), dec!(10000)),  // 1000
        ];
        let selected = select_positions_for_liquidation(&positions, Quote::new(dec!(6000)));
        assert_eq!(selected.len(), 2);

        let exact = select_positions_for_liquidation(&positions, Quote::new(dec!(5000)));
        assert_eq!(exact.len(), 1);

        let nothing = select_positions_for_liquidation(&positions, Quote::zero());
        assert!(nothing.is_empty());
    }

    #[test]
    fn ties_keep_input_order() {
        let positions = vec![
            position(1, dec!(0), dec!(10000)),
            position(2, dec!(0), dec!(10000)),
            position(3, dec!(0), dec!(10000)),
        ];
        let selected = select_positions_for_liquidation(&positions, Quote::new(dec!(1_000_000)));
        let ids: Vec<_> = selected.iter().map(|c| c.position_id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn pricing_rejects_missing_and_wide_quotes() {
        let mut markets = HashMap::new();
        markets.insert("SYM1".to_string(), priced("SYM1", dec!(99.9), dec!(100.1)));
        markets.insert("SYM2".to_string(), priced("SYM2", dec!(95), dec!(105)));

        assert!(verify_pricing(["SYM1"], &markets, dec!(5)).is_ok());

        let missing = verify_pricing(["SYM1", "SYM3"], &markets, dec!(5));
        assert!(matches!(missing, Err(EngineError::UnsafePricing { ref symbol, .. }) if symbol == "SYM3"));

        // 10 / 100 = 10% spread
        let wide = verify_pricing(["SYM2"], &markets, dec!(5));
        assert!(matches!(wide, Err(EngineError::UnsafePricing { .. })));
    }

    fn closed(id: u64, pnl: Decimal, unrealized: Decimal, margin: Decimal, exit: Decimal) -> ClosedPosition {
        ClosedPosition {
            position_id: PositionId(id),
            symbol: format!("SYM{id}"),
            side: Side::Buy,
            quantity: dec!(1),
            entry_price: p(dec!(100)),
            market_price: p(exit + dec!(1)),
            exit_price: p(exit),
            realized_pnl: Quote::new(pnl),
            realized_pnl_pct: Decimal::ZERO,
            unrealized_pnl_before: Quote::new(unrealized),
            slippage_in_price: dec!(1),
            slippage_cost: Quote::new(dec!(1)),
            margin_released: Quote::new(margin),
        }
    }

    fn account(equity: Decimal, used: Decimal) -> AccountSnapshot {
        AccountSnapshot::with_figures(UserId(1), Quote::new(equity), Quote::new(equity), Quote::new(used), Timestamp::from_millis(0))
    }

    #[test]
    fn aggregate_totals_and_status() {
        let acct = account(dec!(4000), dec!(10000));
        let result = LiquidationExecutionResult::aggregate(
            &acct,
            vec![
                closed(1, dec!(-1010), dec!(-1000), dec!(5000), dec!(90)),
                closed(2, dec!(49), dec!(50), dec!(1000), dec!(110)),
            ],
            vec![FailedPosition { position_id: PositionId(3), symbol: "SYM3".into(), error: "no quote".into() }],
        );
        assert_eq!(result.status, LiquidationStatus::Partial);
        assert_eq!(result.total_realized_pnl.value(), dec!(-961));
        assert_eq!(result.total_realized_loss.value(), dec!(1010));
        assert_eq!(result.total_slippage.value(), dec!(2));
        assert_eq!(result.average_liquidation_price, Some(dec!(100)));
        // equity 4000 - 10 - 1 = 3989 over 4000 used
        assert_eq!(result.final_equity.value(), dec!(3989));
        assert_eq!(result.final_margin_level.round_dp(3), dec!(99.725));
        assert!(matches!(result.ensure_complete(), Err(EngineError::PartialExecution { closed: 2, failed: 1 })));
    }

    #[test]
    fn only_threshold_reason_needs_the_check() {
        assert!(!LiquidationReason::CriticalThreshold.bypasses_threshold());
        assert!(LiquidationReason::MarginCallTimeout.bypasses_threshold());
        assert!(LiquidationReason::ManualForced.bypasses_threshold());
        assert!(LiquidationReason::RiskLimitBreach.bypasses_threshold());
    }

    #[test]
    fn status_from_counts() {
        assert_eq!(LiquidationStatus::from_counts(3, 0), LiquidationStatus::Completed);
        assert_eq!(LiquidationStatus::from_counts(0, 2), LiquidationStatus::Failed);
        assert_eq!(LiquidationStatus::from_counts(1, 1), LiquidationStatus::Partial);
    }

    #[test]
    fn metrics_from_result() {
        let acct = account(dec!(4000), dec!(10000));
        let result = LiquidationExecutionResult::aggregate(
            &acct,
            vec![
                closed(1, dec!(-1000), dec!(-1000), dec!(5000), dec!(90)),
                closed(2, dec!(-200), dec!(-200), dec!(1000), dec!(110)),
            ],
            Vec::new(),
        );
        let metrics = calculate_liquidation_metrics(&result);
        assert_eq!(metrics.worst_loss, Some(Quote::new(dec!(-1000))));
        assert_eq!(metrics.best_loss, Some(Quote::new(dec!(-200))));
        assert_eq!(metrics.average_slippage.value(), dec!(1));
        // 4000 / 4000 → 100%, from 40%
        assert_eq!(metrics.margin_recovered, Some(dec!(60)));
        assert_eq!(metrics.execution_quality, dec!(100));
    }

    #[test]
    fn flat_account_quality_and_unbounded_level() {
        let acct = account(dec!(4000), dec!(10000));
        let result = LiquidationExecutionResult::aggregate(
            &acct,
            vec![closed(1, dec!(-100), dec!(-100), dec!(10000), dec!(90))],
            Vec::new(),
        );
        assert_eq!(result.final_margin_level, Decimal::MAX);
        let metrics = calculate_liquidation_metrics(&result);
        assert_eq!(metrics.margin_recovered, None);
        assert_eq!(metrics.execution_quality, dec!(50));
    }

    #[test]
    fn event_lifecycle() {
        let acct = account(dec!(4000), dec!(10000));
        let mut event = LiquidationEvent::new(LiquidationId(1), &acct, LiquidationReason::CriticalThreshold, Timestamp::from_millis(0));
        assert_eq!(event.initial_margin_level, dec!(40));

        let result = LiquidationExecutionResult::aggregate(&acct, vec![closed(1, dec!(-1000), dec!(-1000), dec!(6000), dec!(90))], Vec::new());
        assert!(event.finalize(&result, Timestamp::from_millis(1)).is_err());

        event.start(Timestamp::from_millis(1)).unwrap();
        event.finalize(&result, Timestamp::from_millis(2)).unwrap();
        assert_eq!(event.status, LiquidationStatus::Completed);
        assert_eq!(event.closed_positions, vec![PositionId(1)]);
        assert!(event.cancel(Timestamp::from_millis(3)).is_err());
    }

    #[test]
    fn pending_event_can_be_cancelled() {
        let acct = account(dec!(4000), dec!(10000));
        let mut event = LiquidationEvent::new(LiquidationId(2), &acct, LiquidationReason::ManualForced, Timestamp::from_millis(0));
        event.cancel(Timestamp::from_millis(5)).unwrap();
        assert_eq!(event.status, LiquidationStatus::Cancelled);
        assert!(event.start(Timestamp::from_millis(6)).is_err());
    }
}
