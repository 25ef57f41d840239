//! Risk monitoring and liquidation execution.

use super::core::RiskEngine;
use super::results::{LiquidationOutcome, LiquidationPlan, RiskCycleResult};
use crate::account::AccountSnapshot;
use crate::error::EngineError;
use crate::liquidation::{
    calculate_liquidation_metrics, check_liquidation_needed, select_positions_for_liquidation,
    verify_pricing, ClosedPosition, FailedPosition, LiquidationEvent, LiquidationExecutionResult,
    LiquidationReason,
};
use crate::margin::MonitorDecision;
use crate::margin_call::{MarginCallEvent, Severity};
use crate::market::PricedMarket;
use crate::position::{calculate_realized_pnl, calculate_realized_pnl_pct, Position};
use crate::slippage::SeededRng;
use crate::types::Quote;
use std::collections::HashMap;

impl RiskEngine {
    /// Runs the monitor for one account and updates its margin call. Opens a call on
    /// a fresh breach. When the escalation policy asks for it, escalates straight away
    /// once the level is below the liquidation threshold. Does not close anything.
    pub fn monitor_account(
        &mut self,
        account: &AccountSnapshot,
        forced: Option<LiquidationReason>,
    ) -> Result<(MonitorDecision, Option<LiquidationReason>), EngineError> {
        let now = self.current_time;
        let user_id = account.user_id;

        let decision = self
            .monitor
            .evaluate(account, self.open_calls.get_mut(&user_id), now, forced)?;

        let mut escalation = match &decision {
            MonitorDecision::Escalate { reason, .. } => Some(*reason),
            _ => None,
        };

        if let MonitorDecision::OpenMarginCall { assessment, severity, .. } = &decision {
            let id = self.next_margin_call_id();
            let call = MarginCallEvent::open(id, assessment, *severity, now, self.config.thresholds.critical);
            tracing::info!(user_id = user_id.0, margin_call = id.0, ?severity, "margin call opened");
            self.open_calls.insert(user_id, call);
        }

        let immediate = self.config.escalation.escalate_below_liquidation_threshold;
        if immediate
            && escalation.is_none()
            && matches!(decision, MonitorDecision::OpenMarginCall { .. } | MonitorDecision::Hold { .. })
        {
            let check = check_liquidation_needed(account.equity, account.margin_used, &self.config.liquidation);
            if check.is_needed {
                if let Some(call) = self.open_calls.get_mut(&user_id) {
                    call.escalate_severity(Severity::Emergency);
                }
                tracing::warn!(
                    user_id = user_id.0,
                    margin_level = %check.margin_level,
                    "margin level below liquidation threshold"
                );
                escalation = Some(LiquidationReason::CriticalThreshold);
            }
        }

        self.archive_if_closed(user_id);
        Ok((decision, escalation))
    }

    /// Necessity check and position selection from one snapshot. Pure.
    pub fn plan_liquidation(&self, account: &AccountSnapshot, reason: LiquidationReason) -> LiquidationPlan {
        let assessment = check_liquidation_needed(account.equity, account.margin_used, &self.config.liquidation);
        let candidates = if assessment.is_needed || reason.bypasses_threshold() {
            select_positions_for_liquidation(&account.positions, assessment.margin_to_free)
        } else {
            Vec::new()
        };
        LiquidationPlan {
            reason,
            assessment,
            candidates,
        }
    }

    /// Plans and executes a liquidation. Every selected symbol must have a safe quote
    /// before anything closes; otherwise the run is cancelled with `UnsafePricing`.
    /// Individual closures that fail are recorded and the rest continue.
    pub fn execute_liquidation(
        &mut self,
        account: &AccountSnapshot,
        reason: LiquidationReason,
        markets: &HashMap<String, PricedMarket>,
        rng: &mut SeededRng,
    ) -> Result<LiquidationOutcome, EngineError> {
        let now = self.current_time;
        let id = self.next_liquidation_id();
        let mut event = LiquidationEvent::new(id, account, reason, now);
        let plan = self.plan_liquidation(account, reason);

        if !plan.should_execute() {
            event.cancel(now)?;
            tracing::info!(user_id = account.user_id.0, liquidation = id.0, ?reason, "liquidation not required");
            self.liquidations.push(event.clone());
            return Ok(LiquidationOutcome::NotRequired {
                event,
                assessment: plan.assessment,
            });
        }

        let targets: Vec<&Position> = plan
            .candidates
            .iter()
            .filter_map(|c| account.positions.get(c.index))
            .collect();

        if let Err(err) = verify_pricing(
            targets.iter().map(|p| p.symbol.as_str()),
            markets,
            self.config.liquidation.max_spread_pct,
        ) {
            tracing::warn!(user_id = account.user_id.0, liquidation = id.0, error = %err, "liquidation blocked");
            event.cancel(now)?;
            self.liquidations.push(event);
            return Err(err);
        }

        event.start(now)?;
        tracing::info!(
            user_id = account.user_id.0,
            liquidation = id.0,
            ?reason,
            margin_level = %plan.assessment.margin_level,
            positions = targets.len(),
            "liquidation started"
        );

        let mut closed = Vec::new();
        let mut failed = Vec::new();
        for position in targets {
            match self.close_position(position, markets, rng) {
                Ok(record) => closed.push(record),
                Err(err) => {
                    tracing::warn!(position = position.id.0, symbol = %position.symbol, error = %err, "liquidation close failed");
                    failed.push(FailedPosition {
                        position_id: position.id,
                        symbol: position.symbol.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        let result = LiquidationExecutionResult::aggregate(account, closed, failed);
        let metrics = calculate_liquidation_metrics(&result);
        event.finalize(&result, now)?;

        tracing::info!(
            user_id = account.user_id.0,
            liquidation = id.0,
            status = %result.status,
            closed = result.positions_closed,
            failed = result.positions_failed,
            realized_pnl = %result.total_realized_pnl,
            final_margin_level = %result.final_margin_level,
            "liquidation finished"
        );

        self.liquidations.push(event.clone());
        // a run that closed nothing leaves the call open for the next pass
        if result.positions_closed > 0 {
            self.settle_liquidated_call(account.user_id, now)?;
        }
        Ok(LiquidationOutcome::Executed { event, result, metrics })
    }

    /// Closes at the quoted price moved by worst-case slippage on the closing side.
    fn close_position(
        &self,
        position: &Position,
        markets: &HashMap<String, PricedMarket>,
        rng: &mut SeededRng,
    ) -> Result<ClosedPosition, EngineError> {
        let market = markets.get(&position.symbol).ok_or_else(|| EngineError::UnsafePricing {
            symbol: position.symbol.clone(),
            reason: "no market quote".to_string(),
        })?;
        let market_price = market.snapshot.current_price;
        let slippage = self.slippage.calculate_worst_case(
            &position.symbol,
            market_price.value(),
            position.quantity,
            position.closing_side(),
            &market.conditions,
            self.config.liquidation.worst_case_factor,
            rng,
        )?;
        let exit_price = slippage.execution_price;

        Ok(ClosedPosition {
            position_id: position.id,
            symbol: position.symbol.clone(),
            side: position.side,
            quantity: position.quantity,
            entry_price: position.entry_price,
            market_price,
            exit_price,
            realized_pnl: calculate_realized_pnl(position.side, position.quantity, position.entry_price, exit_price),
            realized_pnl_pct: calculate_realized_pnl_pct(position.side, position.entry_price, exit_price),
            unrealized_pnl_before: position.unrealized_pnl,
            slippage_in_price: slippage.slippage_in_price,
            slippage_cost: Quote::new(slippage.slippage_in_price * position.quantity).round(2),
            margin_released: position.margin_required,
        })
    }

    /// Monitor, then liquidate if the monitor escalated. `seed` drives exit slippage.
    pub fn run_risk_cycle(
        &mut self,
        account: &AccountSnapshot,
        markets: &HashMap<String, PricedMarket>,
        forced: Option<LiquidationReason>,
        seed: Option<u64>,
    ) -> Result<RiskCycleResult, EngineError> {
        let (decision, escalation) = self.monitor_account(account, forced)?;

        let liquidation = match escalation {
            Some(reason) => {
                let mut rng = match seed {
                    Some(seed) => SeededRng::new(seed),
                    None => SeededRng::from_clock(),
                };
                Some(self.execute_liquidation(account, reason, markets, &mut rng)?)
            }
            None => None,
        };

        let margin_call = self
            .open_calls
            .get(&account.user_id)
            .or_else(|| {
                self.closed_calls
                    .iter()
                    .rev()
                    .find(|c| c.user_id == account.user_id)
            })
            .cloned();

        Ok(RiskCycleResult {
            decision,
            margin_call,
            liquidation,
        })
    }
}
