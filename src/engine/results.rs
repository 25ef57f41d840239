// 8.0.2: result types for engine operations.

use crate::commission::CommissionResult;
use crate::conditional::MatchReason;
use crate::liquidation::{
    LiquidationAssessment, LiquidationCandidate, LiquidationEvent, LiquidationExecutionResult,
    LiquidationMetrics, LiquidationReason,
};
use crate::margin::MonitorDecision;
use crate::margin_call::MarginCallEvent;
use crate::slippage::SlippageResult;
use crate::types::{Price, Quote, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub execution_price: Price,
    /// None for limit fills, which execute at the limit price.
    pub slippage: Option<SlippageResult>,
    pub commission: CommissionResult,
    pub notional: Quote,
    pub required_margin: Quote,
    /// Buys: notional + commission. Sells: net proceeds, notional - commission.
    pub total_cost: Quote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderOutcome {
    /// Condition not met on this tick. `triggered` is set when a stop limit
    /// crossed its stop but the limit was not reachable.
    Pending { reason: MatchReason, triggered: bool },
    Executed(ExecutionResult),
}

impl OrderOutcome {
    pub fn execution(&self) -> Option<&ExecutionResult> {
        match self {
            OrderOutcome::Executed(result) => Some(result),
            OrderOutcome::Pending { .. } => None,
        }
    }
}

/// What a liquidation would close, computed from one account snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct LiquidationPlan {
    pub reason: LiquidationReason,
    pub assessment: LiquidationAssessment,
    pub candidates: Vec<LiquidationCandidate>,
}

impl LiquidationPlan {
    pub fn should_execute(&self) -> bool {
        (self.assessment.is_needed || self.reason.bypasses_threshold()) && !self.candidates.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiquidationOutcome {
    /// Nothing to close. The event is recorded as cancelled.
    NotRequired {
        event: LiquidationEvent,
        assessment: LiquidationAssessment,
    },
    Executed {
        event: LiquidationEvent,
        result: LiquidationExecutionResult,
        metrics: LiquidationMetrics,
    },
}

impl LiquidationOutcome {
    pub fn event(&self) -> &LiquidationEvent {
        match self {
            LiquidationOutcome::NotRequired { event, .. } | LiquidationOutcome::Executed { event, .. } => event,
        }
    }

    pub fn result(&self) -> Option<&LiquidationExecutionResult> {
        match self {
            LiquidationOutcome::Executed { result, .. } => Some(result),
            LiquidationOutcome::NotRequired { .. } => None,
        }
    }
}

/// One pass of the risk path for one account.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskCycleResult {
    pub decision: MonitorDecision,
    /// The call as it stands after this pass, if the account has or had one.
    pub margin_call: Option<MarginCallEvent>,
    pub liquidation: Option<LiquidationOutcome>,
}
