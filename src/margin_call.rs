// 5.1 margin_call.rs: margin call lifecycle. status only moves forward:
//   pending -> acknowledged -> resolved
//   pending | acknowledged -> liquidated
// resolved and liquidated are terminal. a closed call is never reopened; a new breach gets a new call.
// escalation does not close the call: it is marked liquidated once positions were actually closed.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::EngineError;
use crate::liquidation::LiquidationReason;
use crate::margin::MarginAssessment;
use crate::types::{MarginCallId, Quote, Timestamp, UserId};

const THIRTY_MINUTES_MS: i64 = 30 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Critical,
    Emergency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginCallStatus {
    Pending,
    Acknowledged,
    Resolved,
    Liquidated,
}

impl MarginCallStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MarginCallStatus::Resolved | MarginCallStatus::Liquidated)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MarginCallStatus::Pending => "pending",
            MarginCallStatus::Acknowledged => "acknowledged",
            MarginCallStatus::Resolved => "resolved",
            MarginCallStatus::Liquidated => "liquidated",
        }
    }
}

impl fmt::Display for MarginCallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginCallEvent {
    pub id: MarginCallId,
    pub user_id: UserId,
    pub margin_level: Decimal,
    pub equity: Quote,
    pub margin_used: Quote,
    pub severity: Severity,
    pub status: MarginCallStatus,
    pub triggered_at: Timestamp,
    pub acknowledged_at: Option<Timestamp>,
    pub closed_at: Option<Timestamp>,
    /// Start of the current uninterrupted stretch below the critical threshold.
    pub below_critical_since: Option<Timestamp>,
}

impl MarginCallEvent {
    pub fn open(
        id: MarginCallId,
        assessment: &MarginAssessment,
        severity: Severity,
        now: Timestamp,
        critical_threshold: Decimal,
    ) -> Self {
        Self {
            id,
            user_id: assessment.user_id,
            margin_level: assessment.margin_level,
            equity: assessment.equity,
            margin_used: assessment.margin_used,
            severity,
            status: MarginCallStatus::Pending,
            triggered_at: now,
            acknowledged_at: None,
            closed_at: None,
            below_critical_since: (assessment.margin_level < critical_threshold).then_some(now),
        }
    }

    fn transition(&mut self, to: MarginCallStatus, allowed_from: &[MarginCallStatus]) -> Result<(), EngineError> {
        if !allowed_from.contains(&self.status) {
            return Err(EngineError::InvalidTransition {
                entity: "margin call",
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }

    pub fn acknowledge(&mut self, now: Timestamp) -> Result<(), EngineError> {
        self.transition(MarginCallStatus::Acknowledged, &[MarginCallStatus::Pending])?;
        self.acknowledged_at = Some(now);
        Ok(())
    }

    pub fn resolve(&mut self, now: Timestamp) -> Result<(), EngineError> {
        self.transition(
            MarginCallStatus::Resolved,
            &[MarginCallStatus::Pending, MarginCallStatus::Acknowledged],
        )?;
        self.closed_at = Some(now);
        Ok(())
    }

    pub fn mark_liquidated(&mut self, now: Timestamp) -> Result<(), EngineError> {
        self.transition(
            MarginCallStatus::Liquidated,
            &[MarginCallStatus::Pending, MarginCallStatus::Acknowledged],
        )?;
        self.closed_at = Some(now);
        Ok(())
    }

    /// Raises severity. Returns true when it changed; never lowers it.
    pub fn escalate_severity(&mut self, severity: Severity) -> bool {
        if severity > self.severity {
            self.severity = severity;
            true
        } else {
            false
        }
    }

    /// Refresh figures from a new assessment of the same account.
    pub fn record_level(&mut self, assessment: &MarginAssessment, now: Timestamp, critical_threshold: Decimal) {
        if self.status.is_terminal() {
            return;
        }
        self.margin_level = assessment.margin_level;
        self.equity = assessment.equity;
        self.margin_used = assessment.margin_used;
        if let Some(severity) = assessment.status.severity() {
            self.escalate_severity(severity);
        }

        if assessment.margin_level < critical_threshold {
            self.below_critical_since.get_or_insert(now);
        } else {
            self.below_critical_since = None;
        }
    }
}

/// When a margin call hands over to liquidation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    /// How long the level may stay below critical before forced closure.
    pub sustained_breach_ms: i64,
    /// Liquidate immediately below this level (the stop-out constant).
    pub emergency_floor: Decimal,
    /// Hand over as soon as the level is below the liquidation threshold,
    /// skipping the breach window.
    #[serde(default)]
    pub escalate_below_liquidation_threshold: bool,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            sustained_breach_ms: THIRTY_MINUTES_MS,
            emergency_floor: dec!(20),
            escalate_below_liquidation_threshold: false,
        }
    }
}

impl EscalationPolicy {
    pub fn escalation_reason(
        &self,
        call: &MarginCallEvent,
        now: Timestamp,
        forced: Option<LiquidationReason>,
    ) -> Option<LiquidationReason> {
        if call.status.is_terminal() {
            return None;
        }
        if forced.is_some() {
            return forced;
        }
        if call.margin_level < self.emergency_floor {
            return Some(LiquidationReason::CriticalThreshold);
        }
        let sustained = call
            .below_critical_since
            .is_some_and(|since| since.millis_until(&now) >= self.sustained_breach_ms);
        sustained.then_some(LiquidationReason::MarginCallTimeout)
    }
}
