//! Margin level calculation and account health monitoring.
//!
//! Margin level is equity over margin used, as a percentage. It is the single
//! number the monitor classifies into bands:
//!
//! - safe: level >= 100%
//! - warning: level >= 80%
//! - critical: level >= 50%
//! - liquidation: below 50%
//!
//! The bands are configuration. Whether liquidation actually fires is a separate
//! threshold owned by the liquidation config, so a stricter stop-out profile can
//! keep these bands while liquidating later.
//!
//! The monitor never sends anything. It returns notification payloads and
//! decisions; dispatching them is the caller's job.

use crate::account::AccountSnapshot;
use crate::error::EngineError;
use crate::liquidation::LiquidationReason;
use crate::margin_call::{EscalationPolicy, MarginCallEvent, Severity};
use crate::types::{Leverage, Quote, Timestamp, UserId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Equity / margin used * 100. Unbounded (Decimal::MAX) when nothing is used.
pub fn margin_level(equity: Quote, margin_used: Quote) -> Decimal {
    if margin_used.value() <= Decimal::ZERO {
        return Decimal::MAX;
    }
    equity.value() / margin_used.value() * dec!(100)
}

/// Equity available for new positions. Never negative.
pub fn free_margin(equity: Quote, margin_used: Quote) -> Quote {
    Quote::new((equity.value() - margin_used.value()).max(Decimal::ZERO))
}

pub fn position_margin(notional: Quote, leverage: Leverage) -> Quote {
    Quote::new(notional.value() / leverage.value())
}

/// Lower bound of each band, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginThresholds {
    pub safe: Decimal,
    pub warning: Decimal,
    pub critical: Decimal,
}

impl Default for MarginThresholds {
    fn default() -> Self {
        Self {
            safe: dec!(100),
            warning: dec!(80),
            critical: dec!(50),
        }
    }
}

impl MarginThresholds {
    pub fn classify(&self, margin_level: Decimal) -> MarginStatus {
        if margin_level >= self.safe {
            MarginStatus::Safe
        } else if margin_level >= self.warning {
            MarginStatus::Warning
        } else if margin_level >= self.critical {
            MarginStatus::Critical
        } else {
            MarginStatus::Liquidation
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginStatus {
    Safe,
    Warning,
    Critical,
    Liquidation,
}

impl MarginStatus {
    pub fn severity(&self) -> Option<Severity> {
        match self {
            MarginStatus::Safe => None,
            MarginStatus::Warning => Some(Severity::Warning),
            MarginStatus::Critical => Some(Severity::Critical),
            MarginStatus::Liquidation => Some(Severity::Emergency),
        }
    }

    pub fn recommended_actions(&self) -> Vec<RecommendedAction> {
        match self {
            MarginStatus::Safe => Vec::new(),
            MarginStatus::Warning => vec![
                RecommendedAction::DepositFunds,
                RecommendedAction::AvoidNewPositions,
            ],
            MarginStatus::Critical => vec![
                RecommendedAction::DepositFunds,
                RecommendedAction::ReducePositions,
                RecommendedAction::AvoidNewPositions,
            ],
            MarginStatus::Liquidation => vec![
                RecommendedAction::DepositFunds,
                RecommendedAction::ClosePositions,
                RecommendedAction::ExpectLiquidation,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    DepositFunds,
    AvoidNewPositions,
    ReducePositions,
    ClosePositions,
    ExpectLiquidation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginAssessment {
    pub user_id: UserId,
    pub equity: Quote,
    pub margin_used: Quote,
    pub margin_level: Decimal,
    pub free_margin: Quote,
    pub status: MarginStatus,
    pub assessed_at: Timestamp,
}

/// Payload for the caller to dispatch. Built, never sent, here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginNotification {
    pub user_id: UserId,
    pub severity: Option<Severity>,
    pub previous_status: Option<MarginStatus>,
    pub status: MarginStatus,
    pub margin_level: Decimal,
    pub free_margin: Quote,
    pub recommended_actions: Vec<RecommendedAction>,
}

impl MarginNotification {
    pub fn for_assessment(assessment: &MarginAssessment, previous_status: Option<MarginStatus>) -> Self {
        Self {
            user_id: assessment.user_id,
            severity: assessment.status.severity(),
            previous_status,
            status: assessment.status,
            margin_level: assessment.margin_level,
            free_margin: assessment.free_margin,
            recommended_actions: assessment.status.recommended_actions(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MonitorDecision {
    /// No open call and nothing to report.
    Healthy(MarginAssessment),
    /// Breach detected with no open call. Caller creates and stores the event.
    OpenMarginCall {
        assessment: MarginAssessment,
        severity: Severity,
        notification: MarginNotification,
    },
    /// Call stays open. Notification only when severity worsened.
    Hold {
        assessment: MarginAssessment,
        notification: Option<MarginNotification>,
    },
    /// Account recovered; the call was resolved.
    Resolve {
        assessment: MarginAssessment,
        notification: MarginNotification,
    },
    /// Hand the account to the liquidation engine.
    Escalate {
        assessment: MarginAssessment,
        reason: LiquidationReason,
    },
}

impl MonitorDecision {
    pub fn assessment(&self) -> &MarginAssessment {
        match self {
            MonitorDecision::Healthy(assessment) => assessment,
            MonitorDecision::OpenMarginCall { assessment, .. }
            | MonitorDecision::Hold { assessment, .. }
            | MonitorDecision::Resolve { assessment, .. }
            | MonitorDecision::Escalate { assessment, .. } => assessment,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarginMonitor {
    thresholds: MarginThresholds,
    escalation: EscalationPolicy,
}

impl MarginMonitor {
    pub fn new(thresholds: MarginThresholds, escalation: EscalationPolicy) -> Self {
        Self {
            thresholds,
            escalation,
        }
    }

    pub fn thresholds(&self) -> &MarginThresholds {
        &self.thresholds
    }

    pub fn escalation(&self) -> &EscalationPolicy {
        &self.escalation
    }

    pub fn assess(&self, account: &AccountSnapshot) -> MarginAssessment {
        let level = margin_level(account.equity, account.margin_used);
        MarginAssessment {
            user_id: account.user_id,
            equity: account.equity,
            margin_used: account.margin_used,
            margin_level: level,
            free_margin: free_margin(account.equity, account.margin_used),
            status: self.thresholds.classify(level),
            assessed_at: account.taken_at,
        }
    }

    /// Runs one monitoring step. An open call is updated in place: its figures are
    /// refreshed and it is resolved on recovery. An escalated call stays open until
    /// the liquidation closes something, so a blocked run escalates again next pass.
    /// `forced` carries an external trigger (admin action, risk limit).
    pub fn evaluate(
        &self,
        account: &AccountSnapshot,
        open_call: Option<&mut MarginCallEvent>,
        now: Timestamp,
        forced: Option<LiquidationReason>,
    ) -> Result<MonitorDecision, EngineError> {
        let assessment = self.assess(account);

        let Some(call) = open_call.filter(|c| !c.status.is_terminal()) else {
            if let Some(reason) = forced {
                return Ok(MonitorDecision::Escalate { assessment, reason });
            }
            return Ok(match assessment.status.severity() {
                None => MonitorDecision::Healthy(assessment),
                Some(severity) => {
                    tracing::info!(
                        user_id = assessment.user_id.0,
                        margin_level = %assessment.margin_level,
                        ?severity,
                        "margin call required"
                    );
                    let notification = MarginNotification::for_assessment(&assessment, None);
                    MonitorDecision::OpenMarginCall {
                        assessment,
                        severity,
                        notification,
                    }
                }
            });
        };

        let previous_severity = call.severity;
        call.record_level(&assessment, now, self.thresholds.critical);

        if let Some(reason) = self.escalation.escalation_reason(call, now, forced) {
            tracing::warn!(
                user_id = assessment.user_id.0,
                margin_call = call.id.0,
                margin_level = %assessment.margin_level,
                ?reason,
                "margin call escalated to liquidation"
            );
            return Ok(MonitorDecision::Escalate { assessment, reason });
        }

        if assessment.status == MarginStatus::Safe {
            call.resolve(now)?;
            tracing::info!(user_id = assessment.user_id.0, margin_call = call.id.0, "margin call resolved");
            let notification =
                MarginNotification::for_assessment(&assessment, Some(status_for(previous_severity)));
            return Ok(MonitorDecision::Resolve {
                assessment,
                notification,
            });
        }

        let notification = (call.severity > previous_severity).then(|| {
            MarginNotification::for_assessment(&assessment, Some(status_for(previous_severity)))
        });
        Ok(MonitorDecision::Hold {
            assessment,
            notification,
        })
    }
}

fn status_for(severity: Severity) -> MarginStatus {
    match severity {
        Severity::Warning => MarginStatus::Warning,
        Severity::Critical => MarginStatus::Critical,
        Severity::Emergency => MarginStatus::Liquidation,
    }
}
