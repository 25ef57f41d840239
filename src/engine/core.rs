// 8.0 engine/core.rs: the risk engine. owns the models built from config plus the
// margin call and liquidation records. account figures are never stored; every call
// receives a fresh snapshot.

use crate::commission::CommissionModel;
use crate::config::{ConfigError, RiskEngineConfig, ThresholdProfile};
use crate::error::EngineError;
use crate::liquidation::LiquidationEvent;
use crate::margin::MarginMonitor;
use crate::margin_call::MarginCallEvent;
use crate::slippage::SlippageModel;
use crate::types::{LiquidationId, MarginCallId, Timestamp, UserId};
use std::collections::HashMap;

/** 8.1: main engine struct */
#[derive(Debug)]
pub struct RiskEngine {
    pub(super) config: RiskEngineConfig,
    pub(super) slippage: SlippageModel,
    pub(super) commission: CommissionModel,
    pub(super) monitor: MarginMonitor,
    /// At most one non-terminal call per user.
    pub(super) open_calls: HashMap<UserId, MarginCallEvent>,
    pub(super) closed_calls: Vec<MarginCallEvent>,
    pub(super) liquidations: Vec<LiquidationEvent>,
    pub(super) next_margin_call_id: u64,
    pub(super) next_liquidation_id: u64,
    pub(super) current_time: Timestamp,
}

impl RiskEngine {
    pub fn new(config: RiskEngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            slippage: SlippageModel::new(config.slippage.clone()),
            commission: CommissionModel::new(config.commission.clone()),
            monitor: MarginMonitor::new(config.thresholds.clone(), config.escalation.clone()),
            config,
            open_calls: HashMap::new(),
            closed_calls: Vec::new(),
            liquidations: Vec::new(),
            next_margin_call_id: 1,
            next_liquidation_id: 1,
            current_time: Timestamp::from_millis(0),
        })
    }

    pub fn with_profile(profile: ThresholdProfile) -> Result<Self, ConfigError> {
        Self::new(profile.config())
    }

    pub fn config(&self) -> &RiskEngineConfig {
        &self.config
    }

    pub fn slippage_model(&self) -> &SlippageModel {
        &self.slippage
    }

    pub fn commission_model(&self) -> &CommissionModel {
        &self.commission
    }

    pub fn monitor(&self) -> &MarginMonitor {
        &self.monitor
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, millis: i64) {
        self.current_time = self.current_time.plus_millis(millis);
    }

    pub fn open_margin_call(&self, user_id: UserId) -> Option<&MarginCallEvent> {
        self.open_calls.get(&user_id)
    }

    pub fn margin_call_history(&self) -> &[MarginCallEvent] {
        &self.closed_calls
    }

    pub fn liquidation_events(&self) -> &[LiquidationEvent] {
        &self.liquidations
    }

    /// User acknowledges the open margin call.
    pub fn acknowledge_margin_call(&mut self, user_id: UserId) -> Result<&MarginCallEvent, EngineError> {
        let now = self.current_time;
        let call = self
            .open_calls
            .get_mut(&user_id)
            .ok_or_else(|| EngineError::invalid("user_id", "no open margin call"))?;
        call.acknowledge(now)?;
        tracing::info!(user_id = user_id.0, margin_call = call.id.0, "margin call acknowledged");
        Ok(call)
    }

    pub(super) fn next_margin_call_id(&mut self) -> MarginCallId {
        let id = MarginCallId(self.next_margin_call_id);
        self.next_margin_call_id += 1;
        id
    }

    pub(super) fn next_liquidation_id(&mut self) -> LiquidationId {
        let id = LiquidationId(self.next_liquidation_id);
        self.next_liquidation_id += 1;
        id
    }

    /// Closes the user's open call once a liquidation actually released positions.
    pub(super) fn settle_liquidated_call(&mut self, user_id: UserId, now: Timestamp) -> Result<(), EngineError> {
        if let Some(call) = self.open_calls.get_mut(&user_id) {
            call.mark_liquidated(now)?;
            tracing::info!(user_id = user_id.0, margin_call = call.id.0, "margin call closed by liquidation");
        }
        self.archive_if_closed(user_id);
        Ok(())
    }

    /// Moves a call that reached a terminal state into the history.
    pub(super) fn archive_if_closed(&mut self, user_id: UserId) {
        let closed = self
            .open_calls
            .get(&user_id)
            .is_some_and(|call| call.status.is_terminal());
        if closed {
            if let Some(call) = self.open_calls.remove(&user_id) {
                self.closed_calls.push(call);
            }
        }
    }
}
