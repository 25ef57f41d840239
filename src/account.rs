// 10.0: the frozen account view handed to the risk path. margin monitor, necessity check
// and position selector all read the same snapshot so they never mix stale and fresh figures.

use crate::margin::{free_margin, margin_level};
use crate::position::Position;
use crate::types::{Quote, Timestamp, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub user_id: UserId,
    /// Settled cash, before unrealized pnl.
    pub balance: Quote,
    pub equity: Quote,
    pub margin_used: Quote,
    pub positions: Vec<Position>,
    pub taken_at: Timestamp,
}

impl AccountSnapshot {
    /// Equity and margin derived from the balance and open positions.
    pub fn from_positions(
        user_id: UserId,
        balance: Quote,
        positions: Vec<Position>,
        taken_at: Timestamp,
    ) -> Self {
        let unrealized: Quote = positions.iter().map(|p| p.unrealized_pnl).sum();
        let margin_used: Quote = positions.iter().map(|p| p.margin_required).sum();
        Self {
            user_id,
            balance,
            equity: balance.add(unrealized),
            margin_used,
            positions,
            taken_at,
        }
    }

    /// Figures supplied directly by the caller, e.g. from a ledger.
    pub fn with_figures(
        user_id: UserId,
        balance: Quote,
        equity: Quote,
        margin_used: Quote,
        taken_at: Timestamp,
    ) -> Self {
        Self {
            user_id,
            balance,
            equity,
            margin_used,
            positions: Vec::new(),
            taken_at,
        }
    }

    pub fn margin_level(&self) -> Decimal {
        margin_level(self.equity, self.margin_used)
    }

    pub fn free_margin(&self) -> Quote {
        free_margin(self.equity, self.margin_used)
    }

    pub fn total_margin_required(&self) -> Quote {
        self.positions.iter().map(|p| p.margin_required).sum()
    }
}
