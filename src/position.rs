// 4.0: open position as seen by the risk path. pnl = (mark - entry) * qty * sign.
// positions are read-only inputs; nothing in this crate mutates them.

use crate::error::EngineError;
use crate::margin::position_margin;
use crate::types::{round_dp, Leverage, PositionId, Price, Quote, Side};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub entry_price: Price,
    pub current_price: Price,
    pub unrealized_pnl: Quote,
    pub margin_required: Quote,
    pub notional_value: Quote,
    pub leverage: Leverage,
}

impl Position {
    /// Builds a position with pnl, notional and margin derived from prices.
    pub fn open(
        id: PositionId,
        symbol: impl Into<String>,
        side: Side,
        quantity: Decimal,
        entry_price: Price,
        current_price: Price,
        leverage: Leverage,
    ) -> Result<Self, EngineError> {
        if quantity <= Decimal::ZERO {
            return Err(EngineError::invalid("quantity", "must be positive"));
        }
        let notional_value = notional_value(quantity, current_price);
        Ok(Self {
            id,
            symbol: symbol.into(),
            side,
            quantity,
            entry_price,
            current_price,
            unrealized_pnl: calculate_unrealized_pnl(side, quantity, entry_price, current_price),
            margin_required: position_margin(notional_value, leverage),
            notional_value,
            leverage,
        })
    }

    /// Unrealized loss as a positive amount, zero for winners.
    pub fn loss(&self) -> Quote {
        Quote::new((-self.unrealized_pnl.value()).max(Decimal::ZERO))
    }

    /// Side of the order that closes this position.
    pub fn closing_side(&self) -> Side {
        self.side.opposite()
    }
}

pub fn notional_value(quantity: Decimal, price: Price) -> Quote {
    Quote::new(quantity * price.value())
}

pub fn calculate_unrealized_pnl(side: Side, quantity: Decimal, entry: Price, mark: Price) -> Quote {
    Quote::new((mark.value() - entry.value()) * quantity * side.sign())
}

// 4.1: realized on close, rounded to cents
pub fn calculate_realized_pnl(side: Side, quantity: Decimal, entry: Price, exit: Price) -> Quote {
    calculate_unrealized_pnl(side, quantity, entry, exit).round(2)
}

pub fn calculate_realized_pnl_pct(side: Side, entry: Price, exit: Price) -> Decimal {
    round_dp(
        (exit.value() - entry.value()) / entry.value() * dec!(100) * side.sign(),
        2,
    )
}
