//! Order submission: condition, then slippage, then commission, then the pre-trade checks.

use super::core::RiskEngine;
use super::results::{ExecutionResult, OrderOutcome};
use crate::account::AccountSnapshot;
use crate::commission::{AccountTier, AssetClass};
use crate::conditional::{evaluate_condition, OrderCondition, PriceContext};
use crate::error::EngineError;
use crate::margin::position_margin;
use crate::market::MarketConditions;
use crate::position::notional_value;
use crate::slippage::SeededRng;
use crate::types::{Leverage, Side};

/// Everything the order path needs besides the account.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub asset_class: AssetClass,
    pub order: OrderCondition,
    pub prices: PriceContext,
    pub conditions: MarketConditions,
    pub tier: AccountTier,
    pub leverage: Leverage,
}

impl RiskEngine {
    /// Seeded entry point. `None` seeds from the clock.
    pub fn submit_order(
        &self,
        request: &OrderRequest,
        account: &AccountSnapshot,
        seed: Option<u64>,
    ) -> Result<OrderOutcome, EngineError> {
        let mut rng = match seed {
            Some(seed) => SeededRng::new(seed),
            None => SeededRng::from_clock(),
        };
        self.submit_order_with_rng(request, account, &mut rng)
    }

    /// Evaluates the order against the current tick and, if it fills, prices it and
    /// checks it against the account. Nothing is reserved; the caller applies the result.
    pub fn submit_order_with_rng(
        &self,
        request: &OrderRequest,
        account: &AccountSnapshot,
        rng: &mut SeededRng,
    ) -> Result<OrderOutcome, EngineError> {
        let order = &request.order;
        order.validate()?;
        let condition = evaluate_condition(order, &request.prices);
        if !condition.matched {
            tracing::debug!(
                symbol = %request.symbol,
                order_type = order.kind.name(),
                reason = condition.reason.as_str(),
                "order pending"
            );
            return Ok(OrderOutcome::Pending {
                reason: condition.reason,
                triggered: condition.should_trigger,
            });
        }

        // limit fills carry their own price; everything else takes slippage off the tick
        let (execution_price, slippage) = match condition.execution_price {
            Some(price) => (price, None),
            None => {
                let result = self.slippage.calculate_slippage_with_rng(
                    &request.symbol,
                    request.prices.current_price.value(),
                    order.quantity,
                    order.side,
                    &request.conditions,
                    rng,
                )?;
                (result.execution_price, Some(result))
            }
        };

        let commission = self.commission.calculate_commission(
            &request.symbol,
            request.asset_class,
            order.side,
            order.quantity,
            execution_price.value(),
            request.tier,
        )?;

        let notional = notional_value(order.quantity, execution_price);
        let required_margin = position_margin(notional, request.leverage).round(2);

        let available = account.free_margin();
        if required_margin > available {
            tracing::info!(
                user_id = account.user_id.0,
                symbol = %request.symbol,
                %required_margin,
                %available,
                "order rejected: insufficient margin"
            );
            return Err(EngineError::InsufficientMargin {
                required: required_margin,
                available,
            });
        }
        if commission.total_commission > account.balance {
            tracing::info!(
                user_id = account.user_id.0,
                symbol = %request.symbol,
                commission = %commission.total_commission,
                balance = %account.balance,
                "order rejected: insufficient balance"
            );
            return Err(EngineError::InsufficientBalance {
                required: commission.total_commission,
                available: account.balance,
            });
        }

        let total_cost = match order.side {
            Side::Buy => notional.add(commission.total_commission),
            Side::Sell => notional.sub(commission.total_commission),
        };

        tracing::info!(
            user_id = account.user_id.0,
            symbol = %request.symbol,
            side = %order.side,
            quantity = %order.quantity,
            %execution_price,
            commission = %commission.total_commission,
            "order executed"
        );

        Ok(OrderOutcome::Executed(ExecutionResult {
            symbol: request.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            execution_price,
            slippage,
            commission,
            notional: notional.round(2),
            required_margin,
            total_cost: total_cost.round(2),
        }))
    }
}
