// 8.0: risk engine facade. two paths share one set of models:
// order submission (condition -> slippage -> commission -> margin check) and
// risk monitoring (margin monitor -> margin call -> liquidation).

mod core;
mod liquidations;
mod orders;
mod results;

pub use core::RiskEngine;
pub use orders::OrderRequest;
pub use results::{
    ExecutionResult, LiquidationOutcome, LiquidationPlan, OrderOutcome, RiskCycleResult,
};
