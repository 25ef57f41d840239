// margin-engine: execution and risk core for leveraged accounts.
// fills are priced pessimistically; margin deterioration escalates to forced closure.
// all computation is deterministic given a seed, with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: ids, Side, Price, Quote, Leverage, Timestamp
//   1.1  error.rs: EngineError taxonomy
//   2.x  market.rs: quote snapshots, liquidity tiers, trading sessions, conditions
//   2.1  slippage.rs: seeded slippage model, worst-case pricing
//   3.x  commission.rs: fees by asset class and account tier
//   3.1  conditional.rs: market, limit, stop, stop limit, trailing stop triggers
//   4.x  position.rs: open position view, PnL
//   5.x  margin.rs: margin level, bands, monitor decisions
//   5.1  margin_call.rs: margin call lifecycle and escalation policy
//   6.x  liquidation.rs: necessity, selection, pricing safety, results, metrics
//   7.x  config.rs: tables, thresholds, presets, JSON loading
//   8.x  engine/: RiskEngine: order path and risk path
//   10.x account.rs: frozen account snapshot

pub mod account;
pub mod commission;
pub mod conditional;
pub mod config;
pub mod engine;
pub mod error;
pub mod liquidation;
pub mod margin;
pub mod margin_call;
pub mod market;
pub mod position;
pub mod slippage;
pub mod types;

// re exports for convenience
pub use account::*;
pub use commission::*;
pub use conditional::*;
pub use config::{ConfigError, RiskEngineConfig, ThresholdProfile};
pub use engine::*;
pub use error::EngineError;
pub use liquidation::*;
pub use margin::*;
pub use margin_call::*;
pub use market::*;
pub use position::*;
pub use slippage::*;
pub use types::*;
