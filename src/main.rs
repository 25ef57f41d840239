//! Risk engine simulation.
//!
//! Walks the order path and the risk path through a handful of accounts:
//! seeded fills, commission tiers, conditional orders, a margin call that
//! recovers, and one that ends in liquidation.

use margin_engine::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::error::Error;
use tracing_subscriber::EnvFilter;

type SimResult = Result<(), Box<dyn Error>>;

fn main() -> SimResult {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    println!("Margin Engine Risk Simulation\n");

    scenario_1_seeded_fills()?;
    scenario_2_commission_tiers()?;
    scenario_3_conditional_orders()?;
    scenario_4_margin_call_recovery()?;
    scenario_5_liquidation()?;
    scenario_6_stop_out_profile()?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

fn price(value: Decimal) -> Result<Price, Box<dyn Error>> {
    Price::new(value).ok_or_else(|| format!("non-positive price {value}").into())
}

fn flat_account(user: u64, balance: Decimal) -> AccountSnapshot {
    AccountSnapshot::with_figures(
        UserId(user),
        Quote::new(balance),
        Quote::new(balance),
        Quote::zero(),
        Timestamp::from_millis(0),
    )
}

/// Same seed, same fill. Different seeds spread between min and ceiling.
fn scenario_1_seeded_fills() -> SimResult {
    println!("Scenario 1: Seeded Slippage\n");

    let engine = RiskEngine::with_profile(ThresholdProfile::Standard)?;
    let model = engine.slippage_model();
    let calm = MarketConditions::normal(dec!(12), dec!(5_000_000));
    let stressed = MarketConditions {
        current_volatility: dec!(36),
        is_high_volatility_event: true,
        is_after_hours: true,
        ..calm.clone()
    };

    for seed in [1, 1, 2, 3] {
        let fill = model.calculate_slippage("EURUSD", dec!(1.0850), dec!(100_000), Side::Buy, &calm, Some(seed))?;
        println!(
            "  seed {seed}: {} pips, fill {}",
            fill.total_slippage.round_dp(3),
            fill.execution_price
        );
    }

    let fill = model.calculate_slippage("EURUSD", dec!(1.0850), dec!(100_000), Side::Sell, &stressed, Some(1))?;
    println!(
        "  stressed sell: {} pips (ceiling {}), fill {}\n",
        fill.total_slippage.round_dp(3),
        model.config("EURUSD")?.ceiling(),
        fill.execution_price
    );
    Ok(())
}

/// Per-share, percentage and fixed fees across tiers.
fn scenario_2_commission_tiers() -> SimResult {
    println!("Scenario 2: Commission Tiers\n");

    let engine = RiskEngine::with_profile(ThresholdProfile::Standard)?;
    let model = engine.commission_model();

    for tier in [AccountTier::Standard, AccountTier::Gold, AccountTier::Vip] {
        let stock = model.calculate_commission("AAPL", AssetClass::Stock, Side::Buy, dec!(100), dec!(150.50), tier)?;
        let crypto = model.calculate_commission("BTCUSD", AssetClass::Crypto, Side::Buy, dec!(0.5), dec!(60000), tier)?;
        println!(
            "  {:?}: 100 AAPL ${}, 0.5 BTC ${}",
            tier, stock.total_commission, crypto.total_commission
        );
    }
    println!();
    Ok(())
}

/// Stop orders fire once, on the tick that crosses.
fn scenario_3_conditional_orders() -> SimResult {
    println!("Scenario 3: Conditional Orders\n");

    let engine = RiskEngine::with_profile(ThresholdProfile::Standard)?;
    let account = flat_account(1, dec!(50_000));
    let order = OrderCondition::stop(Side::Buy, dec!(10_000), price(dec!(1.0850))?)?;

    let ticks = [(dec!(1.0840), dec!(1.0845)), (dec!(1.0845), dec!(1.0850)), (dec!(1.0850), dec!(1.0855))];
    for (previous, current) in ticks {
        let request = OrderRequest {
            symbol: "EURUSD".to_string(),
            asset_class: AssetClass::Forex,
            order,
            prices: PriceContext::tick(price(current)?, Some(price(previous)?)),
            conditions: MarketConditions::normal(dec!(8), dec!(10_000_000)),
            tier: AccountTier::Standard,
            leverage: Leverage::new(dec!(30)).ok_or("bad leverage")?,
        };
        match engine.submit_order(&request, &account, Some(42))? {
            OrderOutcome::Pending { reason, .. } => {
                println!("  {previous} -> {current}: pending ({})", reason.as_str())
            }
            OrderOutcome::Executed(fill) => println!(
                "  {previous} -> {current}: filled @ {}, margin ${}, cost ${}",
                fill.execution_price, fill.required_margin, fill.total_cost
            ),
        }
    }
    println!();
    Ok(())
}

fn positions(entry_aapl: Decimal, mark_aapl: Decimal) -> Result<Vec<Position>, Box<dyn Error>> {
    let two_x = Leverage::new(dec!(2)).ok_or("bad leverage")?;
    Ok(vec![
        Position::open(PositionId(1), "AAPL", Side::Buy, dec!(100), price(entry_aapl)?, price(mark_aapl)?, two_x)?,
        Position::open(PositionId(2), "TSLA", Side::Sell, dec!(20), price(dec!(240))?, price(dec!(250))?, two_x)?,
    ])
}

/// Warning band, acknowledgement, recovery.
fn scenario_4_margin_call_recovery() -> SimResult {
    println!("Scenario 4: Margin Call Recovery\n");

    let mut engine = RiskEngine::with_profile(ThresholdProfile::Standard)?;
    let user = UserId(7);
    let markets = HashMap::new();

    let dip = AccountSnapshot::from_positions(user, Quote::new(dec!(9_000)), positions(dec!(150), dec!(140))?, engine.time());
    let cycle = engine.run_risk_cycle(&dip, &markets, None, Some(1))?;
    println!(
        "  level {}%: {:?}",
        dip.margin_level().round_dp(2),
        cycle.decision.assessment().status
    );

    engine.advance_time(5 * 60 * 1000);
    engine.acknowledge_margin_call(user)?;
    println!("  user acknowledges the call");

    let rally = AccountSnapshot::from_positions(user, Quote::new(dec!(9_000)), positions(dec!(150), dec!(175))?, engine.time());
    let cycle = engine.run_risk_cycle(&rally, &markets, None, Some(1))?;
    if let Some(call) = cycle.margin_call {
        println!("  level {}%: call {}\n", rally.margin_level().round_dp(2), call.status);
    }
    Ok(())
}

fn quotes() -> Result<HashMap<String, PricedMarket>, Box<dyn Error>> {
    let mut markets = HashMap::new();
    for (symbol, mid, half_spread) in [("AAPL", dec!(120), dec!(0.05)), ("TSLA", dec!(250), dec!(0.10))] {
        let snapshot = MarketSnapshot::new(
            symbol,
            price(mid)?,
            price(mid - half_spread)?,
            price(mid + half_spread)?,
            dec!(40),
            LiquidityTier::High,
            Timestamp::from_millis(0),
        )?;
        let conditions = MarketConditions::normal(dec!(25), dec!(20_000_000));
        markets.insert(symbol.to_string(), PricedMarket::new(snapshot, conditions));
    }
    Ok(markets)
}

fn report(outcome: &LiquidationOutcome) {
    match outcome {
        LiquidationOutcome::NotRequired { assessment, .. } => {
            println!("  liquidation not required at {}%", assessment.margin_level.round_dp(2))
        }
        LiquidationOutcome::Executed { result, metrics, .. } => {
            for closed in &result.closed {
                println!(
                    "  closed {} {} @ {} (quote {}), pnl ${}",
                    closed.quantity, closed.symbol, closed.exit_price, closed.market_price, closed.realized_pnl
                );
            }
            println!(
                "  status {}, margin level {}% -> {}%, quality {}",
                result.status,
                result.initial_margin_level.round_dp(2),
                result.final_margin_level.round_dp(2),
                metrics.execution_quality
            );
        }
    }
}

/// Gap below the liquidation threshold under the strict profile: call opens and escalates in one pass.
fn scenario_5_liquidation() -> SimResult {
    println!("Scenario 5: Liquidation\n");

    let mut engine = RiskEngine::with_profile(ThresholdProfile::Strict)?;
    let account = AccountSnapshot::from_positions(UserId(9), Quote::new(dec!(6_000)), positions(dec!(150), dec!(120))?, engine.time());
    println!("  equity ${}, margin ${}, level {}%", account.equity, account.margin_used, account.margin_level().round_dp(2));

    let cycle = engine.run_risk_cycle(&account, &quotes()?, None, Some(2024))?;
    if let Some(outcome) = &cycle.liquidation {
        report(outcome);
    }
    println!();
    Ok(())
}

/// Under stop-out the same account waits on its margin call until the window expires.
fn scenario_6_stop_out_profile() -> SimResult {
    println!("Scenario 6: Stop-Out Profile\n");

    let mut engine = RiskEngine::with_profile(ThresholdProfile::StopOut)?;
    let account = AccountSnapshot::from_positions(UserId(9), Quote::new(dec!(6_000)), positions(dec!(150), dec!(120))?, engine.time());
    let markets = quotes()?;

    let cycle = engine.run_risk_cycle(&account, &markets, None, Some(2024))?;
    println!("  first pass: liquidation {}", if cycle.liquidation.is_some() { "ran" } else { "deferred" });

    engine.advance_time(31 * 60 * 1000);
    let cycle = engine.run_risk_cycle(&account, &markets, None, Some(2024))?;
    if let MonitorDecision::Escalate { reason, .. } = &cycle.decision {
        println!("  after 31 minutes: escalated ({reason:?})");
    }
    if let Some(outcome) = &cycle.liquidation {
        report(outcome);
    }
    Ok(())
}
