//! Property-based tests for the pricing and risk math.
//!
//! These tests verify invariants hold under random inputs.

use margin_engine::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// Strategies for generating test data
fn symbol_and_price() -> impl Strategy<Value = (&'static str, Decimal)> {
    prop_oneof![
        (5_000i64..20_000i64).prop_map(|x| ("EURUSD", Decimal::new(x, 4))), // 0.5 to 2.0
        (10_000i64..100_000i64).prop_map(|x| ("AAPL", Decimal::new(x, 2))), // $100 to $1,000
        (10_000i64..150_000i64).prop_map(|x| ("BTCUSD", Decimal::from(x))), // $10k to $150k
        (1_000i64..50_000i64).prop_map(|x| ("SOLUSD", Decimal::new(x, 2))), // $10 to $500
    ]
}

fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(|x| Decimal::new(x, 2)) // 0.01 to 100,000
}

fn side_strategy() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Buy), Just(Side::Sell)]
}

fn conditions_strategy() -> impl Strategy<Value = MarketConditions> {
    (
        0i64..=20_000i64,
        1i64..=5_000i64,
        1_000i64..1_000_000_000i64,
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(current, average, adv, event, low, after)| MarketConditions {
            current_volatility: Decimal::new(current, 2),
            average_volatility: Decimal::new(average, 2),
            average_daily_volume: Decimal::from(adv),
            is_high_volatility_event: event,
            is_low_liquidity: low,
            is_after_hours: after,
        })
}

fn position_strategy() -> impl Strategy<Value = (i64, i64, i64, u32)> {
    // entry cents, mark cents, quantity, leverage
    (1_000i64..100_000i64, 1_000i64..100_000i64, 1i64..500i64, 1u32..=20u32)
}

fn build_positions(raw: &[(i64, i64, i64, u32)]) -> Vec<Position> {
    raw.iter()
        .enumerate()
        .map(|(i, (entry, mark, qty, lev))| {
            Position::open(
                PositionId(i as u64 + 1),
                format!("SYM{i}"),
                if i % 2 == 0 { Side::Buy } else { Side::Sell },
                Decimal::from(*qty),
                Price::new_unchecked(Decimal::new(*entry, 2)),
                Price::new_unchecked(Decimal::new(*mark, 2)),
                Leverage::new(Decimal::from(*lev)).unwrap(),
            )
            .unwrap()
        })
        .collect()
}

fn model() -> SlippageModel {
    SlippageModel::new(SlippageTable::default())
}

proptest! {
    /// Total slippage never exceeds twice the asset's max slippage
    #[test]
    fn slippage_ceiling_holds(
        (symbol, market) in symbol_and_price(),
        qty in quantity_strategy(),
        side in side_strategy(),
        conditions in conditions_strategy(),
        seed in any::<u64>(),
    ) {
        let model = model();
        let result = model.calculate_slippage(symbol, market, qty, side, &conditions, Some(seed)).unwrap();
        let max = model.config(symbol).unwrap().max_slippage;
        prop_assert!(result.total_slippage <= dec!(2) * max);
        prop_assert!(result.total_slippage >= Decimal::ZERO);
    }

    /// Slippage never favors the trader
    #[test]
    fn slippage_direction(
        (symbol, market) in symbol_and_price(),
        qty in quantity_strategy(),
        side in side_strategy(),
        conditions in conditions_strategy(),
        seed in any::<u64>(),
    ) {
        let result = model().calculate_slippage(symbol, market, qty, side, &conditions, Some(seed)).unwrap();
        match side {
            Side::Buy => prop_assert!(result.execution_price.value() >= market),
            Side::Sell => prop_assert!(result.execution_price.value() <= market),
        }
    }

    /// Same input and seed give identical output
    #[test]
    fn slippage_deterministic(
        (symbol, market) in symbol_and_price(),
        qty in quantity_strategy(),
        side in side_strategy(),
        conditions in conditions_strategy(),
        seed in any::<u64>(),
    ) {
        let model = model();
        let a = model.calculate_slippage(symbol, market, qty, side, &conditions, Some(seed)).unwrap();
        let b = model.calculate_slippage(symbol, market, qty, side, &conditions, Some(seed)).unwrap();
        prop_assert_eq!(a, b);
    }

    /// Worst case is the capped normal figure times the factor
    #[test]
    fn worst_case_scales_normal(
        (symbol, market) in symbol_and_price(),
        qty in quantity_strategy(),
        side in side_strategy(),
        conditions in conditions_strategy(),
        seed in any::<u64>(),
    ) {
        let model = model();
        let normal = model
            .calculate_slippage_with_rng(symbol, market, qty, side, &conditions, &mut SeededRng::new(seed))
            .unwrap();
        let worst = model
            .calculate_worst_case(symbol, market, qty, side, &conditions, dec!(1.5), &mut SeededRng::new(seed))
            .unwrap();
        prop_assert_eq!(worst.total_slippage, normal.total_slippage * dec!(1.5));
    }

    /// Stock commission always lands inside [min, max]
    #[test]
    fn stock_commission_bounded(
        qty in quantity_strategy(),
        cents in 100i64..100_000i64,
        tier in prop_oneof![
            Just(AccountTier::Standard),
            Just(AccountTier::Silver),
            Just(AccountTier::Gold),
            Just(AccountTier::Platinum),
            Just(AccountTier::Vip),
        ],
    ) {
        let model = CommissionModel::new(CommissionTable::default());
        let result = model
            .calculate_commission("AAPL", AssetClass::Stock, Side::Buy, qty, Decimal::new(cents, 2), tier)
            .unwrap();
        prop_assert!(result.total_commission.value() >= dec!(1));
        prop_assert!(result.total_commission.value() <= dec!(50));
    }

    /// A higher margin level is never classified as worse
    #[test]
    fn classification_monotonic(a in 0i64..50_000i64, b in 0i64..50_000i64) {
        let thresholds = MarginThresholds::default();
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let worse = thresholds.classify(Decimal::new(low, 2)).severity();
        let better = thresholds.classify(Decimal::new(high, 2)).severity();
        prop_assert!(better <= worse);
    }

    /// Selection is bounded, unique, ordered, covers the target and leaves input untouched
    #[test]
    fn selection_invariants(
        raw in prop::collection::vec(position_strategy(), 0..12),
        target in 0i64..2_000_000i64,
    ) {
        let positions = build_positions(&raw);
        let before = positions.clone();
        let total_margin: Quote = positions.iter().map(|p| p.margin_required).sum();
        let target = Quote::new(Decimal::new(target, 2));

        let selected = select_positions_for_liquidation(&positions, target);

        prop_assert!(selected.len() <= positions.len());
        prop_assert_eq!(&positions, &before);
        prop_assert_eq!(positions.iter().map(|p| p.margin_required).sum::<Quote>(), total_margin);

        let mut ids: Vec<_> = selected.iter().map(|c| c.position_id).collect();
        ids.sort();
        ids.dedup();
        prop_assert_eq!(ids.len(), selected.len());

        for pair in selected.windows(2) {
            prop_assert!(pair[0].priority >= pair[1].priority);
        }

        let released: Quote = selected.iter().map(|c| c.margin_required).sum();
        prop_assert!(released >= target || selected.len() == positions.len());
        // no extra position once the target was met
        if let Some(last) = selected.last() {
            prop_assert!(released.sub(last.margin_required) < target);
        }
    }

    /// A buy stop that fired does not fire again on the next higher tick
    #[test]
    fn stop_is_edge_triggered(
        stop in 10_000i64..20_000i64,
        below in 1i64..100i64,
        above in 0i64..100i64,
        further in 0i64..100i64,
    ) {
        let level = Price::new_unchecked(Decimal::new(stop, 4));
        let order = OrderCondition::stop(Side::Buy, dec!(1), level).unwrap();
        let previous = Price::new_unchecked(Decimal::new(stop - below, 4));
        let current = Price::new_unchecked(Decimal::new(stop + above, 4));
        let next = Price::new_unchecked(Decimal::new(stop + above + further, 4));

        let first = evaluate_condition(&order, &PriceContext::tick(current, Some(previous)));
        prop_assert!(first.matched && first.should_trigger);

        let second = evaluate_condition(&order, &PriceContext::tick(next, Some(current)));
        prop_assert!(!second.matched);
    }
}
