//! Strike selection over a chain listing.

use rust_decimal::Decimal;

use optloop_core::market::{OptionContract, OptionRight};

/// Contract of the requested right with a tradeable price whose strike is
/// nearest the target. `None` when nothing qualifies — a hard failure for
/// that leg.
#[must_use]
pub fn nearest_strike(
    chain: &[OptionContract],
    right: OptionRight,
    target: Decimal,
) -> Option<&OptionContract> {
    chain
        .iter()
        .filter(|c| c.right == right && c.reference_price > Decimal::ZERO)
        .min_by_key(|c| (c.strike - target).abs())
}

/// The median contract when ordered by reference price; the original
/// single-leg heuristic for "ATM-ish and liquid enough".
#[must_use]
pub fn median_by_price(chain: &[OptionContract]) -> Option<&OptionContract> {
    let mut priced: Vec<&OptionContract> = chain
        .iter()
        .filter(|c| c.reference_price > Decimal::ZERO)
        .collect();
    if priced.is_empty() {
        return None;
    }
    priced.sort_by(|a, b| a.reference_price.cmp(&b.reference_price));
    Some(priced[priced.len() / 2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn contract(right: OptionRight, strike: Decimal, price: Decimal) -> OptionContract {
        OptionContract {
            symbol: format!("SPY-{strike}{right}"),
            right,
            strike,
            expiry: (Utc::now() + Duration::days(30)).date_naive(),
            reference_price: price,
            implied_volatility: Some(0.3),
            volume: Some(200),
        }
    }

    fn condor_chain() -> Vec<OptionContract> {
        let puts = [dec!(92), dec!(95), dec!(97), dec!(103)];
        let calls = [dec!(103), dec!(105), dec!(108), dec!(112)];
        puts.iter()
            .map(|s| contract(OptionRight::Put, *s, dec!(1.10)))
            .chain(calls.iter().map(|s| contract(OptionRight::Call, *s, dec!(1.30))))
            .collect()
    }

    #[test]
    fn condor_targets_resolve_to_expected_strikes() {
        let chain = condor_chain();
        let spot = dec!(100);

        let short_put = nearest_strike(&chain, OptionRight::Put, spot * dec!(0.95)).unwrap();
        let long_put = nearest_strike(&chain, OptionRight::Put, spot * dec!(0.92)).unwrap();
        let short_call = nearest_strike(&chain, OptionRight::Call, spot * dec!(1.05)).unwrap();
        let long_call = nearest_strike(&chain, OptionRight::Call, spot * dec!(1.08)).unwrap();

        assert_eq!(short_put.strike, dec!(95));
        assert_eq!(long_put.strike, dec!(92));
        assert_eq!(short_call.strike, dec!(105));
        assert_eq!(long_call.strike, dec!(108));
    }

    #[test]
    fn unpriced_contracts_never_qualify() {
        let chain = vec![
            contract(OptionRight::Call, dec!(100), dec!(0)),
            contract(OptionRight::Call, dec!(110), dec!(1.50)),
        ];
        let pick = nearest_strike(&chain, OptionRight::Call, dec!(100)).unwrap();
        assert_eq!(pick.strike, dec!(110));
    }

    #[test]
    fn missing_right_is_a_leg_failure() {
        let chain = vec![contract(OptionRight::Call, dec!(100), dec!(1.00))];
        assert!(nearest_strike(&chain, OptionRight::Put, dec!(95)).is_none());
    }

    #[test]
    fn median_pick_orders_by_price() {
        let chain = vec![
            contract(OptionRight::Call, dec!(90), dec!(5.00)),
            contract(OptionRight::Call, dec!(100), dec!(2.00)),
            contract(OptionRight::Put, dec!(95), dec!(0)),
            contract(OptionRight::Call, dec!(110), dec!(0.50)),
        ];
        // Priced, sorted: 0.50, 2.00, 5.00 -> median is 2.00.
        let pick = median_by_price(&chain).unwrap();
        assert_eq!(pick.reference_price, dec!(2.00));

        assert!(median_by_price(&[contract(OptionRight::Call, dec!(100), dec!(0))]).is_none());
    }
}
