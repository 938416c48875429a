//! Deterministic paper broker.
//!
//! Implements every collaborator trait from in-memory fixtures so the full
//! pipeline can run without touching a real API. Used for shadow runs and
//! by the engine's tests; failure knobs simulate broken upstreams.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use optloop_core::market::{
    BrokerPosition, OptionContract, OptionRight, OrderSide, PortfolioState,
};
use optloop_core::traits::{Brokerage, MarketDataProvider, OptionsChainProvider, PriceResolver};
use optloop_core::types::{MarketSnapshot, Momentum, Regime, SkewClass, StrategyKind};

/// An order the paper broker accepted.
#[derive(Debug, Clone)]
pub struct SubmittedOrder {
    pub contract_symbol: String,
    pub side: OrderSide,
    pub qty: u32,
}

pub struct PaperBroker {
    underlying: String,
    snapshot: Option<MarketSnapshot>,
    chain: Vec<OptionContract>,
    portfolio: PortfolioState,
    prices: HashMap<String, Decimal>,
    fail_orders: bool,
    fail_portfolio: bool,
    orders: Mutex<Vec<SubmittedOrder>>,
    next_order: AtomicU64,
}

impl PaperBroker {
    /// A broker with a synthetic but well-formed chain around `spot`:
    /// near/far ATM calls for calendars, put and call wings for condors,
    /// all liquid enough to pass validation.
    #[must_use]
    pub fn new(underlying: &str, spot: Decimal) -> Self {
        let snapshot = MarketSnapshot {
            iv_rank: 70.0,
            skew: SkewClass::Flat,
            vix: 26.0,
            momentum: Momentum::Bullish,
            regime: Regime::HighVol,
            spot,
        };

        let mut prices = HashMap::new();
        prices.insert(underlying.to_string(), Decimal::new(250, 2));

        Self {
            underlying: underlying.to_string(),
            snapshot: Some(snapshot),
            chain: Self::fixture_chain(underlying, spot),
            portfolio: PortfolioState {
                equity: Decimal::from(100_000),
                buying_power: Decimal::from(80_000),
                positions: Vec::new(),
                fetched_at: Utc::now(),
            },
            prices,
            fail_orders: false,
            fail_portfolio: false,
            orders: Mutex::new(Vec::new()),
            next_order: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn with_snapshot(mut self, snapshot: Option<MarketSnapshot>) -> Self {
        self.snapshot = snapshot;
        self
    }

    #[must_use]
    pub fn with_chain(mut self, chain: Vec<OptionContract>) -> Self {
        self.chain = chain;
        self
    }

    #[must_use]
    pub fn with_portfolio(mut self, portfolio: PortfolioState) -> Self {
        self.portfolio = portfolio;
        self
    }

    #[must_use]
    pub fn with_price(mut self, underlying: &str, price: Decimal) -> Self {
        self.prices.insert(underlying.to_string(), price);
        self
    }

    #[must_use]
    pub fn with_broker_position(mut self, position: BrokerPosition) -> Self {
        self.portfolio.positions.push(position);
        self
    }

    /// All order submissions fail.
    #[must_use]
    pub fn failing_orders(mut self) -> Self {
        self.fail_orders = true;
        self
    }

    /// Portfolio fetches fail; exercises the risk gate's fail-closed path.
    #[must_use]
    pub fn failing_portfolio(mut self) -> Self {
        self.fail_portfolio = true;
        self
    }

    /// Orders accepted so far, in submission order.
    #[must_use]
    pub fn submitted_orders(&self) -> Vec<SubmittedOrder> {
        self.orders.lock().map(|o| o.clone()).unwrap_or_default()
    }

    /// One listed contract with sane liquidity figures.
    #[must_use]
    pub fn contract(
        underlying: &str,
        right: OptionRight,
        strike: Decimal,
        dte: i64,
        reference_price: Decimal,
    ) -> OptionContract {
        let expiry = (Utc::now() + Duration::days(dte)).date_naive();
        let strike_code = (strike * Decimal::from(1000)).trunc();
        OptionContract {
            symbol: format!("{underlying}{}{right}{strike_code:0>8}", expiry.format("%y%m%d")),
            right,
            strike,
            expiry,
            reference_price,
            implied_volatility: Some(0.32),
            volume: Some(400),
        }
    }

    fn fixture_chain(underlying: &str, spot: Decimal) -> Vec<OptionContract> {
        let pct = |bps: i64| spot * Decimal::new(bps, 2) / Decimal::from(100);
        let mut chain = Vec::new();

        // Main 30 DTE ladder: condor strikes plus a few in between.
        for (offset_bps, price_cents) in [(9200, 95), (9500, 130), (9700, 160), (10300, 150)] {
            chain.push(Self::contract(
                underlying,
                OptionRight::Put,
                pct(offset_bps),
                30,
                Decimal::new(price_cents, 2),
            ));
        }
        for (offset_bps, price_cents) in [(10300, 170), (10500, 140), (10800, 100), (11200, 60)] {
            chain.push(Self::contract(
                underlying,
                OptionRight::Call,
                pct(offset_bps),
                30,
                Decimal::new(price_cents, 2),
            ));
        }

        // Near and far ATM calls for calendar spreads.
        chain.push(Self::contract(underlying, OptionRight::Call, spot, 14, Decimal::new(210, 2)));
        chain.push(Self::contract(underlying, OptionRight::Call, spot, 38, Decimal::new(320, 2)));

        chain
    }
}

#[async_trait]
impl MarketDataProvider for PaperBroker {
    async fn snapshot(&self) -> Result<Option<MarketSnapshot>> {
        Ok(self.snapshot.clone())
    }
}

#[async_trait]
impl OptionsChainProvider for PaperBroker {
    async fn chain(
        &self,
        underlying: &str,
        dte_min: i64,
        dte_max: i64,
    ) -> Result<Vec<OptionContract>> {
        if underlying != self.underlying {
            return Ok(Vec::new());
        }
        let today = Utc::now().date_naive();
        Ok(self
            .chain
            .iter()
            .filter(|c| {
                let dte = (c.expiry - today).num_days();
                dte >= dte_min && dte <= dte_max
            })
            .cloned()
            .collect())
    }

    fn name(&self) -> &'static str {
        "paper"
    }

    fn reports_stats(&self) -> bool {
        true
    }
}

#[async_trait]
impl Brokerage for PaperBroker {
    async fn portfolio(&self) -> Result<PortfolioState> {
        if self.fail_portfolio {
            return Err(anyhow!("paper broker: portfolio unavailable"));
        }
        Ok(PortfolioState {
            fetched_at: Utc::now(),
            ..self.portfolio.clone()
        })
    }

    async fn submit_order(
        &self,
        contract_symbol: &str,
        side: OrderSide,
        qty: u32,
    ) -> Result<String> {
        if self.fail_orders {
            return Err(anyhow!("paper broker: order rejected"));
        }
        let seq = self.next_order.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut orders) = self.orders.lock() {
            orders.push(SubmittedOrder {
                contract_symbol: contract_symbol.to_string(),
                side,
                qty,
            });
        }
        Ok(format!("PAPER-{seq}"))
    }
}

#[async_trait]
impl PriceResolver for PaperBroker {
    async fn current_price(
        &self,
        underlying: &str,
        _strategy: StrategyKind,
    ) -> Result<Option<Decimal>> {
        Ok(self.prices.get(underlying).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn fixture_chain_covers_condor_and_calendar_windows() {
        let broker = PaperBroker::new("SPY", dec!(100));

        let main = broker.chain("SPY", 7, 45).await.unwrap();
        assert!(main.iter().any(|c| c.right == OptionRight::Put));
        assert!(main.iter().any(|c| c.right == OptionRight::Call));

        let near = broker.chain("SPY", 7, 20).await.unwrap();
        assert!(near.iter().all(|c| c.right == OptionRight::Call));
        assert!(!near.is_empty());

        let far = broker.chain("SPY", 30, 45).await.unwrap();
        assert!(far.iter().any(|c| c.strike == dec!(100)));
    }

    #[tokio::test]
    async fn order_ids_are_sequential_and_logged() {
        let broker = PaperBroker::new("SPY", dec!(100));
        let a = broker.submit_order("SPY0001", OrderSide::Buy, 1).await.unwrap();
        let b = broker.submit_order("SPY0002", OrderSide::Sell, 1).await.unwrap();
        assert_eq!(a, "PAPER-1");
        assert_eq!(b, "PAPER-2");
        assert_eq!(broker.submitted_orders().len(), 2);
    }

    #[tokio::test]
    async fn failing_portfolio_knob_errors() {
        let broker = PaperBroker::new("SPY", dec!(100)).failing_portfolio();
        assert!(broker.portfolio().await.is_err());
    }
}
