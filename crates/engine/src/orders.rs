//! Multi-leg order construction with layered fallback.
//!
//! Legs are resolved fully before anything is submitted, so a missing
//! strike aborts a strategy cleanly. Submission itself is sequential and
//! non-atomic: a broker rejection mid-sequence leaves earlier legs
//! standing (no compensating cancellation), matching the at-least-
//! attempted semantics this desk runs with. Any multi-leg failure gets
//! exactly one retry through the single-leg fallback.

use std::sync::Arc;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use tracing::{info, warn};

use optloop_broker::fallback::ChainSource;
use optloop_core::market::{OptionContract, OptionRight, OrderLeg, OrderSide};
use optloop_core::traits::Brokerage;
use optloop_core::types::StrategyKind;

use crate::error::EngineError;
use crate::strikes;

/// Default expiry window, in days to expiry.
const DTE_DEFAULT: (i64, i64) = (7, 45);
/// Near-term window for the short calendar leg.
const DTE_NEAR: (i64, i64) = (7, 20);
/// Far-term window for the long calendar leg.
const DTE_FAR: (i64, i64) = (30, 45);

/// Outcome of a successful execution.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub strategy: StrategyKind,
    pub legs: Vec<OrderLeg>,
    /// True when the single-leg fallback was used after a multi-leg
    /// failure.
    pub used_fallback: bool,
}

/// A leg resolved from the chain but not yet submitted.
struct PlannedLeg {
    label: &'static str,
    contract: OptionContract,
    side: OrderSide,
}

pub struct OrderConstructor {
    chains: ChainSource,
    broker: Arc<dyn Brokerage>,
}

impl OrderConstructor {
    #[must_use]
    pub fn new(chains: ChainSource, broker: Arc<dyn Brokerage>) -> Self {
        Self { chains, broker }
    }

    /// Routes by strategy; on a multi-leg failure retries once through the
    /// single-leg fallback before giving up.
    ///
    /// # Errors
    /// Returns `EngineError::Execution` when both the strategy path and
    /// the fallback fail.
    pub async fn execute(
        &self,
        strategy: StrategyKind,
        underlying: &str,
        spot: Decimal,
    ) -> Result<ExecutionReport, EngineError> {
        let primary = match strategy {
            StrategyKind::IronCondor => self.iron_condor(underlying, spot).await,
            StrategyKind::CalendarSpread => self.calendar_spread(underlying, spot).await,
            // No dedicated straddle leg plan yet; it trades the simplified
            // single-leg expression directly.
            StrategyKind::Straddle => self.single_leg(underlying).await,
        };

        match primary {
            Ok(legs) => Ok(ExecutionReport {
                strategy,
                legs,
                used_fallback: false,
            }),
            Err(primary_err) => {
                warn!(
                    strategy = %strategy,
                    underlying,
                    error = %primary_err,
                    "Strategy execution failed, retrying via single-leg fallback"
                );
                match self.single_leg(underlying).await {
                    Ok(legs) => Ok(ExecutionReport {
                        strategy,
                        legs,
                        used_fallback: true,
                    }),
                    Err(fallback_err) => Err(EngineError::Execution(format!(
                        "{strategy} on {underlying}: {primary_err}; fallback: {fallback_err}"
                    ))),
                }
            }
        }
    }

    /// Four legs, one expiry window: short strangle at +/-5% with wings
    /// bought at +/-8%. All strikes must resolve before anything submits.
    async fn iron_condor(&self, underlying: &str, spot: Decimal) -> Result<Vec<OrderLeg>> {
        let chain = self.fetch_chain(underlying, DTE_DEFAULT).await?;

        let pct = |bps: i64| spot * Decimal::new(bps, 2) / Decimal::from(100);
        let short_put = strikes::nearest_strike(&chain, OptionRight::Put, pct(9500))
            .context("No contract for short put")?;
        let long_put = strikes::nearest_strike(&chain, OptionRight::Put, pct(9200))
            .context("No contract for long put wing")?;
        let short_call = strikes::nearest_strike(&chain, OptionRight::Call, pct(10500))
            .context("No contract for short call")?;
        let long_call = strikes::nearest_strike(&chain, OptionRight::Call, pct(10800))
            .context("No contract for long call wing")?;

        let plan = vec![
            PlannedLeg { label: "short_put", contract: short_put.clone(), side: OrderSide::Sell },
            PlannedLeg { label: "long_put", contract: long_put.clone(), side: OrderSide::Buy },
            PlannedLeg { label: "short_call", contract: short_call.clone(), side: OrderSide::Sell },
            PlannedLeg { label: "long_call", contract: long_call.clone(), side: OrderSide::Buy },
        ];
        self.submit_legs(plan).await
    }

    /// Two legs at the same strike: sell the near-term ATM call, buy the
    /// far-term one.
    async fn calendar_spread(&self, underlying: &str, spot: Decimal) -> Result<Vec<OrderLeg>> {
        let near_chain = self.fetch_chain(underlying, DTE_NEAR).await?;
        let far_chain = self.fetch_chain(underlying, DTE_FAR).await?;

        let near = strikes::nearest_strike(&near_chain, OptionRight::Call, spot)
            .context("No near-term ATM call")?;
        let far = strikes::nearest_strike(&far_chain, OptionRight::Call, spot)
            .context("No far-term ATM call")?;

        let plan = vec![
            PlannedLeg { label: "short_near", contract: near.clone(), side: OrderSide::Sell },
            PlannedLeg { label: "long_far", contract: far.clone(), side: OrderSide::Buy },
        ];
        self.submit_legs(plan).await
    }

    /// Last-resort expression: buy the median-by-price contract of the
    /// default window.
    async fn single_leg(&self, underlying: &str) -> Result<Vec<OrderLeg>> {
        let chain = self.fetch_chain(underlying, DTE_DEFAULT).await?;
        let contract = strikes::median_by_price(&chain)
            .context("No priced contract for single-leg fallback")?;

        let plan = vec![PlannedLeg {
            label: "single_leg",
            contract: contract.clone(),
            side: OrderSide::Buy,
        }];
        self.submit_legs(plan).await
    }

    async fn fetch_chain(
        &self,
        underlying: &str,
        (dte_min, dte_max): (i64, i64),
    ) -> Result<Vec<OptionContract>> {
        let fetch = self.chains.fetch(underlying, dte_min, dte_max).await?;
        Ok(fetch.contracts)
    }

    /// Sequential submission. Earlier fills stay in place if a later one
    /// is rejected.
    async fn submit_legs(&self, plan: Vec<PlannedLeg>) -> Result<Vec<OrderLeg>> {
        let mut submitted = Vec::with_capacity(plan.len());
        for leg in plan {
            let order_id = self
                .broker
                .submit_order(&leg.contract.symbol, leg.side, 1)
                .await
                .with_context(|| {
                    format!(
                        "Leg '{}' rejected after {} submitted leg(s)",
                        leg.label,
                        submitted.len()
                    )
                })?;

            info!(
                leg = leg.label,
                contract = %leg.contract.display_name(),
                side = %leg.side,
                order_id,
                "Leg submitted"
            );
            submitted.push(OrderLeg {
                label: leg.label.to_string(),
                contract_symbol: leg.contract.symbol,
                strike: leg.contract.strike,
                side: leg.side,
                order_id,
            });
        }
        Ok(submitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optloop_broker::PaperBroker;
    use optloop_core::traits::OptionsChainProvider;
    use rust_decimal_macros::dec;

    fn constructor(broker: Arc<PaperBroker>) -> OrderConstructor {
        let chains = ChainSource::new(vec![broker.clone() as Arc<dyn OptionsChainProvider>]);
        OrderConstructor::new(chains, broker)
    }

    #[tokio::test]
    async fn iron_condor_submits_four_legs_in_order() {
        let broker = Arc::new(PaperBroker::new("SPY", dec!(100)));
        let report = constructor(broker.clone())
            .execute(StrategyKind::IronCondor, "SPY", dec!(100))
            .await
            .unwrap();

        assert!(!report.used_fallback);
        let labels: Vec<&str> = report.legs.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(labels, ["short_put", "long_put", "short_call", "long_call"]);
        assert_eq!(report.legs[0].strike, dec!(95));
        assert_eq!(report.legs[1].strike, dec!(92));
        assert_eq!(report.legs[2].strike, dec!(105));
        assert_eq!(report.legs[3].strike, dec!(108));
        assert_eq!(broker.submitted_orders().len(), 4);
    }

    #[tokio::test]
    async fn calendar_spread_uses_both_expiry_windows() {
        let broker = Arc::new(PaperBroker::new("NVDA", dec!(100)));
        let report = constructor(broker.clone())
            .execute(StrategyKind::CalendarSpread, "NVDA", dec!(100))
            .await
            .unwrap();

        assert_eq!(report.legs.len(), 2);
        assert_eq!(report.legs[0].side, OrderSide::Sell);
        assert_eq!(report.legs[1].side, OrderSide::Buy);
        assert_eq!(report.legs[0].strike, report.legs[1].strike);
    }

    #[tokio::test]
    async fn straddle_trades_the_single_leg_expression() {
        let broker = Arc::new(PaperBroker::new("SPY", dec!(100)));
        let report = constructor(broker.clone())
            .execute(StrategyKind::Straddle, "SPY", dec!(100))
            .await
            .unwrap();

        assert_eq!(report.legs.len(), 1);
        assert_eq!(report.legs[0].side, OrderSide::Buy);
        assert!(!report.used_fallback);
    }

    #[tokio::test]
    async fn unresolvable_condor_falls_back_without_partial_submission() {
        // Chain with calls only: the short put cannot resolve, so the
        // condor must abort before submitting anything, then fall back.
        let broker = Arc::new(PaperBroker::new("SPY", dec!(100)));
        let calls_only: Vec<_> = broker
            .chain("SPY", 7, 45)
            .await
            .unwrap()
            .into_iter()
            .filter(|c| c.right == OptionRight::Call)
            .collect();
        let broker = Arc::new(PaperBroker::new("SPY", dec!(100)).with_chain(calls_only));

        let report = constructor(broker.clone())
            .execute(StrategyKind::IronCondor, "SPY", dec!(100))
            .await
            .unwrap();

        assert!(report.used_fallback);
        assert_eq!(report.legs.len(), 1);
        assert_eq!(report.legs[0].label, "single_leg");
        // Exactly one submission: the fallback leg, no stray condor legs.
        assert_eq!(broker.submitted_orders().len(), 1);
    }

    #[tokio::test]
    async fn broker_rejection_fails_both_paths() {
        let broker = Arc::new(PaperBroker::new("SPY", dec!(100)).failing_orders());
        let err = constructor(broker.clone())
            .execute(StrategyKind::IronCondor, "SPY", dec!(100))
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Execution(_)));
        assert!(broker.submitted_orders().is_empty());
    }
}
