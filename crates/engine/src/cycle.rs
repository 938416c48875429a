//! One orchestration pass over the whole pipeline.
//!
//! The controller is the only component with side effects spanning the
//! others. Per-idea failures are logged and contained; only the
//! open-position query can fail a cycle, and the service loop absorbs
//! even that.

use std::sync::Arc;

use anyhow::Result;
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use optloop_broker::fallback::ChainSource;
use optloop_core::config::EngineConfig;
use optloop_core::traits::{Brokerage, MarketDataProvider, PriceResolver};
use optloop_core::types::Idea;
use optloop_data::models::NewTradeAudit;
use optloop_data::store::TradeStore;

use crate::generator::{IdeaGenerator, UnderlyingPicker};
use crate::ledger::{PositionLedger, SweepSummary};
use crate::orders::OrderConstructor;
use crate::risk::RiskGate;
use crate::validator::IdeaValidator;

/// Fallback entry price when neither the resolver nor the broker knows
/// one.
const DEFAULT_ENTRY_PRICE: Decimal = Decimal::from_parts(100, 0, 0, false, 0);

/// Externally constructed collaborator handles, injected at startup.
pub struct Collaborators {
    pub market: Arc<dyn MarketDataProvider>,
    pub chains: ChainSource,
    pub broker: Arc<dyn Brokerage>,
    pub prices: Arc<dyn PriceResolver>,
}

/// What one cycle did, for the service loop's log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct CycleSummary {
    pub ideas: usize,
    pub validated: usize,
    pub approved: usize,
    pub positions_opened: usize,
    pub sweep: SweepSummary,
}

pub struct CycleController {
    market: Arc<dyn MarketDataProvider>,
    broker: Arc<dyn Brokerage>,
    prices: Arc<dyn PriceResolver>,
    store: Arc<dyn TradeStore>,
    generator: IdeaGenerator,
    validator: IdeaValidator,
    risk: RiskGate,
    orders: OrderConstructor,
    ledger: PositionLedger,
    shadow_mode: bool,
}

impl CycleController {
    #[must_use]
    pub fn new(
        collab: Collaborators,
        store: Arc<dyn TradeStore>,
        config: &EngineConfig,
    ) -> Self {
        let generator = IdeaGenerator::new(config.universe.clone());
        let validator = IdeaValidator::new(collab.chains.clone());
        let risk = RiskGate::new(config.limits.clone(), collab.broker.clone());
        let orders = OrderConstructor::new(collab.chains.clone(), collab.broker.clone());
        let ledger = PositionLedger::new(
            store.clone(),
            collab.prices.clone(),
            config.take_profit_usd,
            config.stop_loss_usd,
        );

        Self {
            market: collab.market,
            broker: collab.broker,
            prices: collab.prices,
            store,
            generator,
            validator,
            risk,
            orders,
            ledger,
            shadow_mode: config.shadow_mode,
        }
    }

    /// Replaces the underlying-selection policy (tests pin a fixed one).
    #[must_use]
    pub fn with_picker(mut self, universe: Vec<String>, picker: Box<dyn UnderlyingPicker>) -> Self {
        self.generator = IdeaGenerator::with_picker(universe, picker);
        self
    }

    /// Runs one full pass: generate, validate, gate, execute, record,
    /// then the mark-to-market sweep.
    ///
    /// # Errors
    /// Returns an error only when the sweep's open-position query fails;
    /// everything else degrades in place.
    pub async fn run_cycle(&self) -> Result<CycleSummary> {
        let mut summary = CycleSummary::default();

        let snapshot = match self.market.snapshot().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                info!("No market snapshot available, skipping cycle");
                return Ok(summary);
            }
            Err(e) => {
                warn!(error = %e, "Market snapshot fetch failed, skipping cycle");
                return Ok(summary);
            }
        };
        info!(
            vix = snapshot.vix,
            iv_rank = snapshot.iv_rank,
            regime = %snapshot.regime,
            shadow_mode = self.shadow_mode,
            "Cycle started"
        );

        let ideas = self.generator.generate(Some(&snapshot));
        summary.ideas = ideas.len();

        for idea in &ideas {
            let validation = self.validator.validate(idea).await;
            if !validation.valid {
                info!(
                    strategy = %idea.strategy,
                    underlying = idea.underlying,
                    reason = validation.reject_reason.as_deref().unwrap_or("unknown"),
                    "Idea rejected by validation"
                );
                continue;
            }
            summary.validated += 1;

            let decision = self.risk.evaluate(idea).await;

            // The audit row is written whether or not the idea was
            // approved; a failed write degrades the trail, not the cycle.
            let audit = NewTradeAudit {
                strategy: idea.strategy,
                underlying: idea.underlying.clone(),
                confidence: idea.confidence,
                quant_score: validation.quality_score,
                risk_score: decision.risk_score,
                approved: decision.approved,
                rationale: idea.rationale.clone(),
            };
            if let Err(e) = self.store.insert_approved_trade(&audit).await {
                error!(error = %e, "Audit insert failed, continuing");
            }

            if !decision.approved {
                info!(
                    strategy = %idea.strategy,
                    underlying = idea.underlying,
                    reason = decision.reject_reason.as_deref().unwrap_or("unknown"),
                    "Idea rejected by risk gate"
                );
                continue;
            }
            summary.approved += 1;
            info!(
                strategy = %idea.strategy,
                underlying = idea.underlying,
                confidence = idea.confidence,
                "Idea approved"
            );

            let mut fallback_used = false;
            if !self.shadow_mode {
                match self
                    .orders
                    .execute(idea.strategy, &idea.underlying, snapshot.spot)
                    .await
                {
                    Ok(report) => {
                        fallback_used = report.used_fallback;
                        info!(
                            strategy = %idea.strategy,
                            legs = report.legs.len(),
                            used_fallback = report.used_fallback,
                            "Order executed"
                        );
                    }
                    Err(e) => {
                        warn!(
                            strategy = %idea.strategy,
                            underlying = idea.underlying,
                            error = %e,
                            "Execution failed, idea dropped"
                        );
                        continue;
                    }
                }
            }

            let entry_price = self.entry_price(idea).await;
            match self.ledger.record_entry(idea, entry_price, fallback_used).await {
                Ok(_) => summary.positions_opened += 1,
                Err(e) => error!(error = %e, "Position insert failed"),
            }
        }

        summary.sweep = self.ledger.sweep().await?;
        Ok(summary)
    }

    /// Entry price resolution ladder: option price resolver, then the
    /// broker's average entry for the underlying, then a flat default.
    async fn entry_price(&self, idea: &Idea) -> Decimal {
        match self.prices.current_price(&idea.underlying, idea.strategy).await {
            Ok(Some(price)) => return price,
            Ok(None) => {}
            Err(e) => warn!(underlying = idea.underlying, error = %e, "Entry price fetch failed"),
        }

        if let Ok(state) = self.broker.portfolio().await {
            if let Some(position) = state.positions.iter().find(|p| p.symbol == idea.underlying) {
                return position.avg_entry_price;
            }
        }

        DEFAULT_ENTRY_PRICE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optloop_broker::PaperBroker;
    use optloop_core::config::EngineConfig;
    use optloop_core::traits::OptionsChainProvider;
    use optloop_data::{MemoryTradeStore, PositionStatus};
    use rust_decimal_macros::dec;

    struct FixedPicker(&'static str);

    impl UnderlyingPicker for FixedPicker {
        fn pick(&self, _universe: &[String]) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    fn controller(
        broker: Arc<PaperBroker>,
        store: Arc<MemoryTradeStore>,
        shadow_mode: bool,
    ) -> CycleController {
        let config = EngineConfig {
            shadow_mode,
            ..EngineConfig::default()
        };
        let collab = Collaborators {
            market: broker.clone(),
            chains: ChainSource::new(vec![broker.clone() as Arc<dyn OptionsChainProvider>]),
            broker: broker.clone(),
            prices: broker,
        };
        CycleController::new(collab, store, &config)
            .with_picker(vec!["SPY".to_string()], Box::new(FixedPicker("SPY")))
    }

    #[tokio::test]
    async fn shadow_cycle_records_but_submits_nothing() {
        // Default fixture snapshot scores exactly one idea: the straddle.
        let broker = Arc::new(PaperBroker::new("SPY", dec!(100)));
        let store = Arc::new(MemoryTradeStore::new());
        let summary = controller(broker.clone(), store.clone(), true)
            .run_cycle()
            .await
            .unwrap();

        assert_eq!(summary.ideas, 1);
        assert_eq!(summary.approved, 1);
        assert_eq!(summary.positions_opened, 1);
        assert!(broker.submitted_orders().is_empty());

        let trades = store.recent_approved_trades(10).await.unwrap();
        assert_eq!(trades.len(), 1);
        assert!(trades[0].approved);
        assert!(trades[0].quant_score.is_some());

        // Entry from the paper price resolver.
        let positions = store.all_positions();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].entry_price, dec!(2.50));
        assert_eq!(positions[0].status, PositionStatus::Open);
    }

    #[tokio::test]
    async fn live_cycle_submits_the_order() {
        let broker = Arc::new(PaperBroker::new("SPY", dec!(100)));
        let store = Arc::new(MemoryTradeStore::new());
        let summary = controller(broker.clone(), store.clone(), false)
            .run_cycle()
            .await
            .unwrap();

        assert_eq!(summary.positions_opened, 1);
        // The straddle trades the single-leg expression.
        assert_eq!(broker.submitted_orders().len(), 1);
    }

    #[tokio::test]
    async fn missing_snapshot_aborts_without_touching_the_store() {
        let broker = Arc::new(PaperBroker::new("SPY", dec!(100)).with_snapshot(None));
        let store = Arc::new(MemoryTradeStore::new());
        let summary = controller(broker, store.clone(), true).run_cycle().await.unwrap();

        assert_eq!(summary.ideas, 0);
        assert!(store.all_positions().is_empty());
        assert!(store.recent_approved_trades(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn risk_rejection_still_lands_in_the_audit_trail() {
        let broker = Arc::new(PaperBroker::new("SPY", dec!(100)).failing_portfolio());
        let store = Arc::new(MemoryTradeStore::new());
        let summary = controller(broker, store.clone(), true).run_cycle().await.unwrap();

        assert_eq!(summary.validated, 1);
        assert_eq!(summary.approved, 0);
        assert!(store.all_positions().is_empty());

        let trades = store.recent_approved_trades(10).await.unwrap();
        assert_eq!(trades.len(), 1);
        assert!(!trades[0].approved);
        assert!(trades[0].risk_score.is_none());
    }

    #[tokio::test]
    async fn fallback_execution_is_flagged_on_the_position() {
        use optloop_core::market::OptionRight;
        use optloop_core::types::{MarketSnapshot, Momentum, Regime, SkewClass, StrategyKind};

        // Calm flat market scores only the iron condor; a calls-only chain
        // makes its put legs unresolvable, so execution falls back to the
        // single-leg expression.
        let snapshot = MarketSnapshot {
            iv_rank: 20.0,
            skew: SkewClass::Flat,
            vix: 15.0,
            momentum: Momentum::Bullish,
            regime: Regime::LowVol,
            spot: dec!(100),
        };
        let calls_only: Vec<_> = [dec!(103), dec!(105), dec!(108), dec!(112)]
            .into_iter()
            .map(|strike| PaperBroker::contract("SPY", OptionRight::Call, strike, 30, dec!(1.40)))
            .collect();
        let broker = Arc::new(
            PaperBroker::new("SPY", dec!(100))
                .with_snapshot(Some(snapshot))
                .with_chain(calls_only),
        );
        let store = Arc::new(MemoryTradeStore::new());

        let summary = controller(broker.clone(), store.clone(), false)
            .run_cycle()
            .await
            .unwrap();

        assert_eq!(summary.positions_opened, 1);
        // Only the fallback leg was submitted, no stray condor legs.
        assert_eq!(broker.submitted_orders().len(), 1);

        let positions = store.all_positions();
        assert_eq!(positions[0].strategy, StrategyKind::IronCondor);
        assert!(positions[0].fallback_used);
    }

    #[tokio::test]
    async fn failed_execution_drops_the_idea_without_a_position() {
        let broker = Arc::new(PaperBroker::new("SPY", dec!(100)).failing_orders());
        let store = Arc::new(MemoryTradeStore::new());
        let summary = controller(broker, store.clone(), false).run_cycle().await.unwrap();

        assert_eq!(summary.approved, 1);
        assert_eq!(summary.positions_opened, 0);
        assert!(store.all_positions().is_empty());
        // The decision itself is still on the audit trail.
        assert_eq!(store.recent_approved_trades(10).await.unwrap().len(), 1);
    }
}
