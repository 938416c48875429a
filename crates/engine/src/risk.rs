//! Portfolio risk gate — fail-closed by construction.

use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use optloop_core::limits::RiskLimits;
use optloop_core::market::PortfolioState;
use optloop_core::traits::Brokerage;
use optloop_core::types::{Idea, RiskDecision};

pub struct RiskGate {
    limits: RiskLimits,
    broker: Arc<dyn Brokerage>,
}

impl RiskGate {
    #[must_use]
    pub fn new(limits: RiskLimits, broker: Arc<dyn Brokerage>) -> Self {
        Self { limits, broker }
    }

    /// Fetches one portfolio snapshot and runs the ordered checks against
    /// it. A failed fetch is itself a rejection; this gate never fails
    /// open.
    pub async fn evaluate(&self, idea: &Idea) -> RiskDecision {
        let state = match self.broker.portfolio().await {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "Portfolio fetch failed, rejecting for safety");
                return RiskDecision::reject(format!("Risk check error: {e}"));
            }
        };
        assess(idea, &state, &self.limits)
    }
}

/// The ordered checks, pure over one portfolio snapshot. First failure
/// wins.
#[must_use]
pub fn assess(idea: &Idea, state: &PortfolioState, limits: &RiskLimits) -> RiskDecision {
    let equity = state.equity.to_f64().unwrap_or(0.0);
    let total_pnl = state.total_unrealized_pnl().to_f64().unwrap_or(0.0);

    // 1. Drawdown.
    let drawdown_pct = if equity > 0.0 {
        total_pnl / equity * 100.0
    } else {
        0.0
    };
    if drawdown_pct < -limits.max_drawdown_pct {
        return RiskDecision::reject(format!(
            "Drawdown limit exceeded ({drawdown_pct:.2}%)"
        ));
    }

    // 2. Position count.
    if state.positions.len() >= limits.max_open_positions {
        return RiskDecision::reject(format!(
            "Max {} open positions reached",
            limits.max_open_positions
        ));
    }

    // 3. Concentration in the idea's underlying.
    let total_exposure: Decimal = state.positions.iter().map(|p| p.market_value.abs()).sum();
    if total_exposure > Decimal::ZERO {
        let exposure = state.exposure_to(&idea.underlying);
        if exposure > state.equity * limits.max_concentration {
            let cap_pct = (limits.max_concentration * Decimal::from(100)).normalize();
            return RiskDecision::reject(format!(
                "Concentration limit exceeded for {} (max {cap_pct}%)",
                idea.underlying
            ));
        }
    }

    // 4. Margin headroom for one more idea.
    if state.buying_power < limits.idea_notional_cost * limits.min_buying_power_multiple {
        return RiskDecision::reject("Insufficient buying power");
    }

    let risk_score = round3(drawdown_pct.abs() / limits.max_drawdown_pct);
    debug!(underlying = idea.underlying, drawdown_pct, risk_score, "Risk checks passed");
    RiskDecision::approve(risk_score)
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use optloop_broker::PaperBroker;
    use optloop_core::market::BrokerPosition;
    use optloop_core::types::StrategyKind;
    use rust_decimal_macros::dec;

    fn idea(underlying: &str) -> Idea {
        Idea {
            strategy: StrategyKind::IronCondor,
            underlying: underlying.to_string(),
            confidence: 0.87,
            rationale: String::new(),
            created_at: Utc::now(),
        }
    }

    fn position(symbol: &str, market_value: Decimal, pnl: Decimal) -> BrokerPosition {
        BrokerPosition {
            symbol: symbol.to_string(),
            market_value,
            unrealized_pnl: pnl,
            avg_entry_price: dec!(100),
        }
    }

    fn state(equity: Decimal, buying_power: Decimal, positions: Vec<BrokerPosition>) -> PortfolioState {
        PortfolioState {
            equity,
            buying_power,
            positions,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn drawdown_breach_rejects_with_exact_reason() {
        let state = state(
            dec!(10000),
            dec!(50000),
            vec![position("SPY", dec!(3000), dec!(-600))],
        );
        let decision = assess(&idea("AAPL"), &state, &RiskLimits::default());
        assert!(!decision.approved);
        assert_eq!(
            decision.reject_reason.as_deref(),
            Some("Drawdown limit exceeded (-6.00%)")
        );
    }

    #[test]
    fn position_count_limit_rejects() {
        let positions = (0..10)
            .map(|i| position(&format!("SYM{i}"), dec!(100), dec!(0)))
            .collect();
        let state = state(dec!(100000), dec!(50000), positions);
        let decision = assess(&idea("AAPL"), &state, &RiskLimits::default());
        assert_eq!(
            decision.reject_reason.as_deref(),
            Some("Max 10 open positions reached")
        );
    }

    #[test]
    fn concentration_boundary_is_exclusive_at_twenty_pct() {
        // 2100 / 10000 = 0.21 -> reject.
        let over = state(
            dec!(10000),
            dec!(50000),
            vec![position("AAPL260320C00180000", dec!(2100), dec!(0))],
        );
        let decision = assess(&idea("AAPL"), &over, &RiskLimits::default());
        assert_eq!(
            decision.reject_reason.as_deref(),
            Some("Concentration limit exceeded for AAPL (max 20%)")
        );

        // 1900 / 10000 = 0.19 -> pass.
        let under = state(
            dec!(10000),
            dec!(50000),
            vec![position("AAPL260320C00180000", dec!(1900), dec!(0))],
        );
        let decision = assess(&idea("AAPL"), &under, &RiskLimits::default());
        assert!(decision.approved);
    }

    #[test]
    fn thin_buying_power_rejects() {
        let state = state(dec!(10000), dec!(1999), vec![]);
        let decision = assess(&idea("TSLA"), &state, &RiskLimits::default());
        assert_eq!(decision.reject_reason.as_deref(), Some("Insufficient buying power"));
    }

    #[test]
    fn clean_portfolio_approves_with_utilization_score() {
        let state = state(
            dec!(10000),
            dec!(50000),
            vec![position("SPY", dec!(1000), dec!(-250))],
        );
        let decision = assess(&idea("AAPL"), &state, &RiskLimits::default());
        assert!(decision.approved);
        // |-2.5| / 5
        assert_eq!(decision.risk_score, Some(0.5));
    }

    #[tokio::test]
    async fn portfolio_fetch_failure_fails_closed() {
        let broker = Arc::new(PaperBroker::new("SPY", dec!(100)).failing_portfolio());
        let gate = RiskGate::new(RiskLimits::default(), broker);
        let decision = gate.evaluate(&idea("SPY")).await;
        assert!(!decision.approved);
        assert!(decision.reject_reason.unwrap().starts_with("Risk check error:"));
    }
}
