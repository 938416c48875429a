//! Portfolio risk limits — pure configuration, no behavior.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Constraints the risk gate enforces against the live portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Maximum tolerated drawdown as a percentage of equity (positive number).
    pub max_drawdown_pct: f64,
    /// Maximum simultaneously open positions.
    pub max_open_positions: usize,
    /// Maximum per-underlying exposure as a fraction of equity.
    pub max_concentration: Decimal,
    /// Required buying power as a multiple of the per-idea notional cost.
    pub min_buying_power_multiple: Decimal,
    /// Fixed notional cost estimate per idea, in dollars.
    pub idea_notional_cost: Decimal,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_drawdown_pct: 5.0,
            max_open_positions: 10,
            max_concentration: Decimal::new(20, 2),        // 0.20
            min_buying_power_multiple: Decimal::from(2),
            idea_notional_cost: Decimal::from(1000),
        }
    }
}
