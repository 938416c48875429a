//! Broker-facing market types: option contracts, portfolio state, order legs.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Contract right (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionRight {
    Call,
    Put,
}

impl std::fmt::Display for OptionRight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "C"),
            Self::Put => write!(f, "P"),
        }
    }
}

/// One listed contract as returned by a chain provider.
///
/// Not cached across cycles; IV and volume are optional because the
/// secondary chain source does not publish them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionContract {
    /// OCC-style contract symbol (e.g. "AAPL260320C00180000").
    pub symbol: String,
    pub right: OptionRight,
    pub strike: Decimal,
    pub expiry: NaiveDate,
    /// Last known tradeable price; zero/absent contracts are unusable.
    pub reference_price: Decimal,
    pub implied_volatility: Option<f64>,
    pub volume: Option<u64>,
}

impl OptionContract {
    /// Human-readable description (e.g. "AAPL 180C 2026-03-20").
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}{} {}", self.symbol, self.strike, self.right, self.expiry)
    }
}

/// Order side for a single leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => f.write_str("buy"),
            Self::Sell => f.write_str("sell"),
        }
    }
}

/// A submitted leg of a (possibly multi-leg) order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLeg {
    /// Role within the strategy (e.g. "short_put", "long_call").
    pub label: String,
    pub contract_symbol: String,
    pub strike: Decimal,
    pub side: OrderSide,
    /// Broker-assigned order identifier.
    pub order_id: String,
}

/// One position as reported by the brokerage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerPosition {
    pub symbol: String,
    pub market_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub avg_entry_price: Decimal,
}

/// Portfolio snapshot fetched atomically per risk decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioState {
    pub equity: Decimal,
    pub buying_power: Decimal,
    pub positions: Vec<BrokerPosition>,
    pub fetched_at: DateTime<Utc>,
}

impl PortfolioState {
    /// Sum of unrealized P&L across all broker positions.
    #[must_use]
    pub fn total_unrealized_pnl(&self) -> Decimal {
        self.positions.iter().map(|p| p.unrealized_pnl).sum()
    }

    /// Absolute market value held against symbols prefixed by `underlying`.
    ///
    /// Prefix matching is what ties OCC option symbols back to their
    /// underlying equity symbol.
    #[must_use]
    pub fn exposure_to(&self, underlying: &str) -> Decimal {
        self.positions
            .iter()
            .filter(|p| p.symbol.starts_with(underlying))
            .map(|p| p.market_value.abs())
            .sum()
    }
}
