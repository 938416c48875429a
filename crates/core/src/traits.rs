//! Collaborator traits at the seams of the decision loop.
//!
//! `Ok(None)` / an empty chain means the source answered but has nothing
//! usable (degrade, don't fail); `Err` means the fetch itself broke. The
//! engine treats both fail-soft.

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::market::{OptionContract, OrderSide, PortfolioState};
use crate::types::{MarketSnapshot, StrategyKind};

/// Produces the per-cycle normalized market snapshot.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Returns `None` when upstream data is unavailable; the cycle is
    /// skipped, not errored.
    async fn snapshot(&self) -> Result<Option<MarketSnapshot>>;
}

/// Lists option contracts for an underlying within a DTE window.
#[async_trait]
pub trait OptionsChainProvider: Send + Sync {
    async fn chain(
        &self,
        underlying: &str,
        dte_min: i64,
        dte_max: i64,
    ) -> Result<Vec<OptionContract>>;

    /// Source name for logs.
    fn name(&self) -> &'static str;

    /// Whether listings from this source carry IV and day-volume figures.
    /// Stat-blind sources are validated on contract presence alone.
    fn reports_stats(&self) -> bool;
}

/// Account state and order entry.
#[async_trait]
pub trait Brokerage: Send + Sync {
    /// One atomic portfolio snapshot per call.
    async fn portfolio(&self) -> Result<PortfolioState>;

    /// Submits a single-contract order; returns the broker order id.
    async fn submit_order(
        &self,
        contract_symbol: &str,
        side: OrderSide,
        qty: u32,
    ) -> Result<String>;
}

/// Resolves a current tradeable price for entry pricing and mark-to-market.
#[async_trait]
pub trait PriceResolver: Send + Sync {
    async fn current_price(
        &self,
        underlying: &str,
        strategy: StrategyKind,
    ) -> Result<Option<Decimal>>;
}
