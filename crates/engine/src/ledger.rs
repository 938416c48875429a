//! Position ledger — the open/closed state machine and its auto-close
//! sweep.
//!
//! The ledger is the only writer of position state. Thresholds are
//! asymmetric on purpose: the stop-loss sits wider than the take-profit.

use std::sync::Arc;

use anyhow::Result;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use optloop_core::traits::PriceResolver;
use optloop_core::types::Idea;
use optloop_data::store::TradeStore;

/// Single-option-equivalent contract multiplier.
pub const CONTRACT_MULTIPLIER: i64 = 100;

/// Outcome counts for one mark-to-market pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepSummary {
    pub refreshed: usize,
    pub closed: usize,
    pub skipped: usize,
}

pub struct PositionLedger {
    store: Arc<dyn TradeStore>,
    prices: Arc<dyn PriceResolver>,
    take_profit_usd: Decimal,
    stop_loss_usd: Decimal,
}

impl PositionLedger {
    #[must_use]
    pub fn new(
        store: Arc<dyn TradeStore>,
        prices: Arc<dyn PriceResolver>,
        take_profit_usd: Decimal,
        stop_loss_usd: Decimal,
    ) -> Self {
        Self {
            store,
            prices,
            take_profit_usd,
            stop_loss_usd,
        }
    }

    /// Opens a position for an approved, executed idea. `fallback_used`
    /// records whether the single-leg fallback traded in place of the
    /// intended strategy.
    ///
    /// # Errors
    /// Returns an error if the store insert fails.
    pub async fn record_entry(
        &self,
        idea: &Idea,
        entry_price: Decimal,
        fallback_used: bool,
    ) -> Result<i32> {
        let id = self
            .store
            .insert_position(idea.strategy, &idea.underlying, entry_price, fallback_used)
            .await?;
        info!(
            id,
            strategy = %idea.strategy,
            underlying = idea.underlying,
            entry = %entry_price,
            fallback_used,
            "Position opened"
        );
        Ok(id)
    }

    /// Refreshes every open position and closes the ones past a
    /// threshold. A position with an unfetchable price is skipped, left
    /// exactly as it was.
    ///
    /// # Errors
    /// Returns an error if the open-position query fails; per-position
    /// store writes are logged and do not halt the pass.
    pub async fn sweep(&self) -> Result<SweepSummary> {
        let mut summary = SweepSummary::default();

        for pos in self.store.open_positions().await? {
            let current = match self
                .prices
                .current_price(&pos.underlying, pos.strategy)
                .await
            {
                Ok(Some(price)) => price,
                Ok(None) => {
                    debug!(id = pos.id, underlying = pos.underlying, "No price, skipping");
                    summary.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(id = pos.id, underlying = pos.underlying, error = %e, "Price fetch failed, skipping");
                    summary.skipped += 1;
                    continue;
                }
            };

            let pnl = unrealized_pnl(pos.entry_price, current);
            if let Err(e) = self.store.update_position(pos.id, current, pnl).await {
                warn!(id = pos.id, error = %e, "P&L update failed");
                summary.skipped += 1;
                continue;
            }

            match self.close_reason(pnl) {
                Some(reason) => {
                    if let Err(e) = self.store.close_position(pos.id, pnl, &reason).await {
                        warn!(id = pos.id, error = %e, "Close failed");
                        summary.skipped += 1;
                        continue;
                    }
                    info!(id = pos.id, underlying = pos.underlying, pnl = %pnl, reason, "Position closed");
                    summary.closed += 1;
                }
                None => summary.refreshed += 1,
            }
        }

        Ok(summary)
    }

    /// Threshold check; the take-profit is tested first.
    fn close_reason(&self, pnl: Decimal) -> Option<String> {
        if pnl >= self.take_profit_usd {
            return Some(format!("Take-profit hit (+${})", self.take_profit_usd));
        }
        if pnl <= -self.stop_loss_usd {
            return Some(format!("Stop-loss hit (-${})", self.stop_loss_usd));
        }
        None
    }
}

/// P&L at single-option-equivalent sizing.
#[must_use]
pub fn unrealized_pnl(entry: Decimal, current: Decimal) -> Decimal {
    (current - entry) * Decimal::from(CONTRACT_MULTIPLIER)
}
