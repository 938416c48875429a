//! In-memory store backend.
//!
//! Backs paper runs that have no Postgres around, and the engine's tests.
//! Honors the same monotonic close semantics as the SQL store.

use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use optloop_core::types::StrategyKind;

use crate::models::{ApprovedTradeRecord, NewTradeAudit, PositionRecord, PositionStatus};
use crate::store::TradeStore;

#[derive(Default)]
struct Inner {
    trades: Vec<ApprovedTradeRecord>,
    positions: Vec<PositionRecord>,
    next_trade_id: i32,
    next_position_id: i32,
}

#[derive(Default)]
pub struct MemoryTradeStore {
    inner: Mutex<Inner>,
}

impl MemoryTradeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| anyhow!("store lock poisoned"))
    }

    /// Every position, open or closed (test inspection).
    pub fn all_positions(&self) -> Vec<PositionRecord> {
        self.lock().map(|i| i.positions.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TradeStore for MemoryTradeStore {
    async fn insert_approved_trade(&self, audit: &NewTradeAudit) -> Result<i32> {
        let mut inner = self.lock()?;
        inner.next_trade_id += 1;
        let id = inner.next_trade_id;
        inner.trades.push(ApprovedTradeRecord {
            id,
            timestamp: Utc::now(),
            strategy: audit.strategy,
            underlying: audit.underlying.clone(),
            confidence: audit.confidence,
            quant_score: audit.quant_score,
            risk_score: audit.risk_score,
            approved: audit.approved,
            rationale: audit.rationale.clone(),
        });
        Ok(id)
    }

    async fn insert_position(
        &self,
        strategy: StrategyKind,
        underlying: &str,
        entry_price: Decimal,
        fallback_used: bool,
    ) -> Result<i32> {
        let mut inner = self.lock()?;
        inner.next_position_id += 1;
        let id = inner.next_position_id;
        inner.positions.push(PositionRecord {
            id,
            trade_timestamp: Utc::now(),
            strategy,
            underlying: underlying.to_string(),
            fallback_used,
            entry_price,
            current_price: Some(entry_price),
            unrealized_pnl: Decimal::ZERO,
            status: PositionStatus::Open,
            close_reason: None,
            closed_at: None,
        });
        Ok(id)
    }

    async fn update_position(&self, id: i32, current_price: Decimal, pnl: Decimal) -> Result<()> {
        let mut inner = self.lock()?;
        if let Some(pos) = inner
            .positions
            .iter_mut()
            .find(|p| p.id == id && p.status == PositionStatus::Open)
        {
            pos.current_price = Some(current_price);
            pos.unrealized_pnl = pnl;
        }
        Ok(())
    }

    async fn close_position(&self, id: i32, final_pnl: Decimal, reason: &str) -> Result<()> {
        let mut inner = self.lock()?;
        // Same guard as the SQL store: only an open position can close.
        if let Some(pos) = inner
            .positions
            .iter_mut()
            .find(|p| p.id == id && p.status == PositionStatus::Open)
        {
            pos.status = PositionStatus::Closed;
            pos.unrealized_pnl = final_pnl;
            pos.close_reason = Some(reason.to_string());
            pos.closed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn open_positions(&self) -> Result<Vec<PositionRecord>> {
        let inner = self.lock()?;
        Ok(inner
            .positions
            .iter()
            .filter(|p| p.status == PositionStatus::Open)
            .cloned()
            .collect())
    }

    async fn recent_approved_trades(&self, limit: i64) -> Result<Vec<ApprovedTradeRecord>> {
        let inner = self.lock()?;
        let mut trades = inner.trades.clone();
        trades.reverse();
        trades.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(trades)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn close_is_monotonic() {
        let store = MemoryTradeStore::new();
        let id = store
            .insert_position(StrategyKind::Straddle, "SPY", dec!(2.00), false)
            .await
            .unwrap();

        store.close_position(id, dec!(200), "Take-profit hit (+$20)").await.unwrap();
        // Second close and a late update must both be no-ops.
        store.close_position(id, dec!(-500), "Stop-loss hit (-$25)").await.unwrap();
        store.update_position(id, dec!(9.99), dec!(799)).await.unwrap();

        let all = store.all_positions();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, PositionStatus::Closed);
        assert_eq!(all[0].unrealized_pnl, dec!(200));
        assert_eq!(all[0].close_reason.as_deref(), Some("Take-profit hit (+$20)"));
        assert!(store.open_positions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recent_trades_returns_newest_first() {
        let store = MemoryTradeStore::new();
        for underlying in ["SPY", "AAPL", "TSLA"] {
            store
                .insert_approved_trade(&NewTradeAudit {
                    strategy: StrategyKind::IronCondor,
                    underlying: underlying.to_string(),
                    confidence: 0.75,
                    quant_score: Some(0.9),
                    risk_score: Some(0.1),
                    approved: true,
                    rationale: String::new(),
                })
                .await
                .unwrap();
        }

        let recent = store.recent_approved_trades(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].underlying, "TSLA");
    }
}
