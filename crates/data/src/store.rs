//! Store seam consumed by the engine.
//!
//! The decision loop only ever needs these six operations; everything else
//! about persistence (pooling, schema, SQL) stays behind this trait.

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;

use optloop_core::types::StrategyKind;

use crate::models::{ApprovedTradeRecord, NewTradeAudit, PositionRecord};
use crate::repositories::{PositionRepository, TradeLogRepository};

#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Appends one decision audit row; returns its id.
    async fn insert_approved_trade(&self, audit: &NewTradeAudit) -> Result<i32>;

    /// Records a freshly opened position; returns its id. `fallback_used`
    /// marks positions whose strategy fell back to the single-leg
    /// expression at execution time.
    async fn insert_position(
        &self,
        strategy: StrategyKind,
        underlying: &str,
        entry_price: Decimal,
        fallback_used: bool,
    ) -> Result<i32>;

    /// Mark-to-market update for one open position.
    async fn update_position(&self, id: i32, current_price: Decimal, pnl: Decimal) -> Result<()>;

    /// Closes a position exactly once; closed positions are never rewritten.
    async fn close_position(&self, id: i32, final_pnl: Decimal, reason: &str) -> Result<()>;

    async fn open_positions(&self) -> Result<Vec<PositionRecord>>;

    async fn recent_approved_trades(&self, limit: i64) -> Result<Vec<ApprovedTradeRecord>>;
}

/// Postgres-backed store composed from the two repositories.
#[derive(Debug, Clone)]
pub struct PgTradeStore {
    trade_log: TradeLogRepository,
    positions: PositionRepository,
}

impl PgTradeStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            trade_log: TradeLogRepository::new(pool.clone()),
            positions: PositionRepository::new(pool),
        }
    }
}

#[async_trait]
impl TradeStore for PgTradeStore {
    async fn insert_approved_trade(&self, audit: &NewTradeAudit) -> Result<i32> {
        self.trade_log.insert(audit).await
    }

    async fn insert_position(
        &self,
        strategy: StrategyKind,
        underlying: &str,
        entry_price: Decimal,
        fallback_used: bool,
    ) -> Result<i32> {
        self.positions
            .insert(strategy, underlying, entry_price, fallback_used)
            .await
    }

    async fn update_position(&self, id: i32, current_price: Decimal, pnl: Decimal) -> Result<()> {
        self.positions.update_pnl(id, current_price, pnl).await
    }

    async fn close_position(&self, id: i32, final_pnl: Decimal, reason: &str) -> Result<()> {
        self.positions.close(id, final_pnl, reason).await
    }

    async fn open_positions(&self) -> Result<Vec<PositionRecord>> {
        self.positions.open_positions().await
    }

    async fn recent_approved_trades(&self, limit: i64) -> Result<Vec<ApprovedTradeRecord>> {
        self.trade_log.recent(limit).await
    }
}
