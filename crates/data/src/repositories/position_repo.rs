//! Position repository — the only writer of position state.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};

use optloop_core::types::StrategyKind;

use crate::models::{PositionRecord, PositionStatus};

/// Repository over the `positions` table.
#[derive(Debug, Clone)]
pub struct PositionRepository {
    pool: PgPool,
}

impl PositionRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Records a freshly opened position; current price starts at entry.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert(
        &self,
        strategy: StrategyKind,
        underlying: &str,
        entry_price: Decimal,
        fallback_used: bool,
    ) -> Result<i32> {
        let row: (i32,) = sqlx::query_as(
            r"
            INSERT INTO positions
                (strategy, underlying, entry_price, current_price, status, fallback_used)
            VALUES ($1, $2, $3, $3, 'open', $4)
            RETURNING id
            ",
        )
        .bind(strategy.as_str())
        .bind(underlying)
        .bind(entry_price)
        .bind(fallback_used)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Mark-to-market update for one open position.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn update_pnl(&self, id: i32, current_price: Decimal, pnl: Decimal) -> Result<()> {
        sqlx::query(
            "UPDATE positions SET current_price = $1, unrealized_pnl = $2 \
             WHERE id = $3 AND status = 'open'",
        )
        .bind(current_price)
        .bind(pnl)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Transitions a position to closed. The `status = 'open'` guard makes
    /// the transition idempotent: a closed position is never rewritten.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn close(&self, id: i32, final_pnl: Decimal, reason: &str) -> Result<()> {
        sqlx::query(
            r"
            UPDATE positions
            SET status = 'closed', unrealized_pnl = $1, close_reason = $2, closed_at = NOW()
            WHERE id = $3 AND status = 'open'
            ",
        )
        .bind(final_pnl)
        .bind(reason)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All open positions, newest first.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn open_positions(&self) -> Result<Vec<PositionRecord>> {
        self.query_by_status("open").await
    }

    async fn query_by_status(&self, status: &str) -> Result<Vec<PositionRecord>> {
        let rows = sqlx::query(
            r"
            SELECT id, trade_timestamp, strategy, underlying, fallback_used,
                   entry_price, current_price, unrealized_pnl, status,
                   close_reason, closed_at
            FROM positions
            WHERE status = $1
            ORDER BY trade_timestamp DESC
            ",
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        let mut positions = Vec::with_capacity(rows.len());
        for row in rows {
            positions.push(Self::decode_row(&row)?);
        }
        Ok(positions)
    }

    fn decode_row(row: &sqlx::postgres::PgRow) -> Result<PositionRecord> {
        let strategy: String = row.get("strategy");
        let status: String = row.get("status");
        let closed_at: Option<DateTime<Utc>> = row.get("closed_at");

        Ok(PositionRecord {
            id: row.get("id"),
            trade_timestamp: row.get("trade_timestamp"),
            strategy: StrategyKind::parse(&strategy)
                .ok_or_else(|| anyhow!("Unknown strategy in position row: {strategy}"))?,
            underlying: row.get("underlying"),
            fallback_used: row.get("fallback_used"),
            entry_price: row.get("entry_price"),
            current_price: row.get("current_price"),
            unrealized_pnl: row.get("unrealized_pnl"),
            status: PositionStatus::parse(&status)
                .ok_or_else(|| anyhow!("Unknown position status: {status}"))?,
            close_reason: row.get("close_reason"),
            closed_at,
        })
    }
}
