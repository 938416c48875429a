//! Audit-trail repository for the append-only decision log.

use anyhow::{anyhow, Result};
use sqlx::{PgPool, Row};

use optloop_core::types::StrategyKind;

use crate::models::{ApprovedTradeRecord, NewTradeAudit};

/// Repository over the `approved_trades` table.
#[derive(Debug, Clone)]
pub struct TradeLogRepository {
    pool: PgPool,
}

impl TradeLogRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Appends one decision row and returns the generated id.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert(&self, audit: &NewTradeAudit) -> Result<i32> {
        let row: (i32,) = sqlx::query_as(
            r"
            INSERT INTO approved_trades
                (strategy, underlying, confidence, quant_score, risk_score, approved, rationale)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            ",
        )
        .bind(audit.strategy.as_str())
        .bind(&audit.underlying)
        .bind(audit.confidence)
        .bind(audit.quant_score)
        .bind(audit.risk_score)
        .bind(audit.approved)
        .bind(&audit.rationale)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Most recent decision rows, newest first.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row holds an unknown
    /// strategy string.
    pub async fn recent(&self, limit: i64) -> Result<Vec<ApprovedTradeRecord>> {
        let rows = sqlx::query(
            r"
            SELECT id, timestamp, strategy, underlying, confidence,
                   quant_score, risk_score, approved, rationale
            FROM approved_trades
            ORDER BY timestamp DESC
            LIMIT $1
            ",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let strategy: String = row.get("strategy");
            records.push(ApprovedTradeRecord {
                id: row.get("id"),
                timestamp: row.get("timestamp"),
                strategy: StrategyKind::parse(&strategy)
                    .ok_or_else(|| anyhow!("Unknown strategy in audit row: {strategy}"))?,
                underlying: row.get("underlying"),
                confidence: row.get("confidence"),
                quant_score: row.get("quant_score"),
                risk_score: row.get("risk_score"),
                approved: row.get("approved"),
                rationale: row.get("rationale"),
            });
        }

        Ok(records)
    }
}
