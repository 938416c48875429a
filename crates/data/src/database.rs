//! Connection pool ownership and idempotent schema bootstrap.

use anyhow::Result;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

pub struct DatabaseClient {
    pool: PgPool,
}

impl DatabaseClient {
    /// Connects to Postgres with a bounded pool.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> PgPool {
        self.pool.clone()
    }

    /// Creates tables and indexes if they do not exist. Safe to run on
    /// every startup.
    ///
    /// # Errors
    /// Returns an error if any DDL statement fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS approved_trades (
                id SERIAL PRIMARY KEY,
                timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                strategy TEXT NOT NULL,
                underlying TEXT NOT NULL,
                confidence DOUBLE PRECISION NOT NULL,
                quant_score DOUBLE PRECISION,
                risk_score DOUBLE PRECISION,
                approved BOOLEAN NOT NULL,
                rationale TEXT NOT NULL DEFAULT ''
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS positions (
                id SERIAL PRIMARY KEY,
                trade_timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                strategy TEXT NOT NULL,
                underlying TEXT NOT NULL,
                entry_price NUMERIC NOT NULL,
                current_price NUMERIC,
                unrealized_pnl NUMERIC NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'open',
                fallback_used BOOLEAN NOT NULL DEFAULT FALSE,
                close_reason TEXT,
                closed_at TIMESTAMPTZ
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        // Upgrade path for tables created before the column existed.
        sqlx::query(
            "ALTER TABLE positions ADD COLUMN IF NOT EXISTS \
             fallback_used BOOLEAN NOT NULL DEFAULT FALSE",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_positions_status ON positions(status)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_positions_underlying_status \
             ON positions(underlying, status)",
        )
        .execute(&self.pool)
        .await?;

        info!("Database schema ready");
        Ok(())
    }
}
