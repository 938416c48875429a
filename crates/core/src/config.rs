use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::limits::RiskLimits;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub alpaca: AlpacaConfig,
    pub polygon: PolygonConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Alpaca paper/live REST endpoints and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlpacaConfig {
    pub base_url: String,
    pub key_id: String,
    pub secret_key: String,
}

/// Polygon options snapshot API (primary chain source).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolygonConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Suppress real order submission; decisions and records still flow.
    pub shadow_mode: bool,
    pub cycle_interval_secs: u64,
    /// Skip cycles outside US equity market hours.
    pub enforce_market_hours: bool,
    /// Benchmark symbol driving the market snapshot.
    pub benchmark: String,
    /// Fixed universe of underlyings ideas are drawn from.
    pub universe: Vec<String>,
    /// Auto-close when a position's unrealized P&L reaches this (dollars).
    pub take_profit_usd: Decimal,
    /// Auto-close when unrealized P&L falls to minus this (dollars).
    /// Deliberately looser than the take-profit.
    pub stop_loss_usd: Decimal,
    pub limits: RiskLimits,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost/optloop".to_string(),
                max_connections: 10,
            },
            alpaca: AlpacaConfig {
                base_url: "https://paper-api.alpaca.markets".to_string(),
                key_id: String::new(),
                secret_key: String::new(),
            },
            polygon: PolygonConfig {
                base_url: "https://api.polygon.io".to_string(),
                api_key: String::new(),
            },
            engine: EngineConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shadow_mode: true,
            cycle_interval_secs: 60,
            enforce_market_hours: true,
            benchmark: "SPY".to_string(),
            universe: vec![
                "SPY".to_string(),
                "AAPL".to_string(),
                "TSLA".to_string(),
                "NVDA".to_string(),
                "QQQ".to_string(),
            ],
            take_profit_usd: Decimal::from(20),
            stop_loss_usd: Decimal::from(25),
            limits: RiskLimits::default(),
        }
    }
}
