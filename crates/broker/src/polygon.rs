//! Polygon options snapshot client — the primary chain source.
//!
//! Unlike the brokerage contract listing, Polygon snapshots carry implied
//! volatility and day volume, which is what the idea validator's sanity
//! checks need.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use optloop_core::config::PolygonConfig;
use optloop_core::market::{OptionContract, OptionRight};
use optloop_core::traits::OptionsChainProvider;

const SNAPSHOT_LIMIT: u32 = 250;

/// REST client for `GET /v3/snapshot/options/{underlying}`.
#[derive(Clone)]
pub struct PolygonChain {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct SnapshotResponse {
    #[serde(default)]
    results: Vec<SnapshotContract>,
}

#[derive(Debug, Deserialize)]
struct SnapshotContract {
    details: ContractDetails,
    implied_volatility: Option<f64>,
    day: Option<DayStats>,
}

#[derive(Debug, Deserialize)]
struct ContractDetails {
    ticker: String,
    contract_type: String,
    strike_price: f64,
    expiration_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct DayStats {
    close: Option<f64>,
    volume: Option<u64>,
}

impl PolygonChain {
    #[must_use]
    pub fn new(config: &PolygonConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    fn to_contract(snap: SnapshotContract) -> Option<OptionContract> {
        let right = match snap.details.contract_type.as_str() {
            "call" => OptionRight::Call,
            "put" => OptionRight::Put,
            _ => return None,
        };
        let close = snap.day.as_ref().and_then(|d| d.close).unwrap_or(0.0);
        Some(OptionContract {
            symbol: snap.details.ticker,
            right,
            strike: Decimal::from_f64_retain(snap.details.strike_price)?,
            expiry: snap.details.expiration_date,
            reference_price: Decimal::from_f64_retain(close)?,
            implied_volatility: snap.implied_volatility,
            volume: snap.day.and_then(|d| d.volume),
        })
    }
}

#[async_trait]
impl OptionsChainProvider for PolygonChain {
    async fn chain(
        &self,
        underlying: &str,
        dte_min: i64,
        dte_max: i64,
    ) -> Result<Vec<OptionContract>> {
        let url = format!("{}/v3/snapshot/options/{underlying}", self.base_url);
        let response: SnapshotResponse = self
            .http
            .get(&url)
            .query(&[
                ("limit", SNAPSHOT_LIMIT.to_string()),
                ("apiKey", self.api_key.clone()),
            ])
            .send()
            .await
            .context("Polygon snapshot request failed")?
            .error_for_status()
            .context("Polygon snapshot returned an error status")?
            .json()
            .await
            .context("Polygon snapshot body did not parse")?;

        let today = Utc::now().date_naive();
        let contracts: Vec<OptionContract> = response
            .results
            .into_iter()
            .filter_map(Self::to_contract)
            .filter(|c| {
                let dte = (c.expiry - today).num_days();
                dte >= dte_min && dte <= dte_max
            })
            .collect();

        debug!(underlying, count = contracts.len(), "Polygon chain fetched");
        Ok(contracts)
    }

    fn name(&self) -> &'static str {
        "polygon"
    }

    fn reports_stats(&self) -> bool {
        true
    }
}
