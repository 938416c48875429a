//! Market snapshot synthesis from public quote data.
//!
//! Derives the per-cycle `MarketSnapshot` the way the desk reads the tape:
//! VIX level sets the regime, the benchmark's 5-day drift sets momentum and
//! skew, and IV rank comes from the primary chain source's IV distribution.
//! Any upstream failure degrades to `None` so the cycle skips cleanly.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

use optloop_core::traits::MarketDataProvider;
use optloop_core::types::{MarketSnapshot, Momentum, Regime, SkewClass};

use crate::fallback::ChainSource;

const DEFAULT_QUOTE_URL: &str = "https://query1.finance.yahoo.com";
/// Neutral midpoint used when the chain has no IV distribution to rank.
const FALLBACK_IV_RANK: f64 = 50.0;

/// Snapshot provider over Yahoo's chart endpoint plus the chain source.
pub struct YahooMarketData {
    http: reqwest::Client,
    base_url: String,
    benchmark: String,
    chains: ChainSource,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Vec<ChartResult>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteBlock>,
}

#[derive(Debug, Deserialize)]
struct QuoteBlock {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

impl YahooMarketData {
    #[must_use]
    pub fn new(benchmark: &str, chains: ChainSource) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_QUOTE_URL.to_string(),
            benchmark: benchmark.to_string(),
            chains,
        }
    }

    /// Override the quote endpoint (tests, proxies).
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Daily closes for `symbol` over the trailing `days` trading days.
    async fn closes(&self, symbol: &str, days: u8) -> Result<Vec<f64>> {
        let url = format!(
            "{}/v8/finance/chart/{}",
            self.base_url,
            urlencode(symbol)
        );
        let response: ChartResponse = self
            .http
            .get(&url)
            .query(&[("range", format!("{days}d")), ("interval", "1d".into())])
            .send()
            .await
            .with_context(|| format!("Quote request failed for {symbol}"))?
            .error_for_status()
            .with_context(|| format!("Quote endpoint errored for {symbol}"))?
            .json()
            .await
            .with_context(|| format!("Quote body did not parse for {symbol}"))?;

        let closes: Vec<f64> = response
            .chart
            .result
            .first()
            .and_then(|r| r.indicators.quote.first())
            .map(|q| q.close.iter().filter_map(|c| *c).collect())
            .unwrap_or_default();

        if closes.is_empty() {
            return Err(anyhow!("No closes returned for {symbol}"));
        }
        Ok(closes)
    }

    /// Percentile of the chain's mean IV within its own min/max range.
    async fn iv_rank(&self) -> f64 {
        let fetch = match self.chains.fetch(&self.benchmark, 7, 45).await {
            Ok(fetch) => fetch,
            Err(e) => {
                warn!(error = %e, "IV rank fetch failed, using fallback");
                return FALLBACK_IV_RANK;
            }
        };

        let ivs: Vec<f64> = fetch
            .contracts
            .iter()
            .filter_map(|c| c.implied_volatility)
            .collect();
        if ivs.is_empty() {
            return FALLBACK_IV_RANK;
        }

        let current = ivs.iter().sum::<f64>() / ivs.len() as f64;
        let min = ivs.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = ivs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if max <= min {
            return FALLBACK_IV_RANK;
        }
        ((current - min) / (max - min) * 100.0).clamp(0.0, 100.0)
    }
}

fn urlencode(symbol: &str) -> String {
    symbol.replace('^', "%5E")
}

#[async_trait]
impl MarketDataProvider for YahooMarketData {
    async fn snapshot(&self) -> Result<Option<MarketSnapshot>> {
        let (vix, closes) = match tokio::try_join!(
            self.closes("^VIX", 1),
            self.closes(&self.benchmark, 5)
        ) {
            Ok((vix_closes, closes)) => {
                let Some(vix) = vix_closes.last().copied() else {
                    return Ok(None);
                };
                (vix, closes)
            }
            Err(e) => {
                warn!(error = %e, "Market data fetch failed, skipping cycle");
                return Ok(None);
            }
        };

        let Some(spot) = closes.last().copied() else {
            return Ok(None);
        };
        let first = closes.first().copied().unwrap_or(spot);

        let mean_drift = if closes.len() > 1 {
            closes
                .windows(2)
                .map(|w| (w[1] - w[0]) / w[0])
                .sum::<f64>()
                / (closes.len() - 1) as f64
        } else {
            0.0
        };

        let skew = if vix < 20.0 {
            SkewClass::Flat
        } else if mean_drift < 0.0 {
            SkewClass::SteepPut
        } else {
            SkewClass::SteepCall
        };
        let momentum = if spot > first {
            Momentum::Bullish
        } else {
            Momentum::Bearish
        };
        let regime = if vix > 25.0 {
            Regime::HighVol
        } else {
            Regime::LowVol
        };

        let Some(spot) = Decimal::from_f64_retain(spot) else {
            return Ok(None);
        };

        Ok(Some(MarketSnapshot {
            iv_rank: self.iv_rank().await,
            skew,
            vix,
            momentum,
            regime,
            spot,
        }))
    }
}
