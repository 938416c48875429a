//! Ordered chain-source fallback.
//!
//! Providers are tried in sequence; the first one that answers with a
//! non-empty listing wins. A source that errors or comes back empty is
//! logged and skipped. Callers learn whether the answering source
//! publishes IV/volume stats so they can relax checks that depend on
//! those fields, regardless of where the source sits in the order.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::warn;

use optloop_core::market::OptionContract;
use optloop_core::traits::OptionsChainProvider;

/// A chain listing together with the source that produced it.
#[derive(Debug, Clone)]
pub struct ChainFetch {
    pub contracts: Vec<OptionContract>,
    pub source_name: &'static str,
    /// Whether the answering source publishes IV and day-volume figures.
    pub stats_reported: bool,
}

/// Ordered list of chain providers tried in sequence.
#[derive(Clone)]
pub struct ChainSource {
    providers: Vec<Arc<dyn OptionsChainProvider>>,
}

impl ChainSource {
    #[must_use]
    pub fn new(providers: Vec<Arc<dyn OptionsChainProvider>>) -> Self {
        Self { providers }
    }

    /// Fetches a chain for `underlying` within the DTE window.
    ///
    /// Returns an empty `ChainFetch` only when at least one source
    /// answered successfully but had no contracts; errors out only when
    /// every source failed.
    ///
    /// # Errors
    /// Returns the last source error when no provider produced an answer.
    pub async fn fetch(
        &self,
        underlying: &str,
        dte_min: i64,
        dte_max: i64,
    ) -> Result<ChainFetch> {
        let mut empty_answer: Option<ChainFetch> = None;
        let mut last_err: Option<anyhow::Error> = None;

        for provider in &self.providers {
            match provider.chain(underlying, dte_min, dte_max).await {
                Ok(contracts) if !contracts.is_empty() => {
                    return Ok(ChainFetch {
                        contracts,
                        source_name: provider.name(),
                        stats_reported: provider.reports_stats(),
                    });
                }
                Ok(_) => {
                    if empty_answer.is_none() {
                        empty_answer = Some(ChainFetch {
                            contracts: Vec::new(),
                            source_name: provider.name(),
                            stats_reported: provider.reports_stats(),
                        });
                    }
                }
                Err(e) => {
                    warn!(
                        source = provider.name(),
                        underlying,
                        error = %e,
                        "Chain source failed, trying next"
                    );
                    last_err = Some(e);
                }
            }
        }

        if let Some(empty) = empty_answer {
            return Ok(empty);
        }
        Err(last_err.unwrap_or_else(|| anyhow!("No chain providers configured")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use optloop_core::market::OptionRight;
    use rust_decimal_macros::dec;

    struct Fixed {
        name: &'static str,
        stats: bool,
        result: std::result::Result<usize, &'static str>,
    }

    #[async_trait]
    impl OptionsChainProvider for Fixed {
        async fn chain(
            &self,
            _underlying: &str,
            _dte_min: i64,
            _dte_max: i64,
        ) -> Result<Vec<OptionContract>> {
            match self.result {
                Ok(n) => Ok((0..n)
                    .map(|i| OptionContract {
                        symbol: format!("TEST{i}"),
                        right: OptionRight::Call,
                        strike: dec!(100),
                        expiry: (Utc::now() + Duration::days(30)).date_naive(),
                        reference_price: dec!(1.25),
                        implied_volatility: Some(0.3),
                        volume: Some(500),
                    })
                    .collect()),
                Err(msg) => Err(anyhow!(msg)),
            }
        }

        fn name(&self) -> &'static str {
            self.name
        }

        fn reports_stats(&self) -> bool {
            self.stats
        }
    }

    fn source(tiers: Vec<Fixed>) -> ChainSource {
        ChainSource::new(
            tiers
                .into_iter()
                .map(|t| Arc::new(t) as Arc<dyn OptionsChainProvider>)
                .collect(),
        )
    }

    #[tokio::test]
    async fn first_source_wins_when_it_answers() {
        let chains = source(vec![
            Fixed { name: "primary", stats: true, result: Ok(3) },
            Fixed { name: "secondary", stats: false, result: Ok(5) },
        ]);
        let fetch = chains.fetch("SPY", 7, 45).await.unwrap();
        assert_eq!(fetch.source_name, "primary");
        assert!(fetch.stats_reported);
        assert_eq!(fetch.contracts.len(), 3);
    }

    #[tokio::test]
    async fn failing_source_falls_through_to_the_next() {
        let chains = source(vec![
            Fixed { name: "primary", stats: true, result: Err("rate limited") },
            Fixed { name: "secondary", stats: false, result: Ok(2) },
        ]);
        let fetch = chains.fetch("SPY", 7, 45).await.unwrap();
        assert_eq!(fetch.source_name, "secondary");
        assert!(!fetch.stats_reported);
    }

    #[tokio::test]
    async fn stats_flag_follows_the_source_not_the_position() {
        // A stat-blind source wired first still reports itself stat-blind.
        let chains = source(vec![Fixed { name: "secondary", stats: false, result: Ok(4) }]);
        let fetch = chains.fetch("SPY", 7, 45).await.unwrap();
        assert!(!fetch.stats_reported);
    }

    #[tokio::test]
    async fn empty_answer_beats_a_hard_error() {
        let chains = source(vec![
            Fixed { name: "primary", stats: true, result: Ok(0) },
            Fixed { name: "secondary", stats: false, result: Err("down") },
        ]);
        let fetch = chains.fetch("SPY", 7, 45).await.unwrap();
        assert!(fetch.contracts.is_empty());
    }

    #[tokio::test]
    async fn all_sources_failing_is_an_error() {
        let chains = source(vec![
            Fixed { name: "primary", stats: true, result: Err("down") },
            Fixed { name: "secondary", stats: false, result: Err("also down") },
        ]);
        assert!(chains.fetch("SPY", 7, 45).await.is_err());
    }
}
