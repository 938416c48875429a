//! Liquidity/volatility sanity filter over the live options chain.

use tracing::{debug, warn};

use optloop_broker::fallback::ChainSource;
use optloop_core::market::OptionContract;
use optloop_core::types::{Idea, Validation};

/// Liquidity floor on mean day volume.
const MIN_AVG_VOLUME: f64 = 100.0;
/// Sane mean-IV bound on stat-reporting sources.
const IV_SANE_MAX: f64 = 5.0;
/// Loosened bound for stat-blind sources, which usually omit IV entirely
/// but may surface a stray figure.
const IV_RELAXED_MAX: f64 = 10.0;
const QUALITY_CAP: f64 = 0.98;

const DTE_MIN: i64 = 7;
const DTE_MAX: i64 = 45;

pub struct IdeaValidator {
    chains: ChainSource,
}

impl IdeaValidator {
    #[must_use]
    pub fn new(chains: ChainSource) -> Self {
        Self { chains }
    }

    /// Checks the idea's underlying chain; first failing check wins.
    /// Deterministic for a fixed chain. Fetch failures become rejections,
    /// never hard errors.
    pub async fn validate(&self, idea: &Idea) -> Validation {
        let fetch = match self.chains.fetch(&idea.underlying, DTE_MIN, DTE_MAX).await {
            Ok(fetch) => fetch,
            Err(e) => {
                warn!(underlying = idea.underlying, error = %e, "Chain fetch failed");
                return Validation::reject(format!("Validation error: {e}"));
            }
        };

        if fetch.contracts.is_empty() {
            return Validation::reject("No options chain data available");
        }

        let avg_iv = mean_iv(&fetch.contracts);
        let avg_volume = mean_volume(&fetch.contracts);
        if fetch.stats_reported {
            if !(avg_iv > 0.0 && avg_iv <= IV_SANE_MAX) {
                return Validation::reject("IV out of reasonable range");
            }
            if avg_volume < MIN_AVG_VOLUME {
                return Validation::reject("Insufficient options liquidity");
            }
        } else if avg_iv > IV_RELAXED_MAX {
            // Stat-blind listing: contract presence is the whole check.
            // The liquidity floor cannot apply and only an absurd stray
            // IV figure is grounds for rejection.
            return Validation::reject("IV out of reasonable range");
        }

        let score = round3(QUALITY_CAP.min(0.5 + avg_iv + avg_volume / 10_000.0));
        debug!(
            underlying = idea.underlying,
            source = fetch.source_name,
            avg_iv,
            avg_volume,
            score,
            "Idea validated"
        );
        Validation::pass(score)
    }
}

/// Mean over contracts that report IV; 0.0 when none do.
fn mean_iv(contracts: &[OptionContract]) -> f64 {
    let ivs: Vec<f64> = contracts.iter().filter_map(|c| c.implied_volatility).collect();
    if ivs.is_empty() {
        return 0.0;
    }
    ivs.iter().sum::<f64>() / ivs.len() as f64
}

/// Mean over contracts that report volume; 0.0 when none do.
fn mean_volume(contracts: &[OptionContract]) -> f64 {
    let volumes: Vec<u64> = contracts.iter().filter_map(|c| c.volume).collect();
    if volumes.is_empty() {
        return 0.0;
    }
    volumes.iter().sum::<u64>() as f64 / volumes.len() as f64
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}
