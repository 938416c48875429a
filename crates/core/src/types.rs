//! Domain types for the decision pipeline.
//!
//! Everything here is immutable once produced: a `MarketSnapshot` is built
//! once per cycle, `Idea`s are never mutated after generation, and the
//! validation/risk outcomes are plain data consumed by the audit trail.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Qualitative shape of the volatility curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkewClass {
    Flat,
    SteepPut,
    SteepCall,
}

impl SkewClass {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::SteepPut => "steep_put",
            Self::SteepCall => "steep_call",
        }
    }

    /// True for either tilted variant.
    #[must_use]
    pub fn is_steep(&self) -> bool {
        !matches!(self, Self::Flat)
    }
}

impl std::fmt::Display for SkewClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse directional read of the benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Momentum {
    Bullish,
    Bearish,
}

impl std::fmt::Display for Momentum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => f.write_str("bullish"),
            Self::Bearish => f.write_str("bearish"),
        }
    }
}

/// Volatility environment classification driven by the benchmark index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    HighVol,
    LowVol,
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HighVol => f.write_str("high_vol"),
            Self::LowVol => f.write_str("low_vol"),
        }
    }
}

/// Normalized view of the market, produced once per cycle by the data
/// collaborator and consumed read-only by every downstream stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Percentile of current IV within its recent range, 0-100.
    pub iv_rank: f64,
    pub skew: SkewClass,
    pub vix: f64,
    pub momentum: Momentum,
    pub regime: Regime,
    /// Benchmark spot price.
    pub spot: Decimal,
}

/// The fixed strategy universe scored every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Straddle,
    IronCondor,
    CalendarSpread,
}

impl StrategyKind {
    pub const ALL: [Self; 3] = [Self::Straddle, Self::IronCondor, Self::CalendarSpread];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Straddle => "straddle",
            Self::IronCondor => "iron_condor",
            Self::CalendarSpread => "calendar_spread",
        }
    }

    /// Parses the persisted string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "straddle" => Some(Self::Straddle),
            "iron_condor" => Some(Self::IronCondor),
            "calendar_spread" => Some(Self::CalendarSpread),
            _ => None,
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate trade emitted by the generator. Never mutated after
/// creation; flows through validation, risk, and execution in the same
/// cycle it was produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Idea {
    pub strategy: StrategyKind,
    pub underlying: String,
    /// 0.55 + 0.40 * score, so always in (0.55, 0.99] when emitted.
    pub confidence: f64,
    /// Human-readable audit trail of the inputs behind the score.
    pub rationale: String,
    pub created_at: DateTime<Utc>,
}

/// Outcome of the liquidity/volatility sanity filter for one idea.
///
/// A rejection is expected control flow, not an error; the reason string
/// ends up verbatim in the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Validation {
    pub valid: bool,
    pub quality_score: Option<f64>,
    pub reject_reason: Option<String>,
}

impl Validation {
    #[must_use]
    pub fn pass(quality_score: f64) -> Self {
        Self {
            valid: true,
            quality_score: Some(quality_score),
            reject_reason: None,
        }
    }

    #[must_use]
    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            quality_score: None,
            reject_reason: Some(reason.into()),
        }
    }
}

/// Outcome of the portfolio risk gate for one validated idea.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskDecision {
    pub approved: bool,
    /// Normalized risk utilization (|drawdown| / limit), not a probability.
    pub risk_score: Option<f64>,
    pub reject_reason: Option<String>,
}

impl RiskDecision {
    #[must_use]
    pub fn approve(risk_score: f64) -> Self {
        Self {
            approved: true,
            risk_score: Some(risk_score),
            reject_reason: None,
        }
    }

    #[must_use]
    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            risk_score: None,
            reject_reason: Some(reason.into()),
        }
    }
}
