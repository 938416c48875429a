//! Persisted row shapes for the audit trail and position ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use optloop_core::types::StrategyKind;

/// Lifecycle status of a position. The open -> closed transition is
/// monotonic; nothing reopens a closed position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    Closed,
}

impl PositionStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

/// Append-only audit row: idea + validation + risk outcome in one record.
///
/// Written for every validated idea whether or not it was approved;
/// `approved` is a field, not a filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovedTradeRecord {
    pub id: i32,
    pub timestamp: DateTime<Utc>,
    pub strategy: StrategyKind,
    pub underlying: String,
    pub confidence: f64,
    pub quant_score: Option<f64>,
    pub risk_score: Option<f64>,
    pub approved: bool,
    pub rationale: String,
}

/// Insert form of [`ApprovedTradeRecord`]; id and timestamp are assigned
/// by the database.
#[derive(Debug, Clone)]
pub struct NewTradeAudit {
    pub strategy: StrategyKind,
    pub underlying: String,
    pub confidence: f64,
    pub quant_score: Option<f64>,
    pub risk_score: Option<f64>,
    pub approved: bool,
    pub rationale: String,
}

/// One tracked position. Mutated in place by the ledger on every
/// mark-to-market sweep until it closes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionRecord {
    pub id: i32,
    pub trade_timestamp: DateTime<Utc>,
    pub strategy: StrategyKind,
    pub underlying: String,
    /// True when the intended multi-leg strategy could not execute and
    /// the single-leg fallback traded instead; `strategy` keeps the
    /// intent, this flag records the actual exposure.
    pub fallback_used: bool,
    pub entry_price: Decimal,
    pub current_price: Option<Decimal>,
    pub unrealized_pnl: Decimal,
    pub status: PositionStatus,
    pub close_reason: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_status_round_trips() {
        assert_eq!(PositionStatus::parse("open"), Some(PositionStatus::Open));
        assert_eq!(PositionStatus::parse("closed"), Some(PositionStatus::Closed));
        assert_eq!(PositionStatus::parse("pending"), None);
        assert_eq!(PositionStatus::Closed.as_str(), "closed");
    }
}
