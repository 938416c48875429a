//! Engine error taxonomy.
//!
//! Only genuine failures live here. Validation and risk rejections are
//! expected outcomes carried as data (`Validation` / `RiskDecision`) and
//! never pass through this type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A data source could not be reached; callers degrade, not abort.
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    /// Leg resolution or order submission failed after fallback.
    #[error("execution failed: {0}")]
    Execution(String),

    /// A store write failed; the in-memory decision stands, the audit
    /// trail may be incomplete.
    #[error("persistence failed: {0}")]
    Persistence(String),
}
