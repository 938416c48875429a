//! The autonomous decision loop.
//!
//! One cycle: snapshot -> generate ideas -> validate -> risk-gate ->
//! execute -> record -> mark-to-market sweep. Every stage is fail-soft:
//! a broken collaborator degrades that stage, never the loop.

pub mod cycle;
pub mod error;
pub mod generator;
pub mod hours;
pub mod ledger;
pub mod orders;
pub mod risk;
pub mod service;
pub mod strikes;
pub mod validator;

pub use cycle::{Collaborators, CycleController, CycleSummary};
pub use error::EngineError;
pub use generator::{IdeaGenerator, RandomPicker, UnderlyingPicker};
pub use ledger::PositionLedger;
pub use orders::{ExecutionReport, OrderConstructor};
pub use risk::RiskGate;
pub use validator::IdeaValidator;
