pub mod database;
pub mod memory;
pub mod models;
pub mod repositories;
pub mod store;

pub use database::DatabaseClient;
pub use memory::MemoryTradeStore;
pub use models::{ApprovedTradeRecord, NewTradeAudit, PositionRecord, PositionStatus};
pub use repositories::{PositionRepository, TradeLogRepository};
pub use store::{PgTradeStore, TradeStore};
