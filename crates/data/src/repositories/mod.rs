pub mod position_repo;
pub mod trade_log_repo;

pub use position_repo::PositionRepository;
pub use trade_log_repo::TradeLogRepository;
