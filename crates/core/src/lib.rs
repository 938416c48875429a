pub mod config;
pub mod config_loader;
pub mod limits;
pub mod market;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use config_loader::ConfigLoader;
pub use limits::RiskLimits;
