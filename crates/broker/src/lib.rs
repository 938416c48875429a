//! Collaborator implementations behind the decision loop.
//!
//! Three live integrations (Polygon chain snapshots, Alpaca account/orders,
//! Yahoo quote feed) plus a deterministic paper broker for shadow runs and
//! tests, and the ordered chain-source fallback combinator.

pub mod alpaca;
pub mod fallback;
pub mod market;
pub mod paper;
pub mod polygon;

pub use alpaca::AlpacaClient;
pub use fallback::{ChainFetch, ChainSource};
pub use market::YahooMarketData;
pub use paper::PaperBroker;
pub use polygon::PolygonChain;
