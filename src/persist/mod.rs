//! State persistence: SQLite store, snapshots, the trade pipeline, and
//! read-side queries.

pub mod pipeline;
pub mod queries;
pub mod snapshot;
pub mod store;

pub use pipeline::{TradePipeline, TradeRecord};
pub use queries::{Candle, CandleFilter, Trade, TradeFilter, TradeStats};
pub use snapshot::Snapshotter;
pub use store::Store;
