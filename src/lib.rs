//! Synthetic NASDAQ-ITCH 5.0 market-data feed generator.
//!
//! Thirty fictional symbols move under geometric Brownian motion with
//! sector-correlated shocks; per-symbol order books evolve through weighted
//! add/cancel/replace/trade/replenish flow; the resulting ITCH message
//! stream is broadcast to WebSocket subscribers as bit-exact binary frames
//! or a JSON mirror. Trades persist asynchronously to SQLite alongside
//! periodic full-state snapshots.

pub mod config;
pub mod engine;
pub mod itch;
pub mod orderbook;
pub mod persist;
pub mod session;
pub mod symbols;
