//! WebSocket session layer: client registry, subscriptions, and fan-out.

pub mod client;
pub mod handler;
pub mod manager;

pub use client::{Client, ClientFormat};
pub use handler::{ws_handler, FeedState};
pub use manager::SessionManager;
