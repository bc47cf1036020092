//! SQLite-backed state store.
//!
//! A single connection behind an async mutex; WAL journaling so feed
//! latency is not coupled to reader traffic. The schema is created on open.

use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tokio::sync::Mutex;
use tracing::info;

/// Wraps the SQLite connection shared by the snapshotter, the trade
/// writers, and the query helpers.
#[derive(Clone)]
pub struct Store {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Opens (or creates) the database and ensures the schema exists.
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).context("open feed db")?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS sim_state (
                key TEXT PRIMARY KEY,
                value_bytes BLOB,
                value_int INTEGER,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS symbols (
                locate_code INTEGER PRIMARY KEY,
                ticker TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                sector TEXT NOT NULL,
                base_price REAL NOT NULL,
                current_price REAL NOT NULL,
                tick_size REAL NOT NULL,
                volatility REAL NOT NULL,
                is_stress INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS orders (
                id INTEGER PRIMARY KEY,
                symbol_locate INTEGER NOT NULL,
                side TEXT NOT NULL,
                price REAL NOT NULL,
                shares INTEGER NOT NULL,
                priority INTEGER NOT NULL,
                mpid TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_orders_locate ON orders(symbol_locate)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS trades (
                match_number INTEGER PRIMARY KEY,
                symbol_locate INTEGER NOT NULL,
                ticker TEXT NOT NULL,
                price REAL NOT NULL,
                shares INTEGER NOT NULL,
                aggressor TEXT NOT NULL,
                executed_at INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_trades_locate_time
             ON trades(symbol_locate, executed_at DESC)",
            [],
        )?;

        info!(db_path, "feed database ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.db");
        let store = Store::open(path.to_str().unwrap()).unwrap();

        let conn = store.conn.try_lock().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('sim_state', 'symbols', 'orders', 'trades')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 4);
    }

    #[test]
    fn open_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.db");
        Store::open(path.to_str().unwrap()).unwrap();
        Store::open(path.to_str().unwrap()).unwrap();
    }
}
