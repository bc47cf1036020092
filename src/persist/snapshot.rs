//! Periodic full-state snapshots and trade persistence.
//!
//! A snapshot upserts every symbol's current price, replaces the orders
//! table wholesale, and saves the PRNG state and reference counters, all
//! inside one transaction so a crash never leaves a torn snapshot.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::params;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::engine::{MarketEngine, Rng};
use crate::orderbook::{
    match_counter, order_id_counter, set_match_counter, set_order_id_counter, Order, Side,
    Simulator,
};
use crate::persist::store::Store;
use crate::symbols::Symbol;

const FINAL_SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);

/// Persists and restores the complete simulator state.
pub struct Snapshotter {
    store: Store,
    market: Arc<MarketEngine>,
    sims: HashMap<u16, Arc<Simulator>>,
    rng: Arc<Rng>,
    symbols: Vec<Symbol>,
    ticker_by_locate: HashMap<u16, &'static str>,
}

impl Snapshotter {
    pub fn new(
        store: Store,
        market: Arc<MarketEngine>,
        sims: HashMap<u16, Arc<Simulator>>,
        rng: Arc<Rng>,
        symbols: &[Symbol],
    ) -> Self {
        let ticker_by_locate = symbols.iter().map(|s| (s.locate_code, s.ticker)).collect();
        Self {
            store,
            market,
            sims,
            rng,
            symbols: symbols.to_vec(),
            ticker_by_locate,
        }
    }

    /// Snapshot loop: saves on a fixed interval, and once more on shutdown
    /// with its own short timeout. Failed saves are logged and retried on
    /// the next tick; they never stop the simulator.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await; // immediate first tick

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.save().await {
                        warn!(error = %e, "snapshot failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("performing final snapshot");
                    match tokio::time::timeout(FINAL_SNAPSHOT_TIMEOUT, self.save()).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => error!(error = %e, "final snapshot failed"),
                        Err(_) => error!("final snapshot timed out"),
                    }
                    return;
                }
            }
        }
    }

    /// Writes the full simulator state in a single transaction.
    pub async fn save(&self) -> Result<()> {
        let start = std::time::Instant::now();
        let prices = self.market.snapshot();
        let orders: Vec<Order> = self
            .sims
            .values()
            .flat_map(|sim| sim.book().all_orders())
            .collect();
        let rng_state = self.rng.state_bytes();
        let now = Utc::now().timestamp();

        let mut conn = self.store.conn.lock().await;
        let tx = conn.transaction().context("begin snapshot transaction")?;

        for sym in &self.symbols {
            let price = prices.get(&sym.locate_code).copied().unwrap_or(sym.base_price);
            tx.execute(
                "INSERT INTO symbols
                 (locate_code, ticker, name, sector, base_price, current_price,
                  tick_size, volatility, is_stress)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(locate_code) DO UPDATE SET
                    current_price = excluded.current_price",
                params![
                    sym.locate_code,
                    sym.ticker,
                    sym.name,
                    sym.sector.as_str(),
                    sym.base_price,
                    price,
                    sym.tick_size,
                    sym.volatility_multiplier,
                    sym.is_stress,
                ],
            )
            .with_context(|| format!("upsert symbol {}", sym.ticker))?;
        }

        // Replace the whole book snapshot: delete-all then bulk insert.
        tx.execute("DELETE FROM orders", [])
            .context("clear orders")?;
        for o in &orders {
            tx.execute(
                "INSERT INTO orders (id, symbol_locate, side, price, shares, priority, mpid)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    o.id as i64,
                    o.locate,
                    (o.side.as_byte() as char).to_string(),
                    o.price,
                    o.shares,
                    o.priority,
                    o.mpid,
                ],
            )
            .context("insert order")?;
        }

        upsert_state_bytes(&tx, "rng_state", &rng_state, now)?;
        upsert_state_int(&tx, "order_id_counter", order_id_counter() as i64, now)?;
        upsert_state_int(&tx, "match_counter", match_counter() as i64, now)?;

        tx.commit().context("commit snapshot")?;
        info!(
            orders = orders.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "snapshot saved"
        );
        Ok(())
    }

    /// Restores simulator state. Returns false (fresh start) when nothing
    /// is persisted yet.
    pub async fn load(&self) -> Result<bool> {
        let conn = self.store.conn.lock().await;

        let symbol_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM symbols", [], |row| row.get(0))
            .context("check symbols")?;
        if symbol_count == 0 {
            info!("no persisted state found, starting fresh");
            return Ok(false);
        }

        let mut stmt = conn.prepare_cached("SELECT locate_code, current_price FROM symbols")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, u16>(0)?, row.get::<_, f64>(1)?))
        })?;
        for row in rows {
            let (locate, price) = row.context("decode symbol row")?;
            self.market.set_price(locate, price);
        }

        let mut stmt = conn.prepare_cached(
            "SELECT id, symbol_locate, side, price, shares, priority, mpid FROM orders",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, u16>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, i32>(4)?,
                row.get::<_, i32>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut order_count = 0usize;
        for row in rows {
            let (id, locate, side, price, shares, priority, mpid) =
                row.context("decode order row")?;
            let Some(sim) = self.sims.get(&locate) else {
                continue;
            };
            let Some(side) = side.bytes().next().and_then(Side::from_byte) else {
                continue;
            };
            sim.book().restore_order(Order {
                id: id as u64,
                locate,
                side,
                price,
                shares,
                priority,
                mpid,
            });
            order_count += 1;
        }

        if let Ok(Some(bytes)) = state_bytes(&conn, "rng_state") {
            if bytes.len() >= 16 {
                self.rng.restore_state_bytes(&bytes);
            }
        }
        if let Ok(Some(v)) = state_int(&conn, "order_id_counter") {
            set_order_id_counter(v as u64);
        }
        if let Ok(Some(v)) = state_int(&conn, "match_counter") {
            set_match_counter(v as u64);
        }

        info!(symbols = symbol_count, orders = order_count, "restored state");
        Ok(true)
    }

    /// Persists one executed trade. Duplicate match numbers are treated as
    /// success so redelivery is harmless.
    pub async fn save_trade(
        &self,
        match_number: u64,
        locate: u16,
        price: f64,
        shares: i32,
        aggressor: u8,
    ) -> Result<()> {
        let ticker = self.ticker_by_locate.get(&locate).copied().unwrap_or("");
        let conn = self.store.conn.lock().await;
        conn.execute(
            "INSERT OR IGNORE INTO trades
             (match_number, symbol_locate, ticker, price, shares, aggressor, executed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                match_number as i64,
                locate,
                ticker,
                price,
                shares,
                (aggressor as char).to_string(),
                Utc::now().timestamp_millis(),
            ],
        )
        .context("insert trade")?;
        Ok(())
    }
}

fn upsert_state_bytes(
    tx: &rusqlite::Transaction<'_>,
    key: &str,
    value: &[u8],
    now: i64,
) -> Result<()> {
    tx.execute(
        "INSERT INTO sim_state (key, value_bytes, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET
            value_bytes = excluded.value_bytes,
            updated_at = excluded.updated_at",
        params![key, value, now],
    )
    .with_context(|| format!("save {key}"))?;
    Ok(())
}

fn upsert_state_int(tx: &rusqlite::Transaction<'_>, key: &str, value: i64, now: i64) -> Result<()> {
    tx.execute(
        "INSERT INTO sim_state (key, value_int, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET
            value_int = excluded.value_int,
            updated_at = excluded.updated_at",
        params![key, value, now],
    )
    .with_context(|| format!("save {key}"))?;
    Ok(())
}

fn state_bytes(conn: &rusqlite::Connection, key: &str) -> Result<Option<Vec<u8>>> {
    let mut stmt = conn.prepare_cached("SELECT value_bytes FROM sim_state WHERE key = ?1")?;
    let mut rows = stmt.query(params![key])?;
    match rows.next()? {
        Some(row) => Ok(row.get(0)?),
        None => Ok(None),
    }
}

fn state_int(conn: &rusqlite::Connection, key: &str) -> Result<Option<i64>> {
    let mut stmt = conn.prepare_cached("SELECT value_int FROM sim_state WHERE key = ?1")?;
    let mut rows = stmt.query(params![key])?;
    match rows.next()? {
        Some(row) => Ok(row.get(0)?),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::Book;
    use crate::symbols::ALL_SYMBOLS;

    fn snapshotter(dir: &tempfile::TempDir) -> Snapshotter {
        let store = Store::open(dir.path().join("feed.db").to_str().unwrap()).unwrap();
        let rng = Arc::new(Rng::new(42));
        let market = Arc::new(MarketEngine::new(rng.clone(), &ALL_SYMBOLS));
        let mut sims = HashMap::new();
        for s in &ALL_SYMBOLS {
            let book = Arc::new(Book::new(s.locate_code, s.tick_size));
            sims.insert(
                s.locate_code,
                Arc::new(Simulator::new(rng.clone(), book, s.locate_code, s.tick_size)),
            );
        }
        Snapshotter::new(store, market, sims, rng, &ALL_SYMBOLS)
    }

    #[tokio::test]
    async fn load_on_empty_db_reports_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let snap = snapshotter(&dir);
        assert!(!snap.load().await.unwrap());
    }

    #[tokio::test]
    async fn save_then_load_round_trips_state() {
        let dir = tempfile::tempdir().unwrap();
        let snap = snapshotter(&dir);

        snap.market.set_price(1, 190.55);
        snap.sims.get(&1).unwrap().initialize(190.55);
        let order_count = snap.sims.get(&1).unwrap().book().order_count();
        let rng_bytes = snap.rng.state_bytes();
        snap.save().await.unwrap();

        // Fresh in-memory state against the same database.
        let store = Store::open(dir.path().join("feed.db").to_str().unwrap()).unwrap();
        let rng = Arc::new(Rng::new(1));
        let market = Arc::new(MarketEngine::new(rng.clone(), &ALL_SYMBOLS));
        let mut sims = HashMap::new();
        for s in &ALL_SYMBOLS {
            let book = Arc::new(Book::new(s.locate_code, s.tick_size));
            sims.insert(
                s.locate_code,
                Arc::new(Simulator::new(rng.clone(), book, s.locate_code, s.tick_size)),
            );
        }
        let restored = Snapshotter::new(store, market.clone(), sims, rng.clone(), &ALL_SYMBOLS);

        assert!(restored.load().await.unwrap());
        assert_eq!(market.price(1), 190.55);
        assert_eq!(
            restored.sims.get(&1).unwrap().book().order_count(),
            order_count
        );
        assert_eq!(rng.state_bytes(), rng_bytes);
    }

    #[tokio::test]
    async fn save_trade_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let snap = snapshotter(&dir);

        snap.save_trade(77, 1, 185.25, 300, b'B').await.unwrap();
        snap.save_trade(77, 1, 185.25, 300, b'B').await.unwrap();

        let conn = snap.store.conn.lock().await;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM trades", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
        let ticker: String = conn
            .query_row("SELECT ticker FROM trades WHERE match_number = 77", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(ticker, "NEXO");
    }

    #[tokio::test]
    async fn snapshot_overwrites_previous_orders() {
        let dir = tempfile::tempdir().unwrap();
        let snap = snapshotter(&dir);

        snap.sims.get(&1).unwrap().initialize(100.0);
        snap.save().await.unwrap();
        let first: i64 = {
            let conn = snap.store.conn.lock().await;
            conn.query_row("SELECT COUNT(*) FROM orders", [], |r| r.get(0))
                .unwrap()
        };
        assert_eq!(first, 60);

        // A later snapshot replaces, not appends.
        snap.save().await.unwrap();
        let second: i64 = {
            let conn = snap.store.conn.lock().await;
            conn.query_row("SELECT COUNT(*) FROM orders", [], |r| r.get(0))
                .unwrap()
        };
        assert_eq!(second, 60);
    }
}
