//! Read-side queries over the persisted trade log: raw trades, OHLCV
//! candles, and aggregate statistics.

use anyhow::{bail, Context, Result};
use rusqlite::params;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::persist::store::Store;

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

/// A persisted trade.
#[derive(Debug, Clone, Serialize)]
pub struct Trade {
    #[serde(rename = "matchNumber")]
    pub match_number: i64,
    pub ticker: String,
    pub price: f64,
    pub shares: i32,
    pub aggressor: String,
    /// Epoch milliseconds.
    #[serde(rename = "executedAt")]
    pub executed_at: i64,
}

/// Controls which trades to return.
#[derive(Debug, Clone, Default)]
pub struct TradeFilter {
    pub symbol_locate: u16,
    pub limit: usize,
    pub offset: usize,
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
}

/// An OHLCV bar.
#[derive(Debug, Clone, Serialize)]
pub struct Candle {
    /// Bucket start, epoch milliseconds.
    #[serde(rename = "t")]
    pub bucket_ms: i64,
    #[serde(rename = "o")]
    pub open: f64,
    #[serde(rename = "h")]
    pub high: f64,
    #[serde(rename = "l")]
    pub low: f64,
    #[serde(rename = "c")]
    pub close: f64,
    #[serde(rename = "v")]
    pub volume: i64,
    #[serde(rename = "n")]
    pub count: i64,
}

/// Controls candle bucketing.
#[derive(Debug, Clone)]
pub struct CandleFilter {
    pub symbol_locate: u16,
    /// One of "1m", "5m", "15m", "1h", "4h", "1d".
    pub interval: String,
    pub limit: usize,
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
}

/// Aggregate trade statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TradeStats {
    #[serde(rename = "totalTrades")]
    pub total_trades: i64,
    #[serde(rename = "totalVolume")]
    pub total_volume: i64,
}

fn interval_seconds(interval: &str) -> Option<i64> {
    match interval {
        "1m" => Some(60),
        "5m" => Some(300),
        "15m" => Some(900),
        "1h" => Some(3600),
        "4h" => Some(14_400),
        "1d" => Some(86_400),
        _ => None,
    }
}

fn clamp_limit(limit: usize) -> usize {
    if limit == 0 || limit > MAX_LIMIT {
        DEFAULT_LIMIT
    } else {
        limit
    }
}

impl Store {
    /// Trades for one symbol, newest first, with optional time range and
    /// pagination.
    pub async fn query_trades(&self, f: &TradeFilter) -> Result<Vec<Trade>> {
        let limit = clamp_limit(f.limit);
        let from = f.from_ms.unwrap_or(i64::MIN);
        let to = f.to_ms.unwrap_or(i64::MAX);

        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare_cached(
                "SELECT match_number, ticker, price, shares, aggressor, executed_at
                 FROM trades
                 WHERE symbol_locate = ?1 AND executed_at >= ?2 AND executed_at <= ?3
                 ORDER BY executed_at DESC
                 LIMIT ?4 OFFSET ?5",
            )
            .context("prepare trades query")?;

        let rows = stmt.query_map(
            params![f.symbol_locate, from, to, limit as i64, f.offset as i64],
            |row| {
                Ok(Trade {
                    match_number: row.get(0)?,
                    ticker: row.get(1)?,
                    price: row.get(2)?,
                    shares: row.get(3)?,
                    aggressor: row.get(4)?,
                    executed_at: row.get(5)?,
                })
            },
        )?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode trade row")?);
        }
        Ok(out)
    }

    /// OHLCV bars for one symbol at a fixed interval, newest first.
    pub async fn query_candles(&self, f: &CandleFilter) -> Result<Vec<Candle>> {
        let Some(secs) = interval_seconds(&f.interval) else {
            bail!("unsupported interval: {}", f.interval);
        };
        let bucket_ms = secs * 1000;
        let limit = clamp_limit(f.limit);
        let from = f.from_ms.unwrap_or(i64::MIN);
        let to = f.to_ms.unwrap_or(i64::MAX);

        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare_cached(
                "SELECT price, shares, executed_at
                 FROM trades
                 WHERE symbol_locate = ?1 AND executed_at >= ?2 AND executed_at <= ?3
                 ORDER BY executed_at ASC, match_number ASC",
            )
            .context("prepare candles query")?;

        let rows = stmt.query_map(params![f.symbol_locate, from, to], |row| {
            Ok((
                row.get::<_, f64>(0)?,
                row.get::<_, i32>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        // Fold trades into epoch-floored buckets.
        let mut buckets: BTreeMap<i64, Candle> = BTreeMap::new();
        for row in rows {
            let (price, shares, executed_at) = row.context("decode trade row")?;
            let bucket = executed_at - executed_at.rem_euclid(bucket_ms);
            buckets
                .entry(bucket)
                .and_modify(|c| {
                    c.high = c.high.max(price);
                    c.low = c.low.min(price);
                    c.close = price;
                    c.volume += shares as i64;
                    c.count += 1;
                })
                .or_insert(Candle {
                    bucket_ms: bucket,
                    open: price,
                    high: price,
                    low: price,
                    close: price,
                    volume: shares as i64,
                    count: 1,
                });
        }

        Ok(buckets.into_values().rev().take(limit).collect())
    }

    /// Total trade count and share volume over the whole log.
    pub async fn query_trade_stats(&self) -> Result<TradeStats> {
        let conn = self.conn.lock().await;
        let stats = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(shares), 0) FROM trades",
                [],
                |row| {
                    Ok(TradeStats {
                        total_trades: row.get(0)?,
                        total_volume: row.get(1)?,
                    })
                },
            )
            .context("query trade stats")?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;

    async fn seeded_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("feed.db").to_str().unwrap()).unwrap();
        {
            let conn = store.conn.lock().await;
            // Two symbols, trades spread over three 1m buckets.
            let rows: &[(i64, u16, &str, f64, i32, &str, i64)] = &[
                (1, 1, "NEXO", 100.0, 100, "B", 60_000),
                (2, 1, "NEXO", 101.0, 200, "S", 61_000),
                (3, 1, "NEXO", 99.5, 100, "B", 125_000),
                (4, 1, "NEXO", 102.0, 300, "S", 185_000),
                (5, 2, "QBIT", 50.0, 400, "B", 62_000),
            ];
            for (mn, locate, ticker, price, shares, aggr, at) in rows {
                conn.execute(
                    "INSERT INTO trades VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![mn, locate, ticker, price, shares, aggr, at],
                )
                .unwrap();
            }
        }
        (dir, store)
    }

    #[tokio::test]
    async fn trades_filtered_newest_first() {
        let (_dir, store) = seeded_store().await;
        let trades = store
            .query_trades(&TradeFilter {
                symbol_locate: 1,
                ..TradeFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(trades.len(), 4);
        assert_eq!(trades[0].match_number, 4);
        assert!(trades.windows(2).all(|w| w[0].executed_at >= w[1].executed_at));
    }

    #[tokio::test]
    async fn trades_time_range_and_pagination() {
        let (_dir, store) = seeded_store().await;
        let trades = store
            .query_trades(&TradeFilter {
                symbol_locate: 1,
                from_ms: Some(61_000),
                to_ms: Some(125_000),
                ..TradeFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(trades.len(), 2);

        let paged = store
            .query_trades(&TradeFilter {
                symbol_locate: 1,
                limit: 2,
                offset: 2,
                ..TradeFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(paged.len(), 2);
        assert_eq!(paged[0].match_number, 2);
    }

    #[tokio::test]
    async fn candles_bucket_ohlcv() {
        let (_dir, store) = seeded_store().await;
        let candles = store
            .query_candles(&CandleFilter {
                symbol_locate: 1,
                interval: "1m".into(),
                limit: 0,
                from_ms: None,
                to_ms: None,
            })
            .await
            .unwrap();

        // Buckets 60000, 120000, 180000, newest first.
        assert_eq!(candles.len(), 3);
        assert_eq!(candles[0].bucket_ms, 180_000);
        assert_eq!(candles[2].bucket_ms, 60_000);

        let first = &candles[2];
        assert_eq!(first.open, 100.0);
        assert_eq!(first.close, 101.0);
        assert_eq!(first.high, 101.0);
        assert_eq!(first.low, 100.0);
        assert_eq!(first.volume, 300);
        assert_eq!(first.count, 2);
    }

    #[tokio::test]
    async fn candles_unknown_interval_errors() {
        let (_dir, store) = seeded_store().await;
        let err = store
            .query_candles(&CandleFilter {
                symbol_locate: 1,
                interval: "7m".into(),
                limit: 0,
                from_ms: None,
                to_ms: None,
            })
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn trade_stats_totals() {
        let (_dir, store) = seeded_store().await;
        let stats = store.query_trade_stats().await.unwrap();
        assert_eq!(stats.total_trades, 5);
        assert_eq!(stats.total_volume, 1100);
    }

    #[tokio::test]
    async fn stats_on_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("feed.db").to_str().unwrap()).unwrap();
        let stats = store.query_trade_stats().await.unwrap();
        assert_eq!(stats.total_trades, 0);
        assert_eq!(stats.total_volume, 0);
    }
}
