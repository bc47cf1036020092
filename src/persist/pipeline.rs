//! Bounded trade-persistence channel with a fixed writer pool.
//!
//! Producers never block: a full channel drops the record and bumps a
//! counter, trading log completeness for feed latency under overload.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info};

use crate::itch::{ItchMessage, MsgType};
use crate::persist::snapshot::Snapshotter;

/// One executed trade queued for persistence.
#[derive(Debug, Clone)]
pub struct TradeRecord {
    pub match_number: u64,
    pub locate: u16,
    pub price: f64,
    pub shares: i32,
    pub aggressor: u8,
}

/// Producer handle for the trade channel.
#[derive(Clone)]
pub struct TradePipeline {
    tx: mpsc::Sender<TradeRecord>,
    dropped: Arc<AtomicU64>,
}

impl TradePipeline {
    /// Starts `workers` writer tasks draining a channel of `capacity`.
    pub fn start(
        snapshotter: Arc<Snapshotter>,
        capacity: usize,
        workers: usize,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<TradeRecord>(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        for worker in 0..workers.max(1) {
            let rx = rx.clone();
            let snapshotter = snapshotter.clone();
            let mut shutdown = shutdown.clone();
            tokio::spawn(async move {
                loop {
                    let record = tokio::select! {
                        record = async { rx.lock().await.recv().await } => record,
                        _ = shutdown.changed() => None,
                    };
                    let Some(record) = record else {
                        info!(worker, "trade writer stopped");
                        return;
                    };
                    if let Err(e) = snapshotter
                        .save_trade(
                            record.match_number,
                            record.locate,
                            record.price,
                            record.shares,
                            record.aggressor,
                        )
                        .await
                    {
                        debug!(error = %e, match_number = record.match_number, "trade insert failed");
                    }
                }
            });
        }

        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Non-blocking enqueue; false when the channel is full and the record
    /// was dropped.
    pub fn enqueue(&self, record: TradeRecord) -> bool {
        match self.tx.try_send(record) {
            Ok(()) => true,
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Queues every trade message in a batch.
    pub fn enqueue_from(&self, locate: u16, msgs: &[ItchMessage]) {
        for m in msgs {
            if m.msg_type != MsgType::Trade {
                continue;
            }
            self.enqueue(TradeRecord {
                match_number: m.match_number,
                locate,
                price: m.price,
                shares: m.shares,
                aggressor: m.side,
            });
        }
    }

    /// Records dropped because the channel was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
