//! Price-time priority order book for a single symbol.
//!
//! Bids sort descending, asks ascending, at most [`MAX_LEVELS`] price levels
//! per side. A hash index gives O(1) lookup by order id. All operations are
//! atomic with respect to observers: a single writer lock guards mutations,
//! readers share.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::orderbook::order::{next_order_id, Order, Side};

/// Price levels kept per side.
pub const MAX_LEVELS: usize = 10;
/// Orders seeded per level at initialization.
pub const ORDERS_PER_LEVEL: usize = 3;

/// Orders resting at one price point, in time priority.
#[derive(Debug, Clone)]
struct PriceLevel {
    price: f64,
    order_ids: Vec<u64>,
}

#[derive(Default)]
struct BookInner {
    bids: Vec<PriceLevel>, // sorted descending by price
    asks: Vec<PriceLevel>, // sorted ascending by price
    orders: HashMap<u64, Order>,
}

/// Aggregated data at a single price level.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthLevel {
    pub price: f64,
    pub orders: usize,
    pub total_shares: i32,
}

/// Point-in-time snapshot of the book.
#[derive(Debug, Clone, Default)]
pub struct DepthSnapshot {
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
    pub best_bid: f64,
    pub best_ask: f64,
    pub mid_price: f64,
    pub spread: f64,
}

pub struct Book {
    pub locate: u16,
    pub tick_size: f64,
    inner: RwLock<BookInner>,
}

impl Book {
    pub fn new(locate: u16, tick_size: f64) -> Self {
        Self {
            locate,
            tick_size,
            inner: RwLock::new(BookInner::default()),
        }
    }

    /// Inserts an order at its price level, creating and re-sorting levels
    /// as needed and trimming the side past [`MAX_LEVELS`].
    pub fn add_order(&self, order: Order) {
        let mut inner = self.inner.write();
        inner.insert(order);
    }

    /// Re-adds a persisted order without touching the id counter.
    pub fn restore_order(&self, order: Order) {
        let mut inner = self.inner.write();
        inner.insert(order);
    }

    /// Removes an order by id, collapsing its level if now empty.
    pub fn remove_order(&self, order_id: u64) -> Option<Order> {
        let mut inner = self.inner.write();
        inner.remove(order_id)
    }

    /// O(1) lookup by order id.
    pub fn get_order(&self, order_id: u64) -> Option<Order> {
        self.inner.read().orders.get(&order_id).cloned()
    }

    /// Subtracts shares from an order and returns the remainder. The order
    /// is removed entirely when nothing remains; 0 for unknown ids.
    pub fn reduce_order(&self, order_id: u64, reduce_by: i32) -> i32 {
        let mut inner = self.inner.write();
        let Some(order) = inner.orders.get_mut(&order_id) else {
            return 0;
        };
        order.shares -= reduce_by;
        let remaining = order.shares;
        if remaining <= 0 {
            inner.remove(order_id);
            return 0;
        }
        remaining
    }

    /// Atomically removes the old order and inserts a replacement with a
    /// fresh id, preserving side, owner, and MPID. None if the old id is
    /// not on the book.
    pub fn replace_order(&self, old_id: u64, new_price: f64, new_shares: i32) -> Option<Order> {
        let mut inner = self.inner.write();
        let old = inner.remove(old_id)?;

        let replacement = Order {
            id: next_order_id(),
            locate: old.locate,
            side: old.side,
            price: new_price,
            shares: new_shares,
            priority: 0,
            mpid: old.mpid,
        };
        inner.insert(replacement.clone());
        Some(replacement)
    }

    /// Best bid price, or 0 when the side is empty.
    pub fn best_bid(&self) -> f64 {
        self.inner.read().bids.first().map_or(0.0, |l| l.price)
    }

    /// Best ask price, or 0 when the side is empty.
    pub fn best_ask(&self) -> f64 {
        self.inner.read().asks.first().map_or(0.0, |l| l.price)
    }

    /// Midpoint of best bid and ask, or 0 when either side is empty.
    pub fn mid_price(&self) -> f64 {
        let inner = self.inner.read();
        match (inner.bids.first(), inner.asks.first()) {
            (Some(b), Some(a)) => (b.price + a.price) / 2.0,
            _ => 0.0,
        }
    }

    pub fn order_count(&self) -> usize {
        self.inner.read().orders.len()
    }

    pub fn bid_levels(&self) -> usize {
        self.inner.read().bids.len()
    }

    pub fn ask_levels(&self) -> usize {
        self.inner.read().asks.len()
    }

    pub fn total_bid_orders(&self) -> usize {
        self.inner.read().bids.iter().map(|l| l.order_ids.len()).sum()
    }

    pub fn total_ask_orders(&self) -> usize {
        self.inner.read().asks.iter().map(|l| l.order_ids.len()).sum()
    }

    /// The idx-th bid order walking levels in priority order.
    pub fn bid_order_at(&self, idx: usize) -> Option<Order> {
        let inner = self.inner.read();
        inner.order_at(&inner.bids, idx)
    }

    /// The idx-th ask order walking levels in priority order.
    pub fn ask_order_at(&self, idx: usize) -> Option<Order> {
        let inner = self.inner.read();
        inner.order_at(&inner.asks, idx)
    }

    /// Every resting order (persistence).
    pub fn all_orders(&self) -> Vec<Order> {
        self.inner.read().orders.values().cloned().collect()
    }

    /// Immutable per-level aggregation of both sides.
    pub fn depth(&self) -> DepthSnapshot {
        let inner = self.inner.read();

        let aggregate = |levels: &[PriceLevel]| {
            levels
                .iter()
                .map(|l| DepthLevel {
                    price: l.price,
                    orders: l.order_ids.len(),
                    total_shares: l
                        .order_ids
                        .iter()
                        .filter_map(|id| inner.orders.get(id))
                        .map(|o| o.shares)
                        .sum(),
                })
                .collect::<Vec<_>>()
        };

        let mut snap = DepthSnapshot {
            bids: aggregate(&inner.bids),
            asks: aggregate(&inner.asks),
            ..DepthSnapshot::default()
        };
        snap.best_bid = inner.bids.first().map_or(0.0, |l| l.price);
        snap.best_ask = inner.asks.first().map_or(0.0, |l| l.price);
        if snap.best_bid > 0.0 && snap.best_ask > 0.0 {
            snap.mid_price = (snap.best_bid + snap.best_ask) / 2.0;
            snap.spread = snap.best_ask - snap.best_bid;
        }
        snap
    }
}

impl BookInner {
    fn insert(&mut self, order: Order) {
        let id = order.id;
        let side = order.side;
        let price = order.price;
        self.orders.insert(id, order);

        let (levels, descending) = match side {
            Side::Buy => (&mut self.bids, true),
            Side::Sell => (&mut self.asks, false),
        };

        if let Some(level) = levels.iter_mut().find(|l| l.price == price) {
            level.order_ids.push(id);
        } else {
            levels.push(PriceLevel {
                price,
                order_ids: vec![id],
            });
            if descending {
                levels.sort_by(|a, b| b.price.total_cmp(&a.price));
            } else {
                levels.sort_by(|a, b| a.price.total_cmp(&b.price));
            }
        }

        // Trim the worst level past the cap, purging its orders from the
        // id index as well.
        while levels.len() > MAX_LEVELS {
            if let Some(trimmed) = levels.pop() {
                for id in trimmed.order_ids {
                    self.orders.remove(&id);
                }
            }
        }
    }

    fn remove(&mut self, order_id: u64) -> Option<Order> {
        let order = self.orders.remove(&order_id)?;
        let levels = match order.side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        for i in 0..levels.len() {
            if let Some(pos) = levels[i].order_ids.iter().position(|id| *id == order_id) {
                levels[i].order_ids.remove(pos);
                if levels[i].order_ids.is_empty() {
                    levels.remove(i);
                }
                break;
            }
        }
        Some(order)
    }

    fn order_at(&self, levels: &[PriceLevel], idx: usize) -> Option<Order> {
        let mut count = 0;
        for level in levels {
            for id in &level.order_ids {
                if count == idx {
                    return self.orders.get(id).cloned();
                }
                count += 1;
            }
        }
        None
    }
}
