//! Weighted order-flow simulator for a single symbol's book.

use std::sync::Arc;

use crate::engine::rng::Rng;
use crate::itch::{ItchMessage, MsgType};
use crate::orderbook::book::{Book, MAX_LEVELS, ORDERS_PER_LEVEL};
use crate::orderbook::order::{next_match_number, next_order_id, Order, Side};

/// Action weights: Add, Cancel, Replace, Trade, Replenish.
const ACTION_WEIGHTS: [f64; 5] = [0.30, 0.20, 0.15, 0.15, 0.20];

const ACTION_ADD: usize = 0;
const ACTION_CANCEL: usize = 1;
const ACTION_REPLACE: usize = 2;
const ACTION_TRADE: usize = 3;
const ACTION_REPLENISH: usize = 4;

/// Market maker MPIDs for attributed orders.
const MPIDS: [&str; 8] = ["GSCO", "MSCO", "JPMS", "CITI", "BARK", "SUSQ", "VIRT", "CITD"];

/// Drives simulated order book activity for one symbol. Given a seeded PRNG
/// and identical initial state, the emitted message stream is deterministic.
pub struct Simulator {
    rng: Arc<Rng>,
    book: Arc<Book>,
    locate: u16,
    tick_size: f64,
}

impl Simulator {
    pub fn new(rng: Arc<Rng>, book: Arc<Book>, locate: u16, tick_size: f64) -> Self {
        Self {
            rng,
            book,
            locate,
            tick_size,
        }
    }

    pub fn book(&self) -> &Arc<Book> {
        &self.book
    }

    /// Seeds the book with [`MAX_LEVELS`] bid and ask levels of
    /// [`ORDERS_PER_LEVEL`] orders each around a reference price, emitting
    /// the corresponding add messages.
    pub fn initialize(&self, ref_price: f64) -> Vec<ItchMessage> {
        let mut msgs = Vec::with_capacity(MAX_LEVELS * ORDERS_PER_LEVEL * 2);

        for level in 0..MAX_LEVELS {
            let offset = (level + 1) as f64 * self.tick_size;
            let bid_price = snap_price(ref_price - offset, self.tick_size);
            let ask_price = snap_price(ref_price + offset, self.tick_size);

            for j in 0..ORDERS_PER_LEVEL {
                msgs.push(self.seed_order(Side::Buy, bid_price, j as i32));
                msgs.push(self.seed_order(Side::Sell, ask_price, j as i32));
            }
        }

        msgs
    }

    fn seed_order(&self, side: Side, price: f64, priority: i32) -> ItchMessage {
        let shares = (self.rng.int_range(100, 1000) / 100 * 100) as i32;
        let mut order = Order {
            id: next_order_id(),
            locate: self.locate,
            side,
            price,
            shares,
            priority,
            mpid: String::new(),
        };
        // Roughly 30% of seeded orders are attributed to a market maker.
        if self.rng.float64() < 0.3 {
            order.mpid = MPIDS[self.rng.intn(MPIDS.len() as i64) as usize].to_string();
        }
        let msg = self.add_order_msg(&order);
        self.book.add_order(order);
        msg
    }

    /// Performs `num_actions` weighted actions against the book and returns
    /// the generated messages in emission order.
    pub fn step(&self, current_price: f64, num_actions: usize) -> Vec<ItchMessage> {
        let mut msgs = Vec::new();
        for _ in 0..num_actions {
            let action = self.rng.weighted_pick(&ACTION_WEIGHTS);
            match action {
                ACTION_ADD => msgs.extend(self.do_add(current_price)),
                ACTION_CANCEL => msgs.extend(self.do_cancel()),
                ACTION_REPLACE => msgs.extend(self.do_replace()),
                ACTION_TRADE => msgs.extend(self.do_trade()),
                ACTION_REPLENISH => msgs.extend(self.do_replenish(current_price)),
                _ => unreachable!("weighted_pick out of range"),
            }
        }
        msgs
    }

    /// Places a new limit order 1-10 ticks away from the current price.
    fn do_add(&self, current_price: f64) -> Vec<ItchMessage> {
        let side = if self.rng.float64() < 0.5 {
            Side::Sell
        } else {
            Side::Buy
        };

        let offset = self.rng.int_range(1, 10) as f64 * self.tick_size;
        let price = self.passive_price(current_price, side, offset);
        let shares = (self.rng.int_range(1, 10) * 100) as i32;

        let mut order = Order {
            id: next_order_id(),
            locate: self.locate,
            side,
            price,
            shares,
            priority: 0,
            mpid: String::new(),
        };
        if self.rng.float64() < 0.2 {
            order.mpid = MPIDS[self.rng.intn(MPIDS.len() as i64) as usize].to_string();
        }

        let msg = self.add_order_msg(&order);
        self.book.add_order(order);
        vec![msg]
    }

    /// Removes an order picked uniformly over both sides.
    fn do_cancel(&self) -> Vec<ItchMessage> {
        let Some(victim) = self.pick_random_order() else {
            return Vec::new();
        };
        if self.book.remove_order(victim.id).is_none() {
            return Vec::new();
        }

        let mut msg = ItchMessage::new(MsgType::OrderDelete);
        msg.stock_locate = self.locate;
        msg.order_ref = victim.id;
        vec![msg]
    }

    /// Moves a random order by -2..+2 ticks with a fresh size.
    fn do_replace(&self) -> Vec<ItchMessage> {
        let Some(old) = self.pick_random_order() else {
            return Vec::new();
        };

        let shift = self.rng.int_range(-2, 2) as f64 * self.tick_size;
        let mut new_price = snap_price(old.price + shift, self.tick_size);
        if new_price < self.tick_size {
            new_price = self.tick_size;
        }
        let new_shares = (self.rng.int_range(1, 10) * 100) as i32;

        let Some(replacement) = self.book.replace_order(old.id, new_price, new_shares) else {
            return Vec::new();
        };

        let mut msg = ItchMessage::new(MsgType::OrderReplace);
        msg.stock_locate = self.locate;
        msg.order_ref = replacement.id;
        msg.orig_order_ref = old.id;
        msg.shares = new_shares;
        msg.price = new_price;
        vec![msg]
    }

    /// Executes an aggressive order against the best resting order on the
    /// opposite side. Emits an executed + trade pair sharing one match
    /// number, then reduces the victim.
    fn do_trade(&self) -> Vec<ItchMessage> {
        if self.book.best_bid() == 0.0 || self.book.best_ask() == 0.0 {
            return Vec::new();
        }

        let (aggressor, victim) = if self.rng.float64() < 0.5 {
            // Buy aggressor lifts the best ask.
            (Side::Buy, self.book.ask_order_at(0))
        } else {
            // Sell aggressor hits the best bid.
            (Side::Sell, self.book.bid_order_at(0))
        };
        let Some(victim) = victim else {
            return Vec::new();
        };

        let lots = (victim.shares / 100).max(1) as i64;
        let mut trade_shares = (self.rng.int_range(1, lots) * 100) as i32;
        if trade_shares > victim.shares {
            trade_shares = victim.shares;
        }

        let match_number = next_match_number();

        let mut executed = ItchMessage::new(MsgType::OrderExecuted);
        executed.stock_locate = self.locate;
        executed.order_ref = victim.id;
        executed.shares = trade_shares;
        executed.match_number = match_number;
        executed.price = victim.price;

        let mut trade = ItchMessage::new(MsgType::Trade);
        trade.stock_locate = self.locate;
        trade.order_ref = victim.id;
        trade.side = aggressor.as_byte();
        trade.shares = trade_shares;
        trade.price = victim.price;
        trade.match_number = match_number;

        self.book.reduce_order(victim.id, trade_shares);
        vec![executed, trade]
    }

    /// Adds liquidity close to the current price (1-5 ticks).
    fn do_replenish(&self, current_price: f64) -> Vec<ItchMessage> {
        let side = if self.rng.float64() < 0.5 {
            Side::Sell
        } else {
            Side::Buy
        };

        let offset = self.rng.int_range(1, 5) as f64 * self.tick_size;
        let price = self.passive_price(current_price, side, offset);
        let shares = (self.rng.int_range(2, 10) * 100) as i32;

        let mut order = Order {
            id: next_order_id(),
            locate: self.locate,
            side,
            price,
            shares,
            priority: 0,
            mpid: String::new(),
        };
        if self.rng.float64() < 0.25 {
            order.mpid = MPIDS[self.rng.intn(MPIDS.len() as i64) as usize].to_string();
        }

        let msg = self.add_order_msg(&order);
        self.book.add_order(order);
        vec![msg]
    }

    /// Uniform pick over every order on both sides; None on an empty book.
    fn pick_random_order(&self) -> Option<Order> {
        let total_bid = self.book.total_bid_orders();
        let total_ask = self.book.total_ask_orders();
        let total = total_bid + total_ask;
        if total == 0 {
            return None;
        }
        let idx = self.rng.intn(total as i64) as usize;
        if idx < total_bid {
            self.book.bid_order_at(idx)
        } else {
            self.book.ask_order_at(idx - total_bid)
        }
    }

    fn passive_price(&self, current_price: f64, side: Side, offset: f64) -> f64 {
        let raw = match side {
            Side::Buy => current_price - offset,
            Side::Sell => current_price + offset,
        };
        let snapped = snap_price(raw, self.tick_size);
        if snapped < self.tick_size {
            self.tick_size
        } else {
            snapped
        }
    }

    fn add_order_msg(&self, order: &Order) -> ItchMessage {
        let msg_type = if order.mpid.is_empty() {
            MsgType::AddOrder
        } else {
            MsgType::AddOrderMpid
        };
        let mut msg = ItchMessage::new(msg_type);
        msg.stock_locate = self.locate;
        msg.order_ref = order.id;
        msg.side = order.side.as_byte();
        msg.shares = order.shares;
        msg.price = order.price;
        msg.mpid = order.mpid.clone();
        msg
    }
}

fn snap_price(price: f64, tick_size: f64) -> f64 {
    (price / tick_size).round() * tick_size
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_simulator(seed: i64) -> Simulator {
        let rng = Arc::new(Rng::new(seed));
        let book = Arc::new(Book::new(1, 0.01));
        Simulator::new(rng, book, 1, 0.01)
    }

    #[test]
    fn initialize_message_count() {
        let sim = test_simulator(42);
        let msgs = sim.initialize(100.00);
        // 10 levels x 3 orders x 2 sides.
        assert_eq!(msgs.len(), 60);
    }

    #[test]
    fn initialize_all_add_orders() {
        let sim = test_simulator(42);
        for (i, m) in sim.initialize(100.00).iter().enumerate() {
            assert!(
                matches!(m.msg_type, MsgType::AddOrder | MsgType::AddOrderMpid),
                "msg[{i}] is {:?}, want add",
                m.msg_type
            );
        }
    }

    #[test]
    fn initialize_book_shape() {
        let sim = test_simulator(42);
        sim.initialize(100.00);
        let book = sim.book();
        assert_eq!(book.order_count(), 60);
        assert_eq!(book.bid_levels(), 10);
        assert_eq!(book.ask_levels(), 10);
        assert!(book.best_bid() < 100.00);
        assert!(book.best_ask() > 100.00);
    }

    #[test]
    fn initialize_round_lots_and_snapped_prices() {
        let sim = test_simulator(42);
        for (i, m) in sim.initialize(100.00).iter().enumerate() {
            assert!(m.shares > 0, "msg[{i}] shares not positive");
            assert_eq!(m.shares % 100, 0, "msg[{i}] shares not a round lot");
            let cents = (m.price * 100.0).round();
            assert!(
                (m.price - cents / 100.0).abs() < 1e-3,
                "msg[{i}] price {} not snapped",
                m.price
            );
        }
    }

    #[test]
    fn step_produces_valid_types() {
        let sim = test_simulator(42);
        sim.initialize(100.00);
        for _ in 0..100 {
            for m in sim.step(100.00, 3) {
                assert!(
                    matches!(
                        m.msg_type,
                        MsgType::AddOrder
                            | MsgType::AddOrderMpid
                            | MsgType::OrderExecuted
                            | MsgType::OrderCancel
                            | MsgType::OrderDelete
                            | MsgType::OrderReplace
                            | MsgType::Trade
                    ),
                    "step emitted {:?}",
                    m.msg_type
                );
            }
        }
    }

    #[test]
    fn executed_trade_pairing() {
        let sim = test_simulator(42);
        sim.initialize(100.00);
        for _ in 0..500 {
            let msgs = sim.step(100.00, 3);
            for j in 0..msgs.len() {
                if msgs[j].msg_type == MsgType::OrderExecuted {
                    assert!(
                        j + 1 < msgs.len() && msgs[j + 1].msg_type == MsgType::Trade,
                        "executed not followed by trade"
                    );
                    assert_eq!(
                        msgs[j].match_number,
                        msgs[j + 1].match_number,
                        "match number mismatch"
                    );
                }
            }
        }
    }

    #[test]
    fn trade_never_exceeds_victim_shares() {
        let sim = test_simulator(7);
        sim.initialize(50.00);
        for _ in 0..2000 {
            for m in sim.step(50.00, 2) {
                if m.msg_type == MsgType::Trade {
                    assert!(m.shares > 0);
                    assert_eq!(m.shares % 100, 0);
                }
            }
        }
    }

    #[test]
    fn actions_reference_previously_added_orders() {
        use std::collections::HashSet;

        let sim = test_simulator(42);
        let mut msgs = sim.initialize(100.00);
        for _ in 0..300 {
            msgs.extend(sim.step(100.00, 2));
        }

        // Replay the stream: every delete/replace/execution must reference
        // an order the stream itself added earlier.
        let mut seen: HashSet<u64> = HashSet::new();
        for m in msgs {
            match m.msg_type {
                MsgType::AddOrder | MsgType::AddOrderMpid => {
                    assert!(seen.insert(m.order_ref), "duplicate order id");
                }
                MsgType::OrderDelete => {
                    assert!(seen.contains(&m.order_ref), "delete of unknown order");
                }
                MsgType::OrderReplace => {
                    assert!(seen.contains(&m.orig_order_ref), "replace of unknown order");
                    assert!(seen.insert(m.order_ref), "duplicate replacement id");
                }
                MsgType::OrderExecuted | MsgType::Trade => {
                    assert!(seen.contains(&m.order_ref), "execution of unknown order");
                }
                _ => {}
            }
        }
    }

    #[test]
    fn deterministic_stream() {
        let run = || {
            let sim = test_simulator(42);
            let mut all = sim.initialize(100.00);
            for _ in 0..50 {
                all.extend(sim.step(100.00, 2));
            }
            all
        };

        let a = run();
        let b = run();
        assert_eq!(a.len(), b.len(), "determinism: different message counts");
        for (i, (x, y)) in a.iter().zip(&b).enumerate() {
            assert_eq!(x.msg_type, y.msg_type, "type mismatch at {i}");
            assert_eq!(x.price, y.price, "price mismatch at {i}");
            assert_eq!(x.shares, y.shares, "shares mismatch at {i}");
        }
    }

    #[test]
    fn prices_stay_on_tick_grid() {
        let sim = test_simulator(42);
        sim.initialize(100.00);
        for _ in 0..500 {
            for m in sim.step(100.00, 3) {
                if m.price != 0.0 {
                    let ticks = (m.price / 0.01).round();
                    assert!(
                        (m.price - ticks * 0.01).abs() < 1e-9,
                        "price {} off the grid",
                        m.price
                    );
                }
            }
        }
    }
}
