//! Per-symbol limit order books and the order-flow simulator.

pub mod book;
pub mod order;
pub mod simulator;

pub use book::{Book, DepthLevel, DepthSnapshot, MAX_LEVELS, ORDERS_PER_LEVEL};
pub use order::{
    match_counter, next_match_number, next_order_id, order_id_counter, set_match_counter,
    set_order_id_counter, Order, Side,
};
pub use simulator::Simulator;
