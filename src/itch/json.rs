//! JSON mirror of the binary ITCH messages.
//!
//! One object per message: snake_case `type`, camelCase fields, prices as
//! 4-decimal strings, timestamps as integer nanoseconds, tickers and MPIDs
//! trimmed of padding.

use anyhow::Result;
use serde_json::{json, Value};

use crate::itch::{ItchMessage, MsgType};

/// Encodes a message as a JSON byte string.
pub fn encode_json(m: &ItchMessage) -> Result<Vec<u8>> {
    let obj = msg_to_value(m);
    Ok(serde_json::to_vec(&obj)?)
}

fn msg_to_value(m: &ItchMessage) -> Value {
    match m.msg_type {
        MsgType::SystemEvent => json!({
            "type": "system_event",
            "timestamp": m.timestamp,
            "stockLocate": m.stock_locate,
            "eventCode": byte_str(m.event_code),
        }),

        MsgType::StockDirectory => json!({
            "type": "stock_directory",
            "timestamp": m.timestamp,
            "stockLocate": m.stock_locate,
            "stock": m.stock.trim(),
            "marketCategory": byte_str(m.market_category),
            "financialStatus": byte_str(m.financial_status),
            "roundLotSize": m.round_lot_size,
            "roundLotsOnly": byte_str(m.round_lots_only),
        }),

        MsgType::StockTradingAction => json!({
            "type": "stock_trading_action",
            "timestamp": m.timestamp,
            "stockLocate": m.stock_locate,
            "stock": m.stock.trim(),
            "tradingState": byte_str(m.trading_state),
        }),

        MsgType::AddOrder => json!({
            "type": "add_order",
            "timestamp": m.timestamp,
            "stockLocate": m.stock_locate,
            "stock": m.stock.trim(),
            "orderRef": m.order_ref,
            "side": byte_str(m.side),
            "shares": m.shares,
            "price": format_price(m.price),
        }),

        MsgType::AddOrderMpid => json!({
            "type": "add_order_mpid",
            "timestamp": m.timestamp,
            "stockLocate": m.stock_locate,
            "stock": m.stock.trim(),
            "orderRef": m.order_ref,
            "side": byte_str(m.side),
            "shares": m.shares,
            "price": format_price(m.price),
            "mpid": m.mpid.trim(),
        }),

        MsgType::OrderExecuted => json!({
            "type": "order_executed",
            "timestamp": m.timestamp,
            "stockLocate": m.stock_locate,
            "orderRef": m.order_ref,
            "shares": m.shares,
            "matchNumber": m.match_number,
        }),

        MsgType::OrderCancel => json!({
            "type": "order_cancel",
            "timestamp": m.timestamp,
            "stockLocate": m.stock_locate,
            "orderRef": m.order_ref,
            "shares": m.shares,
        }),

        MsgType::OrderDelete => json!({
            "type": "order_delete",
            "timestamp": m.timestamp,
            "stockLocate": m.stock_locate,
            "orderRef": m.order_ref,
        }),

        MsgType::OrderReplace => json!({
            "type": "order_replace",
            "timestamp": m.timestamp,
            "stockLocate": m.stock_locate,
            "origOrderRef": m.orig_order_ref,
            "orderRef": m.order_ref,
            "shares": m.shares,
            "price": format_price(m.price),
        }),

        MsgType::Trade => json!({
            "type": "trade",
            "timestamp": m.timestamp,
            "stockLocate": m.stock_locate,
            "orderRef": m.order_ref,
            "side": byte_str(m.side),
            "shares": m.shares,
            "stock": m.stock.trim(),
            "price": format_price(m.price),
            "matchNumber": m.match_number,
        }),
    }
}

fn byte_str(b: u8) -> String {
    (b as char).to_string()
}

fn format_price(price: f64) -> String {
    format!("{price:.4}")
}
