//! Bit-exact binary ITCH 5.0 encoder.
//!
//! Every frame is a 2-byte big-endian length prefix (SoupBinTCP-style)
//! followed by the message body. All body fields are big-endian fixed width.

use crate::itch::{pad_mpid, pad_stock, price4, ItchMessage, MsgType};

pub const SYSTEM_EVENT_LEN: usize = 12;
pub const STOCK_DIRECTORY_LEN: usize = 39;
pub const TRADING_ACTION_LEN: usize = 25;
pub const ADD_ORDER_LEN: usize = 36;
pub const ADD_ORDER_MPID_LEN: usize = 40;
pub const ORDER_EXECUTED_LEN: usize = 31;
pub const ORDER_CANCEL_LEN: usize = 23;
pub const ORDER_DELETE_LEN: usize = 19;
pub const ORDER_REPLACE_LEN: usize = 35;
pub const TRADE_LEN: usize = 44;

/// Encodes a message into its binary wire frame, including the 2-byte
/// length prefix.
pub fn encode_binary(m: &ItchMessage) -> Vec<u8> {
    let body = match m.msg_type {
        MsgType::SystemEvent => encode_system_event(m),
        MsgType::StockDirectory => encode_stock_directory(m),
        MsgType::StockTradingAction => encode_trading_action(m),
        MsgType::AddOrder => encode_add_order(m),
        MsgType::AddOrderMpid => encode_add_order_mpid(m),
        MsgType::OrderExecuted => encode_order_executed(m),
        MsgType::OrderCancel => encode_order_cancel(m),
        MsgType::OrderDelete => encode_order_delete(m),
        MsgType::OrderReplace => encode_order_replace(m),
        MsgType::Trade => encode_trade(m),
    };

    let mut frame = Vec::with_capacity(2 + body.len());
    frame.extend_from_slice(&(body.len() as u16).to_be_bytes());
    frame.extend_from_slice(&body);
    frame
}

/// Writes the shared Type(1) + StockLocate(2) + TrackingNum(2) +
/// Timestamp(6) header into the first 11 bytes.
fn put_header(buf: &mut [u8], m: &ItchMessage) {
    buf[0] = m.msg_type.code();
    buf[1..3].copy_from_slice(&m.stock_locate.to_be_bytes());
    buf[3..5].copy_from_slice(&m.tracking_num.to_be_bytes());
    put_timestamp(&mut buf[5..11], m.timestamp);
}

/// 6-byte big-endian nanosecond timestamp.
fn put_timestamp(buf: &mut [u8], nanos: i64) {
    buf[0] = (nanos >> 40) as u8;
    buf[1] = (nanos >> 32) as u8;
    buf[2] = (nanos >> 24) as u8;
    buf[3] = (nanos >> 16) as u8;
    buf[4] = (nanos >> 8) as u8;
    buf[5] = nanos as u8;
}

fn encode_system_event(m: &ItchMessage) -> Vec<u8> {
    let mut buf = vec![0u8; SYSTEM_EVENT_LEN];
    put_header(&mut buf, m);
    buf[11] = m.event_code;
    buf
}

fn encode_stock_directory(m: &ItchMessage) -> Vec<u8> {
    let mut buf = vec![0u8; STOCK_DIRECTORY_LEN];
    put_header(&mut buf, m);
    buf[11..19].copy_from_slice(&pad_stock(&m.stock));
    buf[19] = m.market_category;
    buf[20] = m.financial_status;
    buf[21..25].copy_from_slice(&(m.round_lot_size as u32).to_be_bytes());
    buf[25] = m.round_lots_only;
    buf[26] = m.issue_classification;
    buf[27..29].copy_from_slice(&m.issue_sub_type);
    buf[29] = m.authenticity;
    buf[30] = m.short_sale_threshold;
    buf[31] = m.ipo_flag;
    buf[32] = m.luld_ref_price_tier;
    buf[33] = m.etp_flag;
    buf[34..38].copy_from_slice(&(m.etp_leverage_factor as u32).to_be_bytes());
    buf[38] = m.inverse_indicator;
    buf
}

fn encode_trading_action(m: &ItchMessage) -> Vec<u8> {
    let mut buf = vec![0u8; TRADING_ACTION_LEN];
    put_header(&mut buf, m);
    buf[11..19].copy_from_slice(&pad_stock(&m.stock));
    buf[19] = m.trading_state;
    buf[20] = m.reserved;
    buf[21..25].copy_from_slice(b"    "); // reason, space-padded
    buf
}

fn encode_add_order(m: &ItchMessage) -> Vec<u8> {
    let mut buf = vec![0u8; ADD_ORDER_LEN];
    put_header(&mut buf, m);
    buf[11..19].copy_from_slice(&m.order_ref.to_be_bytes());
    buf[19] = m.side;
    buf[20..24].copy_from_slice(&(m.shares as u32).to_be_bytes());
    buf[24..32].copy_from_slice(&pad_stock(&m.stock));
    buf[32..36].copy_from_slice(&price4(m.price).to_be_bytes());
    buf
}

fn encode_add_order_mpid(m: &ItchMessage) -> Vec<u8> {
    let mut buf = encode_add_order(m);
    buf.extend_from_slice(&pad_mpid(&m.mpid));
    buf
}

fn encode_order_executed(m: &ItchMessage) -> Vec<u8> {
    let mut buf = vec![0u8; ORDER_EXECUTED_LEN];
    put_header(&mut buf, m);
    buf[11..19].copy_from_slice(&m.order_ref.to_be_bytes());
    buf[19..23].copy_from_slice(&(m.shares as u32).to_be_bytes());
    buf[23..31].copy_from_slice(&m.match_number.to_be_bytes());
    buf
}

fn encode_order_cancel(m: &ItchMessage) -> Vec<u8> {
    let mut buf = vec![0u8; ORDER_CANCEL_LEN];
    put_header(&mut buf, m);
    buf[11..19].copy_from_slice(&m.order_ref.to_be_bytes());
    buf[19..23].copy_from_slice(&(m.shares as u32).to_be_bytes());
    buf
}

fn encode_order_delete(m: &ItchMessage) -> Vec<u8> {
    let mut buf = vec![0u8; ORDER_DELETE_LEN];
    put_header(&mut buf, m);
    buf[11..19].copy_from_slice(&m.order_ref.to_be_bytes());
    buf
}

fn encode_order_replace(m: &ItchMessage) -> Vec<u8> {
    let mut buf = vec![0u8; ORDER_REPLACE_LEN];
    put_header(&mut buf, m);
    buf[11..19].copy_from_slice(&m.orig_order_ref.to_be_bytes());
    buf[19..27].copy_from_slice(&m.order_ref.to_be_bytes());
    buf[27..31].copy_from_slice(&(m.shares as u32).to_be_bytes());
    buf[31..35].copy_from_slice(&price4(m.price).to_be_bytes());
    buf
}

fn encode_trade(m: &ItchMessage) -> Vec<u8> {
    let mut buf = vec![0u8; TRADE_LEN];
    put_header(&mut buf, m);
    buf[11..19].copy_from_slice(&m.order_ref.to_be_bytes());
    buf[19] = m.side;
    buf[20..24].copy_from_slice(&(m.shares as u32).to_be_bytes());
    buf[24..32].copy_from_slice(&pad_stock(&m.stock));
    buf[32..36].copy_from_slice(&price4(m.price).to_be_bytes());
    buf[36..44].copy_from_slice(&m.match_number.to_be_bytes());
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(msg_type: MsgType) -> ItchMessage {
        let mut m = ItchMessage::new(msg_type);
        m.timestamp = 34_200_000_000_000; // 09:30 UTC in nanos
        m.stock_locate = 7;
        m.stock = "NEXO".into();
        m.order_ref = 123_456;
        m.orig_order_ref = 123_400;
        m.side = b'B';
        m.shares = 500;
        m.price = 185.25;
        m.match_number = 42;
        m.mpid = "GSCO".into();
        m.event_code = b'Q';
        m.trading_state = b'T';
        m
    }

    #[test]
    fn body_lengths_match_schema() {
        let cases = [
            (MsgType::SystemEvent, SYSTEM_EVENT_LEN),
            (MsgType::StockDirectory, STOCK_DIRECTORY_LEN),
            (MsgType::StockTradingAction, TRADING_ACTION_LEN),
            (MsgType::AddOrder, ADD_ORDER_LEN),
            (MsgType::AddOrderMpid, ADD_ORDER_MPID_LEN),
            (MsgType::OrderExecuted, ORDER_EXECUTED_LEN),
            (MsgType::OrderCancel, ORDER_CANCEL_LEN),
            (MsgType::OrderDelete, ORDER_DELETE_LEN),
            (MsgType::OrderReplace, ORDER_REPLACE_LEN),
            (MsgType::Trade, TRADE_LEN),
        ];
        for (msg_type, want) in cases {
            let frame = encode_binary(&sample(msg_type));
            let prefix = u16::from_be_bytes([frame[0], frame[1]]) as usize;
            assert_eq!(prefix, want, "length prefix for {msg_type:?}");
            assert_eq!(frame.len(), 2 + want, "frame length for {msg_type:?}");
        }
    }

    #[test]
    fn header_layout() {
        for msg_type in [
            MsgType::SystemEvent,
            MsgType::AddOrder,
            MsgType::OrderExecuted,
            MsgType::Trade,
        ] {
            let m = sample(msg_type);
            let frame = encode_binary(&m);
            let body = &frame[2..];
            assert_eq!(body[0], msg_type.code(), "first body byte is the type code");
            assert_eq!(
                u16::from_be_bytes([body[1], body[2]]),
                7,
                "bytes 1..3 carry the locate code big-endian"
            );
        }
    }

    #[test]
    fn timestamp_six_bytes_big_endian() {
        let m = sample(MsgType::OrderDelete);
        let frame = encode_binary(&m);
        let body = &frame[2..];
        let mut nanos: i64 = 0;
        for b in &body[5..11] {
            nanos = nanos << 8 | *b as i64;
        }
        assert_eq!(nanos, m.timestamp);
    }

    #[test]
    fn add_order_fields() {
        let m = sample(MsgType::AddOrder);
        let frame = encode_binary(&m);
        let body = &frame[2..];
        assert_eq!(u64::from_be_bytes(body[11..19].try_into().unwrap()), 123_456);
        assert_eq!(body[19], b'B');
        assert_eq!(u32::from_be_bytes(body[20..24].try_into().unwrap()), 500);
        assert_eq!(&body[24..32], b"NEXO    ");
        assert_eq!(
            u32::from_be_bytes(body[32..36].try_into().unwrap()),
            1_852_500
        );
    }

    #[test]
    fn add_order_mpid_trailer() {
        let frame = encode_binary(&sample(MsgType::AddOrderMpid));
        let body = &frame[2..];
        assert_eq!(body[0], b'F');
        assert_eq!(&body[36..40], b"GSCO");
    }

    #[test]
    fn replace_carries_both_refs() {
        let frame = encode_binary(&sample(MsgType::OrderReplace));
        let body = &frame[2..];
        assert_eq!(u64::from_be_bytes(body[11..19].try_into().unwrap()), 123_400);
        assert_eq!(u64::from_be_bytes(body[19..27].try_into().unwrap()), 123_456);
    }

    #[test]
    fn trade_carries_match_number() {
        let frame = encode_binary(&sample(MsgType::Trade));
        let body = &frame[2..];
        assert_eq!(u64::from_be_bytes(body[36..44].try_into().unwrap()), 42);
    }

    #[test]
    fn executed_and_trade_share_layout_offsets() {
        let e = encode_binary(&sample(MsgType::OrderExecuted));
        let body = &e[2..];
        assert_eq!(u32::from_be_bytes(body[19..23].try_into().unwrap()), 500);
        assert_eq!(u64::from_be_bytes(body[23..31].try_into().unwrap()), 42);
    }

    #[test]
    fn trading_action_reason_space_padded() {
        let frame = encode_binary(&sample(MsgType::StockTradingAction));
        let body = &frame[2..];
        assert_eq!(body[19], b'T');
        assert_eq!(&body[21..25], b"    ");
    }
}
