//! Client registry and the broadcast fan-out hot path.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::debug;

use crate::itch::{self, binary::encode_binary, json::encode_json, ItchMessage, MsgType};
use crate::session::client::{Client, ClientFormat};
use crate::symbols::Symbol;

/// Registers clients, tracks subscriptions, and fans batches of messages
/// out to subscribers, encoding each batch at most once per format in use.
pub struct SessionManager {
    clients: RwLock<HashMap<u64, Arc<Client>>>,
    symbols: Vec<Symbol>,
    by_ticker: HashMap<&'static str, u16>,
    buffer_size: usize,
}

impl SessionManager {
    pub fn new(symbols: &[Symbol], buffer_size: usize) -> Self {
        let by_ticker = symbols.iter().map(|s| (s.ticker, s.locate_code)).collect();
        Self {
            clients: RwLock::new(HashMap::new()),
            symbols: symbols.to_vec(),
            by_ticker,
            buffer_size,
        }
    }

    /// Creates and registers a new client. The returned receiver feeds the
    /// connection's write pump.
    pub fn register(&self) -> (Arc<Client>, mpsc::Receiver<Vec<u8>>) {
        let (client, rx) = Client::new(self.buffer_size);
        let client = Arc::new(client);
        self.clients.write().insert(client.id, client.clone());
        debug!(client_id = client.id, "client registered");
        (client, rx)
    }

    pub fn unregister(&self, client_id: u64) {
        if self.clients.write().remove(&client_id).is_some() {
            debug!(client_id, "client unregistered");
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Translates tickers to locate codes. The sentinel "*" short-circuits
    /// to (empty, true) meaning "all symbols"; unknown tickers are skipped.
    pub fn resolve_tickers(&self, tickers: &[String]) -> (Vec<u16>, bool) {
        let mut locates = Vec::new();
        for t in tickers {
            if t == "*" {
                return (Vec::new(), true);
            }
            if let Some(locate) = self.by_ticker.get(t.as_str()) {
                locates.push(*locate);
            }
        }
        (locates, false)
    }

    /// Fans a batch out to every client subscribed to `locate`. Messages
    /// are stamped with the current timestamp (and ticker if absent), then
    /// encoded lazily, at most once per distinct format among receivers.
    /// Enqueueing never blocks; full client buffers drop.
    pub fn broadcast(&self, locate: u16, stock: &str, mut msgs: Vec<ItchMessage>) {
        if msgs.is_empty() {
            return;
        }

        let ts = itch::nanos_since_midnight();
        for m in &mut msgs {
            m.timestamp = ts;
            if m.stock.is_empty() {
                m.stock = stock.to_string();
            }
        }

        let mut json_frames: Option<Vec<Vec<u8>>> = None;
        let mut binary_frames: Option<Vec<Vec<u8>>> = None;

        let clients = self.clients.read();
        for client in clients.values() {
            if !client.is_subscribed(locate) {
                continue;
            }
            let frames = match client.format() {
                ClientFormat::Json => {
                    json_frames.get_or_insert_with(|| encode_all_json(&msgs))
                }
                ClientFormat::Binary => {
                    binary_frames.get_or_insert_with(|| encode_all_binary(&msgs))
                }
            };
            for frame in frames.iter() {
                // Full buffer: frame dropped, client's counter bumped.
                client.send(frame.clone());
            }
        }
    }

    /// Sends directly to one client, skipping the subscription check (used
    /// for stock-directory pushes on subscribe).
    pub fn send_to_client(&self, client: &Client, mut msgs: Vec<ItchMessage>) {
        let ts = itch::nanos_since_midnight();
        for m in &mut msgs {
            m.timestamp = ts;
        }

        let frames = match client.format() {
            ClientFormat::Json => encode_all_json(&msgs),
            ClientFormat::Binary => encode_all_binary(&msgs),
        };
        for frame in frames {
            client.send(frame);
        }
    }

    /// Stock-directory messages for the given locates, or for the whole
    /// catalog when `locates` is None.
    pub fn stock_directory(&self, locates: Option<&[u16]>) -> Vec<ItchMessage> {
        self.symbols
            .iter()
            .filter(|s| match locates {
                Some(wanted) => wanted.contains(&s.locate_code),
                None => true,
            })
            .map(|s| {
                let mut m = ItchMessage::new(MsgType::StockDirectory);
                m.stock_locate = s.locate_code;
                m.stock = s.ticker.to_string();
                m.market_category = b'Q';
                m.financial_status = b'N';
                m.round_lot_size = 100;
                m.round_lots_only = b'N';
                m.issue_classification = b'C';
                m.issue_sub_type = [b'Z', b' '];
                m.authenticity = b'P';
                m.short_sale_threshold = b'N';
                m.ipo_flag = b' ';
                m.luld_ref_price_tier = b'1';
                m.etp_flag = b'N';
                m.inverse_indicator = b'N';
                m
            })
            .collect()
    }
}

fn encode_all_json(msgs: &[ItchMessage]) -> Vec<Vec<u8>> {
    msgs.iter().filter_map(|m| encode_json(m).ok()).collect()
}

fn encode_all_binary(msgs: &[ItchMessage]) -> Vec<Vec<u8>> {
    msgs.iter().map(encode_binary).collect()
}
