//! One connected feed client: encoding format, subscriptions, and the
//! bounded send queue.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc;

/// Preferred wire encoding for a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientFormat {
    Json,
    Binary,
}

struct ClientState {
    format: ClientFormat,
    symbols: HashSet<u16>,
    all_symbols: bool,
}

static CLIENT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A registered feed client. The send queue is bounded: when it is full,
/// messages are dropped and counted rather than blocking the broadcaster.
pub struct Client {
    pub id: u64,
    state: RwLock<ClientState>,
    tx: mpsc::Sender<Vec<u8>>,
    dropped: AtomicU64,
}

impl Client {
    /// Creates a client with a send buffer of `buffer_size` frames. The
    /// returned receiver feeds the connection's write pump.
    pub fn new(buffer_size: usize) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        let client = Self {
            id: CLIENT_ID_COUNTER.fetch_add(1, Ordering::SeqCst) + 1,
            state: RwLock::new(ClientState {
                format: ClientFormat::Json,
                symbols: HashSet::new(),
                all_symbols: false,
            }),
            tx,
            dropped: AtomicU64::new(0),
        };
        (client, rx)
    }

    pub fn format(&self) -> ClientFormat {
        self.state.read().format
    }

    pub fn set_format(&self, format: ClientFormat) {
        self.state.write().format = format;
    }

    pub fn subscribe(&self, locates: &[u16]) {
        let mut state = self.state.write();
        state.symbols.extend(locates.iter().copied());
    }

    pub fn subscribe_all(&self) {
        self.state.write().all_symbols = true;
    }

    pub fn unsubscribe(&self, locates: &[u16]) {
        let mut state = self.state.write();
        for locate in locates {
            state.symbols.remove(locate);
        }
    }

    pub fn is_subscribed(&self, locate: u16) -> bool {
        let state = self.state.read();
        state.all_symbols || state.symbols.contains(&locate)
    }

    pub fn is_all_subscribed(&self) -> bool {
        self.state.read().all_symbols
    }

    /// Subscribed locate codes; None means "all symbols".
    pub fn subscribed_locates(&self) -> Option<Vec<u16>> {
        let state = self.state.read();
        if state.all_symbols {
            return None;
        }
        Some(state.symbols.iter().copied().collect())
    }

    /// Non-blocking enqueue. False when the buffer is full (frame dropped,
    /// drop counter bumped) or the connection is gone.
    pub fn send(&self, data: Vec<u8>) -> bool {
        match self.tx.try_send(data) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Frames dropped due to a full send buffer.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_format_is_json() {
        let (c, _rx) = Client::new(10);
        assert_eq!(c.format(), ClientFormat::Json);
        c.set_format(ClientFormat::Binary);
        assert_eq!(c.format(), ClientFormat::Binary);
    }

    #[test]
    fn subscribe_and_unsubscribe() {
        let (c, _rx) = Client::new(10);
        assert!(!c.is_subscribed(1));
        c.subscribe(&[1, 5, 10]);
        assert!(c.is_subscribed(1));
        assert!(c.is_subscribed(5));
        assert!(!c.is_subscribed(2));

        c.unsubscribe(&[5]);
        assert!(!c.is_subscribed(5));
        assert!(c.is_subscribed(1));

        let locates = c.subscribed_locates().unwrap();
        assert_eq!(locates.len(), 2);
    }

    #[test]
    fn subscribe_all_matches_everything() {
        let (c, _rx) = Client::new(10);
        c.subscribe_all();
        assert!(c.is_subscribed(1));
        assert!(c.is_subscribed(999));
        assert!(c.is_all_subscribed());
        assert!(c.subscribed_locates().is_none());
    }

    #[test]
    fn send_buffer_full_drops_and_counts() {
        let (c, _rx) = Client::new(2);
        assert!(c.send(b"msg1".to_vec()));
        assert!(c.send(b"msg2".to_vec()));
        assert!(!c.send(b"msg3".to_vec()));
        assert_eq!(c.dropped(), 1);
    }

    #[test]
    fn send_succeeds_with_room() {
        let (c, _rx) = Client::new(100);
        assert!(c.send(b"hello".to_vec()));
        assert_eq!(c.dropped(), 0);
    }

    #[test]
    fn send_to_closed_receiver_fails_without_counting() {
        let (c, rx) = Client::new(2);
        drop(rx);
        assert!(!c.send(b"msg".to_vec()));
        assert_eq!(c.dropped(), 0);
    }

    #[test]
    fn unique_ids() {
        let (c1, _r1) = Client::new(1);
        let (c2, _r2) = Client::new(1);
        let (c3, _r3) = Client::new(1);
        assert!(c1.id != c2.id && c2.id != c3.id && c1.id != c3.id);
    }
}
