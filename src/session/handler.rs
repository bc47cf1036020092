//! WebSocket upgrade handler and the per-client read/write pumps.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::session::client::{Client, ClientFormat};
use crate::session::manager::SessionManager;

const WRITE_WAIT: Duration = Duration::from_secs(10);
const PONG_WAIT: Duration = Duration::from_secs(60);
const PING_PERIOD: Duration = Duration::from_secs(30);
const MAX_MESSAGE_SIZE: usize = 4096;

/// Shared state for the feed endpoint.
#[derive(Clone)]
pub struct FeedState {
    pub manager: Arc<SessionManager>,
    pub shutdown: watch::Receiver<bool>,
}

/// Client -> server control message.
#[derive(Debug, Deserialize)]
struct ControlMessage {
    action: String,
    #[serde(default)]
    symbols: Vec<String>,
    #[serde(default)]
    format: String,
}

/// Upgrades `/feed` requests and runs the client session to completion.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<FeedState>) -> Response {
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: FeedState) {
    let (client, rx) = state.manager.register();
    let (sender, receiver) = socket.split();

    let (done_tx, done_rx) = watch::channel(false);
    let write_task = tokio::spawn(write_pump(
        sender,
        rx,
        client.clone(),
        done_rx,
        state.shutdown.clone(),
    ));

    read_pump(receiver, client.clone(), &state.manager).await;

    // Read side finished (error, close, or timeout): tear the client down.
    let _ = done_tx.send(true);
    state.manager.unregister(client.id);
    let _ = write_task.await;
    info!(client_id = client.id, dropped = client.dropped(), "client disconnected");
}

/// Parses one JSON control message per incoming frame. Malformed input is
/// logged and ignored; the connection stays open. Returns when the peer
/// goes quiet past the read deadline, errors, or closes.
async fn read_pump(mut receiver: SplitStream<WebSocket>, client: Arc<Client>, manager: &SessionManager) {
    loop {
        let frame = match tokio::time::timeout(PONG_WAIT, receiver.next()).await {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(e))) => {
                debug!(client_id = client.id, error = %e, "client read error");
                return;
            }
            Ok(None) => return,
            Err(_) => {
                debug!(client_id = client.id, "client read deadline exceeded");
                return;
            }
        };

        match frame {
            Message::Text(text) => {
                let ctrl: ControlMessage = match serde_json::from_str(&text) {
                    Ok(ctrl) => ctrl,
                    Err(e) => {
                        warn!(client_id = client.id, error = %e, "invalid control message");
                        continue;
                    }
                };
                handle_control(&client, manager, ctrl);
            }
            Message::Close(_) => return,
            // Pongs (and any other frame) reset the read deadline by
            // reaching this point.
            _ => {}
        }
    }
}

fn handle_control(client: &Arc<Client>, manager: &SessionManager, ctrl: ControlMessage) {
    match ctrl.action.as_str() {
        "subscribe" => {
            let (locates, all) = manager.resolve_tickers(&ctrl.symbols);
            if all {
                client.subscribe_all();
                info!(client_id = client.id, "subscribed to all symbols");
                manager.send_to_client(client, manager.stock_directory(None));
            } else if !locates.is_empty() {
                client.subscribe(&locates);
                info!(client_id = client.id, symbols = ?ctrl.symbols, "subscribed");
                manager.send_to_client(client, manager.stock_directory(Some(&locates)));
            }
        }
        "unsubscribe" => {
            let (locates, _) = manager.resolve_tickers(&ctrl.symbols);
            if !locates.is_empty() {
                client.unsubscribe(&locates);
                info!(client_id = client.id, symbols = ?ctrl.symbols, "unsubscribed");
            }
        }
        "format" => match ctrl.format.as_str() {
            "binary" => {
                client.set_format(ClientFormat::Binary);
                info!(client_id = client.id, "switched to binary format");
            }
            "json" => {
                client.set_format(ClientFormat::Json);
                info!(client_id = client.id, "switched to json format");
            }
            other => warn!(client_id = client.id, format = other, "unknown format"),
        },
        other => warn!(client_id = client.id, action = other, "unknown action"),
    }
}

/// Drains the send queue onto the socket, pings on a fixed period, and
/// enforces a per-write deadline. Text frames for JSON clients, binary
/// frames otherwise.
async fn write_pump(
    mut sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Vec<u8>>,
    client: Arc<Client>,
    mut done: watch::Receiver<bool>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ping = tokio::time::interval(PING_PERIOD);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The interval fires immediately; skip that first tick.
    ping.tick().await;

    loop {
        let message = tokio::select! {
            data = rx.recv() => match data {
                Some(data) => match client.format() {
                    ClientFormat::Json => match String::from_utf8(data) {
                        Ok(text) => Message::Text(text),
                        Err(_) => continue,
                    },
                    ClientFormat::Binary => Message::Binary(data),
                },
                None => break,
            },
            _ = ping.tick() => Message::Ping(Vec::new()),
            _ = done.changed() => break,
            _ = shutdown.changed() => break,
        };

        match tokio::time::timeout(WRITE_WAIT, sender.send(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(client_id = client.id, error = %e, "client write error");
                break;
            }
            Err(_) => {
                debug!(client_id = client.id, "client write deadline exceeded");
                break;
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
}
