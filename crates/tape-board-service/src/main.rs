// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Unix-socket hub for the shared card board.
//!
//! Holds the authoritative board behind one lock, applies validated
//! mutations, and fans change events out to subscribed connections before
//! the mutating caller sees its ack. State is ephemeral and resets on
//! restart; seed cards come from host prefs.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tape_board::{Board, BoardEvent, Emitter, EventSink, ObserverId};
use tape_board_proto::{
    wire::{decode_message, encode_message, CHECKSUM_LEN, HEADER_LEN},
    AckStatus, ErrorPayload, HandshakeAckPayload, Message,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

mod config;
use config::{HostPrefs, PrefsStore};


/// Transport side of one observer: encodes events onto the connection
/// outbox. A closed outbox reports the observer gone; a backlogged one
/// loses the frame but keeps the registration.
#[derive(Clone)]
struct ConnSink {
    tx: tokio::sync::mpsc::Sender<Vec<u8>>,
}

impl EventSink for ConnSink {
    fn deliver(&self, seq: u64, event: &BoardEvent) -> bool {
        let msg = match event {
            BoardEvent::Changed { rid, diff } => Message::CardChanged {
                rid: rid.clone(),
                diff: diff.clone(),
            },
            BoardEvent::Added { rid, position } => Message::CardAdded {
                rid: rid.clone(),
                position: *position,
            },
            BoardEvent::Removed { position, .. } => Message::CardRemoved {
                position: *position,
            },
        };
        let pkt = match encode_message(msg, seq) {
            Ok(pkt) => pkt,
            Err(err) => {
                warn!(?err, "failed to encode event frame");
                return true;
            }
        };
        match self.tx.try_send(pkt) {
            Ok(()) => true,
            Err(tokio::sync::mpsc::error::TrySendError::Full(_)) => true,
            Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

struct ConnState {
    observer: ObserverId,
    tx: tokio::sync::mpsc::Sender<Vec<u8>>,
}

struct HubState {
    next_conn_id: u64,
    board: Board,
    events: Emitter<ConnSink>,
    conns: HashMap<u64, ConnState>,
}

impl HubState {
    fn new(board: Board) -> Self {
        Self {
            next_conn_id: 0,
            board,
            events: Emitter::new(),
            conns: HashMap::new(),
        }
    }

    /// Queue one frame for a single connection, stamped from the hub clock.
    async fn send_to(&mut self, conn_id: u64, msg: Message) {
        let ts = self.events.alloc_seq();
        let Some(conn) = self.conns.get(&conn_id) else {
            return;
        };
        match encode_message(msg, ts) {
            Ok(pkt) => {
                let _ = conn.tx.send(pkt).await;
            }
            Err(err) => warn!(?err, "failed to encode frame for conn {conn_id}"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    // Prefs (best-effort); defaults are written once if absent.
    let store = PrefsStore::open().ok();
    let prefs: HostPrefs = store
        .as_ref()
        .and_then(|s| s.load("board_host").ok().flatten())
        .unwrap_or_default();
    if let Some(store) = &store {
        let _ = store.save("board_host", &prefs);
    }

    // The board is ephemeral; every boot starts from the seed cards.
    let mut board = Board::new();
    for fields in prefs.seed.clone() {
        let (rid, _event) = board.create(fields).context("seed card rejected")?;
        info!("seeded {rid}");
    }

    let socket_path = prefs.socket_path.clone();
    let hub = Arc::new(Mutex::new(HubState::new(board)));

    // Remove stale socket if present
    let _ = std::fs::remove_file(&socket_path);
    let listener = UnixListener::bind(&socket_path)?;
    info!("board hub listening at {socket_path}");

    loop {
        let (stream, _) = listener.accept().await?;
        let hub_state = hub.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_client(stream, hub_state).await {
                warn!(?err, "client handler error");
            }
        });
    }
}

async fn handle_client(stream: UnixStream, hub: Arc<Mutex<HubState>>) -> Result<()> {
    // split stream
    let (mut reader, writer) = tokio::io::split(stream);

    // allocate conn id, observer registration, and outbox
    let (tx, mut rx) = tokio::sync::mpsc::channel::<Vec<u8>>(256);
    let conn_id = {
        let mut h = hub.lock().await;
        let id = h.next_conn_id;
        h.next_conn_id += 1;
        let observer = h.events.register(ConnSink { tx: tx.clone() });
        h.conns.insert(id, ConnState { observer, tx });
        id
    };

    // writer task
    tokio::spawn(async move {
        let mut ws = writer;
        while let Some(buf) = rx.recv().await {
            if ws.write_all(&buf).await.is_err() {
                break;
            }
        }
    });

    const MAX_PAYLOAD: usize = 1024 * 1024;
    let mut read_buf: Vec<u8> = vec![0u8; 16 * 1024];
    let mut acc: Vec<u8> = Vec::with_capacity(32 * 1024);
    'conn: loop {
        let n = match reader.read(&mut read_buf).await {
            Ok(0) => break 'conn,
            Ok(n) => n,
            Err(err) => {
                warn!(?err, "read error on conn {conn_id}");
                break 'conn;
            }
        };
        acc.extend_from_slice(&read_buf[..n]);

        // process as many frames as available
        loop {
            if acc.len() < HEADER_LEN {
                break;
            }
            let len = u32::from_be_bytes([acc[8], acc[9], acc[10], acc[11]]) as usize;
            if len > MAX_PAYLOAD {
                warn!("payload too large from conn {conn_id}");
                break 'conn;
            }
            let frame_len = HEADER_LEN + len + CHECKSUM_LEN;
            if acc.len() < frame_len {
                // need more data
                break;
            }
            let packet: Vec<u8> = acc.drain(..frame_len).collect();
            match decode_message(&packet) {
                Ok((msg, _ts, _used)) => {
                    if let Err(err) = handle_message(msg, conn_id, &hub).await {
                        warn!(?err, "dropping connection {conn_id}");
                        break 'conn;
                    }
                }
                Err(err) => {
                    warn!(?err, "failed to decode packet from conn {conn_id}");
                    break 'conn;
                }
            }
        }
    }

    // cleanup connection and its observer registration
    let mut h = hub.lock().await;
    if let Some(conn) = h.conns.remove(&conn_id) {
        h.events.deregister(conn.observer);
    }

    Ok(())
}

// Handle a single inbound message from a connection.
async fn handle_message(msg: Message, conn_id: u64, hub: &Arc<Mutex<HubState>>) -> Result<()> {
    match msg {
        Message::Handshake(handshake) => {
            // Access is always granted.
            let mut h = hub.lock().await;
            let ack = Message::HandshakeAck(HandshakeAckPayload {
                status: AckStatus::Ok,
                server_version: handshake.client_version, // echo back
                capabilities: handshake.capabilities,
                session_id: conn_id.to_string(),
                error: None,
            });
            h.send_to(conn_id, ack).await;
        }
        Message::SubscribeCard { rid } => {
            let mut h = hub.lock().await;
            match h.board.get(&rid).cloned() {
                Ok(card) => {
                    let observer = h
                        .conns
                        .get(&conn_id)
                        .map(|c| c.observer)
                        .ok_or_else(|| anyhow::anyhow!("missing conn"))?;
                    h.events.watch_card(observer, rid.clone());
                    h.send_to(conn_id, Message::CardModel { rid, card }).await;
                }
                Err(err) => {
                    h.send_to(conn_id, Message::Error(ErrorPayload::from(&err)))
                        .await;
                }
            }
        }
        Message::SubscribeBoard => {
            let mut h = hub.lock().await;
            let observer = h
                .conns
                .get(&conn_id)
                .map(|c| c.observer)
                .ok_or_else(|| anyhow::anyhow!("missing conn"))?;
            h.events.watch_board(observer);
            let rids = h.board.list().to_vec();
            h.send_to(conn_id, Message::BoardModel { rids }).await;
        }
        Message::GetCard { rid } => {
            let mut h = hub.lock().await;
            let reply = match h.board.get(&rid).cloned() {
                Ok(card) => Message::CardModel { rid, card },
                Err(err) => Message::Error(ErrorPayload::from(&err)),
            };
            h.send_to(conn_id, reply).await;
        }
        Message::GetBoard => {
            let mut h = hub.lock().await;
            let rids = h.board.list().to_vec();
            h.send_to(conn_id, Message::BoardModel { rids }).await;
        }
        Message::SetCard { rid, patch } => {
            let mut h = hub.lock().await;
            match h.board.update(&rid, patch) {
                Ok(diff) => {
                    // Commit, then event, then ack: a subscribed mutator
                    // sees the event first on its own FIFO.
                    h.events.emit(&BoardEvent::Changed {
                        rid: rid.clone(),
                        diff: diff.clone(),
                    });
                    h.send_to(conn_id, Message::SetAck { rid, diff }).await;
                }
                Err(err) => {
                    h.send_to(conn_id, Message::Error(ErrorPayload::from(&err)))
                        .await;
                }
            }
        }
        Message::NewCard { fields } => {
            let mut h = hub.lock().await;
            match h.board.create(fields) {
                Ok((rid, event)) => {
                    h.events.emit(&event);
                    h.send_to(conn_id, Message::NewAck { rid }).await;
                }
                Err(err) => {
                    h.send_to(conn_id, Message::Error(ErrorPayload::from(&err)))
                        .await;
                }
            }
        }
        Message::DeleteCard { rid } => {
            let mut h = hub.lock().await;
            match h.board.delete(&rid) {
                Ok(Some(event)) => {
                    h.events.emit(&event);
                    h.send_to(conn_id, Message::DeleteAck { rid }).await;
                }
                Ok(None) => {
                    // Unknown card: still an ack, no event.
                    h.send_to(conn_id, Message::DeleteAck { rid }).await;
                }
                Err(err) => {
                    error!(%err, "board state is suspect; refusing the call");
                    h.send_to(conn_id, Message::Error(ErrorPayload::from(&err)))
                        .await;
                    anyhow::bail!("board inconsistency on {rid}");
                }
            }
        }
        Message::HandshakeAck(_)
        | Message::Error(_)
        | Message::CardModel { .. }
        | Message::BoardModel { .. }
        | Message::SetAck { .. }
        | Message::NewAck { .. }
        | Message::DeleteAck { .. }
        | Message::CardChanged { .. }
        | Message::CardAdded { .. }
        | Message::CardRemoved { .. } => {
            // hub-originated frames are never accepted from clients; ignore
        }
    }
    Ok(())
}
