// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Client helper for talking to the board hub over Unix sockets
//! (CBOR-framed), plus a blocking channel adapter for threaded tools.

use anyhow::Result;
use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use tape_board_proto::{
    wire::{decode_message, encode_message, CHECKSUM_LEN, HEADER_LEN},
    CardFields, CardPatch, HandshakePayload, Message, Rid,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream as AsyncUnixStream;

/// Minimal async client over Unix sockets.
pub struct BoardClient {
    stream: AsyncUnixStream,
}

impl BoardClient {
    /// Connect to the hub at the given Unix socket path.
    pub async fn connect(path: &str) -> Result<Self> {
        let stream = AsyncUnixStream::connect(path).await?;
        Ok(Self { stream })
    }

    /// Send a handshake message.
    pub async fn send_handshake(&mut self, payload: HandshakePayload) -> Result<()> {
        self.send(Message::Handshake(payload)).await
    }

    /// Become an observer of one card.
    pub async fn subscribe_card(&mut self, rid: Rid) -> Result<()> {
        self.send(Message::SubscribeCard { rid }).await
    }

    /// Become an observer of the collection.
    pub async fn subscribe_board(&mut self) -> Result<()> {
        self.send(Message::SubscribeBoard).await
    }

    /// Request one card snapshot.
    pub async fn get_card(&mut self, rid: Rid) -> Result<()> {
        self.send(Message::GetCard { rid }).await
    }

    /// Request the ordered collection snapshot.
    pub async fn get_board(&mut self) -> Result<()> {
        self.send(Message::GetBoard).await
    }

    /// Submit a sparse update to one card.
    pub async fn set_card(&mut self, rid: Rid, patch: CardPatch) -> Result<()> {
        self.send(Message::SetCard { rid, patch }).await
    }

    /// Create a card from a full field set.
    pub async fn new_card(&mut self, fields: CardFields) -> Result<()> {
        self.send(Message::NewCard { fields }).await
    }

    /// Delete one card. The hub acks whether or not the card existed.
    pub async fn delete_card(&mut self, rid: Rid) -> Result<()> {
        self.send(Message::DeleteCard { rid }).await
    }

    async fn send(&mut self, msg: Message) -> Result<()> {
        let pkt = encode_message(msg, 0)?;
        self.stream.write_all(&pkt).await?;
        Ok(())
    }

    /// Poll a single message if available. Returns Ok(None) when the stream
    /// is closed before any bytes are read. Reads until a full frame header
    /// is buffered so short reads cannot desynchronize framing.
    pub async fn poll_message(&mut self) -> Result<Option<Message>> {
        let mut header = [0u8; HEADER_LEN];
        let mut read = 0usize;
        while read < header.len() {
            let n = self.stream.read(&mut header[read..]).await?;
            if n == 0 {
                if read == 0 {
                    return Ok(None);
                }
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "truncated frame header: read {} of {} bytes",
                        read,
                        header.len()
                    ),
                )
                .into());
            }
            read += n;
        }
        let len = u32::from_be_bytes([header[8], header[9], header[10], header[11]]) as usize;
        let mut rest = vec![0u8; len + CHECKSUM_LEN];
        self.stream.read_exact(&mut rest).await?;
        let mut packet = Vec::with_capacity(HEADER_LEN + len + CHECKSUM_LEN);
        packet.extend_from_slice(&header);
        packet.extend_from_slice(&rest);
        let (msg, _ts, _) = decode_message(&packet)?;
        Ok(Some(msg))
    }

    /// Expose the underlying stream (e.g., for select!).
    pub fn stream(&mut self) -> &mut AsyncUnixStream {
        &mut self.stream
    }
}

/// Connect, handshake, and subscribe to the board; returns a receiver of
/// every decoded hub frame (snapshots, acks, events).
///
/// The initial Unix socket connect is synchronous so callers can surface
/// connection errors in their UI. After a successful connect, the stream is
/// moved into a background thread that handles handshake, subscription, and
/// message decoding.
pub fn connect_board_channel(path: &str) -> std::io::Result<Receiver<Message>> {
    let (msg_tx, msg_rx) = mpsc::channel();
    let stream = UnixStream::connect(path)?;

    thread::spawn(move || {
        let mut stream = stream;
        let _ = stream.write_all(
            &encode_message(
                Message::Handshake(HandshakePayload {
                    client_version: 1,
                    capabilities: vec![],
                    agent_id: None,
                    session_meta: None,
                }),
                0,
            )
            .unwrap_or_default(),
        );
        let _ = stream.write_all(&encode_message(Message::SubscribeBoard, 0).unwrap_or_default());
        loop {
            let mut header = [0u8; HEADER_LEN];
            if stream.read_exact(&mut header).is_err() {
                break;
            }
            let len = u32::from_be_bytes([header[8], header[9], header[10], header[11]]) as usize;
            let mut rest = vec![0u8; len + CHECKSUM_LEN];
            if stream.read_exact(&mut rest).is_err() {
                break;
            }
            let mut packet = Vec::with_capacity(HEADER_LEN + len + CHECKSUM_LEN);
            packet.extend_from_slice(&header);
            packet.extend_from_slice(&rest);
            match decode_message(&packet) {
                Ok((msg, _, _)) => {
                    if msg_tx.send(msg).is_err() {
                        break;
                    }
                }
                Err(_) => continue,
            }
        }
    });

    Ok(msg_rx)
}
