// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Minimal CLI publisher for exercising the board hub.
//!
//! This example connects to the Unix socket hub, sends a handshake,
//! subscribes to the board, then publishes N price updates to one card so
//! that every other subscribed client sees `card_changed` events flow.

use anyhow::{Context, Result};
use std::io::Write;
use std::os::unix::net::UnixStream;
use std::time::Duration;
use tape_board_proto::{
    wire::encode_message, CardPatch, HandshakePayload, Message,
};

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let socket_path = args
        .next()
        .unwrap_or_else(|| "/tmp/tape-board.sock".to_string());
    let rid = args.next().unwrap_or_else(|| "tape.card.1".to_string());
    let updates: u64 = args
        .next()
        .as_deref()
        .unwrap_or("5")
        .parse()
        .context("parse updates")?;
    let delay_ms: u64 = args
        .next()
        .as_deref()
        .unwrap_or("250")
        .parse()
        .context("parse delay_ms")?;

    let mut stream =
        UnixStream::connect(&socket_path).with_context(|| format!("connect {socket_path}"))?;

    let pkt = encode_message(
        Message::Handshake(HandshakePayload {
            client_version: 1,
            capabilities: vec!["demo:pulse".into()],
            agent_id: Some("tape-board-client-example:board_pulse".into()),
            session_meta: None,
        }),
        0,
    )
    .context("encode handshake")?;
    stream.write_all(&pkt).context("write handshake")?;

    let pkt = encode_message(Message::SubscribeBoard, 0).context("encode subscribe")?;
    stream.write_all(&pkt).context("write subscribe")?;

    for i in 0..updates {
        let patch = CardPatch {
            price: Some(format!("1500.{:02} ▲", i % 100)),
            ..CardPatch::default()
        };
        let pkt = encode_message(
            Message::SetCard {
                rid: rid.clone(),
                patch,
            },
            0,
        )
        .context("encode set_card")?;
        stream.write_all(&pkt).context("write set_card")?;
        std::thread::sleep(Duration::from_millis(delay_ms));
    }

    Ok(())
}
