// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Deterministic framing and CBOR helpers for hub packets.
//!
//! Packet layout:
//!
//! ``MAGIC(4) || VERSION(2) || FLAGS(2) || LENGTH(4) || PAYLOAD || CHECKSUM(32)``
//!
//! * PAYLOAD is a CBOR `OpEnvelope`
//! * CHECKSUM = blake3-256 over HEADER (first 12 bytes) || PAYLOAD

use blake3::Hasher;
use ciborium::value::Value;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::{
    BoardModelPayload, CardAddedPayload, CardDiffPayload, CardModelPayload, CardRemovedPayload,
    Message, NewCardPayload, OpEnvelope, RidPayload, SetCardPayload,
};

/// Protocol magic constant "TAPE".
pub const MAGIC: [u8; 4] = [0x54, 0x41, 0x50, 0x45];
/// Wire protocol version (big-endian u16).
pub const VERSION: u16 = 0x0001;
/// Reserved flags (set to zero for v1).
pub const FLAGS: u16 = 0x0000;
/// Header length in bytes (magic, version, flags, payload length).
pub const HEADER_LEN: usize = 12;
/// Checksum length in bytes.
pub const CHECKSUM_LEN: usize = 32;

/// Failure while encoding or decoding a packet.
#[derive(Debug, Error)]
pub enum WireError {
    /// Fewer bytes than one complete packet.
    #[error("incomplete packet")]
    Incomplete,
    /// First four bytes are not the protocol magic.
    #[error("bad magic")]
    BadMagic,
    /// Unknown wire version.
    #[error("unsupported version {0:#06x}")]
    UnsupportedVersion(u16),
    /// Checksum over header and payload does not match.
    #[error("checksum mismatch")]
    ChecksumMismatch,
    /// Envelope names an operation this schema does not know.
    #[error("unknown op {0}")]
    UnknownOp(String),
    /// CBOR serialization failed.
    #[error("cbor encode: {0}")]
    Encode(#[from] ciborium::ser::Error<std::io::Error>),
    /// CBOR deserialization failed.
    #[error("cbor decode: {0}")]
    Decode(#[from] ciborium::de::Error<std::io::Error>),
    /// Payload value did not match the operation schema.
    #[error("payload schema: {0}")]
    Payload(#[from] ciborium::value::Error),
}

/// Encode to CBOR bytes (definite lengths by default).
pub fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, WireError> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes)?;
    Ok(bytes)
}

/// Decode from CBOR bytes.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, WireError> {
    Ok(ciborium::de::from_reader(bytes)?)
}

/// A full packet (header + payload + checksum).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Raw header (12 bytes).
    pub header: [u8; HEADER_LEN],
    /// CBOR payload bytes.
    pub payload: Vec<u8>,
    /// blake3 checksum over header||payload.
    pub checksum: [u8; CHECKSUM_LEN],
}

impl Packet {
    /// Build a packet from CBOR payload bytes.
    pub fn from_payload(payload: Vec<u8>) -> Self {
        let mut header = [0u8; HEADER_LEN];
        header[0..4].copy_from_slice(&MAGIC);
        header[4..6].copy_from_slice(&VERSION.to_be_bytes());
        header[6..8].copy_from_slice(&FLAGS.to_be_bytes());
        header[8..12].copy_from_slice(&(payload.len() as u32).to_be_bytes());

        let mut hasher = Hasher::new();
        hasher.update(&header);
        hasher.update(&payload);
        let checksum = *hasher.finalize().as_bytes();

        Packet {
            header,
            payload,
            checksum,
        }
    }

    /// Encode an `OpEnvelope` into a full packet byte vector.
    pub fn encode_envelope<P: Serialize>(env: &OpEnvelope<P>) -> Result<Vec<u8>, WireError> {
        let payload = to_cbor(env)?;
        let packet = Packet::from_payload(payload);
        let mut out =
            Vec::with_capacity(packet.header.len() + packet.payload.len() + packet.checksum.len());
        out.extend_from_slice(&packet.header);
        out.extend_from_slice(&packet.payload);
        out.extend_from_slice(&packet.checksum);
        Ok(out)
    }

    /// Decode a packet from a byte slice, returning the envelope and bytes
    /// consumed.
    pub fn decode_envelope<P: DeserializeOwned>(
        bytes: &[u8],
    ) -> Result<(OpEnvelope<P>, usize), WireError> {
        if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
            return Err(WireError::Incomplete);
        }
        if bytes[0..4] != MAGIC {
            return Err(WireError::BadMagic);
        }
        let version = u16::from_be_bytes([bytes[4], bytes[5]]);
        if version != VERSION {
            return Err(WireError::UnsupportedVersion(version));
        }
        let len = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        if bytes.len() < HEADER_LEN + len + CHECKSUM_LEN {
            return Err(WireError::Incomplete);
        }
        let header = &bytes[0..HEADER_LEN];
        let payload = &bytes[HEADER_LEN..HEADER_LEN + len];
        let checksum = &bytes[HEADER_LEN + len..HEADER_LEN + len + CHECKSUM_LEN];

        let mut hasher = Hasher::new();
        hasher.update(header);
        hasher.update(payload);
        let expect = hasher.finalize();
        if expect.as_bytes() != checksum {
            return Err(WireError::ChecksumMismatch);
        }

        let env: OpEnvelope<P> = from_cbor(payload)?;
        Ok((env, HEADER_LEN + len + CHECKSUM_LEN))
    }
}

/// Encode a `Message` into a packet with the provided logical timestamp.
pub fn encode_message(msg: Message, ts: u64) -> Result<Vec<u8>, WireError> {
    let op = msg.op_name();
    let payload = match msg {
        Message::Handshake(p) => Value::serialized(&p)?,
        Message::HandshakeAck(p) => Value::serialized(&p)?,
        Message::Error(p) => Value::serialized(&p)?,
        Message::SubscribeCard { rid } | Message::GetCard { rid } => {
            Value::serialized(&RidPayload { rid })?
        }
        Message::SubscribeBoard | Message::GetBoard => Value::Null,
        Message::SetCard { rid, patch } => Value::serialized(&SetCardPayload { rid, patch })?,
        Message::NewCard { fields } => Value::serialized(&NewCardPayload { fields })?,
        Message::DeleteCard { rid } | Message::NewAck { rid } | Message::DeleteAck { rid } => {
            Value::serialized(&RidPayload { rid })?
        }
        Message::CardModel { rid, card } => Value::serialized(&CardModelPayload { rid, card })?,
        Message::BoardModel { rids } => Value::serialized(&BoardModelPayload { rids })?,
        Message::SetAck { rid, diff } | Message::CardChanged { rid, diff } => {
            Value::serialized(&CardDiffPayload { rid, diff })?
        }
        Message::CardAdded { rid, position } => {
            Value::serialized(&CardAddedPayload { rid, position })?
        }
        Message::CardRemoved { position } => Value::serialized(&CardRemovedPayload { position })?,
    };

    let env = OpEnvelope {
        op: op.to_string(),
        ts,
        payload,
    };
    Packet::encode_envelope(&env)
}

/// Decode bytes into (Message, ts, bytes_consumed).
pub fn decode_message(bytes: &[u8]) -> Result<(Message, u64, usize), WireError> {
    let (env, used) = Packet::decode_envelope::<Value>(bytes)?;
    let ts = env.ts;
    let msg = match env.op.as_str() {
        "handshake" => Message::Handshake(env.payload.deserialized()?),
        "handshake_ack" => Message::HandshakeAck(env.payload.deserialized()?),
        "error" => Message::Error(env.payload.deserialized()?),
        "subscribe_card" => {
            let p: RidPayload = env.payload.deserialized()?;
            Message::SubscribeCard { rid: p.rid }
        }
        "subscribe_board" => Message::SubscribeBoard,
        "get_card" => {
            let p: RidPayload = env.payload.deserialized()?;
            Message::GetCard { rid: p.rid }
        }
        "get_board" => Message::GetBoard,
        "set_card" => {
            let p: SetCardPayload = env.payload.deserialized()?;
            Message::SetCard {
                rid: p.rid,
                patch: p.patch,
            }
        }
        "new_card" => {
            let p: NewCardPayload = env.payload.deserialized()?;
            Message::NewCard { fields: p.fields }
        }
        "delete_card" => {
            let p: RidPayload = env.payload.deserialized()?;
            Message::DeleteCard { rid: p.rid }
        }
        "card_model" => {
            let p: CardModelPayload = env.payload.deserialized()?;
            Message::CardModel {
                rid: p.rid,
                card: p.card,
            }
        }
        "board_model" => {
            let p: BoardModelPayload = env.payload.deserialized()?;
            Message::BoardModel { rids: p.rids }
        }
        "set_ack" => {
            let p: CardDiffPayload = env.payload.deserialized()?;
            Message::SetAck {
                rid: p.rid,
                diff: p.diff,
            }
        }
        "new_ack" => {
            let p: RidPayload = env.payload.deserialized()?;
            Message::NewAck { rid: p.rid }
        }
        "delete_ack" => {
            let p: RidPayload = env.payload.deserialized()?;
            Message::DeleteAck { rid: p.rid }
        }
        "card_changed" => {
            let p: CardDiffPayload = env.payload.deserialized()?;
            Message::CardChanged {
                rid: p.rid,
                diff: p.diff,
            }
        }
        "card_added" => {
            let p: CardAddedPayload = env.payload.deserialized()?;
            Message::CardAdded {
                rid: p.rid,
                position: p.position,
            }
        }
        "card_removed" => {
            let p: CardRemovedPayload = env.payload.deserialized()?;
            Message::CardRemoved {
                position: p.position,
            }
        }
        other => {
            return Err(WireError::UnknownOp(other.to_string()));
        }
    };
    Ok((msg, ts, used))
}

// --- Unit tests -----------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CardPatch;
    use std::collections::BTreeMap;

    fn sample_set_card() -> Message {
        let patch = CardPatch {
            price: Some("1500.17 ▲".to_string()),
            ..CardPatch::default()
        };
        Message::SetCard {
            rid: "tape.card.3".into(),
            patch,
        }
    }

    #[test]
    fn round_trips_set_card() {
        let msg = sample_set_card();
        let bytes = encode_message(msg.clone(), 7).unwrap();
        assert_eq!(bytes[0..4], MAGIC);
        assert_eq!(u16::from_be_bytes([bytes[4], bytes[5]]), VERSION);

        let (decoded, ts, used) = decode_message(&bytes).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(ts, 7);
        assert_eq!(used, bytes.len());
    }

    #[test]
    fn round_trips_unit_ops() {
        for msg in [Message::SubscribeBoard, Message::GetBoard] {
            let bytes = encode_message(msg.clone(), 1).unwrap();
            let (decoded, _, _) = decode_message(&bytes).unwrap();
            assert_eq!(decoded, msg);
        }
    }

    #[test]
    fn round_trips_events_and_acks() {
        let mut diff = BTreeMap::new();
        diff.insert("price".to_string(), "20".to_string());
        let msgs = [
            Message::CardChanged {
                rid: "tape.card.1".into(),
                diff: diff.clone(),
            },
            Message::SetAck {
                rid: "tape.card.1".into(),
                diff: BTreeMap::new(),
            },
            Message::CardAdded {
                rid: "tape.card.6".into(),
                position: 5,
            },
            Message::CardRemoved { position: 2 },
        ];
        for msg in msgs {
            let bytes = encode_message(msg.clone(), 9).unwrap();
            let (decoded, ts, _) = decode_message(&bytes).unwrap();
            assert_eq!(decoded, msg);
            assert_eq!(ts, 9);
        }
    }

    #[test]
    fn rejects_corrupted_payload() {
        let mut bytes = encode_message(sample_set_card(), 0).unwrap();
        bytes[HEADER_LEN + 1] ^= 0xff;
        assert!(matches!(
            decode_message(&bytes),
            Err(WireError::ChecksumMismatch)
        ));
    }

    #[test]
    fn rejects_truncated_packet() {
        let bytes = encode_message(sample_set_card(), 0).unwrap();
        assert!(matches!(
            decode_message(&bytes[..bytes.len() - 1]),
            Err(WireError::Incomplete)
        ));
        assert!(matches!(
            decode_message(&bytes[..4]),
            Err(WireError::Incomplete)
        ));
    }

    #[test]
    fn rejects_bad_magic_and_version() {
        let mut bad_magic = encode_message(sample_set_card(), 0).unwrap();
        bad_magic[0] = 0;
        assert!(matches!(
            decode_message(&bad_magic),
            Err(WireError::BadMagic)
        ));

        let mut bad_version = encode_message(sample_set_card(), 0).unwrap();
        bad_version[5] = 9;
        assert!(matches!(
            decode_message(&bad_version),
            Err(WireError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn rejects_unknown_op() {
        let env = OpEnvelope {
            op: "drop_table".to_string(),
            ts: 0,
            payload: Value::Null,
        };
        let bytes = Packet::encode_envelope(&env).unwrap();
        assert!(matches!(
            decode_message(&bytes),
            Err(WireError::UnknownOp(op)) if op == "drop_table"
        ));
    }
}
