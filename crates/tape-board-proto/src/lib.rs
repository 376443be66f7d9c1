// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Wire schema for the Tape board hub (card reads, calls, acks, events).
//! Frames are CBOR `OpEnvelope`s carried in deterministic checksummed
//! packets; see [`wire`].

pub use tape_board::{Card, CardFields, CardPatch, FieldDiff, Rid};

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::PathBuf};
use tape_board::BoardError;

pub mod wire;

/// Default Unix socket path for the board hub.
///
/// Prefers a per-user runtime dir (XDG_RUNTIME_DIR) and falls back to
/// `/tmp` when unavailable.
pub fn default_socket_path() -> PathBuf {
    let base = std::env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"));
    base.join("tape-board.sock")
}

/// Canonical OpEnvelope carried as the payload of a packet.
///
/// * `op` – operation name (see [`Message::op_name`]).
/// * `ts` – logical timestamp (authoritative on the hub side).
/// * `payload` – operation-specific body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpEnvelope<P> {
    /// Operation name (e.g., "handshake", "set_card", "card_changed").
    pub op: String,
    /// Logical timestamp (monotonic per hub).
    pub ts: u64,
    /// Operation-specific body.
    pub payload: P,
}

/// Error payload used in error and handshake_ack responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorPayload {
    /// Numeric error code (e.g., 1, 2, 500).
    pub code: u32,
    /// Stable identifier (e.g., "E_NOT_FOUND").
    pub name: String,
    /// Optional machine-readable details.
    pub details: Option<ciborium::value::Value>,
    /// Human readable message.
    pub message: String,
}

impl ErrorPayload {
    /// Builds the wire payload for a board failure.
    pub fn from_board(err: &BoardError) -> Self {
        let (code, name) = match err {
            BoardError::NotFound { .. } => (1, "E_NOT_FOUND"),
            BoardError::EmptyField { .. } => (2, "E_INVALID_PARAMS"),
            BoardError::IndexDiverged { .. } => (500, "E_STATE"),
        };
        Self {
            code,
            name: name.to_string(),
            details: None,
            message: err.to_string(),
        }
    }
}

impl From<&BoardError> for ErrorPayload {
    fn from(err: &BoardError) -> Self {
        Self::from_board(err)
    }
}

/// Handshake request payload (client → hub).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandshakePayload {
    /// Optional agent identifier.
    pub agent_id: Option<String>,
    /// Capability identifiers.
    pub capabilities: Vec<String>,
    /// Implementation version (not wire version).
    pub client_version: u32,
    /// Optional free-form session metadata.
    pub session_meta: Option<BTreeMap<String, ciborium::value::Value>>,
}

/// Handshake acknowledgement payload (hub → client).
///
/// Access is always granted today; the status and error fields exist so
/// the wire shape does not change when a real policy gate lands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandshakeAckPayload {
    /// Status of the handshake.
    pub status: AckStatus,
    /// Hub implementation version (not wire version).
    pub server_version: u32,
    /// Capabilities enabled for this session.
    pub capabilities: Vec<String>,
    /// Session identifier.
    pub session_id: String,
    /// Optional error payload when status == Error.
    pub error: Option<ErrorPayload>,
}

/// Status enumeration for handshake ack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AckStatus {
    /// Handshake succeeded.
    #[serde(rename = "OK")]
    Ok,
    /// Handshake failed.
    #[serde(rename = "ERROR")]
    Error,
}

/// Single-identifier payload (subscribes, gets, deletes, simple acks).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RidPayload {
    /// Card resource identifier.
    pub rid: Rid,
}

/// Sparse update call payload (client → hub).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetCardPayload {
    /// Card to update.
    pub rid: Rid,
    /// Fields to change; absent fields keep their value.
    pub patch: CardPatch,
}

/// Creation call payload (client → hub).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewCardPayload {
    /// Full field set for the new card.
    pub fields: CardFields,
}

/// Card snapshot payload (hub → client).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardModelPayload {
    /// Identifier the snapshot belongs to.
    pub rid: Rid,
    /// Full card state.
    pub card: Card,
}

/// Collection snapshot payload (hub → client).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoardModelPayload {
    /// Ordered identifiers of every live card.
    pub rids: Vec<Rid>,
}

/// Field-diff payload, shared by update acks and change events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardDiffPayload {
    /// Card the diff applies to.
    pub rid: Rid,
    /// Field name to new value, changed fields only.
    pub diff: FieldDiff,
}

/// Insertion event payload (hub → board observers).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardAddedPayload {
    /// Identifier of the new card.
    pub rid: Rid,
    /// Collection length before the append.
    pub position: usize,
}

/// Removal event payload (hub → board observers).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardRemovedPayload {
    /// Position the card occupied; later entries shifted one left.
    pub position: usize,
}

/// Wire message kinds carried inside OpEnvelope payloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Message {
    /// Handshake request (op = "handshake").
    Handshake(HandshakePayload),
    /// Handshake acknowledgement (op = "handshake_ack").
    HandshakeAck(HandshakeAckPayload),
    /// Protocol or processing error (op = "error").
    Error(ErrorPayload),
    /// Become an observer of one card (op = "subscribe_card").
    SubscribeCard {
        /// Card to observe.
        rid: Rid,
    },
    /// Become an observer of the collection (op = "subscribe_board").
    SubscribeBoard,
    /// Read one card (op = "get_card").
    GetCard {
        /// Card to read.
        rid: Rid,
    },
    /// Read the ordered collection (op = "get_board").
    GetBoard,
    /// Apply a sparse update to one card (op = "set_card").
    SetCard {
        /// Card to update.
        rid: Rid,
        /// Fields to change.
        patch: CardPatch,
    },
    /// Create a card from a full field set (op = "new_card").
    NewCard {
        /// Full field set for the new card.
        fields: CardFields,
    },
    /// Delete one card (op = "delete_card").
    DeleteCard {
        /// Card to delete.
        rid: Rid,
    },
    /// Card snapshot response (op = "card_model").
    CardModel {
        /// Identifier the snapshot belongs to.
        rid: Rid,
        /// Full card state.
        card: Card,
    },
    /// Collection snapshot response (op = "board_model").
    BoardModel {
        /// Ordered identifiers of every live card.
        rids: Vec<Rid>,
    },
    /// Update acknowledgement carrying the applied diff (op = "set_ack").
    SetAck {
        /// Card that was updated.
        rid: Rid,
        /// Fields that actually changed; may be empty.
        diff: FieldDiff,
    },
    /// Creation acknowledgement (op = "new_ack").
    NewAck {
        /// Identifier of the new card.
        rid: Rid,
    },
    /// Deletion acknowledgement, sent whether or not the card existed
    /// (op = "delete_ack").
    DeleteAck {
        /// Identifier the call named.
        rid: Rid,
    },
    /// Field change event for card observers (op = "card_changed").
    CardChanged {
        /// Card the diff applies to.
        rid: Rid,
        /// Fields that changed; an empty diff is a legal event.
        diff: FieldDiff,
    },
    /// Membership event: card appended (op = "card_added").
    CardAdded {
        /// Identifier of the new card.
        rid: Rid,
        /// Collection length before the append.
        position: usize,
    },
    /// Membership event: card removed (op = "card_removed").
    CardRemoved {
        /// Position the card occupied.
        position: usize,
    },
}

impl Message {
    /// Canonical op string for this message variant.
    pub fn op_name(&self) -> &'static str {
        match self {
            Message::Handshake(_) => "handshake",
            Message::HandshakeAck(_) => "handshake_ack",
            Message::Error(_) => "error",
            Message::SubscribeCard { .. } => "subscribe_card",
            Message::SubscribeBoard => "subscribe_board",
            Message::GetCard { .. } => "get_card",
            Message::GetBoard => "get_board",
            Message::SetCard { .. } => "set_card",
            Message::NewCard { .. } => "new_card",
            Message::DeleteCard { .. } => "delete_card",
            Message::CardModel { .. } => "card_model",
            Message::BoardModel { .. } => "board_model",
            Message::SetAck { .. } => "set_ack",
            Message::NewAck { .. } => "new_ack",
            Message::DeleteAck { .. } => "delete_ack",
            Message::CardChanged { .. } => "card_changed",
            Message::CardAdded { .. } => "card_added",
            Message::CardRemoved { .. } => "card_removed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tape_board::BoardError;

    #[test]
    fn op_names_are_stable() {
        assert_eq!(Message::SubscribeBoard.op_name(), "subscribe_board");
        assert_eq!(
            Message::DeleteCard {
                rid: "tape.card.1".into()
            }
            .op_name(),
            "delete_card"
        );
        assert_eq!(
            Message::CardRemoved { position: 2 }.op_name(),
            "card_removed"
        );
    }

    #[test]
    fn board_errors_map_to_stable_names() {
        let not_found = ErrorPayload::from_board(&BoardError::NotFound {
            rid: "tape.card.9".into(),
        });
        assert_eq!(not_found.name, "E_NOT_FOUND");
        assert_eq!(not_found.code, 1);

        let invalid = ErrorPayload::from_board(&BoardError::EmptyField { field: "price" });
        assert_eq!(invalid.name, "E_INVALID_PARAMS");
        assert!(invalid.message.contains("price"));

        let diverged = ErrorPayload::from_board(&BoardError::IndexDiverged {
            rid: "tape.card.9".into(),
        });
        assert_eq!(diverged.name, "E_STATE");
        assert_eq!(diverged.code, 500);
    }
}
