// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Authoritative card board shared by many writers.
//! Pure data (records, an ordered collection, validated patches) plus an
//! event emitter that keeps observers consistent with committed state.

pub mod board;
pub mod card;
pub mod emit;
pub mod error;
pub mod event;
pub mod fields;

pub use board::Board;
pub use card::{card_rid, parse_card_rid, Card, CardId, Rid, CARD_RID_PREFIX};
pub use emit::{Emitter, EventSink, ObserverId};
pub use error::BoardError;
pub use event::BoardEvent;
pub use fields::{CardFields, CardPatch, FieldDiff};
