// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Card record and its addressing scheme.

use serde::{Deserialize, Serialize};

use crate::fields::{CardPatch, FieldDiff};

/// Process-unique card identifier. Allocated from 1 upward, never reused.
pub type CardId = u64;

/// Resource identifier addressing one card externally.
pub type Rid = String;

/// Prefix shared by every card resource identifier.
pub const CARD_RID_PREFIX: &str = "tape.card.";

/// Derives the resource identifier for a card id.
pub fn card_rid(id: CardId) -> Rid {
    format!("{CARD_RID_PREFIX}{id}")
}

/// Extracts the card id from a resource identifier, if it is one.
pub fn parse_card_rid(rid: &str) -> Option<CardId> {
    rid.strip_prefix(CARD_RID_PREFIX)?.parse().ok()
}

/// One card's full field set.
///
/// Every text field holds a non-empty trimmed string once the card exists;
/// mutations that would break that are rejected before any state changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    /// Stable integer identifier, immutable once assigned.
    pub id: CardId,
    /// Latest price text.
    pub price: String,
    /// Display style hint.
    pub style: String,
    /// Previous price text.
    #[serde(rename = "prevprice")]
    pub prev_price: String,
    /// Trading signal label.
    pub signal: String,
    /// Buy volume text.
    #[serde(rename = "tradebuy")]
    pub trade_buy: String,
    /// Sell volume text.
    #[serde(rename = "tradesell")]
    pub trade_sell: String,
    /// Instrument symbol.
    pub instrument: String,
}

impl Card {
    /// Applies a validated patch in place, returning the fields that
    /// actually changed. Values equal to the current value are skipped, so
    /// repeating an identical update yields an empty diff.
    pub(crate) fn apply(&mut self, patch: CardPatch) -> FieldDiff {
        let mut diff = FieldDiff::new();
        for ((name, current), proposed) in self.slots_mut().into_iter().zip(patch.into_values()) {
            if let Some(value) = proposed {
                if *current != value {
                    diff.insert(name.to_string(), value.clone());
                    *current = value;
                }
            }
        }
        diff
    }

    /// Mutable view of the text fields, in wire order.
    fn slots_mut(&mut self) -> [(&'static str, &mut String); 7] {
        [
            ("price", &mut self.price),
            ("style", &mut self.style),
            ("prevprice", &mut self.prev_price),
            ("signal", &mut self.signal),
            ("tradebuy", &mut self.trade_buy),
            ("tradesell", &mut self.trade_sell),
            ("instrument", &mut self.instrument),
        ]
    }
}
