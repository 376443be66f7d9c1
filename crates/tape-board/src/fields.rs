// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Creation payloads, sparse patches, and field validation.
//!
//! Validation is pure: trim first, then reject anything that ended up
//! empty, naming the offending field. Nothing here touches stored state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::card::{Card, CardId};
use crate::error::BoardError;

/// Mapping of field name to new value for fields an update actually changed.
pub type FieldDiff = BTreeMap<String, String>;

/// Full field set required to create a card. Every field is mandatory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardFields {
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

impl CardFields {
    /// Trims every field and rejects the first one that ends up empty.
    pub fn validated(mut self) -> Result<Self, BoardError> {
        for (name, value) in self.slots_mut() {
            let trimmed = value.trim().to_string();
            if trimmed.is_empty() {
                return Err(BoardError::EmptyField { field: name });
            }
            *value = trimmed;
        }
        Ok(self)
    }

    /// Builds the card these fields describe.
    pub(crate) fn into_card(self, id: CardId) -> Card {
        Card {
            id,
            price: self.price,
            style: self.style,
            prev_price: self.prev_price,
            signal: self.signal,
            trade_buy: self.trade_buy,
            trade_sell: self.trade_sell,
            instrument: self.instrument,
        }
    }

    /// Mutable view of the fields, in wire order.
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

/// Sparse field set for an update.
///
/// An absent field leaves the stored value untouched; a present field is
/// validated and applied. The distinction is carried by the type, not by
/// sentinel values.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardPatch {
    /// New price text, when supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    /// New style hint, when supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// New previous-price text, when supplied.
    #[serde(default, rename = "prevprice", skip_serializing_if = "Option::is_none")]
    pub prev_price: Option<String>,
    /// New signal label, when supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
    /// New buy volume text, when supplied.
    #[serde(default, rename = "tradebuy", skip_serializing_if = "Option::is_none")]
    pub trade_buy: Option<String>,
    /// New sell volume text, when supplied.
    #[serde(default, rename = "tradesell", skip_serializing_if = "Option::is_none")]
    pub trade_sell: Option<String>,
    /// New instrument symbol, when supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<String>,
}

impl CardPatch {
    /// True when no field is supplied.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Trims every supplied field and rejects the first one that ends up
    /// empty. Absent fields pass untouched.
    pub fn validated(mut self) -> Result<Self, BoardError> {
        for (name, slot) in self.slots_mut() {
            if let Some(value) = slot {
                let trimmed = value.trim().to_string();
                if trimmed.is_empty() {
                    return Err(BoardError::EmptyField { field: name });
                }
                *value = trimmed;
            }
        }
        Ok(self)
    }

    /// Consumes the patch into its field values, in wire order.
    pub(crate) fn into_values(self) -> [Option<String>; 7] {
        [
            self.price,
            self.style,
            self.prev_price,
            self.signal,
            self.trade_buy,
            self.trade_sell,
            self.instrument,
        ]
    }

    /// Mutable view of the supplied fields, in wire order.
    fn slots_mut(&mut self) -> [(&'static str, &mut Option<String>); 7] {
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
