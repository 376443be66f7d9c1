// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Record store and collection index behind one mutation surface.

use std::collections::{HashMap, HashSet};

use crate::card::{card_rid, Card, CardId, Rid};
use crate::error::BoardError;
use crate::event::BoardEvent;
use crate::fields::{CardFields, CardPatch, FieldDiff};

/// Authoritative card store plus the ordered collection of live cards.
///
/// The board does no locking itself; callers serialize access so that id
/// allocation, the read-modify-write of an update, and the compound
/// create/delete operations (which touch both the record map and the
/// collection) each run as one critical section.
#[derive(Debug)]
pub struct Board {
    cards: HashMap<Rid, Card>,
    order: Vec<Rid>,
    next_id: CardId,
}

impl Board {
    /// Creates an empty board. The first card created gets id 1.
    pub fn new() -> Self {
        Self {
            cards: HashMap::new(),
            order: Vec::new(),
            next_id: 1,
        }
    }

    /// Returns the card at `rid`.
    pub fn get(&self, rid: &str) -> Result<&Card, BoardError> {
        self.cards.get(rid).ok_or_else(|| BoardError::NotFound {
            rid: rid.to_string(),
        })
    }

    /// Ordered identifiers of every live card: insertion order, shifted
    /// left by removals, never implicitly resorted.
    pub fn list(&self) -> &[Rid] {
        &self.order
    }

    /// Number of live cards.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when no cards are live.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Validates `fields`, allocates the next id, inserts the card, and
    /// appends its identifier to the collection.
    ///
    /// Returns the new identifier and the insertion event; the event's
    /// position is the collection length before the append. Validation
    /// failures happen before the id is allocated, so rejected creates
    /// leave no gap.
    pub fn create(&mut self, fields: CardFields) -> Result<(Rid, BoardEvent), BoardError> {
        let fields = fields.validated()?;
        let id = self.next_id;
        self.next_id += 1;
        let rid = card_rid(id);
        let position = self.order.len();
        self.cards.insert(rid.clone(), fields.into_card(id));
        self.order.push(rid.clone());
        Ok((
            rid.clone(),
            BoardEvent::Added { rid, position },
        ))
    }

    /// Applies a sparse update to the card at `rid`.
    ///
    /// Fields absent from the patch keep their prior value; fields whose
    /// validated value equals the current value stay out of the diff. An
    /// empty diff is still a success.
    pub fn update(&mut self, rid: &str, patch: CardPatch) -> Result<FieldDiff, BoardError> {
        let card = self.cards.get_mut(rid).ok_or_else(|| BoardError::NotFound {
            rid: rid.to_string(),
        })?;
        let patch = patch.validated()?;
        Ok(card.apply(patch))
    }

    /// Removes the card at `rid`.
    ///
    /// Deleting an unknown identifier is a success with no event, so
    /// callers may retry freely. When the card existed, its collection
    /// position is recomputed by scanning for the identifier; callers
    /// never supply a position of their own.
    pub fn delete(&mut self, rid: &str) -> Result<Option<BoardEvent>, BoardError> {
        if self.cards.remove(rid).is_none() {
            return Ok(None);
        }
        let position = self
            .order
            .iter()
            .position(|entry| entry.as_str() == rid)
            .ok_or_else(|| BoardError::IndexDiverged {
                rid: rid.to_string(),
            })?;
        self.order.remove(position);
        Ok(Some(BoardEvent::Removed {
            rid: rid.to_string(),
            position,
        }))
    }

    /// Verifies that every collection entry resolves to a stored card,
    /// with no duplicates, and that every stored card is listed.
    pub fn check_consistency(&self) -> Result<(), BoardError> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(self.order.len());
        for rid in &self.order {
            if !self.cards.contains_key(rid) || !seen.insert(rid.as_str()) {
                return Err(BoardError::IndexDiverged { rid: rid.clone() });
            }
        }
        if let Some(rid) = self.cards.keys().find(|rid| !seen.contains(rid.as_str())) {
            return Err(BoardError::IndexDiverged { rid: rid.clone() });
        }
        Ok(())
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
