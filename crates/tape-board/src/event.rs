// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Change events produced by committed board mutations.

use crate::card::Rid;
use crate::fields::FieldDiff;

/// One committed mutation, as observers see it.
///
/// Exactly one event exists per successful mutation. Membership events
/// carry the affected position so observers can maintain their copy of the
/// ordered collection without re-reading it; `Changed` carries only the
/// fields that moved, and an empty diff still signals "attempted, no
/// change".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    /// Fields of an existing card changed.
    Changed {
        /// Card the diff applies to.
        rid: Rid,
        /// Field name to new value, changed fields only.
        diff: FieldDiff,
    },
    /// A card was appended to the collection.
    Added {
        /// Identifier of the new card.
        rid: Rid,
        /// Collection length before the append.
        position: usize,
    },
    /// A card left the collection.
    Removed {
        /// Identifier the card had.
        rid: Rid,
        /// Position it occupied; later entries shifted one left.
        position: usize,
    },
}
