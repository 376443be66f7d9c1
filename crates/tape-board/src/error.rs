// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Typed failures for board operations.

use thiserror::Error;

use crate::card::Rid;

/// Failure taxonomy for board operations.
///
/// Lookup and validation failures never partially apply a mutation and
/// never produce an event. `IndexDiverged` means the record map and the
/// collection index disagree; state is suspect and the operation fails
/// rather than guessing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BoardError {
    /// The identifier does not resolve to a live card.
    #[error("no card at {rid}")]
    NotFound {
        /// Identifier that failed to resolve.
        rid: Rid,
    },
    /// A supplied field was empty or whitespace-only after trimming.
    #[error("{field} must not be empty")]
    EmptyField {
        /// Wire name of the offending field.
        field: &'static str,
    },
    /// The record map and the collection index disagree about this card.
    #[error("collection index diverged for {rid}")]
    IndexDiverged {
        /// Identifier present in one structure but not the other.
        rid: Rid,
    },
}
