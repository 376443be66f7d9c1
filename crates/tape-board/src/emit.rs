// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Event fan-out to registered observers.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::card::Rid;
use crate::event::BoardEvent;

/// Handle naming one registered observer.
pub type ObserverId = u64;

/// Delivery port implemented by the transport side of an observer.
pub trait EventSink {
    /// Delivers one sequenced event. Returning `false` reports the
    /// observer gone; it is deregistered and receives nothing further.
    fn deliver(&self, seq: u64, event: &BoardEvent) -> bool;
}

/// Routes committed events to current observers, synchronously and in
/// order.
///
/// Observers register a sink, then watch individual cards (for field
/// diffs) or the board (for membership events). Every delivery carries a
/// value from one monotonic sequence counter, so any two events an
/// observer receives arrive in generation order. Callers may stamp their
/// replies from the same counter (`alloc_seq`) to keep a single clock.
pub struct Emitter<S> {
    next_observer: ObserverId,
    next_seq: u64,
    sinks: BTreeMap<ObserverId, S>,
    card_watch: HashMap<Rid, BTreeSet<ObserverId>>,
    board_watch: BTreeSet<ObserverId>,
}

impl<S> Emitter<S> {
    /// Creates an emitter with no observers; sequence numbers start at 0.
    pub fn new() -> Self {
        Self {
            next_observer: 1,
            next_seq: 0,
            sinks: BTreeMap::new(),
            card_watch: HashMap::new(),
            board_watch: BTreeSet::new(),
        }
    }

    /// Registers a sink and returns its observer handle.
    pub fn register(&mut self, sink: S) -> ObserverId {
        let id = self.next_observer;
        self.next_observer += 1;
        self.sinks.insert(id, sink);
        id
    }

    /// Removes an observer from every watch set.
    pub fn deregister(&mut self, id: ObserverId) {
        self.sinks.remove(&id);
        self.board_watch.remove(&id);
        self.card_watch.retain(|_, watchers| {
            watchers.remove(&id);
            !watchers.is_empty()
        });
    }

    /// Starts delivering `Changed` events for `rid` to this observer.
    /// Returns false when the observer is unknown.
    pub fn watch_card(&mut self, id: ObserverId, rid: Rid) -> bool {
        if !self.sinks.contains_key(&id) {
            return false;
        }
        self.card_watch.entry(rid).or_default().insert(id);
        true
    }

    /// Starts delivering membership events to this observer.
    /// Returns false when the observer is unknown.
    pub fn watch_board(&mut self, id: ObserverId) -> bool {
        if !self.sinks.contains_key(&id) {
            return false;
        }
        self.board_watch.insert(id);
        true
    }

    /// Count of registered observers.
    pub fn observers(&self) -> usize {
        self.sinks.len()
    }

    /// Hands out the next sequence number without emitting anything.
    pub fn alloc_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

impl<S: EventSink> Emitter<S> {
    /// Delivers `event` to every observer watching the affected resource,
    /// in registration order, under one fresh sequence number.
    ///
    /// Field diffs go to watchers of that card; insertions and removals go
    /// to board watchers. Observers whose sink reports them gone are
    /// deregistered. Watchers of a removed card are forgotten once its
    /// removal event is out; card ids are never reused, so nothing can be
    /// delivered late.
    pub fn emit(&mut self, event: &BoardEvent) {
        let seq = self.alloc_seq();
        let targets: Vec<ObserverId> = match event {
            BoardEvent::Changed { rid, .. } => self
                .card_watch
                .get(rid)
                .map(|watchers| watchers.iter().copied().collect())
                .unwrap_or_default(),
            BoardEvent::Added { .. } | BoardEvent::Removed { .. } => {
                self.board_watch.iter().copied().collect()
            }
        };
        let mut gone = Vec::new();
        for id in targets {
            if let Some(sink) = self.sinks.get(&id) {
                if !sink.deliver(seq, event) {
                    gone.push(id);
                }
            }
        }
        for id in gone {
            self.deregister(id);
        }
        if let BoardEvent::Removed { rid, .. } = event {
            self.card_watch.remove(rid);
        }
    }
}

impl<S> Default for Emitter<S> {
    fn default() -> Self {
        Self::new()
    }
}
