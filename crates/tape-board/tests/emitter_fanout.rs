// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Event emitter routing, ordering, and pruning tests.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tape_board::{BoardEvent, Emitter, EventSink, FieldDiff};

#[derive(Clone)]
struct RecordingSink {
    log: Rc<RefCell<Vec<(u64, BoardEvent)>>>,
    alive: Rc<Cell<bool>>,
}

impl RecordingSink {
    fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(Vec::new())),
            alive: Rc::new(Cell::new(true)),
        }
    }
}

impl EventSink for RecordingSink {
    fn deliver(&self, seq: u64, event: &BoardEvent) -> bool {
        if !self.alive.get() {
            return false;
        }
        self.log.borrow_mut().push((seq, event.clone()));
        true
    }
}

fn changed(rid: &str, field: &str, value: &str) -> BoardEvent {
    let mut diff = FieldDiff::new();
    diff.insert(field.to_string(), value.to_string());
    BoardEvent::Changed {
        rid: rid.to_string(),
        diff,
    }
}

#[test]
fn field_diffs_reach_only_watchers_of_that_card() {
    let mut emitter = Emitter::new();
    let watching = RecordingSink::new();
    let other = RecordingSink::new();
    let a = emitter.register(watching.clone());
    let b = emitter.register(other.clone());
    assert!(emitter.watch_card(a, "tape.card.1".to_string()));
    assert!(emitter.watch_card(b, "tape.card.2".to_string()));

    emitter.emit(&changed("tape.card.1", "price", "20"));

    assert_eq!(watching.log.borrow().len(), 1);
    assert!(other.log.borrow().is_empty());
}

#[test]
fn membership_events_reach_board_watchers() {
    let mut emitter = Emitter::new();
    let board_watcher = RecordingSink::new();
    let card_watcher = RecordingSink::new();
    let a = emitter.register(board_watcher.clone());
    let b = emitter.register(card_watcher.clone());
    assert!(emitter.watch_board(a));
    assert!(emitter.watch_card(b, "tape.card.1".to_string()));

    emitter.emit(&BoardEvent::Added {
        rid: "tape.card.6".to_string(),
        position: 5,
    });
    emitter.emit(&BoardEvent::Removed {
        rid: "tape.card.2".to_string(),
        position: 1,
    });

    assert_eq!(board_watcher.log.borrow().len(), 2);
    assert!(card_watcher.log.borrow().is_empty());
}

#[test]
fn observers_see_the_same_events_in_generation_order() {
    let mut emitter = Emitter::new();
    let first = RecordingSink::new();
    let second = RecordingSink::new();
    let a = emitter.register(first.clone());
    let b = emitter.register(second.clone());
    assert!(emitter.watch_card(a, "tape.card.1".to_string()));
    assert!(emitter.watch_card(b, "tape.card.1".to_string()));

    emitter.emit(&changed("tape.card.1", "price", "20"));
    emitter.emit(&changed("tape.card.1", "price", "21"));
    emitter.emit(&changed("tape.card.1", "signal", "Sell"));

    let left = first.log.borrow();
    let right = second.log.borrow();
    assert_eq!(*left, *right);
    assert!(
        left.windows(2).all(|pair| pair[0].0 < pair[1].0),
        "seq strictly increases"
    );
}

#[test]
fn reply_clock_and_event_clock_share_one_sequence() {
    let mut emitter = Emitter::new();
    let sink = RecordingSink::new();
    let a = emitter.register(sink.clone());
    assert!(emitter.watch_card(a, "tape.card.1".to_string()));

    let reply_ts = emitter.alloc_seq();
    emitter.emit(&changed("tape.card.1", "price", "20"));

    let log = sink.log.borrow();
    assert_eq!(log.len(), 1);
    assert!(log[0].0 > reply_ts);
}

#[test]
fn dead_sinks_are_pruned_without_disturbing_the_rest() {
    let mut emitter = Emitter::new();
    let dead = RecordingSink::new();
    let live = RecordingSink::new();
    let a = emitter.register(dead.clone());
    let b = emitter.register(live.clone());
    assert!(emitter.watch_card(a, "tape.card.1".to_string()));
    assert!(emitter.watch_card(b, "tape.card.1".to_string()));
    dead.alive.set(false);

    emitter.emit(&changed("tape.card.1", "price", "20"));

    assert_eq!(emitter.observers(), 1);
    assert_eq!(live.log.borrow().len(), 1);

    emitter.emit(&changed("tape.card.1", "price", "21"));
    assert!(dead.log.borrow().is_empty());
    assert_eq!(live.log.borrow().len(), 2);
}

#[test]
fn removal_forgets_watchers_of_that_card() {
    let mut emitter = Emitter::new();
    let sink = RecordingSink::new();
    let a = emitter.register(sink.clone());
    assert!(emitter.watch_board(a));
    assert!(emitter.watch_card(a, "tape.card.1".to_string()));

    emitter.emit(&BoardEvent::Removed {
        rid: "tape.card.1".to_string(),
        position: 0,
    });
    assert_eq!(sink.log.borrow().len(), 1);

    emitter.emit(&changed("tape.card.1", "price", "20"));
    assert_eq!(
        sink.log.borrow().len(),
        1,
        "removed card no longer routes diffs"
    );
}

#[test]
fn deregistered_observers_receive_nothing() {
    let mut emitter = Emitter::new();
    let sink = RecordingSink::new();
    let a = emitter.register(sink.clone());
    assert!(emitter.watch_board(a));
    emitter.deregister(a);
    assert!(!emitter.watch_board(a), "unknown observers cannot watch");

    emitter.emit(&BoardEvent::Added {
        rid: "tape.card.1".to_string(),
        position: 0,
    });
    assert!(sink.log.borrow().is_empty());
}
