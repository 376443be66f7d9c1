// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Board mutation, ordering, and consistency tests.

use tape_board::{card_rid, parse_card_rid, Board, BoardError, BoardEvent, CardFields, CardPatch};

fn fields(instrument: &str) -> CardFields {
    CardFields {
        price: "10".into(),
        style: "h1".into(),
        prev_price: "9".into(),
        signal: "Buy".into(),
        trade_buy: "1".into(),
        trade_sell: "0".into(),
        instrument: instrument.into(),
    }
}

fn seeded(count: usize) -> Board {
    let mut board = Board::new();
    for i in 0..count {
        board
            .create(fields(&format!("SEED/{i}")))
            .expect("seed card");
    }
    board
}

#[test]
fn create_assigns_monotonic_ids_and_appends() {
    let mut board = seeded(5);
    let (rid, event) = board.create(fields("EUR/USD")).expect("create");
    assert_eq!(rid, card_rid(6));
    assert_eq!(
        event,
        BoardEvent::Added {
            rid: rid.clone(),
            position: 5
        }
    );
    assert_eq!(board.list().last(), Some(&rid));
    assert_eq!(board.len(), 6);

    let ids: Vec<_> = board
        .list()
        .iter()
        .map(|rid| parse_card_rid(rid).expect("card rid"))
        .collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted, "insertion order tracks allocation order");
}

#[test]
fn ids_are_never_reused_after_delete() {
    let mut board = seeded(3);
    board.delete(&card_rid(3)).expect("delete");
    let (rid, _) = board.create(fields("OIL BR")).expect("create");
    assert_eq!(rid, card_rid(4));
}

#[test]
fn rejected_create_allocates_no_id() {
    let mut board = Board::new();
    let mut bad = fields("EUR/USD");
    bad.style = "   ".into();
    assert_eq!(
        board.create(bad),
        Err(BoardError::EmptyField { field: "style" })
    );
    assert!(board.is_empty());

    let (rid, _) = board.create(fields("EUR/USD")).expect("create");
    assert_eq!(rid, card_rid(1));
}

#[test]
fn creation_trims_every_field() {
    let mut board = Board::new();
    let mut padded = fields("  EUR/USD  ");
    padded.price = " 1500.15 ▼ ".into();
    let (rid, _) = board.create(padded).expect("create");
    let card = board.get(&rid).expect("card");
    assert_eq!(card.price, "1500.15 ▼");
    assert_eq!(card.instrument, "EUR/USD");
}

#[test]
fn get_unknown_is_not_found() {
    let board = seeded(1);
    assert_eq!(
        board.get("tape.card.9").err(),
        Some(BoardError::NotFound {
            rid: "tape.card.9".into()
        })
    );
}

#[test]
fn update_trims_and_suppresses_no_ops() {
    let mut board = seeded(1);
    let rid = card_rid(1);

    let patch = CardPatch {
        price: Some(" 20 ".into()),
        ..CardPatch::default()
    };
    let diff = board.update(&rid, patch).expect("update");
    assert_eq!(diff.get("price").map(String::as_str), Some("20"));
    assert_eq!(diff.len(), 1);
    assert_eq!(board.get(&rid).expect("card").price, "20");

    let patch = CardPatch {
        price: Some("20".into()),
        ..CardPatch::default()
    };
    let diff = board.update(&rid, patch).expect("update");
    assert!(diff.is_empty(), "identical update changes nothing");
}

#[test]
fn update_touches_only_supplied_fields() {
    let mut board = seeded(1);
    let rid = card_rid(1);
    let before = board.get(&rid).expect("card").clone();

    let patch = CardPatch {
        signal: Some("Sell".into()),
        ..CardPatch::default()
    };
    let diff = board.update(&rid, patch).expect("update");
    assert_eq!(diff.len(), 1);
    let after = board.get(&rid).expect("card");
    assert_eq!(after.signal, "Sell");
    assert_eq!(after.price, before.price);
    assert_eq!(after.instrument, before.instrument);
}

#[test]
fn update_rejects_empty_fields_without_side_effects() {
    let mut board = seeded(1);
    let rid = card_rid(1);
    let before = board.get(&rid).expect("card").clone();

    let patch = CardPatch {
        price: Some("".into()),
        trade_buy: Some("7".into()),
        ..CardPatch::default()
    };
    assert_eq!(
        board.update(&rid, patch),
        Err(BoardError::EmptyField { field: "price" })
    );
    assert_eq!(board.get(&rid).expect("card"), &before);
}

#[test]
fn update_unknown_short_circuits_before_validation() {
    let mut board = Board::new();
    let patch = CardPatch {
        price: Some("".into()),
        ..CardPatch::default()
    };
    assert_eq!(
        board.update("tape.card.1", patch),
        Err(BoardError::NotFound {
            rid: "tape.card.1".into()
        })
    );
}

#[test]
fn delete_recomputes_position_and_is_idempotent() {
    let mut board = seeded(5);
    let rid = card_rid(3);

    let event = board.delete(&rid).expect("delete");
    assert_eq!(
        event,
        Some(BoardEvent::Removed {
            rid: rid.clone(),
            position: 2
        })
    );
    let want = [card_rid(1), card_rid(2), card_rid(4), card_rid(5)];
    assert_eq!(board.list(), want);

    assert_eq!(board.delete(&rid).expect("repeat delete"), None);
    assert_eq!(board.delete("tape.card.99").expect("unknown delete"), None);
    board.check_consistency().expect("consistent");
}

#[test]
fn every_listed_rid_resolves() {
    let mut board = seeded(4);
    board.delete(&card_rid(2)).expect("delete");
    board.create(fields("GBP/USD")).expect("create");
    for rid in board.list() {
        assert!(board.get(rid).is_ok());
    }
    board.check_consistency().expect("consistent");
}
