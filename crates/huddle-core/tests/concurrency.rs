//! Concurrent writers against both stores: no lost updates, commit-ordered
//! broadcasts.

mod support;

use std::sync::Arc;
use std::thread;

use huddle_core::{
    CreateRequest, Engine, EngineConfig, NullNotifier, Operation, Setup, SqliteStore, StoreConfig,
    WidgetKind, WidgetStore,
};
use support::{conv, create, member, memory_engine, voters_unique};

const WRITERS: usize = 16;

#[test]
fn parallel_votes_are_all_counted() {
    let engine = Arc::new(memory_engine());
    let poll = create(&engine, WidgetKind::Poll, "u1", Setup::poll("q", &["A", "B"]));
    let sub = engine.notifier().observe(&conv());

    let handles: Vec<_> = (0..WRITERS)
        .map(|n| {
            let engine = Arc::clone(&engine);
            let id = poll.id.clone();
            thread::spawn(move || {
                let option = if n % 2 == 0 { "A" } else { "B" };
                engine
                    .apply(&id, &Operation::vote_option(option), &member(&format!("v{n}")))
                    .expect("vote accepted")
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("writer thread");
    }

    let stored = engine.get(&poll.id).expect("get");
    assert_eq!(stored.version, WRITERS as u64);
    assert_eq!(stored.payload.as_choice().expect("choice").total_votes(), WRITERS);
    assert!(voters_unique(&stored));

    let versions: Vec<u64> = sub.drain().iter().map(|b| b.document.version).collect();
    let expected: Vec<u64> = (1..=WRITERS as u64).collect();
    assert_eq!(versions, expected);
}

#[test]
fn racing_duplicate_votes_accept_exactly_one() {
    let engine = Arc::new(memory_engine());
    let poll = create(&engine, WidgetKind::Poll, "u1", Setup::poll("q", &["A", "B"]));

    let handles: Vec<_> = (0..WRITERS)
        .map(|n| {
            let engine = Arc::clone(&engine);
            let id = poll.id.clone();
            thread::spawn(move || {
                let option = if n % 2 == 0 { "A" } else { "B" };
                engine
                    .apply(&id, &Operation::vote_option(option), &member("same"))
                    .is_ok()
            })
        })
        .collect();
    let accepted = handles
        .into_iter()
        .map(|h| h.join().expect("writer thread"))
        .filter(|ok| *ok)
        .count();

    assert_eq!(accepted, 1);
    assert_eq!(engine.get(&poll.id).expect("get").version, 1);
}

#[test]
fn separate_connections_serialize_on_one_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = Arc::new(dir.path().join("widgets.sqlite3"));
    let config = EngineConfig::default();

    let board = {
        let store = SqliteStore::open(&path, &config.store).expect("open");
        let engine = Engine::new(store, NullNotifier, config.clone());
        engine
            .create(&CreateRequest {
                channel: conv(),
                kind: WidgetKind::Brainstorm,
                actor: member("u1"),
                setup: Setup::board("Ideas"),
            })
            .expect("create")
    };

    let handles: Vec<_> = (0..8)
        .map(|n| {
            let path = Arc::clone(&path);
            let id = board.id.clone();
            let config = config.clone();
            thread::spawn(move || {
                let store = SqliteStore::open(&path, &config.store).expect("open per thread");
                let engine = Engine::new(store, NullNotifier, config);
                for k in 0..5 {
                    engine
                        .apply(&id, &Operation::add_text(format!("idea {n}.{k}")), &member(&format!("w{n}")))
                        .expect("add accepted");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("writer thread");
    }

    let store = SqliteStore::open(&path, &StoreConfig::default()).expect("reopen");
    let stored = store.load(&board.id).expect("load").expect("present");
    assert_eq!(stored.version, 40);
    assert_eq!(stored.payload.as_board().expect("board").items.len(), 40);
}
