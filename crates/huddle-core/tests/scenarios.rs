//! End-to-end widget flows through the engine.

mod support;

use huddle_core::aggregate::Summary;
use huddle_core::view::redact_for;
use huddle_core::{
    Actor, CreateRequest, Engine, EngineConfig, Operation, Rejection, Setup, SqliteStore,
    StoreConfig, WidgetKind, WidgetStore,
};
use support::{conv, create, member, memory_engine};

fn rejection(err: huddle_core::EngineError) -> Rejection {
    err.rejection().cloned().expect("business rejection")
}

fn tally_counts(summary: &Summary) -> Vec<usize> {
    match summary {
        Summary::Tally(t) => t.options.iter().map(|o| o.count).collect(),
        other => panic!("expected a tally, got {other:?}"),
    }
}

#[test]
fn poll_lifecycle() {
    let engine = memory_engine();
    let sub = engine.notifier().observe(&conv());
    let poll = create(&engine, WidgetKind::Poll, "u1", Setup::poll("Lunch?", &["A", "B", "C"]));

    let v1 = engine
        .apply(&poll.id, &Operation::vote_option("B"), &member("u2"))
        .expect("u2 votes");
    assert_eq!(v1.version, 1);
    assert_eq!(tally_counts(&v1.summary), [0, 1, 0]);

    let v2 = engine
        .apply(&poll.id, &Operation::vote_option("B"), &member("u3"))
        .expect("u3 votes");
    assert_eq!(tally_counts(&v2.summary), [0, 2, 0]);

    let err = engine
        .apply(&poll.id, &Operation::vote_option("A"), &member("u2"))
        .unwrap_err();
    assert_eq!(rejection(err), Rejection::DuplicateVote);
    assert_eq!(engine.get(&poll.id).expect("get").version, 2);

    let forbidden = engine
        .apply(&poll.id, &Operation::Close, &member("u2"))
        .unwrap_err();
    assert!(matches!(rejection(forbidden), Rejection::Forbidden { .. }));

    let closed = engine
        .apply(&poll.id, &Operation::Close, &member("u1"))
        .expect("creator closes");
    assert!(closed.closed);
    assert_eq!(closed.version, 3);

    let late = engine
        .apply(&poll.id, &Operation::vote_option("C"), &member("u4"))
        .unwrap_err();
    assert_eq!(rejection(late), Rejection::Closed);
    assert_eq!(engine.get(&poll.id).expect("get"), closed);

    let versions: Vec<u64> = sub.drain().iter().map(|b| b.document.version).collect();
    assert_eq!(versions, [0, 1, 2, 3]);
}

#[test]
fn brainstorm_vote_round_trip() {
    let engine = memory_engine();
    let board = create(&engine, WidgetKind::Brainstorm, "u1", Setup::board("Offsite ideas"));

    let v1 = engine
        .apply(&board.id, &Operation::add_text("Hike"), &member("u2"))
        .expect("add idea");
    let item = v1.payload.as_board().expect("board").items[0].entry.id.clone();

    let v2 = engine
        .apply(&board.id, &Operation::toggle_vote(item.clone()), &member("u3"))
        .expect("vote");
    let votes = &v2.payload.as_board().expect("board").items[0].votes;
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0].as_str(), "u3");

    let v3 = engine
        .apply(&board.id, &Operation::toggle_vote(item), &member("u3"))
        .expect("unvote");
    assert_eq!(v3.version, 3);
    assert_eq!(v3.payload, v1.payload);
}

#[test]
fn blind_vote_reveal() {
    let engine = memory_engine();
    let blind = create(
        &engine,
        WidgetKind::BlindVote,
        "u1",
        Setup::poll("Estimate", &["3", "5", "8"]),
    );

    engine
        .apply(&blind.id, &Operation::vote_option("5"), &member("u2"))
        .expect("u2");
    let before = engine
        .apply(&blind.id, &Operation::vote_option("8"), &member("u3"))
        .expect("u3");
    assert_eq!(before.summary, Summary::Hidden { total_votes: 2 });
    assert_eq!(before.revealed, Some(false));

    let mine = redact_for(&before, &member("u2").id);
    let visible: usize = mine
        .payload
        .as_choice()
        .expect("choice")
        .options
        .iter()
        .map(|o| o.votes.len())
        .sum();
    assert_eq!(visible, 1);

    let forbidden = engine
        .apply(&blind.id, &Operation::Reveal, &member("u2"))
        .unwrap_err();
    assert!(matches!(rejection(forbidden), Rejection::Forbidden { .. }));

    let revealed = engine
        .apply(&blind.id, &Operation::Reveal, &member("u1"))
        .expect("reveal");
    assert_eq!(revealed.revealed, Some(true));
    assert_eq!(tally_counts(&revealed.summary), [0, 1, 1]);

    let again = engine
        .apply(&blind.id, &Operation::Reveal, &member("u1"))
        .unwrap_err();
    assert!(matches!(rejection(again), Rejection::InvalidArgument(_)));

    let live = engine
        .apply(&blind.id, &Operation::vote_option("5"), &member("u4"))
        .expect("vote after reveal");
    assert_eq!(tally_counts(&live.summary), [0, 2, 1]);
    match &live.summary {
        Summary::Tally(t) => assert_eq!(t.winner.as_deref(), Some("5")),
        other => panic!("unexpected summary {other:?}"),
    }
}

#[test]
fn retrospective_with_facilitator_cleanup() {
    let engine = memory_engine();
    let retro = create(
        &engine,
        WidgetKind::RetrospectiveBoard,
        "u1",
        Setup::board("Sprint 42"),
    );
    let v1 = engine
        .apply(&retro.id, &Operation::add_to("went-well", "Fast reviews"), &member("u2"))
        .expect("add");
    let item = v1.payload.as_board().expect("board").items[0].entry.id.clone();

    let delete = Operation::DeleteItem { item_id: item };
    let err = engine.apply(&retro.id, &delete, &member("u3")).unwrap_err();
    assert!(matches!(rejection(err), Rejection::Forbidden { .. }));

    let cleaned = engine
        .apply(&retro.id, &delete, &Actor::facilitator("f1", "Fran"))
        .expect("facilitator deletes");
    assert!(cleaned.payload.as_board().expect("board").items.is_empty());
}

#[test]
fn brainwriting_rounds() {
    let engine = memory_engine();
    let session = create(
        &engine,
        WidgetKind::Brainwriting,
        "u1",
        Setup::rounds("Cut onboarding time", 1, 2),
    );
    for who in ["u2", "u3"] {
        engine.apply(&session.id, &Operation::Join, &member(who)).expect("join");
    }
    engine
        .apply(&session.id, &Operation::AdvanceRound, &member("u1"))
        .expect("round 1");
    engine
        .apply(&session.id, &Operation::add_text("Video walkthrough"), &member("u2"))
        .expect("u2 submits");
    let done = engine
        .apply(&session.id, &Operation::add_text("Sample project"), &member("u3"))
        .expect("u3 submits");
    match &done.summary {
        Summary::Rounds(r) => {
            assert_eq!(r.round, 1);
            assert!(r.complete);
        }
        other => panic!("unexpected summary {other:?}"),
    }
    let r2 = engine
        .apply(&session.id, &Operation::AdvanceRound, &member("u1"))
        .expect("round 2");
    assert_eq!(r2.payload.as_rounds().expect("rounds").round, 2);
    let err = engine
        .apply(&session.id, &Operation::AdvanceRound, &member("u1"))
        .unwrap_err();
    assert!(matches!(rejection(err), Rejection::InvalidArgument(_)));
}

#[test]
fn sqlite_engine_persists_across_reopen() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("widgets.sqlite3");
    let config = EngineConfig::default();

    let widget_id = {
        let store = SqliteStore::open(&path, &config.store).expect("open");
        let engine = Engine::new(store, huddle_core::NullNotifier, config.clone());
        let checklist = engine
            .create(&CreateRequest {
                channel: conv(),
                kind: WidgetKind::Checklist,
                actor: member("u1"),
                setup: Setup::tasks("Launch"),
            })
            .expect("create");
        let v1 = engine
            .apply(&checklist.id, &Operation::add_text("Announce"), &member("u2"))
            .expect("add");
        let item = v1.payload.as_tasks().expect("tasks").items[0].entry.id.clone();
        engine
            .apply(&checklist.id, &Operation::ToggleComplete { item_id: item }, &member("u3"))
            .expect("complete");
        engine
            .apply(&checklist.id, &Operation::Close, &member("u3"))
            .expect("any participant closes a checklist");
        checklist.id
    };

    let store = SqliteStore::open(&path, &StoreConfig::default()).expect("reopen");
    let stored = store.load(&widget_id).expect("load").expect("present");
    assert!(stored.closed);
    assert_eq!(stored.version, 3);
    assert_eq!(stored.summary, Summary::Tasks { total: 1, completed: 1 });
}
