//! Client sessions reconciling against a live engine.

mod support;

use huddle_core::{
    Actor, LimitsConfig, Operation, OperationRequest, Receipt, Reconciler, Setup, Subscription,
    WidgetKind,
};
use support::{MemoryEngine, conv, create, member, memory_engine};

struct Session {
    actor: Actor,
    reconciler: Reconciler,
    inbox: Subscription,
}

impl Session {
    fn join(engine: &MemoryEngine, actor: Actor, widget: &huddle_core::WidgetId) -> Self {
        let inbox = engine.notifier().subscribe(&conv(), &actor);
        let document = engine.fetch(widget, &actor).expect("initial fetch");
        Self {
            reconciler: Reconciler::new(actor.clone(), document, LimitsConfig::default()),
            actor,
            inbox,
        }
    }

    fn act(&mut self, engine: &MemoryEngine, operation: Operation) {
        let widget_id = self.reconciler.authoritative().id.clone();
        let (ticket, _) = self.reconciler.propose(operation.clone());
        let response = engine.handle(&OperationRequest {
            widget_id,
            operation,
            actor: self.actor.clone(),
        });
        self.reconciler.settle(ticket, &response);
    }

    fn pump(&mut self) {
        for broadcast in self.inbox.drain() {
            self.reconciler.receive(broadcast.document);
        }
    }
}

#[test]
fn sessions_converge_on_stored_document() {
    let engine = memory_engine();
    let board = create(&engine, WidgetKind::Brainstorm, "u1", Setup::board("Ideas"));
    let mut alice = Session::join(&engine, member("u1"), &board.id);
    let mut bob = Session::join(&engine, member("u2"), &board.id);

    alice.act(&engine, Operation::add_text("Async standups"));
    bob.pump();
    let item = bob.reconciler.view().payload.as_board().expect("board").items[0]
        .entry
        .id
        .clone();
    bob.act(&engine, Operation::toggle_vote(item.clone()));
    alice.act(&engine, Operation::toggle_vote(item));
    alice.pump();
    bob.pump();

    let stored = engine.get(&board.id).expect("get");
    assert_eq!(stored.version, 3);
    for session in [&alice, &bob] {
        assert_eq!(session.reconciler.view(), &stored);
        assert_eq!(session.reconciler.pending(), 0);
    }
}

#[test]
fn optimistic_item_ids_match_server_ids() {
    let engine = memory_engine();
    let board = create(&engine, WidgetKind::Brainstorm, "u1", Setup::board("Ideas"));
    let mut bob = Session::join(&engine, member("u2"), &board.id);

    let (ticket, view) = bob.reconciler.propose(Operation::add_text("Pairing hour"));
    let optimistic = view.payload.as_board().expect("board").items[0].entry.id.clone();
    let response = engine.handle(&OperationRequest {
        widget_id: board.id.clone(),
        operation: Operation::add_text("Pairing hour"),
        actor: member("u2"),
    });
    assert_eq!(bob.reconciler.settle(ticket, &response), Receipt::Applied);
    let confirmed = bob.reconciler.authoritative().payload.as_board().expect("board").items[0]
        .entry
        .id
        .clone();
    assert_eq!(optimistic, confirmed);
}

#[test]
fn late_broadcasts_do_not_regress() {
    let engine = memory_engine();
    let poll = create(&engine, WidgetKind::Poll, "u1", Setup::poll("q", &["A", "B"]));
    let mut carol = Session::join(&engine, member("u3"), &poll.id);

    carol.act(&engine, Operation::vote_option("A"));
    assert_eq!(carol.reconciler.authoritative().version, 1);

    // The broadcast for version 1 arrives after the response already did.
    let queued = carol.inbox.drain();
    assert_eq!(queued.len(), 1);
    assert_eq!(
        carol.reconciler.receive(queued[0].document.clone()),
        Receipt::Stale
    );
    assert_eq!(carol.reconciler.authoritative().version, 1);
}

#[test]
fn closed_widget_triggers_refresh() {
    let engine = memory_engine();
    let poll = create(&engine, WidgetKind::Poll, "u1", Setup::poll("q", &["A", "B"]));
    let mut dan = Session::join(&engine, member("u4"), &poll.id);
    engine
        .apply(&poll.id, &Operation::Close, &member("u1"))
        .expect("close");

    dan.act(&engine, Operation::vote_option("B"));
    assert!(dan.reconciler.needs_refresh());

    dan.reconciler.refresh(engine.get(&poll.id).expect("get"));
    assert!(!dan.reconciler.needs_refresh());
    assert!(dan.reconciler.view().closed);
}

#[test]
fn blind_vote_sessions_converge_on_their_own_view() {
    let engine = memory_engine();
    let blind = create(
        &engine,
        WidgetKind::BlindVote,
        "u1",
        Setup::poll("Estimate", &["3", "5", "8"]),
    );
    let mut host = Session::join(&engine, member("u1"), &blind.id);
    let mut eve = Session::join(&engine, member("u5"), &blind.id);

    eve.act(&engine, Operation::vote_option("5"));
    host.act(&engine, Operation::vote_option("8"));
    host.pump();
    eve.pump();

    let own_votes = |session: &Session| -> usize {
        let view = session.reconciler.view();
        view.payload
            .as_choice()
            .expect("choice")
            .options
            .iter()
            .map(|o| o.votes.len())
            .sum()
    };
    assert_eq!(host.reconciler.view().version, 2);
    assert_eq!(eve.reconciler.view().version, 2);
    assert_eq!(own_votes(&host), 1);
    assert_eq!(own_votes(&eve), 1);

    host.act(&engine, Operation::Reveal);
    eve.pump();
    let stored = engine.get(&blind.id).expect("get");
    assert_eq!(host.reconciler.view(), &stored);
    assert_eq!(eve.reconciler.view(), &stored);
    assert_eq!(own_votes(&eve), 2);
}
