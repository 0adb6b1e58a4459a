//! A simulated participant: one chat session holding one widget.

use huddle_core::model::payload::{BoardPayload, RoundsPayload, TaskPayload};
use huddle_core::{
    Actor, ActorId, Choice, ItemAttrs, ItemId, LimitsConfig, Operation, OperationResponse, Payload,
    Receipt, Reconciler, Ticket, WidgetDocument,
};

use crate::clock::SimulatedClock;
use crate::rng::DeterministicRng;

/// Stable index of a simulated session.
pub type SessionId = usize;

/// Immutable snapshot of a session after a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub id: SessionId,
    pub actor: ActorId,
    pub authoritative: WidgetDocument,
    pub view: WidgetDocument,
    pub pending: usize,
    /// Authoritative version after every delivery, in arrival order.
    pub observed_versions: Vec<u64>,
}

pub struct SimulatedSession {
    id: SessionId,
    reconciler: Reconciler,
    clock: SimulatedClock,
    observed_versions: Vec<u64>,
    contributions: u32,
}

impl SimulatedSession {
    #[must_use]
    pub fn new(
        id: SessionId,
        actor: Actor,
        document: WidgetDocument,
        limits: LimitsConfig,
        clock: SimulatedClock,
    ) -> Self {
        let observed_versions = vec![document.version];
        let reconciler = Reconciler::new(actor, document, limits).with_clock(clock.handle());
        Self {
            id,
            reconciler,
            clock,
            observed_versions,
            contributions: 0,
        }
    }

    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub const fn actor(&self) -> &Actor {
        self.reconciler.viewer()
    }

    #[must_use]
    pub const fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub const fn clock_mut(&mut self) -> &mut SimulatedClock {
        &mut self.clock
    }

    #[must_use]
    pub const fn needs_refresh(&self) -> bool {
        self.reconciler.needs_refresh()
    }

    /// Track an operation optimistically; the caller sends it.
    pub fn propose(&mut self, operation: Operation) -> Ticket {
        let (ticket, view) = self.reconciler.propose(operation);
        tracing::trace!(session = self.id, version = view.version, "proposed");
        ticket
    }

    pub fn on_response(&mut self, ticket: Ticket, response: &OperationResponse) -> Receipt {
        let receipt = self.reconciler.settle(ticket, response);
        self.observe();
        receipt
    }

    pub fn on_broadcast(&mut self, document: WidgetDocument) -> Receipt {
        let receipt = self.reconciler.receive(document);
        self.observe();
        receipt
    }

    /// Drop operations that waited too long for an answer.
    pub fn expire_pending(&mut self) -> usize {
        let expired = self.reconciler.expire();
        if expired > 0 {
            tracing::debug!(session = self.id, expired, "pending operations expired");
        }
        expired
    }

    pub fn on_refresh(&mut self, document: WidgetDocument) -> Receipt {
        let receipt = self.reconciler.refresh(document);
        self.observe();
        receipt
    }

    fn observe(&mut self) {
        self.observed_versions
            .push(self.reconciler.authoritative().version);
    }

    /// Pick something a participant might plausibly do next, based on what
    /// the session currently shows. Some picks are meant to be rejected.
    pub fn next_operation(&mut self, rng: &mut DeterministicRng) -> Option<Operation> {
        let view = self.reconciler.view();
        if view.closed {
            return None;
        }
        let me = &self.reconciler.viewer().id;
        let operation = match &view.payload {
            Payload::Choice(choice) => {
                let index = rng.pick_index(choice.options.len())?;
                Some(Operation::vote_option(choice.options[index].id.clone()))
            }
            Payload::Scale(scale) => Some(Operation::Vote {
                choice: Choice::Score(rng.in_range(scale.min, scale.max)),
            }),
            Payload::Ranking(ranking) => {
                let mut order: Vec<String> = ranking.options.iter().map(|o| o.id.clone()).collect();
                rng.shuffle(&mut order);
                Some(Operation::Vote {
                    choice: Choice::Ranking(order),
                })
            }
            Payload::Board(board) => Some(board_move(board, rng, self.id, self.contributions)),
            Payload::Tasks(tasks) => Some(task_move(tasks, rng, self.id, self.contributions)),
            Payload::Rounds(rounds) => rounds_move(rounds, me, rng, self.id, self.contributions),
        };
        if matches!(operation, Some(Operation::AddItem { .. })) {
            self.contributions += 1;
        }
        operation
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        SessionState {
            id: self.id,
            actor: self.reconciler.viewer().id.clone(),
            authoritative: self.reconciler.authoritative().clone(),
            view: self.reconciler.view().clone(),
            pending: self.reconciler.pending(),
            observed_versions: self.observed_versions.clone(),
        }
    }
}

fn note(session: SessionId, n: u32) -> String {
    format!("idea {session}.{n}")
}

fn pick_item<'a>(ids: &'a [ItemId], rng: &mut DeterministicRng) -> Option<&'a ItemId> {
    rng.pick_index(ids.len()).map(|i| &ids[i])
}

fn board_move(board: &BoardPayload, rng: &mut DeterministicRng, session: SessionId, n: u32) -> Operation {
    let ids: Vec<ItemId> = board.items.iter().map(|i| i.entry.id.clone()).collect();
    let roll = rng.next_bounded(100);
    match pick_item(&ids, rng) {
        Some(id) if roll >= 85 => Operation::DeleteItem { item_id: id.clone() },
        Some(id) if roll >= 45 => Operation::toggle_vote(id.clone()),
        _ => Operation::add_text(note(session, n)),
    }
}

fn task_move(tasks: &TaskPayload, rng: &mut DeterministicRng, session: SessionId, n: u32) -> Operation {
    let ids: Vec<ItemId> = tasks.items.iter().map(|i| i.entry.id.clone()).collect();
    let roll = rng.next_bounded(100);
    match pick_item(&ids, rng) {
        Some(id) if roll >= 85 => Operation::DeleteItem { item_id: id.clone() },
        Some(id) if roll >= 45 => Operation::ToggleComplete { item_id: id.clone() },
        _ => Operation::add_text(format!("task {session}.{n}")),
    }
}

fn rounds_move(
    rounds: &RoundsPayload,
    me: &ActorId,
    rng: &mut DeterministicRng,
    session: SessionId,
    n: u32,
) -> Option<Operation> {
    if rounds.participant(me).is_none() {
        return Some(Operation::Join);
    }
    if rounds.round == 0 {
        return None;
    }
    let earlier: Vec<ItemId> = rounds
        .items
        .iter()
        .filter(|item| item.round < rounds.round)
        .map(|item| item.entry.id.clone())
        .collect();
    let builds_on = if rng.hit_rate_percent(30) {
        pick_item(&earlier, rng).cloned()
    } else {
        None
    };
    Some(Operation::AddItem {
        target: None,
        text: note(session, n),
        attrs: ItemAttrs {
            builds_on,
            ..ItemAttrs::default()
        },
    })
}
