//! huddle-sim library.
//!
//! Deterministic simulation of several chat sessions sharing one widget.
//! Every session runs a [`huddle_core::Reconciler`] against a real
//! [`huddle_core::Engine`]; requests, responses and broadcasts travel over a
//! [`network::SimulatedNetwork`] that drops, duplicates, delays and reorders
//! them. After the run every session refreshes once and the
//! [`oracle::ConvergenceOracle`] checks the result.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for return types.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod campaign;
pub mod clock;
pub mod network;
pub mod oracle;
pub mod rng;
pub mod session;

use anyhow::{Context, Result, bail};
use huddle_core::{
    Actor, ChannelHub, ChannelKey, CreateRequest, Engine, EngineConfig, MemoryStore, Operation,
    OperationKind, OperationRequest, Payload, Receipt, RejectionKind, Setup, Subscription, Ticket,
    WidgetDocument, WidgetId, WidgetKind, registry,
};
use serde::{Deserialize, Serialize};

use crate::clock::{ClockConfig, SimulatedClock};
use crate::network::{Endpoint, FaultConfig, Message, Packet, SendOutcome, SimulatedNetwork};
use crate::rng::DeterministicRng;
use crate::session::{SessionId, SessionState, SimulatedSession};

/// Parameters of one simulated meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub seed: u64,
    /// Number of participant sessions; session 0 creates the widget.
    pub session_count: usize,
    pub rounds: u64,
    pub kind: WidgetKind,
    /// Percent chance that a session acts in a given round.
    pub activity_percent: u8,
    /// Round at which the creator closes the widget, if at all.
    pub close_at_round: Option<u64>,
    pub fault: FaultConfig,
    pub clock: ClockConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            session_count: 4,
            rounds: 24,
            kind: WidgetKind::Poll,
            activity_percent: 60,
            close_at_round: Some(18),
            fault: FaultConfig::default(),
            clock: ClockConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// # Errors
    ///
    /// Returns an error if a parameter is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.session_count == 0 {
            bail!("session_count must be > 0");
        }
        if self.rounds == 0 {
            bail!("rounds must be > 0");
        }
        if self.activity_percent > 100 {
            bail!("activity_percent must be <= 100");
        }
        Ok(())
    }
}

/// One step of the run, recorded for replay and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    pub round: u64,
    pub kind: TraceEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEventKind {
    Created {
        widget: WidgetId,
        kind: WidgetKind,
    },
    Propose {
        session: SessionId,
        ticket: Ticket,
        op: OperationKind,
    },
    Send {
        from: Endpoint,
        to: Endpoint,
        message: &'static str,
        outcome: SendOutcome,
    },
    Handled {
        session: SessionId,
        op: OperationKind,
        /// Committed version, or why nothing changed.
        result: Result<u64, RejectionKind>,
    },
    Deliver {
        session: SessionId,
        message: &'static str,
        receipt: Receipt,
        version: u64,
    },
    Refresh {
        session: SessionId,
        receipt: Receipt,
        version: u64,
    },
    Reordered {
        count: usize,
    },
    Partition {
        session: SessionId,
        isolated: bool,
    },
    Freeze {
        session: SessionId,
    },
    /// Pending operations that went unanswered past their deadline.
    Expired {
        session: SessionId,
        count: usize,
    },
}

/// Counters for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationStats {
    pub proposed: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub dropped: usize,
    pub duplicated: usize,
    pub reordered: usize,
    pub stale_deliveries: usize,
    /// Pending operations dropped for want of an answer.
    pub expired: usize,
    /// Refreshes forced by a rejection or a timeout during the run, not the
    /// final one.
    pub recoveries: usize,
}

#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub config: SimulationConfig,
    pub trace: Vec<TraceEvent>,
    pub sessions: Vec<SessionState>,
    /// Every document the channel observer received, in arrival order.
    pub committed: Vec<WidgetDocument>,
    /// The store's latest document after the run.
    pub stored: WidgetDocument,
    pub stats: SimulationStats,
    /// A session lost packets and had to recover through a refresh.
    pub interesting_state_reached: bool,
}

/// Rounds the final drain may take before the simulator gives up on an
/// empty network.
const DRAIN_ROUND_LIMIT: u64 = 64;

pub struct Simulator {
    config: SimulationConfig,
    rng: DeterministicRng,
    engine: Engine<MemoryStore, ChannelHub>,
    server_clock: SimulatedClock,
    network: SimulatedNetwork,
    widget: WidgetId,
    sessions: Vec<SimulatedSession>,
    subscriptions: Vec<Subscription>,
    observer: Subscription,
    committed: Vec<WidgetDocument>,
    trace: Vec<TraceEvent>,
    stats: SimulationStats,
    round: u64,
}

impl Simulator {
    /// Create the engine, the widget and one session per participant.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid config or if the widget cannot be
    /// created.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;

        let mut rng = DeterministicRng::new(config.seed);
        let server_clock = SimulatedClock::server(config.clock);
        let engine = Engine::new(MemoryStore::new(), ChannelHub::new(), EngineConfig::default())
            .with_clock(server_clock.handle());
        let channel = ChannelKey::from(format!("sim-{}", config.seed));
        let observer = engine.notifier().observe(&channel);

        let actors: Vec<Actor> = (0..config.session_count)
            .map(|i| participant(i, config.session_count))
            .collect();
        let document = engine
            .create(&CreateRequest {
                channel: channel.clone(),
                kind: config.kind,
                actor: actors[0].clone(),
                setup: setup_for(config.kind),
            })
            .with_context(|| format!("create simulated {} widget", config.kind))?;

        let limits = engine.config().limits;
        let mut sessions = Vec::with_capacity(actors.len());
        let mut subscriptions = Vec::with_capacity(actors.len());
        for (id, actor) in actors.into_iter().enumerate() {
            let clock = SimulatedClock::session(config.clock, &mut rng);
            subscriptions.push(engine.notifier().subscribe(&channel, &actor));
            sessions.push(SimulatedSession::new(id, actor, document.clone(), limits, clock));
        }

        let trace = vec![TraceEvent {
            round: 0,
            kind: TraceEventKind::Created {
                widget: document.id.clone(),
                kind: document.kind,
            },
        }];

        Ok(Self {
            network: SimulatedNetwork::new(config.fault),
            config,
            rng,
            engine,
            server_clock,
            widget: document.id,
            sessions,
            subscriptions,
            observer,
            committed: Vec::new(),
            trace,
            stats: SimulationStats::default(),
            round: 0,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run every round, drain the network, refresh every session.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot serve a refresh.
    pub fn run(&mut self) -> Result<SimulationResult> {
        for round in 0..self.config.rounds {
            self.round = round;
            self.tick_clocks();
            self.inject_faults();
            self.recover_sessions()?;
            self.act();
            self.deliver();
        }
        self.settle()?;

        let stored = self.engine.get(&self.widget)?;
        let interesting_state_reached = self.stats.dropped > 0 && self.stats.recoveries > 0;
        tracing::info!(
            seed = self.config.seed,
            kind = %self.config.kind,
            version = stored.version,
            accepted = self.stats.accepted,
            rejected = self.stats.rejected,
            dropped = self.stats.dropped,
            "simulation complete"
        );

        Ok(SimulationResult {
            config: self.config.clone(),
            trace: std::mem::take(&mut self.trace),
            sessions: self.sessions.iter().map(SimulatedSession::snapshot).collect(),
            committed: std::mem::take(&mut self.committed),
            stored,
            stats: self.stats,
            interesting_state_reached,
        })
    }

    fn record(&mut self, kind: TraceEventKind) {
        self.trace.push(TraceEvent {
            round: self.round,
            kind,
        });
    }

    fn tick_clocks(&mut self) {
        self.server_clock.tick(self.round);
        for session in &mut self.sessions {
            session.clock_mut().tick(self.round);
        }
    }

    fn inject_faults(&mut self) {
        let fault = self.network.fault_config();
        if self.rng.hit_rate_percent(fault.partition_rate_percent)
            && let Some(session) = self.rng.pick_index(self.sessions.len())
        {
            let isolated = !self.network.is_partitioned(session);
            self.network.set_partitioned(session, isolated);
            tracing::debug!(round = self.round, session, isolated, "partition toggled");
            self.record(TraceEventKind::Partition { session, isolated });
        }
        if self.rng.hit_rate_percent(fault.freeze_rate_percent)
            && let Some(session) = self.rng.pick_index(self.sessions.len())
        {
            self.sessions[session]
                .clock_mut()
                .freeze(self.round, fault.freeze_duration_rounds);
            self.record(TraceEventKind::Freeze { session });
        }
    }

    /// Expire overdue operations, then refetch for every reachable session
    /// that lost trust in its copy.
    fn recover_sessions(&mut self) -> Result<()> {
        for id in 0..self.sessions.len() {
            let count = self.sessions[id].expire_pending();
            if count > 0 {
                self.stats.expired += count;
                self.record(TraceEventKind::Expired { session: id, count });
            }
            if self.sessions[id].needs_refresh() && !self.network.is_partitioned(id) {
                self.stats.recoveries += 1;
                self.refresh(id)?;
            }
        }
        Ok(())
    }

    fn refresh(&mut self, id: SessionId) -> Result<()> {
        let document = self.engine.fetch(&self.widget, self.sessions[id].actor())?;
        let version = document.version;
        let receipt = self.sessions[id].on_refresh(document);
        self.record(TraceEventKind::Refresh {
            session: id,
            receipt,
            version,
        });
        Ok(())
    }

    fn act(&mut self) {
        for id in 0..self.sessions.len() {
            let operation = match self.scripted_operation(id) {
                Some(operation) => Some(operation),
                None if self.rng.hit_rate_percent(self.config.activity_percent) => {
                    self.sessions[id].next_operation(&mut self.rng)
                }
                None => None,
            };
            let Some(operation) = operation else {
                continue;
            };

            let ticket = self.sessions[id].propose(operation.clone());
            self.stats.proposed += 1;
            self.record(TraceEventKind::Propose {
                session: id,
                ticket,
                op: operation.kind(),
            });
            self.send(Packet {
                from: Endpoint::Session(id),
                to: Endpoint::Server,
                message: Message::Request { ticket, operation },
            });
        }
    }

    /// The creator's moderation steps: reveal halfway, advance brainwriting
    /// rounds, close when configured.
    fn scripted_operation(&self, id: SessionId) -> Option<Operation> {
        if id != 0 {
            return None;
        }
        let view = self.sessions[id].reconciler().view();
        if view.closed {
            return None;
        }
        if self.config.close_at_round == Some(self.round) {
            return Some(Operation::Close);
        }
        let schema = registry::schema(view.kind);
        if schema.hides_votes && self.round == self.config.rounds / 2 {
            return Some(Operation::Reveal);
        }
        if let Payload::Rounds(rounds) = &view.payload
            && self.round % 4 == 2
            && rounds.round < rounds.total_rounds
        {
            return Some(Operation::AdvanceRound);
        }
        None
    }

    fn send(&mut self, packet: Packet) {
        let (from, to, message) = (packet.from, packet.to, packet.message.label());
        let outcome = self.network.send(packet, self.round, &mut self.rng);
        if outcome.dropped {
            self.stats.dropped += 1;
        }
        if outcome.duplicated {
            self.stats.duplicated += 1;
        }
        self.record(TraceEventKind::Send {
            from,
            to,
            message,
            outcome,
        });
    }

    fn deliver(&mut self) {
        let outcome = self.network.deliver_ready(self.round, &mut self.rng);
        if outcome.reordered {
            self.stats.reordered += 1;
            self.record(TraceEventKind::Reordered {
                count: outcome.delivered.len(),
            });
        }
        for packet in outcome.delivered {
            match (packet.to, packet.from, packet.message) {
                (Endpoint::Server, Endpoint::Session(id), Message::Request { ticket, operation }) => {
                    self.serve(id, ticket, operation);
                }
                (Endpoint::Session(id), _, message) => self.receive(id, message),
                (to, from, message) => {
                    tracing::warn!(?to, ?from, message = message.label(), "undeliverable packet");
                }
            }
        }
    }

    fn serve(&mut self, id: SessionId, ticket: Ticket, operation: Operation) {
        let op = operation.kind();
        let response = self.engine.handle(&OperationRequest {
            widget_id: self.widget.clone(),
            operation,
            actor: self.sessions[id].actor().clone(),
        });
        let result = match (response.document(), response.error_kind()) {
            (Some(document), _) => {
                self.stats.accepted += 1;
                Ok(document.version)
            }
            (None, kind) => {
                self.stats.rejected += 1;
                Err(kind.unwrap_or(RejectionKind::Unavailable))
            }
        };
        self.record(TraceEventKind::Handled {
            session: id,
            op,
            result,
        });
        self.send(Packet {
            from: Endpoint::Server,
            to: Endpoint::Session(id),
            message: Message::Response { ticket, response },
        });
        self.pump_broadcasts();
    }

    /// Move everything the hub queued onto the simulated network.
    fn pump_broadcasts(&mut self) {
        self.committed
            .extend(self.observer.drain().into_iter().map(|b| b.document));
        let queued: Vec<(SessionId, WidgetDocument)> = self
            .subscriptions
            .iter()
            .enumerate()
            .flat_map(|(id, sub)| sub.drain().into_iter().map(move |b| (id, b.document)))
            .collect();
        for (id, document) in queued {
            self.send(Packet {
                from: Endpoint::Server,
                to: Endpoint::Session(id),
                message: Message::Broadcast(Box::new(document)),
            });
        }
    }

    fn receive(&mut self, id: SessionId, message: Message) {
        let label = message.label();
        let session = &mut self.sessions[id];
        let receipt = match message {
            Message::Response { ticket, response } => session.on_response(ticket, &response),
            Message::Broadcast(document) => session.on_broadcast(*document),
            Message::Request { .. } => return,
        };
        let version = session.reconciler().authoritative().version;
        if receipt == Receipt::Stale {
            self.stats.stale_deliveries += 1;
        }
        self.record(TraceEventKind::Deliver {
            session: id,
            message: label,
            receipt,
            version,
        });
    }

    /// Stop injecting faults, deliver what is in flight, refresh everyone.
    fn settle(&mut self) -> Result<()> {
        self.network.heal_all();
        for session in &mut self.sessions {
            session.clock_mut().unfreeze();
        }

        let last = self.config.rounds.saturating_add(DRAIN_ROUND_LIMIT);
        while self.network.in_flight_len() > 0 && self.round < last {
            self.round += 1;
            self.tick_clocks();
            self.deliver();
        }
        if self.network.in_flight_len() > 0 {
            tracing::warn!(
                in_flight = self.network.in_flight_len(),
                "network did not drain"
            );
        }

        for id in 0..self.sessions.len() {
            self.refresh(id)?;
        }
        self.committed
            .extend(self.observer.drain().into_iter().map(|b| b.document));
        Ok(())
    }
}

fn participant(index: usize, count: usize) -> Actor {
    let id = format!("p{index}");
    let name = format!("Participant {index}");
    if count >= 3 && index == count - 1 {
        Actor::facilitator(id, name)
    } else {
        Actor::member(id, name)
    }
}

/// A representative setup for each kind.
#[must_use]
pub fn setup_for(kind: WidgetKind) -> Setup {
    match kind {
        WidgetKind::RomanVoting => Setup::poll("Ship on Friday?", &[]),
        WidgetKind::Poll | WidgetKind::BlindVote => {
            Setup::poll("Where should the offsite be?", &["Lisbon", "Oslo", "Kyoto"])
        }
        WidgetKind::Brainstorm
        | WidgetKind::RetrospectiveBoard
        | WidgetKind::LeanCanvas
        | WidgetKind::OpportunityTree => Setup::board("How do we halve onboarding time?"),
        WidgetKind::ActionItems | WidgetKind::Checklist => Setup::tasks("Release follow-ups"),
        WidgetKind::ConfidenceVote | WidgetKind::TeamHealth | WidgetKind::Nps => {
            Setup::scale("How do we feel about the plan?")
        }
        WidgetKind::RankedChoice => {
            Setup::ranking("What matters most?", &["Speed", "Quality", "Cost", "Scope"])
        }
        WidgetKind::Brainwriting => Setup::rounds("Ideas for the team day", 2, 3),
    }
}
