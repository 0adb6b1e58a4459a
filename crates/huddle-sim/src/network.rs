use std::collections::BTreeSet;

use huddle_core::{Operation, OperationResponse, Ticket, WidgetDocument};
use serde::{Deserialize, Serialize};

use crate::rng::DeterministicRng;
use crate::session::SessionId;

/// Fault injection configuration for simulated delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultConfig {
    /// Maximum delivery delay in rounds.
    pub max_delay_rounds: u8,
    /// Percentage of sends dropped.
    pub drop_rate_percent: u8,
    /// Percentage of sends duplicated.
    pub duplicate_rate_percent: u8,
    /// Percentage chance of reordering ready packets at each tick.
    pub reorder_rate_percent: u8,
    /// Percentage chance per round to toggle a random session's partition.
    pub partition_rate_percent: u8,
    /// Percentage chance per round to freeze a random session clock.
    pub freeze_rate_percent: u8,
    /// Number of rounds a frozen clock stays frozen.
    pub freeze_duration_rounds: u8,
}

impl FaultConfig {
    /// Faults that delay, repeat or reorder but never lose a packet.
    #[must_use]
    pub const fn lossless() -> Self {
        Self {
            max_delay_rounds: 2,
            drop_rate_percent: 0,
            duplicate_rate_percent: 5,
            reorder_rate_percent: 10,
            partition_rate_percent: 0,
            freeze_rate_percent: 5,
            freeze_duration_rounds: 2,
        }
    }
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            max_delay_rounds: 2,
            drop_rate_percent: 5,
            duplicate_rate_percent: 3,
            reorder_rate_percent: 5,
            partition_rate_percent: 2,
            freeze_rate_percent: 2,
            freeze_duration_rounds: 2,
        }
    }
}

/// One side of a simulated link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Endpoint {
    Server,
    Session(SessionId),
}

/// What travels over the simulated network.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A session asks the engine to apply an operation.
    Request { ticket: Ticket, operation: Operation },
    /// The engine's answer to one request.
    Response {
        ticket: Ticket,
        response: OperationResponse,
    },
    /// A committed document pushed to a channel subscriber.
    Broadcast(Box<WidgetDocument>),
}

impl Message {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Request { .. } => "request",
            Self::Response { .. } => "response",
            Self::Broadcast(_) => "broadcast",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub from: Endpoint,
    pub to: Endpoint,
    pub message: Message,
}

impl Packet {
    /// The session on the far side of the server, whichever direction.
    #[must_use]
    pub const fn session(&self) -> Option<SessionId> {
        match (self.from, self.to) {
            (Endpoint::Session(id), _) | (_, Endpoint::Session(id)) => Some(id),
            (Endpoint::Server, Endpoint::Server) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct InFlight {
    deliver_at_round: u64,
    packet: Packet,
}

/// Result of a send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOutcome {
    pub dropped: bool,
    pub duplicated: bool,
    /// Delay assigned to the primary copy.
    pub delay_rounds: u8,
}

impl SendOutcome {
    const DROPPED: Self = Self {
        dropped: true,
        duplicated: false,
        delay_rounds: 0,
    };
}

/// Packets whose delivery round has arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliverOutcome {
    pub delivered: Vec<Packet>,
    pub reordered: bool,
}

/// Deterministic fault-injecting network between sessions and the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedNetwork {
    in_flight: Vec<InFlight>,
    partitioned: BTreeSet<SessionId>,
    fault: FaultConfig,
}

impl SimulatedNetwork {
    #[must_use]
    pub const fn new(fault: FaultConfig) -> Self {
        Self {
            in_flight: Vec::new(),
            partitioned: BTreeSet::new(),
            fault,
        }
    }

    #[must_use]
    pub const fn fault_config(&self) -> FaultConfig {
        self.fault
    }

    /// Cut a session off from the server, or reconnect it.
    pub fn set_partitioned(&mut self, session: SessionId, isolated: bool) {
        if isolated {
            self.partitioned.insert(session);
        } else {
            self.partitioned.remove(&session);
        }
    }

    #[must_use]
    pub fn is_partitioned(&self, session: SessionId) -> bool {
        self.partitioned.contains(&session)
    }

    pub fn heal_all(&mut self) {
        self.partitioned.clear();
    }

    #[must_use]
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Send a packet with fault injection.
    pub fn send(&mut self, packet: Packet, round: u64, rng: &mut DeterministicRng) -> SendOutcome {
        if packet.session().is_some_and(|s| self.is_partitioned(s)) {
            return SendOutcome::DROPPED;
        }
        if rng.hit_rate_percent(self.fault.drop_rate_percent) {
            return SendOutcome::DROPPED;
        }

        let delay_bound = u64::from(self.fault.max_delay_rounds).saturating_add(1);
        let delay = u8::try_from(rng.next_bounded(delay_bound)).unwrap_or(self.fault.max_delay_rounds);
        let deliver_at_round = round.saturating_add(u64::from(delay));

        let duplicated = rng.hit_rate_percent(self.fault.duplicate_rate_percent);
        if duplicated {
            self.in_flight.push(InFlight {
                deliver_at_round,
                packet: packet.clone(),
            });
        }
        self.in_flight.push(InFlight {
            deliver_at_round,
            packet,
        });

        SendOutcome {
            dropped: false,
            duplicated,
            delay_rounds: delay,
        }
    }

    /// Take every packet due by `round`, in send order unless reordered.
    pub fn deliver_ready(&mut self, round: u64, rng: &mut DeterministicRng) -> DeliverOutcome {
        let (ready, future): (Vec<_>, Vec<_>) = self
            .in_flight
            .drain(..)
            .partition(|p| p.deliver_at_round <= round);
        self.in_flight = future;

        let mut delivered: Vec<Packet> = ready.into_iter().map(|p| p.packet).collect();
        let reordered = delivered.len() > 1 && rng.hit_rate_percent(self.fault.reorder_rate_percent);
        if reordered {
            rng.shuffle(&mut delivered);
        }

        DeliverOutcome {
            delivered,
            reordered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broadcast(session: SessionId) -> Packet {
        Packet {
            from: Endpoint::Server,
            to: Endpoint::Session(session),
            message: Message::Broadcast(Box::new(crate::fixtures::poll_document())),
        }
    }

    fn quiet() -> FaultConfig {
        FaultConfig {
            max_delay_rounds: 0,
            drop_rate_percent: 0,
            duplicate_rate_percent: 0,
            reorder_rate_percent: 0,
            partition_rate_percent: 0,
            freeze_rate_percent: 0,
            freeze_duration_rounds: 0,
        }
    }

    #[test]
    fn quiet_network_delivers_in_order() {
        let mut net = SimulatedNetwork::new(quiet());
        let mut rng = DeterministicRng::new(0);
        for session in 0..3 {
            let outcome = net.send(broadcast(session), 0, &mut rng);
            assert!(!outcome.dropped);
        }
        let out = net.deliver_ready(0, &mut rng);
        let senders: Vec<_> = out.delivered.iter().filter_map(Packet::session).collect();
        assert_eq!(senders, [0, 1, 2]);
        assert!(!out.reordered);
        assert_eq!(net.in_flight_len(), 0);
    }

    #[test]
    fn partitioned_session_loses_traffic() {
        let mut net = SimulatedNetwork::new(quiet());
        let mut rng = DeterministicRng::new(0);
        net.set_partitioned(1, true);
        assert!(net.send(broadcast(1), 0, &mut rng).dropped);
        assert!(!net.send(broadcast(2), 0, &mut rng).dropped);
        net.heal_all();
        assert!(!net.is_partitioned(1));
    }

    #[test]
    fn delayed_packets_wait_for_their_round() {
        let mut net = SimulatedNetwork::new(FaultConfig {
            max_delay_rounds: 3,
            ..quiet()
        });
        let mut rng = DeterministicRng::new(5);
        let mut total = 0;
        for _ in 0..20 {
            let _ = net.send(broadcast(0), 0, &mut rng);
        }
        for round in 0..=3 {
            total += net.deliver_ready(round, &mut rng).delivered.len();
        }
        assert_eq!(total, 20);
        assert_eq!(net.in_flight_len(), 0);
    }

    #[test]
    fn duplicates_arrive_twice() {
        let mut net = SimulatedNetwork::new(FaultConfig {
            duplicate_rate_percent: 100,
            ..quiet()
        });
        let mut rng = DeterministicRng::new(9);
        assert!(net.send(broadcast(0), 0, &mut rng).duplicated);
        assert_eq!(net.deliver_ready(0, &mut rng).delivered.len(), 2);
    }
}
