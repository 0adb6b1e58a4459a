use std::collections::HashSet;
use std::fmt;

use huddle_core::registry;
use huddle_core::view::redact_for;
use huddle_core::{ActorId, Payload, WidgetDocument};

use crate::SimulationResult;
use crate::session::{SessionId, SessionState};

// ── Core result types ─────────────────────────────────────────────────────────

/// Outcome of one or more invariant checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleResult {
    /// `true` iff no violations were found.
    pub passed: bool,
    pub violations: Vec<InvariantViolation>,
}

impl OracleResult {
    const fn pass() -> Self {
        Self {
            passed: true,
            violations: Vec::new(),
        }
    }

    fn from_violations(violations: Vec<InvariantViolation>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
        }
    }

    /// Accumulate another check's failures into this one.
    #[must_use]
    fn merge(mut self, other: Self) -> Self {
        if !other.passed {
            self.passed = false;
            self.violations.extend(other.violations);
        }
        self
    }
}

// ── Invariant violation diagnostics ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A session's authoritative copy moved to an older version.
    VersionRegression {
        session: SessionId,
        from: u64,
        to: u64,
    },

    /// A committed document lists the same voter twice on a one-vote widget.
    DuplicateVoter { version: u64, voter: ActorId },

    /// Committed versions did not grow by exactly one per broadcast.
    VersionGap { expected: u64, found: u64 },

    /// Something was committed after the widget closed.
    WriteAfterClose { closed_at: u64, version: u64 },

    /// The store's latest document differs from the last broadcast.
    StoreMismatch { stored: u64, broadcast: u64 },

    /// After the final refresh a session still disagrees with the store.
    Divergence {
        session: SessionId,
        session_version: u64,
        stored_version: u64,
        pending: usize,
        view_matches: bool,
    },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VersionRegression { session, from, to } => write!(
                f,
                "VersionRegression: session {session} went from version {from} back to {to}"
            ),
            Self::DuplicateVoter { version, voter } => write!(
                f,
                "DuplicateVoter: version {version} counts voter {voter} more than once"
            ),
            Self::VersionGap { expected, found } => {
                write!(f, "VersionGap: expected version {expected}, committed {found}")
            }
            Self::WriteAfterClose { closed_at, version } => write!(
                f,
                "WriteAfterClose: closed at version {closed_at} but committed {version}"
            ),
            Self::StoreMismatch { stored, broadcast } => write!(
                f,
                "StoreMismatch: store holds version {stored}, last broadcast was {broadcast}"
            ),
            Self::Divergence {
                session,
                session_version,
                stored_version,
                pending,
                view_matches,
            } => write!(
                f,
                "Divergence: session {session} at version {session_version} \
                 (pending={pending}, view_matches={view_matches}), store at {stored_version}"
            ),
        }
    }
}

// ── Oracle ────────────────────────────────────────────────────────────────────

/// Checks a finished simulation against the engine's guarantees.
///
/// # Invariants checked
///
/// 1. **No regression** (`check_session_versions`): a session never adopts
///    an older document than one it already holds.
/// 2. **One vote each** (`check_one_vote_each`): on single-choice, scale
///    and ranking widgets no voter appears twice in any committed version.
/// 3. **Monotonic versions** (`check_committed_versions`): broadcasts
///    carry versions 0, 1, 2, … in commit order, ending at the stored one.
/// 4. **Terminal closure** (`check_terminal_closure`): nothing is
///    committed after a close.
/// 5. **Convergence** (`check_convergence`): after the final refresh every
///    session shows exactly its own view of the stored document with
///    nothing pending.
pub struct ConvergenceOracle;

impl ConvergenceOracle {
    /// Run every check.
    #[must_use]
    pub fn check_all(result: &SimulationResult) -> OracleResult {
        Self::check_session_versions(&result.sessions)
            .merge(Self::check_one_vote_each(&result.committed))
            .merge(Self::check_committed_versions(&result.committed, &result.stored))
            .merge(Self::check_terminal_closure(&result.committed))
            .merge(Self::check_convergence(&result.sessions, &result.stored))
    }

    // ── Invariant 1: No regression ───────────────────────────────────────────

    #[must_use]
    pub fn check_session_versions(sessions: &[SessionState]) -> OracleResult {
        let violations = sessions
            .iter()
            .flat_map(|s| {
                s.observed_versions
                    .windows(2)
                    .filter(|w| w[1] < w[0])
                    .map(|w| InvariantViolation::VersionRegression {
                        session: s.id,
                        from: w[0],
                        to: w[1],
                    })
            })
            .collect();
        OracleResult::from_violations(violations)
    }

    // ── Invariant 2: One vote each ───────────────────────────────────────────

    #[must_use]
    pub fn check_one_vote_each(committed: &[WidgetDocument]) -> OracleResult {
        let mut violations = Vec::new();
        for document in committed {
            let voters: Vec<&ActorId> = match &document.payload {
                Payload::Choice(choice) if registry::schema(document.kind).single_choice => choice
                    .options
                    .iter()
                    .flat_map(|o| o.votes.iter().map(|v| &v.voter_id))
                    .collect(),
                Payload::Scale(scale) => scale.votes.iter().map(|v| &v.voter_id).collect(),
                Payload::Ranking(ranking) => ranking.ballots.iter().map(|b| &b.voter_id).collect(),
                _ => continue,
            };
            let mut seen = HashSet::new();
            for voter in voters {
                if !seen.insert(voter) {
                    violations.push(InvariantViolation::DuplicateVoter {
                        version: document.version,
                        voter: voter.clone(),
                    });
                }
            }
        }
        OracleResult::from_violations(violations)
    }

    // ── Invariant 3: Monotonic versions ──────────────────────────────────────

    /// `committed` is everything a channel observer received, starting with
    /// the creation broadcast.
    #[must_use]
    pub fn check_committed_versions(
        committed: &[WidgetDocument],
        stored: &WidgetDocument,
    ) -> OracleResult {
        let mut violations = Vec::new();
        for (expected, document) in (0_u64..).zip(committed) {
            if document.version != expected {
                violations.push(InvariantViolation::VersionGap {
                    expected,
                    found: document.version,
                });
                break;
            }
        }
        if let Some(last) = committed.last()
            && last != stored
        {
            violations.push(InvariantViolation::StoreMismatch {
                stored: stored.version,
                broadcast: last.version,
            });
        }
        OracleResult::from_violations(violations)
    }

    // ── Invariant 4: Terminal closure ────────────────────────────────────────

    #[must_use]
    pub fn check_terminal_closure(committed: &[WidgetDocument]) -> OracleResult {
        let Some(closed_at) = committed.iter().position(|d| d.closed) else {
            return OracleResult::pass();
        };
        let violations = committed[closed_at + 1..]
            .iter()
            .map(|d| InvariantViolation::WriteAfterClose {
                closed_at: committed[closed_at].version,
                version: d.version,
            })
            .collect();
        OracleResult::from_violations(violations)
    }

    // ── Invariant 5: Convergence ─────────────────────────────────────────────

    #[must_use]
    pub fn check_convergence(sessions: &[SessionState], stored: &WidgetDocument) -> OracleResult {
        let violations = sessions
            .iter()
            .filter_map(|s| {
                let expected = redact_for(stored, &s.actor);
                let view_matches = s.view == expected;
                (s.authoritative != expected || !view_matches || s.pending > 0).then(|| {
                    InvariantViolation::Divergence {
                        session: s.id,
                        session_version: s.authoritative.version,
                        stored_version: stored.version,
                        pending: s.pending,
                        view_matches,
                    }
                })
            })
            .collect();
        OracleResult::from_violations(violations)
    }
}
