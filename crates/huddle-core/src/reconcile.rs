//! Client-side reconciliation.
//!
//! A [`Reconciler`] keeps, per session and widget, the last authoritative
//! document and the operations sent but not yet answered. The view shown to
//! the participant is the authoritative copy with those pending operations
//! re-applied through the same processor the server runs. A newer
//! authoritative document always replaces the old one whole; nothing is
//! merged field by field.
//!
//! A pending operation that stays unanswered past its deadline is dropped by
//! [`Reconciler::expire`]. Its request or reply may have been lost, so the
//! session is flagged for a refresh; a late reply is still accepted.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::clock::{Clock, SystemClock};
use crate::config::LimitsConfig;
use crate::error::RejectionKind;
use crate::model::{Actor, Operation, WidgetDocument};
use crate::processor::{self, ApplyContext};
use crate::protocol::OperationResponse;

/// Handle for one proposed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

/// Outcome of offering a document to the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receipt {
    /// The document replaced the authoritative copy.
    Applied,
    /// The document was not newer and was ignored.
    Stale,
}

/// How long an operation may wait for its answer by default.
pub const DEFAULT_PENDING_TIMEOUT_SECS: i64 = 10;

struct Pending {
    ticket: Ticket,
    operation: Operation,
    deadline: DateTime<Utc>,
}

pub struct Reconciler {
    viewer: Actor,
    authoritative: WidgetDocument,
    pending: Vec<Pending>,
    view: WidgetDocument,
    needs_refresh: bool,
    next_ticket: u64,
    limits: LimitsConfig,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl Reconciler {
    #[must_use]
    pub fn new(viewer: Actor, document: WidgetDocument, limits: LimitsConfig) -> Self {
        Self {
            viewer,
            view: document.clone(),
            authoritative: document,
            pending: Vec::new(),
            needs_refresh: false,
            next_ticket: 0,
            limits,
            clock: Arc::new(SystemClock),
            timeout: Duration::seconds(DEFAULT_PENDING_TIMEOUT_SECS),
        }
    }

    /// Replace how long a pending operation waits before it expires.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub const fn viewer(&self) -> &Actor {
        &self.viewer
    }

    /// Last document received from the server.
    #[must_use]
    pub const fn authoritative(&self) -> &WidgetDocument {
        &self.authoritative
    }

    /// Authoritative copy plus optimistic pending operations.
    #[must_use]
    pub const fn view(&self) -> &WidgetDocument {
        &self.view
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Set after a response showed the local copy cannot be trusted.
    #[must_use]
    pub const fn needs_refresh(&self) -> bool {
        self.needs_refresh
    }

    /// Record an operation about to be sent and show it optimistically.
    ///
    /// An operation the local processor rejects leaves the view unchanged,
    /// but it is still tracked: the server decides.
    pub fn propose(&mut self, operation: Operation) -> (Ticket, &WidgetDocument) {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        let deadline = self.clock.now() + self.timeout;
        self.pending.push(Pending {
            ticket,
            operation,
            deadline,
        });
        self.rebuild_view();
        (ticket, &self.view)
    }

    /// Resolve a pending operation with the server's answer.
    pub fn settle(&mut self, ticket: Ticket, response: &OperationResponse) -> Receipt {
        let Some(index) = self.pending.iter().position(|p| p.ticket == ticket) else {
            tracing::debug!(?ticket, "response for unknown ticket");
            return match response {
                OperationResponse::Ok { document } => self.receive(document.clone()),
                OperationResponse::Error { .. } => Receipt::Stale,
            };
        };
        self.pending.remove(index);

        let receipt = match response {
            OperationResponse::Ok { document } => self.replace_if_newer(document),
            OperationResponse::Error { kind, message } => {
                if matches!(
                    kind,
                    RejectionKind::Closed | RejectionKind::NotFound | RejectionKind::Unavailable
                ) {
                    self.needs_refresh = true;
                }
                tracing::debug!(?ticket, ?kind, %message, "pending operation rejected");
                Receipt::Stale
            }
        };
        self.rebuild_view();
        receipt
    }

    /// Drop every pending operation whose deadline has passed and flag the
    /// session for a refresh if any did. Returns how many expired.
    pub fn expire(&mut self) -> usize {
        let now = self.clock.now();
        let before = self.pending.len();
        self.pending.retain(|p| p.deadline > now);
        let expired = before - self.pending.len();
        if expired > 0 {
            tracing::debug!(
                widget = %self.authoritative.id,
                viewer = %self.viewer.id,
                expired,
                "pending operations timed out"
            );
            self.needs_refresh = true;
            self.rebuild_view();
        }
        expired
    }

    /// Offer a broadcast document.
    pub fn receive(&mut self, document: WidgetDocument) -> Receipt {
        let receipt = self.replace_if_newer(&document);
        if receipt == Receipt::Applied {
            self.rebuild_view();
        }
        receipt
    }

    /// Adopt a freshly fetched document and forget unanswered operations.
    ///
    /// The fetched copy never moves the version backwards.
    pub fn refresh(&mut self, document: WidgetDocument) -> Receipt {
        let receipt = self.replace_if_newer(&document);
        self.pending.clear();
        self.needs_refresh = false;
        self.rebuild_view();
        receipt
    }

    fn replace_if_newer(&mut self, document: &WidgetDocument) -> Receipt {
        if document.id != self.authoritative.id || document.version <= self.authoritative.version {
            return Receipt::Stale;
        }
        self.authoritative = document.clone();
        Receipt::Applied
    }

    fn rebuild_view(&mut self) {
        let ctx = ApplyContext::new(self.clock.now(), &self.limits);
        let mut view = self.authoritative.clone();
        for pending in &self.pending {
            if let Ok(next) = processor::apply(&view, &pending.operation, &self.viewer, &ctx) {
                view = next;
            }
        }
        self.view = view;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::Rejection;
    use crate::processor::fixtures::{doc, run, user};
    use crate::model::{Setup, WidgetKind};

    fn poll() -> WidgetDocument {
        doc(WidgetKind::Poll, &Setup::poll("q", &["A", "B"]))
    }

    fn reconciler() -> Reconciler {
        Reconciler::new(user("u2"), poll(), LimitsConfig::default())
    }

    fn votes_for(document: &WidgetDocument, option: usize) -> usize {
        document.payload.as_choice().expect("choice").options[option].votes.len()
    }

    #[test]
    fn proposal_is_visible_before_ack() {
        let mut r = reconciler();
        let (_, view) = r.propose(Operation::vote_option("A"));
        assert_eq!(votes_for(view, 0), 1);
        assert_eq!(r.authoritative().version, 0);
        assert_eq!(r.pending(), 1);
    }

    #[test]
    fn ack_replaces_authoritative_copy() {
        let mut r = reconciler();
        let (ticket, _) = r.propose(Operation::vote_option("A"));
        let server = run(&poll(), &Operation::vote_option("A"), &user("u2")).expect("vote");
        let receipt = r.settle(ticket, &OperationResponse::Ok { document: server.clone() });
        assert_eq!(receipt, Receipt::Applied);
        assert_eq!(r.authoritative(), &server);
        assert_eq!(r.view(), &server);
        assert_eq!(r.pending(), 0);
    }

    #[test]
    fn rejection_rolls_back_optimistic_change() {
        let mut r = reconciler();
        let (ticket, _) = r.propose(Operation::vote_option("A"));
        r.settle(ticket, &OperationResponse::rejected(&Rejection::DuplicateVote));
        assert_eq!(r.view(), &poll());
        assert!(!r.needs_refresh());
    }

    #[test]
    fn closed_response_requests_refresh() {
        let mut r = reconciler();
        let (ticket, _) = r.propose(Operation::vote_option("A"));
        r.settle(ticket, &OperationResponse::rejected(&Rejection::Closed));
        assert!(r.needs_refresh());

        let closed = run(&poll(), &Operation::Close, &user("u1")).expect("close");
        assert_eq!(r.refresh(closed.clone()), Receipt::Applied);
        assert!(!r.needs_refresh());
        assert_eq!(r.view(), &closed);
    }

    #[test]
    fn stale_broadcast_is_ignored() {
        let mut r = reconciler();
        let v1 = run(&poll(), &Operation::vote_option("B"), &user("u3")).expect("v1");
        let v2 = run(&v1, &Operation::vote_option("B"), &user("u4")).expect("v2");
        assert_eq!(r.receive(v2.clone()), Receipt::Applied);
        assert_eq!(r.receive(v1), Receipt::Stale);
        assert_eq!(r.receive(v2.clone()), Receipt::Stale);
        assert_eq!(r.authoritative(), &v2);
    }

    #[test]
    fn pending_ops_reapply_over_newer_broadcast() {
        let mut r = reconciler();
        r.propose(Operation::vote_option("A"));
        let other = run(&poll(), &Operation::vote_option("B"), &user("u3")).expect("other");
        r.receive(other);
        assert_eq!(votes_for(r.view(), 0), 1);
        assert_eq!(votes_for(r.view(), 1), 1);
        assert_eq!(r.view().version, 2);
    }

    #[test]
    fn unanswered_proposal_expires_and_requests_refresh() {
        let clock = Arc::new(ManualClock::default());
        let mut r = reconciler()
            .with_clock(clock.clone())
            .with_timeout(Duration::seconds(5));
        let (ticket, _) = r.propose(Operation::vote_option("A"));

        clock.advance(Duration::seconds(4));
        assert_eq!(r.expire(), 0);
        assert_eq!(votes_for(r.view(), 0), 1);
        assert!(!r.needs_refresh());

        clock.advance(Duration::seconds(1));
        assert_eq!(r.expire(), 1);
        assert_eq!(r.pending(), 0);
        assert_eq!(r.view(), &poll());
        assert!(r.needs_refresh());

        let server = run(&poll(), &Operation::vote_option("A"), &user("u2")).expect("vote");
        let late = r.settle(ticket, &OperationResponse::Ok { document: server.clone() });
        assert_eq!(late, Receipt::Applied);
        assert_eq!(r.view(), &server);
    }

    #[test]
    fn expired_add_is_not_shown_twice() {
        let d = doc(WidgetKind::Brainstorm, &Setup::board("Ideas"));
        let clock = Arc::new(ManualClock::default());
        let mut r = Reconciler::new(user("u2"), d.clone(), LimitsConfig::default())
            .with_clock(clock.clone());
        r.propose(Operation::add_text("idea"));
        let committed = run(&d, &Operation::add_text("idea"), &user("u2")).expect("add");
        r.receive(committed.clone());
        assert_eq!(r.view().payload.as_board().expect("board").items.len(), 2);

        clock.advance(Duration::seconds(DEFAULT_PENDING_TIMEOUT_SECS));
        assert_eq!(r.expire(), 1);
        assert_eq!(r.view(), &committed);
    }

    #[test]
    fn locally_rejected_proposal_changes_nothing() {
        let mut r = reconciler();
        let (_, view) = r.propose(Operation::Close);
        assert_eq!(view, &poll());
        assert_eq!(r.pending(), 1);
    }
}
