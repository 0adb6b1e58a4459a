//! Mutation processor.
//!
//! [`apply`] is a pure function from `(document, operation, actor)` to the
//! next document or a [`Rejection`]. It never touches storage; the store
//! runs it inside its atomic update so the transform always sees the latest
//! stored value.
//!
//! # Check order
//!
//! 1. **Structure**: the kind supports the operation, required fields are
//!    present, referenced options/items/columns exist, text is within limits.
//! 2. **Lifecycle**: [`guard::check`] for closed state and creator authority.
//! 3. **Business rules**: per-category handler (one-shot votes, vote
//!    budgets, round caps, authorship).
//!
//! On success the version grows by one and the summary is recomputed.

mod board;
mod choice;
mod ranking;
mod rounds;
mod scale;
mod tasks;

use chrono::{DateTime, Utc};

use crate::aggregate;
use crate::config::LimitsConfig;
use crate::error::Rejection;
use crate::guard;
use crate::model::payload::FreeformEntry;
use crate::model::{Actor, ItemId, Operation, Payload, WidgetDocument, WidgetId};
use crate::registry::{self, WidgetSchema};

/// Ambient inputs for one application.
#[derive(Debug, Clone, Copy)]
pub struct ApplyContext<'a> {
    pub now: DateTime<Utc>,
    pub limits: &'a LimitsConfig,
}

impl<'a> ApplyContext<'a> {
    #[must_use]
    pub const fn new(now: DateTime<Utc>, limits: &'a LimitsConfig) -> Self {
        Self { now, limits }
    }
}

/// Everything a category handler needs besides its payload.
pub(crate) struct Step<'a> {
    pub widget: &'a WidgetId,
    pub next_version: u64,
    pub schema: &'static WidgetSchema,
    pub actor: &'a Actor,
    pub now: DateTime<Utc>,
}

impl Step<'_> {
    /// Build the common fields of a new freeform contribution.
    pub fn entry(&self, text: &str) -> FreeformEntry {
        let text = text.trim();
        FreeformEntry {
            id: ItemId::derive(self.widget, self.next_version, &self.actor.id, text),
            text: text.to_string(),
            author_id: self.actor.id.clone(),
            author_name: self.actor.name.clone(),
            created_at: self.now,
        }
    }

    /// Authors may delete their own entries; facilitators may delete any.
    pub fn ensure_may_delete(&self, entry: &FreeformEntry) -> Result<(), Rejection> {
        if entry.author_id == self.actor.id || self.actor.is_privileged() {
            Ok(())
        } else {
            Err(Rejection::Forbidden {
                action: "delete another participant's item",
            })
        }
    }
}

/// Apply one operation to one document.
///
/// # Errors
///
/// Returns the [`Rejection`] describing why the operation was not applied.
/// The input document is never modified.
pub fn apply(
    document: &WidgetDocument,
    operation: &Operation,
    actor: &Actor,
    ctx: &ApplyContext<'_>,
) -> Result<WidgetDocument, Rejection> {
    let schema = registry::schema(document.kind);

    validate(document, schema, operation, ctx.limits)?;
    guard::check(document, schema, operation.kind(), actor)?;

    let mut next = document.clone();
    next.version = document.version.saturating_add(1);

    match operation {
        Operation::Reveal => guard::reveal(&mut next),
        Operation::Close => guard::close(&mut next),
        _ => {
            let step = Step {
                widget: &document.id,
                next_version: next.version,
                schema,
                actor,
                now: ctx.now,
            };
            match &mut next.payload {
                Payload::Choice(payload) => choice::apply(payload, operation, &step)?,
                Payload::Board(payload) => board::apply(payload, operation, &step)?,
                Payload::Tasks(payload) => tasks::apply(payload, operation, &step)?,
                Payload::Scale(payload) => scale::apply(payload, operation, &step)?,
                Payload::Ranking(payload) => ranking::apply(payload, operation, &step)?,
                Payload::Rounds(payload) => rounds::apply(payload, operation, &step)?,
            }
        }
    }

    next.summary = aggregate::summarize(next.kind, &next.payload, next.votes_hidden());
    Ok(next)
}

/// Structural validation, independent of lifecycle state and actor.
///
/// # Errors
///
/// Returns [`Rejection::InvalidArgument`] for unsupported operations,
/// missing fields or dangling references.
pub fn validate(
    document: &WidgetDocument,
    schema: &WidgetSchema,
    operation: &Operation,
    limits: &LimitsConfig,
) -> Result<(), Rejection> {
    if !schema.allows(operation.kind()) {
        return Err(Rejection::invalid(format!(
            "{} does not support {}",
            document.kind,
            operation.kind()
        )));
    }

    if document.payload.shape() != schema.shape {
        return Err(Rejection::invalid(format!(
            "{} document carries a {} payload",
            document.kind,
            document.payload.shape()
        )));
    }

    if matches!(operation, Operation::Reveal | Operation::Close) {
        return Ok(());
    }

    match &document.payload {
        Payload::Choice(payload) => choice::validate(payload, operation),
        Payload::Board(payload) => board::validate(document.kind, payload, operation, limits),
        Payload::Tasks(payload) => tasks::validate(payload, operation, limits),
        Payload::Scale(payload) => scale::validate(payload, operation),
        Payload::Ranking(payload) => ranking::validate(payload, operation),
        Payload::Rounds(payload) => rounds::validate(payload, operation, limits),
    }
}

/// Rejection for an operation a handler does not implement. Unreachable
/// when the registry and handlers agree.
fn unsupported(operation: &Operation) -> Rejection {
    Rejection::invalid(format!("unsupported operation {}", operation.kind()))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::model::{ActorId, ChannelKey, Setup, WidgetKind};

    pub fn limits() -> LimitsConfig {
        LimitsConfig::default()
    }

    pub fn now() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    pub fn doc(kind: WidgetKind, setup: &Setup) -> WidgetDocument {
        let schema = registry::schema(kind);
        let payload = registry::initial_payload(kind, setup, &limits()).expect("valid setup");
        let revealed = schema.hides_votes.then_some(false);
        let summary = aggregate::summarize(kind, &payload, matches!(revealed, Some(false)));
        WidgetDocument {
            id: WidgetId::from("wd-test"),
            kind,
            channel: ChannelKey::from("conv-1"),
            created_by: ActorId::from("u1"),
            created_at: now(),
            closed: false,
            revealed,
            version: 0,
            payload,
            summary,
        }
    }

    pub fn run(
        document: &WidgetDocument,
        operation: &Operation,
        actor: &Actor,
    ) -> Result<WidgetDocument, Rejection> {
        let limits = limits();
        apply(document, operation, actor, &ApplyContext::new(now(), &limits))
    }

    pub fn user(id: &str) -> Actor {
        Actor::member(id, id.to_uppercase())
    }
}
