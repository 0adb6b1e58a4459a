//! Multi-round brainwriting.
//!
//! Round 0 gathers participants. The creator starts round 1 and every later
//! round with `advance_round`; each participant may submit up to
//! `items_per_round` items per round, optionally building on an item from an
//! earlier round. Adding an item joins the author implicitly.

use super::{Step, unsupported};
use crate::aggregate;
use crate::config::LimitsConfig;
use crate::error::Rejection;
use crate::model::payload::{Participant, RoundItem, RoundsPayload};
use crate::model::{ItemId, Operation};
use crate::registry::check_text;

pub(super) fn validate(
    payload: &RoundsPayload,
    operation: &Operation,
    limits: &LimitsConfig,
) -> Result<(), Rejection> {
    match operation {
        Operation::Join | Operation::AdvanceRound => Ok(()),
        Operation::AddItem {
            target,
            text,
            attrs,
        } => {
            check_text("text", text, limits)?;
            if target.is_some() {
                return Err(Rejection::invalid("brainwriting has no columns"));
            }
            if attrs.parent_id.is_some() || attrs.assigned_to.is_some() || attrs.due_date.is_some()
            {
                return Err(Rejection::invalid(
                    "brainwriting items only take builds_on",
                ));
            }
            if payload.items.len() >= limits.max_items {
                return Err(Rejection::invalid(format!(
                    "session already holds {} items",
                    limits.max_items
                )));
            }
            if let Some(base) = &attrs.builds_on {
                existing(payload, base)?;
            }
            Ok(())
        }
        Operation::DeleteItem { item_id } => existing(payload, item_id).map(|_| ()),
        other => Err(unsupported(other)),
    }
}

fn existing<'a>(payload: &'a RoundsPayload, item_id: &ItemId) -> Result<&'a RoundItem, Rejection> {
    payload
        .item(item_id)
        .ok_or_else(|| Rejection::invalid(format!("unknown item '{item_id}'")))
}

pub(super) fn apply(
    payload: &mut RoundsPayload,
    operation: &Operation,
    step: &Step<'_>,
) -> Result<(), Rejection> {
    match operation {
        Operation::Join => {
            if payload.participant(&step.actor.id).is_some() {
                return Err(Rejection::invalid("already joined"));
            }
            join(payload, step);
            Ok(())
        }
        Operation::AddItem { text, attrs, .. } => {
            if payload.round == 0 {
                return Err(Rejection::invalid("the first round has not started"));
            }
            if let Some(base) = &attrs.builds_on
                && existing(payload, base)?.round >= payload.round
            {
                return Err(Rejection::invalid(
                    "builds_on must reference an earlier round",
                ));
            }
            let cap = usize::try_from(payload.items_per_round).unwrap_or(usize::MAX);
            if payload.submitted(&step.actor.id, payload.round) >= cap {
                return Err(Rejection::invalid(format!(
                    "at most {cap} items per round"
                )));
            }
            if payload.participant(&step.actor.id).is_none() {
                join(payload, step);
            }
            payload.items.push(RoundItem {
                entry: step.entry(text),
                round: payload.round,
                builds_on: attrs.builds_on.clone(),
            });
            Ok(())
        }
        Operation::DeleteItem { item_id } => {
            let item = existing(payload, item_id)?;
            step.ensure_may_delete(&item.entry)?;
            if item.round != payload.round {
                return Err(Rejection::invalid("items of finished rounds are kept"));
            }
            payload.items.retain(|item| &item.entry.id != item_id);
            Ok(())
        }
        Operation::AdvanceRound => {
            if payload.round >= payload.total_rounds {
                return Err(Rejection::invalid(format!(
                    "all {} rounds already ran",
                    payload.total_rounds
                )));
            }
            if payload.round > 0 && !aggregate::round_complete(payload, payload.round) {
                tracing::debug!(
                    widget = %step.widget,
                    round = payload.round,
                    waiting = aggregate::waiting_on(payload, payload.round).len(),
                    "advancing before every participant submitted"
                );
            }
            payload.round += 1;
            payload.round_started_at = Some(step.now);
            Ok(())
        }
        other => Err(unsupported(other)),
    }
}

fn join(payload: &mut RoundsPayload, step: &Step<'_>) {
    payload.participants.push(Participant {
        id: step.actor.id.clone(),
        name: step.actor.name.clone(),
        joined_round: payload.round,
    });
}
