//! Freeform boards: brainstorm, retrospective, lean canvas, opportunity tree.
//!
//! Items live in one column each. Opportunity trees use the columns as tree
//! levels: an item at level `n > 0` names a parent at level `n - 1`, and
//! deleting a node removes its whole subtree. Every item in that subtree
//! must be deletable by the actor, or nothing is removed.

use std::collections::HashSet;

use super::{Step, unsupported};
use crate::config::LimitsConfig;
use crate::error::Rejection;
use crate::model::payload::{BoardItem, BoardPayload};
use crate::model::{ItemAttrs, ItemId, Operation, WidgetKind};
use crate::registry::check_text;

pub(super) fn validate(
    kind: WidgetKind,
    payload: &BoardPayload,
    operation: &Operation,
    limits: &LimitsConfig,
) -> Result<(), Rejection> {
    match operation {
        Operation::AddItem {
            target,
            text,
            attrs,
        } => {
            check_text("text", text, limits)?;
            if payload.items.len() >= limits.max_items {
                return Err(Rejection::invalid(format!(
                    "board already holds {} items",
                    limits.max_items
                )));
            }
            if attrs.assigned_to.is_some() || attrs.due_date.is_some() || attrs.builds_on.is_some()
            {
                return Err(Rejection::invalid(
                    "board items take no assignee, due date or builds_on",
                ));
            }
            let level = target_column(payload, target.as_deref())?;
            check_parent(kind, payload, level, attrs)
        }
        Operation::ToggleVote { item_id } | Operation::DeleteItem { item_id } => {
            existing(payload, item_id).map(|_| ())
        }
        other => Err(unsupported(other)),
    }
}

fn target_column(payload: &BoardPayload, target: Option<&str>) -> Result<usize, Rejection> {
    match target {
        None if payload.columns.is_empty() => Err(Rejection::invalid("board has no columns")),
        None => Ok(0),
        Some(column) => payload
            .column_index(column)
            .ok_or_else(|| Rejection::invalid(format!("unknown column '{column}'"))),
    }
}

fn check_parent(
    kind: WidgetKind,
    payload: &BoardPayload,
    level: usize,
    attrs: &ItemAttrs,
) -> Result<(), Rejection> {
    if kind != WidgetKind::OpportunityTree {
        return match attrs.parent_id {
            Some(_) => Err(Rejection::invalid(format!("{kind} items have no parent"))),
            None => Ok(()),
        };
    }

    match (&attrs.parent_id, level) {
        (None, 0) => Ok(()),
        (Some(_), 0) => Err(Rejection::invalid("root level items have no parent")),
        (None, _) => Err(Rejection::invalid("this level requires a parent_id")),
        (Some(parent), level) => {
            let parent = existing(payload, parent)?;
            if payload.column_index(&parent.column) == Some(level - 1) {
                Ok(())
            } else {
                Err(Rejection::invalid(format!(
                    "parent must sit at level '{}'",
                    payload.columns[level - 1].id
                )))
            }
        }
    }
}

fn existing<'a>(payload: &'a BoardPayload, item_id: &ItemId) -> Result<&'a BoardItem, Rejection> {
    payload
        .item(item_id)
        .ok_or_else(|| Rejection::invalid(format!("unknown item '{item_id}'")))
}

pub(super) fn apply(
    payload: &mut BoardPayload,
    operation: &Operation,
    step: &Step<'_>,
) -> Result<(), Rejection> {
    match operation {
        Operation::AddItem {
            target,
            text,
            attrs,
        } => {
            let level = target_column(payload, target.as_deref())?;
            let column = payload.columns[level].id.clone();
            payload.items.push(BoardItem {
                entry: step.entry(text),
                column,
                parent_id: attrs.parent_id.clone(),
                votes: Vec::new(),
            });
            Ok(())
        }
        Operation::ToggleVote { item_id } => toggle_vote(payload, item_id, step),
        Operation::DeleteItem { item_id } => {
            existing(payload, item_id)?;
            let doomed = subtree(payload, item_id);
            for item in payload.items.iter().filter(|i| doomed.contains(&i.entry.id)) {
                step.ensure_may_delete(&item.entry)?;
            }
            payload.items.retain(|item| !doomed.contains(&item.entry.id));
            Ok(())
        }
        other => Err(unsupported(other)),
    }
}

fn toggle_vote(
    payload: &mut BoardPayload,
    item_id: &ItemId,
    step: &Step<'_>,
) -> Result<(), Rejection> {
    let voter = &step.actor.id;
    let already = existing(payload, item_id)?.votes.contains(voter);

    if !already
        && let Some(budget) = payload.max_votes_per_participant
        && payload.votes_by(voter) >= budget as usize
    {
        return Err(Rejection::invalid(format!(
            "vote budget of {budget} already used"
        )));
    }

    let item = payload
        .items
        .iter_mut()
        .find(|item| &item.entry.id == item_id)
        .ok_or_else(|| Rejection::invalid(format!("unknown item '{item_id}'")))?;
    // Votes stay sorted so that a toggle round trip restores the payload.
    match item.votes.binary_search(voter) {
        Ok(index) => {
            item.votes.remove(index);
        }
        Err(index) => item.votes.insert(index, voter.clone()),
    }
    Ok(())
}

/// The item and every descendant through `parent_id`.
fn subtree(payload: &BoardPayload, root: &ItemId) -> HashSet<ItemId> {
    let mut doomed = HashSet::from([root.clone()]);
    loop {
        let before = doomed.len();
        for item in &payload.items {
            if let Some(parent) = &item.parent_id
                && doomed.contains(parent)
            {
                doomed.insert(item.entry.id.clone());
            }
        }
        if doomed.len() == before {
            return doomed;
        }
    }
}
