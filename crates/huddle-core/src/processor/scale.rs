//! Scale votes: confidence vote, team health, NPS.

use super::{Step, unsupported};
use crate::error::Rejection;
use crate::model::payload::{ScalePayload, ScoreEntry};
use crate::model::{Choice, Operation};

pub(super) fn validate(payload: &ScalePayload, operation: &Operation) -> Result<(), Rejection> {
    match operation {
        Operation::Vote {
            choice: Choice::Score(value),
        } => {
            if (payload.min..=payload.max).contains(value) {
                Ok(())
            } else {
                Err(Rejection::invalid(format!(
                    "score {value} outside {}..={}",
                    payload.min, payload.max
                )))
            }
        }
        Operation::Vote { .. } => Err(Rejection::invalid("vote expects a score")),
        other => Err(unsupported(other)),
    }
}

pub(super) fn apply(
    payload: &mut ScalePayload,
    operation: &Operation,
    step: &Step<'_>,
) -> Result<(), Rejection> {
    let Operation::Vote {
        choice: Choice::Score(value),
    } = operation
    else {
        return Err(unsupported(operation));
    };
    if payload.has_voted(&step.actor.id) {
        return Err(Rejection::DuplicateVote);
    }
    payload.votes.push(ScoreEntry {
        voter_id: step.actor.id.clone(),
        value: *value,
    });
    Ok(())
}
