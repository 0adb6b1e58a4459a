//! Ranked choice ballots.

use std::collections::HashSet;

use super::{Step, unsupported};
use crate::error::Rejection;
use crate::model::payload::{Ballot, RankingPayload};
use crate::model::{Choice, Operation};

pub(super) fn validate(payload: &RankingPayload, operation: &Operation) -> Result<(), Rejection> {
    match operation {
        Operation::Vote {
            choice: Choice::Ranking(order),
        } => {
            if order.is_empty() {
                return Err(Rejection::invalid("ranking must name at least one option"));
            }
            let mut seen = HashSet::with_capacity(order.len());
            for id in order {
                if !payload.options.iter().any(|o| &o.id == id) {
                    return Err(Rejection::invalid(format!("unknown option '{id}'")));
                }
                if !seen.insert(id.as_str()) {
                    return Err(Rejection::invalid(format!("option '{id}' ranked twice")));
                }
            }
            Ok(())
        }
        Operation::Vote { .. } => Err(Rejection::invalid("vote expects a ranking")),
        other => Err(unsupported(other)),
    }
}

pub(super) fn apply(
    payload: &mut RankingPayload,
    operation: &Operation,
    step: &Step<'_>,
) -> Result<(), Rejection> {
    let Operation::Vote {
        choice: Choice::Ranking(order),
    } = operation
    else {
        return Err(unsupported(operation));
    };
    if payload.has_ballot(&step.actor.id) {
        return Err(Rejection::DuplicateVote);
    }
    payload.ballots.push(Ballot {
        voter_id: step.actor.id.clone(),
        order: order.clone(),
    });
    Ok(())
}
