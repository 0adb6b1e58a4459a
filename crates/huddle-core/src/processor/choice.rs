//! Single-choice voting: poll, blind vote, roman voting.

use super::{Step, unsupported};
use crate::error::Rejection;
use crate::model::payload::{ChoicePayload, VoteEntry};
use crate::model::{Choice, Operation};

pub(super) fn validate(payload: &ChoicePayload, operation: &Operation) -> Result<(), Rejection> {
    match operation {
        Operation::Vote {
            choice: Choice::Option(option),
        } => {
            if payload.options.iter().any(|o| &o.id == option) {
                Ok(())
            } else {
                Err(Rejection::invalid(format!("unknown option '{option}'")))
            }
        }
        Operation::Vote { .. } => Err(Rejection::invalid("vote expects an option choice")),
        other => Err(unsupported(other)),
    }
}

pub(super) fn apply(
    payload: &mut ChoicePayload,
    operation: &Operation,
    step: &Step<'_>,
) -> Result<(), Rejection> {
    let Operation::Vote {
        choice: Choice::Option(option),
    } = operation
    else {
        return Err(unsupported(operation));
    };

    let voter = &step.actor.id;
    if step.schema.single_choice && payload.option_of(voter).is_some() {
        return Err(Rejection::DuplicateVote);
    }

    let target = payload
        .options
        .iter_mut()
        .find(|o| &o.id == option)
        .ok_or_else(|| Rejection::invalid(format!("unknown option '{option}'")))?;
    if target.votes.iter().any(|v| &v.voter_id == voter) {
        return Err(Rejection::DuplicateVote);
    }
    target.votes.push(VoteEntry {
        voter_id: voter.clone(),
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{doc, run, user};
    use crate::error::Rejection;
    use crate::model::{Choice, Operation, Setup, WidgetKind};

    fn poll() -> crate::model::WidgetDocument {
        doc(WidgetKind::Poll, &Setup::poll("Lunch?", &["A", "B", "C"]))
    }

    #[test]
    fn vote_is_recorded_under_option() {
        let next = run(&poll(), &Operation::vote_option("B"), &user("u2")).expect("vote");
        let choice = next.payload.as_choice().expect("choice");
        assert_eq!(choice.options[1].votes.len(), 1);
        assert_eq!(choice.options[1].votes[0].voter_id.as_str(), "u2");
    }

    #[test]
    fn second_vote_by_same_voter_is_duplicate() {
        let once = run(&poll(), &Operation::vote_option("A"), &user("u2")).expect("vote");
        assert_eq!(
            run(&once, &Operation::vote_option("C"), &user("u2")),
            Err(Rejection::DuplicateVote)
        );
        assert_eq!(
            run(&once, &Operation::vote_option("A"), &user("u2")),
            Err(Rejection::DuplicateVote)
        );
    }

    #[test]
    fn unknown_option_is_invalid() {
        assert!(matches!(
            run(&poll(), &Operation::vote_option("Z"), &user("u2")),
            Err(Rejection::InvalidArgument(_))
        ));
    }

    #[test]
    fn score_choice_is_invalid_for_polls() {
        let op = Operation::Vote {
            choice: Choice::Score(3),
        };
        assert!(matches!(
            run(&poll(), &op, &user("u2")),
            Err(Rejection::InvalidArgument(_))
        ));
    }

    #[test]
    fn roman_voting_uses_fixed_ids() {
        let d = doc(WidgetKind::RomanVoting, &Setup::poll("Ship it?", &[]));
        let next = run(&d, &Operation::vote_option("sideways"), &user("u3")).expect("vote");
        assert_eq!(next.version, 1);
        assert_eq!(next.revealed, Some(false));
    }
}
