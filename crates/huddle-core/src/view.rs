//! Per-viewer visibility.

use crate::model::{ActorId, Payload, WidgetDocument};

/// The copy of `document` that `viewer` may see.
///
/// Before reveal, a vote-hiding widget shows each viewer only their own
/// vote; the summary already carries nothing but the total. Everything else
/// passes through unchanged.
#[must_use]
pub fn redact_for(document: &WidgetDocument, viewer: &ActorId) -> WidgetDocument {
    let mut visible = document.clone();
    if !document.votes_hidden() {
        return visible;
    }
    if let Payload::Choice(choice) = &mut visible.payload {
        for option in &mut choice.options {
            option.votes.retain(|vote| &vote.voter_id == viewer);
        }
    }
    visible
}
