//! Widget schema registry.
//!
//! A pure lookup table from [`WidgetKind`] to the rules that apply to it:
//! payload shape, allowed operations, who may close, whether votes stay
//! hidden until reveal. New kinds are added here, not in the processor.

use crate::config::LimitsConfig;
use crate::error::Rejection;
use crate::model::OperationKind::{
    AddItem, AdvanceRound, Close, DeleteItem, Join, Reveal, ToggleComplete, ToggleVote, Vote,
};
use crate::model::payload::{
    BoardPayload, ChoicePayload, Column, RankOption, RankingPayload, RoundsPayload, ScalePayload,
    TaskPayload, VoteOption,
};
use crate::model::{OperationKind, Payload, PayloadShape, Setup, WidgetKind};

/// Who may move a widget to its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseAuthority {
    /// Only `created_by`.
    Creator,
    /// Any participant of the conversation.
    AnyParticipant,
}

/// Rules applicable to one widget kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WidgetSchema {
    pub kind: WidgetKind,
    pub shape: PayloadShape,
    pub operations: &'static [OperationKind],
    pub close_authority: CloseAuthority,
    /// Per-voter choices stay hidden until the creator reveals them.
    pub hides_votes: bool,
    /// A voter may appear in at most one option's vote list.
    pub single_choice: bool,
}

impl WidgetSchema {
    #[must_use]
    pub fn allows(&self, operation: OperationKind) -> bool {
        self.operations.contains(&operation)
    }
}

const CHOICE_OPS: &[OperationKind] = &[Vote, Close];
const HIDDEN_CHOICE_OPS: &[OperationKind] = &[Vote, Reveal, Close];
const BOARD_OPS: &[OperationKind] = &[AddItem, ToggleVote, DeleteItem, Close];
const TASK_OPS: &[OperationKind] = &[AddItem, DeleteItem, ToggleComplete, Close];
const SCALE_OPS: &[OperationKind] = &[Vote, Close];
const ROUND_OPS: &[OperationKind] = &[Join, AddItem, DeleteItem, AdvanceRound, Close];

const fn schema_for(
    kind: WidgetKind,
    operations: &'static [OperationKind],
    close_authority: CloseAuthority,
    hides_votes: bool,
    single_choice: bool,
) -> WidgetSchema {
    WidgetSchema {
        kind,
        shape: kind.shape(),
        operations,
        close_authority,
        hides_votes,
        single_choice,
    }
}

static SCHEMAS: [WidgetSchema; 14] = [
    schema_for(WidgetKind::Poll, CHOICE_OPS, CloseAuthority::Creator, false, true),
    schema_for(WidgetKind::BlindVote, HIDDEN_CHOICE_OPS, CloseAuthority::Creator, true, true),
    schema_for(WidgetKind::RomanVoting, HIDDEN_CHOICE_OPS, CloseAuthority::Creator, true, true),
    schema_for(WidgetKind::Brainstorm, BOARD_OPS, CloseAuthority::Creator, false, false),
    schema_for(WidgetKind::RetrospectiveBoard, BOARD_OPS, CloseAuthority::Creator, false, false),
    schema_for(WidgetKind::LeanCanvas, BOARD_OPS, CloseAuthority::Creator, false, false),
    schema_for(WidgetKind::OpportunityTree, BOARD_OPS, CloseAuthority::Creator, false, false),
    schema_for(WidgetKind::ActionItems, TASK_OPS, CloseAuthority::Creator, false, false),
    schema_for(WidgetKind::Checklist, TASK_OPS, CloseAuthority::AnyParticipant, false, false),
    schema_for(WidgetKind::ConfidenceVote, SCALE_OPS, CloseAuthority::Creator, false, false),
    schema_for(WidgetKind::TeamHealth, SCALE_OPS, CloseAuthority::Creator, false, false),
    schema_for(WidgetKind::Nps, SCALE_OPS, CloseAuthority::Creator, false, false),
    schema_for(WidgetKind::RankedChoice, SCALE_OPS, CloseAuthority::Creator, false, false),
    schema_for(WidgetKind::Brainwriting, ROUND_OPS, CloseAuthority::Creator, false, false),
];

/// Look up the schema of a kind.
#[must_use]
pub fn schema(kind: WidgetKind) -> &'static WidgetSchema {
    let index = WidgetKind::ALL
        .iter()
        .position(|k| *k == kind)
        .unwrap_or_default();
    &SCHEMAS[index]
}

/// All registered schemas in catalogue order.
#[must_use]
pub fn schemas() -> &'static [WidgetSchema] {
    &SCHEMAS
}

// ---------------------------------------------------------------------------
// Fixed layouts
// ---------------------------------------------------------------------------

const ROMAN_OPTIONS: [(&str, &str); 3] = [
    ("up", "Thumbs up"),
    ("sideways", "Sideways"),
    ("down", "Thumbs down"),
];

const RETRO_COLUMNS: [(&str, &str); 3] = [
    ("went-well", "Went well"),
    ("to-improve", "To improve"),
    ("actions", "Action items"),
];

const LEAN_CANVAS_SECTIONS: [(&str, &str); 9] = [
    ("problem", "Problem"),
    ("customer-segments", "Customer segments"),
    ("unique-value-proposition", "Unique value proposition"),
    ("solution", "Solution"),
    ("channels", "Channels"),
    ("revenue-streams", "Revenue streams"),
    ("cost-structure", "Cost structure"),
    ("key-metrics", "Key metrics"),
    ("unfair-advantage", "Unfair advantage"),
];

/// Tree levels, root first. An item at level `n > 0` must have a parent at `n - 1`.
pub const OPPORTUNITY_LEVELS: [(&str, &str); 4] = [
    ("outcome", "Desired outcome"),
    ("opportunity", "Opportunity"),
    ("solution", "Solution"),
    ("experiment", "Experiment"),
];

const DEFAULT_BRAINSTORM_COLUMN: (&str, &str) = ("ideas", "Ideas");

/// Inclusive scale bounds for scale kinds.
#[must_use]
pub const fn scale_bounds(kind: WidgetKind) -> Option<(i64, i64)> {
    match kind {
        WidgetKind::ConfidenceVote | WidgetKind::TeamHealth => Some((1, 5)),
        WidgetKind::Nps => Some((0, 10)),
        _ => None,
    }
}

fn fixed_columns(pairs: &[(&str, &str)]) -> Vec<Column> {
    pairs
        .iter()
        .map(|(id, title)| Column {
            id: (*id).to_string(),
            title: (*title).to_string(),
        })
        .collect()
}

/// Lowercase, dash-separated identifier derived from a display title.
#[must_use]
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for ch in title.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

// ---------------------------------------------------------------------------
// Initial payload
// ---------------------------------------------------------------------------

/// Build the initial payload for a new widget of `kind`.
///
/// # Errors
///
/// Returns [`Rejection::InvalidArgument`] when the setup does not match the
/// kind's shape or violates structural limits.
pub fn initial_payload(
    kind: WidgetKind,
    setup: &Setup,
    limits: &LimitsConfig,
) -> Result<Payload, Rejection> {
    let payload = match (kind.shape(), setup) {
        (PayloadShape::Choice, Setup::Choice { question, options }) => {
            check_text("question", question, limits)?;
            let options = if kind == WidgetKind::RomanVoting {
                if !options.is_empty() {
                    return Err(Rejection::invalid("roman voting options are fixed"));
                }
                ROMAN_OPTIONS
                    .iter()
                    .map(|(id, label)| VoteOption {
                        id: (*id).to_string(),
                        label: (*label).to_string(),
                        votes: Vec::new(),
                    })
                    .collect()
            } else {
                check_options(options, limits)?;
                options
                    .iter()
                    .map(|label| VoteOption {
                        id: label.trim().to_string(),
                        label: label.trim().to_string(),
                        votes: Vec::new(),
                    })
                    .collect()
            };
            Payload::Choice(ChoicePayload {
                question: question.trim().to_string(),
                options,
            })
        }
        (
            PayloadShape::Board,
            Setup::Board {
                prompt,
                columns,
                max_votes_per_participant,
            },
        ) => {
            check_text("prompt", prompt, limits)?;
            let columns = board_columns(kind, columns, limits)?;
            Payload::Board(BoardPayload {
                prompt: prompt.trim().to_string(),
                columns,
                items: Vec::new(),
                max_votes_per_participant: max_votes_per_participant
                    .or(limits.default_votes_per_participant),
            })
        }
        (PayloadShape::Tasks, Setup::Tasks { title }) => {
            check_text("title", title, limits)?;
            Payload::Tasks(TaskPayload {
                title: title.trim().to_string(),
                items: Vec::new(),
            })
        }
        (PayloadShape::Scale, Setup::Scale { question }) => {
            check_text("question", question, limits)?;
            let (min, max) = scale_bounds(kind)
                .ok_or_else(|| Rejection::invalid(format!("{kind} has no scale bounds")))?;
            Payload::Scale(ScalePayload {
                question: question.trim().to_string(),
                min,
                max,
                votes: Vec::new(),
            })
        }
        (PayloadShape::Ranking, Setup::Ranking { question, options }) => {
            check_text("question", question, limits)?;
            check_options(options, limits)?;
            Payload::Ranking(RankingPayload {
                question: question.trim().to_string(),
                options: options
                    .iter()
                    .map(|label| RankOption {
                        id: label.trim().to_string(),
                        label: label.trim().to_string(),
                    })
                    .collect(),
                ballots: Vec::new(),
            })
        }
        (
            PayloadShape::Rounds,
            Setup::Rounds {
                prompt,
                items_per_round,
                total_rounds,
                round_seconds,
            },
        ) => {
            check_text("prompt", prompt, limits)?;
            if *items_per_round == 0 || *total_rounds == 0 {
                return Err(Rejection::invalid(
                    "items_per_round and total_rounds must be positive",
                ));
            }
            Payload::Rounds(RoundsPayload {
                prompt: prompt.trim().to_string(),
                items_per_round: *items_per_round,
                total_rounds: *total_rounds,
                round_seconds: *round_seconds,
                round: 0,
                round_started_at: None,
                participants: Vec::new(),
                items: Vec::new(),
            })
        }
        (shape, _) => {
            return Err(Rejection::invalid(format!(
                "{kind} expects a {shape} setup"
            )));
        }
    };

    Ok(payload)
}

fn board_columns(
    kind: WidgetKind,
    custom: &[String],
    limits: &LimitsConfig,
) -> Result<Vec<Column>, Rejection> {
    if kind != WidgetKind::Brainstorm && !custom.is_empty() {
        return Err(Rejection::invalid(format!("{kind} columns are fixed")));
    }

    let columns = match kind {
        WidgetKind::RetrospectiveBoard => fixed_columns(&RETRO_COLUMNS),
        WidgetKind::LeanCanvas => fixed_columns(&LEAN_CANVAS_SECTIONS),
        WidgetKind::OpportunityTree => fixed_columns(&OPPORTUNITY_LEVELS),
        _ if custom.is_empty() => fixed_columns(&[DEFAULT_BRAINSTORM_COLUMN]),
        _ => {
            if custom.len() > limits.max_options {
                return Err(Rejection::invalid(format!(
                    "at most {} columns allowed",
                    limits.max_options
                )));
            }
            let mut columns: Vec<Column> = Vec::with_capacity(custom.len());
            for title in custom {
                let id = slugify(title);
                if id.is_empty() {
                    return Err(Rejection::invalid("column titles must not be empty"));
                }
                if columns.iter().any(|c| c.id == id) {
                    return Err(Rejection::invalid(format!("duplicate column '{id}'")));
                }
                columns.push(Column {
                    id,
                    title: title.trim().to_string(),
                });
            }
            columns
        }
    };

    Ok(columns)
}

fn check_options(options: &[String], limits: &LimitsConfig) -> Result<(), Rejection> {
    if options.len() < 2 {
        return Err(Rejection::invalid("at least two options are required"));
    }
    if options.len() > limits.max_options {
        return Err(Rejection::invalid(format!(
            "at most {} options allowed",
            limits.max_options
        )));
    }
    for (index, option) in options.iter().enumerate() {
        check_text("option", option, limits)?;
        if options[..index].iter().any(|o| o.trim() == option.trim()) {
            return Err(Rejection::invalid(format!(
                "duplicate option '{}'",
                option.trim()
            )));
        }
    }
    Ok(())
}

/// Reject empty or oversized free text.
///
/// # Errors
///
/// Returns [`Rejection::InvalidArgument`] naming the offending field.
pub fn check_text(field: &str, text: &str, limits: &LimitsConfig) -> Result<(), Rejection> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Rejection::invalid(format!("{field} must not be empty")));
    }
    if trimmed.chars().count() > limits.max_text_len {
        return Err(Rejection::invalid(format!(
            "{field} exceeds {} characters",
            limits.max_text_len
        )));
    }
    Ok(())
}
