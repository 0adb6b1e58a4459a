//! Aggregation helpers: pure functions over payloads.
//!
//! The processor recomputes a [`Summary`] after every accepted mutation and
//! stores it on the document, so every subscriber receives the same derived
//! view. For vote-hiding kinds the summary carries only the vote count
//! until the creator reveals.

use serde::{Deserialize, Serialize};

use crate::model::payload::{
    BoardPayload, ChoicePayload, RankingPayload, RoundsPayload, ScalePayload, TaskPayload,
};
use crate::model::{ActorId, ItemId, Payload, WidgetKind};

/// NPS promoters score at least this much.
pub const NPS_PROMOTER_MIN: i64 = 9;
/// NPS detractors score at most this much.
pub const NPS_DETRACTOR_MAX: i64 = 6;
/// Number of leading items listed in a board summary.
pub const BOARD_TOP_ITEMS: usize = 5;

// ---------------------------------------------------------------------------
// Summary types
// ---------------------------------------------------------------------------

/// Derived aggregate stored on each document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Summary {
    #[default]
    Empty,
    /// Tallies withheld until reveal.
    Hidden { total_votes: usize },
    Tally(Tally),
    Board(BoardSummary),
    Tasks { total: usize, completed: usize },
    Scale(ScaleSummary),
    Ranking { order: Vec<RankedOption> },
    Rounds(RoundSummary),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionTally {
    pub id: String,
    pub label: String,
    pub count: usize,
    /// `count / total_votes`, 0 when nobody voted.
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tally {
    pub total_votes: usize,
    pub options: Vec<OptionTally>,
    pub winner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnCount {
    pub column: String,
    pub items: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSummary {
    pub item_count: usize,
    pub columns: Vec<ColumnCount>,
    /// Most voted items, ties in insertion order.
    pub top_items: Vec<ItemId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleSummary {
    pub count: usize,
    pub average: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nps: Option<f64>,
    /// Votes per scale value, lowest first, zeros included.
    pub distribution: Vec<(i64, usize)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedOption {
    pub id: String,
    /// Mean 1-indexed position across ballots.
    pub mean_rank: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub round: u32,
    pub total_rounds: u32,
    pub complete: bool,
    pub waiting_on: Vec<ActorId>,
}

// ---------------------------------------------------------------------------
// Tally
// ---------------------------------------------------------------------------

/// `count / total`, or 0 when `total` is 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn share(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

/// Count votes per option. The winner is the option with the most votes,
/// ties going to the first declared option; no winner without votes.
#[must_use]
pub fn tally(choice: &ChoicePayload) -> Tally {
    let total_votes = choice.total_votes();
    let options: Vec<OptionTally> = choice
        .options
        .iter()
        .map(|option| OptionTally {
            id: option.id.clone(),
            label: option.label.clone(),
            count: option.votes.len(),
            share: share(option.votes.len(), total_votes),
        })
        .collect();

    let mut winner: Option<&OptionTally> = None;
    for option in &options {
        if option.count > winner.map_or(0, |w| w.count) {
            winner = Some(option);
        }
    }

    Tally {
        total_votes,
        winner: winner.map(|w| w.id.clone()),
        options,
    }
}

// ---------------------------------------------------------------------------
// Averages
// ---------------------------------------------------------------------------

/// Arithmetic mean, absent when there are no values.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn average(values: &[i64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum: i64 = values.iter().sum();
    Some(sum as f64 / values.len() as f64)
}

/// Net promoter score: percentage of promoters minus percentage of
/// detractors, in `[-100, 100]`. Absent when there are no values.
#[must_use]
pub fn net_promoter_score(values: &[i64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let promoters = values.iter().filter(|v| **v >= NPS_PROMOTER_MIN).count();
    let detractors = values.iter().filter(|v| **v <= NPS_DETRACTOR_MAX).count();
    Some((share(promoters, values.len()) - share(detractors, values.len())) * 100.0)
}

fn scale_summary(kind: WidgetKind, scale: &ScalePayload) -> ScaleSummary {
    let values: Vec<i64> = scale.votes.iter().map(|v| v.value).collect();
    let distribution = (scale.min..=scale.max)
        .map(|value| (value, values.iter().filter(|v| **v == value).count()))
        .collect();

    ScaleSummary {
        count: values.len(),
        average: average(&values),
        nps: if kind == WidgetKind::Nps {
            net_promoter_score(&values)
        } else {
            None
        },
        distribution,
    }
}

// ---------------------------------------------------------------------------
// Consensus ranking
// ---------------------------------------------------------------------------

/// Group ranking by mean 1-indexed position, ascending.
///
/// An option missing from a ballot counts as ranked just below that
/// ballot's last entry. Ties keep declaration order. Without ballots every
/// option has mean rank 0 and declaration order is returned.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn consensus_ranking(ranking: &RankingPayload) -> Vec<RankedOption> {
    let mut ranked: Vec<RankedOption> = ranking
        .options
        .iter()
        .map(|option| {
            if ranking.ballots.is_empty() {
                return RankedOption {
                    id: option.id.clone(),
                    mean_rank: 0.0,
                };
            }
            let total: usize = ranking
                .ballots
                .iter()
                .map(|ballot| {
                    ballot
                        .order
                        .iter()
                        .position(|id| id == &option.id)
                        .map_or(ballot.order.len() + 1, |pos| pos + 1)
                })
                .sum();
            RankedOption {
                id: option.id.clone(),
                mean_rank: total as f64 / ranking.ballots.len() as f64,
            }
        })
        .collect();

    // Stable sort keeps declaration order for ties.
    ranked.sort_by(|a, b| a.mean_rank.total_cmp(&b.mean_rank));
    ranked
}

// ---------------------------------------------------------------------------
// Rounds
// ---------------------------------------------------------------------------

/// Participants expected to submit in `round`: those who joined before it started.
#[must_use]
pub fn expected_in_round(rounds: &RoundsPayload, round: u32) -> Vec<&ActorId> {
    rounds
        .participants
        .iter()
        .filter(|p| p.joined_round < round)
        .map(|p| &p.id)
        .collect()
}

/// Expected participants who have not yet submitted the required count.
#[must_use]
pub fn waiting_on(rounds: &RoundsPayload, round: u32) -> Vec<ActorId> {
    let required = usize::try_from(rounds.items_per_round).unwrap_or(usize::MAX);
    expected_in_round(rounds, round)
        .into_iter()
        .filter(|id| rounds.submitted(id, round) < required)
        .cloned()
        .collect()
}

/// A round is complete once every expected participant submitted enough
/// items. Round 0 (gathering) is never complete; this is a soft gate that
/// the creator may override.
#[must_use]
pub fn round_complete(rounds: &RoundsPayload, round: u32) -> bool {
    round > 0 && waiting_on(rounds, round).is_empty()
}

// ---------------------------------------------------------------------------
// Board and tasks
// ---------------------------------------------------------------------------

fn board_summary(board: &BoardPayload) -> BoardSummary {
    let columns = board
        .columns
        .iter()
        .map(|column| ColumnCount {
            column: column.id.clone(),
            items: board
                .items
                .iter()
                .filter(|item| item.column == column.id)
                .count(),
        })
        .collect();

    let mut by_votes: Vec<_> = board.items.iter().filter(|i| !i.votes.is_empty()).collect();
    by_votes.sort_by(|a, b| b.votes.len().cmp(&a.votes.len()));

    BoardSummary {
        item_count: board.items.len(),
        columns,
        top_items: by_votes
            .into_iter()
            .take(BOARD_TOP_ITEMS)
            .map(|item| item.entry.id.clone())
            .collect(),
    }
}

fn task_summary(tasks: &TaskPayload) -> Summary {
    Summary::Tasks {
        total: tasks.items.len(),
        completed: tasks.completed_count(),
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Recompute the derived summary for a payload.
///
/// `votes_hidden` withholds tallies for vote-hiding kinds before reveal.
#[must_use]
pub fn summarize(kind: WidgetKind, payload: &Payload, votes_hidden: bool) -> Summary {
    match payload {
        Payload::Choice(choice) if votes_hidden => Summary::Hidden {
            total_votes: choice.total_votes(),
        },
        Payload::Choice(choice) => Summary::Tally(tally(choice)),
        Payload::Board(board) => Summary::Board(board_summary(board)),
        Payload::Tasks(tasks) => task_summary(tasks),
        Payload::Scale(scale) => Summary::Scale(scale_summary(kind, scale)),
        Payload::Ranking(ranking) => Summary::Ranking {
            order: consensus_ranking(ranking),
        },
        Payload::Rounds(rounds) => Summary::Rounds(RoundSummary {
            round: rounds.round,
            total_rounds: rounds.total_rounds,
            complete: round_complete(rounds, rounds.round),
            waiting_on: waiting_on(rounds, rounds.round),
        }),
    }
}
