//! Typed payloads, one per [`PayloadShape`].
//!
//! The payload is a tagged union keyed by shape. The registry guarantees
//! that a document's payload shape matches its kind, and the processor
//! dispatches on the variant.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ActorId, ItemId};
use super::kind::PayloadShape;

/// Type-specific widget state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Payload {
    Choice(ChoicePayload),
    Board(BoardPayload),
    Tasks(TaskPayload),
    Scale(ScalePayload),
    Ranking(RankingPayload),
    Rounds(RoundsPayload),
}

impl Payload {
    /// Shape tag of this payload.
    #[must_use]
    pub const fn shape(&self) -> PayloadShape {
        match self {
            Self::Choice(_) => PayloadShape::Choice,
            Self::Board(_) => PayloadShape::Board,
            Self::Tasks(_) => PayloadShape::Tasks,
            Self::Scale(_) => PayloadShape::Scale,
            Self::Ranking(_) => PayloadShape::Ranking,
            Self::Rounds(_) => PayloadShape::Rounds,
        }
    }

    #[must_use]
    pub const fn as_choice(&self) -> Option<&ChoicePayload> {
        match self {
            Self::Choice(p) => Some(p),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_board(&self) -> Option<&BoardPayload> {
        match self {
            Self::Board(p) => Some(p),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_tasks(&self) -> Option<&TaskPayload> {
        match self {
            Self::Tasks(p) => Some(p),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_scale(&self) -> Option<&ScalePayload> {
        match self {
            Self::Scale(p) => Some(p),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_ranking(&self) -> Option<&RankingPayload> {
        match self {
            Self::Ranking(p) => Some(p),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_rounds(&self) -> Option<&RoundsPayload> {
        match self {
            Self::Rounds(p) => Some(p),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared entries
// ---------------------------------------------------------------------------

/// Membership of a voter in an option's vote list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteEntry {
    pub voter_id: ActorId,
}

/// Fields common to every freeform contribution.
///
/// Immutable once written; only its author (or a facilitator) may delete it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeformEntry {
    pub id: ItemId,
    pub text: String,
    pub author_id: ActorId,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Choice: poll, blind vote, roman voting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoicePayload {
    pub question: String,
    pub options: Vec<VoteOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOption {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub votes: Vec<VoteEntry>,
}

impl ChoicePayload {
    /// Find the option a voter currently appears in.
    #[must_use]
    pub fn option_of(&self, voter: &ActorId) -> Option<&VoteOption> {
        self.options
            .iter()
            .find(|option| option.votes.iter().any(|v| &v.voter_id == voter))
    }

    /// Total number of votes cast across all options.
    #[must_use]
    pub fn total_votes(&self) -> usize {
        self.options.iter().map(|o| o.votes.len()).sum()
    }
}

// ---------------------------------------------------------------------------
// Board: brainstorm, retrospective, lean canvas, opportunity tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardPayload {
    pub prompt: String,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub items: Vec<BoardItem>,
    /// Dot-vote budget per participant; `None` means unlimited.
    #[serde(default)]
    pub max_votes_per_participant: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardItem {
    #[serde(flatten)]
    pub entry: FreeformEntry,
    pub column: String,
    #[serde(default)]
    pub parent_id: Option<ItemId>,
    #[serde(default)]
    pub votes: Vec<ActorId>,
}

impl BoardPayload {
    #[must_use]
    pub fn item(&self, id: &ItemId) -> Option<&BoardItem> {
        self.items.iter().find(|item| &item.entry.id == id)
    }

    #[must_use]
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.id == column)
    }

    /// Number of items a participant currently votes for.
    #[must_use]
    pub fn votes_by(&self, voter: &ActorId) -> usize {
        self.items
            .iter()
            .filter(|item| item.votes.contains(voter))
            .count()
    }
}

// ---------------------------------------------------------------------------
// Tasks: action items, checklist
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPayload {
    pub title: String,
    #[serde(default)]
    pub items: Vec<TaskItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskItem {
    #[serde(flatten)]
    pub entry: FreeformEntry,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_by: Option<ActorId>,
}

impl TaskPayload {
    #[must_use]
    pub fn item(&self, id: &ItemId) -> Option<&TaskItem> {
        self.items.iter().find(|item| &item.entry.id == id)
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.items.iter().filter(|item| item.completed).count()
    }
}

// ---------------------------------------------------------------------------
// Scale: confidence vote, team health, NPS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalePayload {
    pub question: String,
    pub min: i64,
    pub max: i64,
    #[serde(default)]
    pub votes: Vec<ScoreEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub voter_id: ActorId,
    pub value: i64,
}

impl ScalePayload {
    #[must_use]
    pub fn has_voted(&self, voter: &ActorId) -> bool {
        self.votes.iter().any(|v| &v.voter_id == voter)
    }
}

// ---------------------------------------------------------------------------
// Ranking: ranked choice
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingPayload {
    pub question: String,
    pub options: Vec<RankOption>,
    #[serde(default)]
    pub ballots: Vec<Ballot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankOption {
    pub id: String,
    pub label: String,
}

/// One participant's ordering, best first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub voter_id: ActorId,
    pub order: Vec<String>,
}

impl RankingPayload {
    #[must_use]
    pub fn has_ballot(&self, voter: &ActorId) -> bool {
        self.ballots.iter().any(|b| &b.voter_id == voter)
    }
}

// ---------------------------------------------------------------------------
// Rounds: brainwriting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundsPayload {
    pub prompt: String,
    pub items_per_round: u32,
    pub total_rounds: u32,
    /// Suggested round length; rounds are advanced by the creator.
    #[serde(default)]
    pub round_seconds: Option<u32>,
    /// Current round, 0 while participants gather before the first round.
    #[serde(default)]
    pub round: u32,
    #[serde(default)]
    pub round_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub items: Vec<RoundItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ActorId,
    pub name: String,
    /// Round that was running when the participant joined.
    pub joined_round: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundItem {
    #[serde(flatten)]
    pub entry: FreeformEntry,
    pub round: u32,
    #[serde(default)]
    pub builds_on: Option<ItemId>,
}

impl RoundsPayload {
    #[must_use]
    pub fn participant(&self, id: &ActorId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.id == id)
    }

    #[must_use]
    pub fn item(&self, id: &ItemId) -> Option<&RoundItem> {
        self.items.iter().find(|item| &item.entry.id == id)
    }

    /// Items a participant submitted in a given round.
    #[must_use]
    pub fn submitted(&self, author: &ActorId, round: u32) -> usize {
        self.items
            .iter()
            .filter(|item| item.round == round && &item.entry.author_id == author)
            .count()
    }
}
