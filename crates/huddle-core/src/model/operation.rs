//! Operations a session can issue against a widget.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::ItemId;

/// What a participant selects when voting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    /// Pick one option of a choice widget by id.
    Option(String),
    /// A numeric score on a scale widget.
    Score(i64),
    /// A full ordering of option ids, best first.
    Ranking(Vec<String>),
}

/// Optional attributes attached to an added item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAttrs {
    /// Parent node for tree-structured boards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ItemId>,
    /// Assignee display name for task items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// Earlier round item this contribution builds on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builds_on: Option<ItemId>,
}

/// A single named mutation request against a widget document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Vote {
        choice: Choice,
    },
    AddItem {
        /// Column or section to add to; defaults to the first one.
        #[serde(default)]
        target: Option<String>,
        text: String,
        #[serde(default)]
        attrs: ItemAttrs,
    },
    ToggleVote {
        item_id: ItemId,
    },
    DeleteItem {
        item_id: ItemId,
    },
    ToggleComplete {
        item_id: ItemId,
    },
    Reveal,
    Close,
    AdvanceRound,
    /// Register as a participant of a multi-round flow.
    Join,
}

/// Discriminant of an [`Operation`], used by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Vote,
    AddItem,
    ToggleVote,
    DeleteItem,
    ToggleComplete,
    Reveal,
    Close,
    AdvanceRound,
    Join,
}

impl OperationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vote => "vote",
            Self::AddItem => "add_item",
            Self::ToggleVote => "toggle_vote",
            Self::DeleteItem => "delete_item",
            Self::ToggleComplete => "toggle_complete",
            Self::Reveal => "reveal",
            Self::Close => "close",
            Self::AdvanceRound => "advance_round",
            Self::Join => "join",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Operation {
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::Vote { .. } => OperationKind::Vote,
            Self::AddItem { .. } => OperationKind::AddItem,
            Self::ToggleVote { .. } => OperationKind::ToggleVote,
            Self::DeleteItem { .. } => OperationKind::DeleteItem,
            Self::ToggleComplete { .. } => OperationKind::ToggleComplete,
            Self::Reveal => OperationKind::Reveal,
            Self::Close => OperationKind::Close,
            Self::AdvanceRound => OperationKind::AdvanceRound,
            Self::Join => OperationKind::Join,
        }
    }

    /// Shorthand for voting for an option by id.
    #[must_use]
    pub fn vote_option(option: impl Into<String>) -> Self {
        Self::Vote {
            choice: Choice::Option(option.into()),
        }
    }

    /// Shorthand for adding a plain item to the default target.
    #[must_use]
    pub fn add_text(text: impl Into<String>) -> Self {
        Self::AddItem {
            target: None,
            text: text.into(),
            attrs: ItemAttrs::default(),
        }
    }

    /// Shorthand for adding an item to a named column or section.
    #[must_use]
    pub fn add_to(target: impl Into<String>, text: impl Into<String>) -> Self {
        Self::AddItem {
            target: Some(target.into()),
            text: text.into(),
            attrs: ItemAttrs::default(),
        }
    }

    #[must_use]
    pub fn toggle_vote(item_id: impl Into<ItemId>) -> Self {
        Self::ToggleVote {
            item_id: item_id.into(),
        }
    }
}
