//! Creation parameters for a new widget.

use serde::{Deserialize, Serialize};

/// Initial configuration supplied by the originating slash command.
///
/// The variant must match the payload shape of the requested kind; fixed
/// layouts (roman voting options, retrospective columns, canvas sections,
/// tree levels, scale bounds) are supplied by the registry, not the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Setup {
    Choice {
        question: String,
        #[serde(default)]
        options: Vec<String>,
    },
    Board {
        prompt: String,
        /// Custom columns, only honoured for brainstorms.
        #[serde(default)]
        columns: Vec<String>,
        #[serde(default)]
        max_votes_per_participant: Option<u32>,
    },
    Tasks {
        title: String,
    },
    Scale {
        question: String,
    },
    Ranking {
        question: String,
        options: Vec<String>,
    },
    Rounds {
        prompt: String,
        items_per_round: u32,
        total_rounds: u32,
        #[serde(default)]
        round_seconds: Option<u32>,
    },
}

impl Setup {
    #[must_use]
    pub fn poll(question: impl Into<String>, options: &[&str]) -> Self {
        Self::Choice {
            question: question.into(),
            options: options.iter().map(|o| (*o).to_string()).collect(),
        }
    }

    #[must_use]
    pub fn board(prompt: impl Into<String>) -> Self {
        Self::Board {
            prompt: prompt.into(),
            columns: Vec::new(),
            max_votes_per_participant: None,
        }
    }

    #[must_use]
    pub fn tasks(title: impl Into<String>) -> Self {
        Self::Tasks {
            title: title.into(),
        }
    }

    #[must_use]
    pub fn scale(question: impl Into<String>) -> Self {
        Self::Scale {
            question: question.into(),
        }
    }

    #[must_use]
    pub fn ranking(question: impl Into<String>, options: &[&str]) -> Self {
        Self::Ranking {
            question: question.into(),
            options: options.iter().map(|o| (*o).to_string()).collect(),
        }
    }

    #[must_use]
    pub fn rounds(prompt: impl Into<String>, items_per_round: u32, total_rounds: u32) -> Self {
        Self::Rounds {
            prompt: prompt.into(),
            items_per_round,
            total_rounds,
            round_seconds: None,
        }
    }
}
