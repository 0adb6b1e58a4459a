//! Widget kind catalogue.
//!
//! Every slash-command tool maps to one [`WidgetKind`]. Kinds that share a
//! payload layout share a [`PayloadShape`], which is what the mutation
//! processor dispatches on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of widget kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WidgetKind {
    /// Open single-choice poll.
    Poll,
    /// Single-choice vote whose per-voter choices stay hidden until reveal.
    BlindVote,
    /// Thumbs up / sideways / down, hidden until reveal.
    RomanVoting,
    /// Free ideas with dot votes.
    Brainstorm,
    /// Went well / to improve / actions columns.
    RetrospectiveBoard,
    /// Nine-section lean canvas.
    LeanCanvas,
    /// Outcome, opportunity, solution, experiment tree.
    OpportunityTree,
    /// Assignable follow-ups with due dates.
    ActionItems,
    /// Shared checklist.
    Checklist,
    /// Fist-of-five confidence vote.
    ConfidenceVote,
    /// Team health check on a 1 to 5 scale.
    TeamHealth,
    /// Net promoter score on a 0 to 10 scale.
    Nps,
    /// Per-participant ranking of options, merged into a consensus order.
    RankedChoice,
    /// Timed multi-round silent idea writing.
    Brainwriting,
}

/// Payload layout shared by several kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadShape {
    Choice,
    Board,
    Tasks,
    Scale,
    Ranking,
    Rounds,
}

impl PayloadShape {
    /// Return the canonical shape name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Choice => "choice",
            Self::Board => "board",
            Self::Tasks => "tasks",
            Self::Scale => "scale",
            Self::Ranking => "ranking",
            Self::Rounds => "rounds",
        }
    }
}

impl fmt::Display for PayloadShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown widget kind name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown widget kind '{raw}'")]
pub struct UnknownWidgetKind {
    /// The unrecognised input string.
    pub raw: String,
}

impl WidgetKind {
    /// All kinds in catalogue order.
    pub const ALL: [Self; 14] = [
        Self::Poll,
        Self::BlindVote,
        Self::RomanVoting,
        Self::Brainstorm,
        Self::RetrospectiveBoard,
        Self::LeanCanvas,
        Self::OpportunityTree,
        Self::ActionItems,
        Self::Checklist,
        Self::ConfidenceVote,
        Self::TeamHealth,
        Self::Nps,
        Self::RankedChoice,
        Self::Brainwriting,
    ];

    /// Return the slash-command style name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Poll => "poll",
            Self::BlindVote => "blind-vote",
            Self::RomanVoting => "roman-voting",
            Self::Brainstorm => "brainstorm",
            Self::RetrospectiveBoard => "retrospective-board",
            Self::LeanCanvas => "lean-canvas",
            Self::OpportunityTree => "opportunity-tree",
            Self::ActionItems => "action-items",
            Self::Checklist => "checklist",
            Self::ConfidenceVote => "confidence-vote",
            Self::TeamHealth => "team-health",
            Self::Nps => "nps",
            Self::RankedChoice => "ranked-choice",
            Self::Brainwriting => "brainwriting",
        }
    }

    /// Payload layout used by this kind.
    #[must_use]
    pub const fn shape(self) -> PayloadShape {
        match self {
            Self::Poll | Self::BlindVote | Self::RomanVoting => PayloadShape::Choice,
            Self::Brainstorm
            | Self::RetrospectiveBoard
            | Self::LeanCanvas
            | Self::OpportunityTree => PayloadShape::Board,
            Self::ActionItems | Self::Checklist => PayloadShape::Tasks,
            Self::ConfidenceVote | Self::TeamHealth | Self::Nps => PayloadShape::Scale,
            Self::RankedChoice => PayloadShape::Ranking,
            Self::Brainwriting => PayloadShape::Rounds,
        }
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WidgetKind {
    type Err = UnknownWidgetKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownWidgetKind { raw: s.to_string() })
    }
}

impl Serialize for WidgetKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for WidgetKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_roundtrip_through_fromstr() {
        for kind in WidgetKind::ALL {
            let parsed: WidgetKind = kind.as_str().parse().expect("known kind");
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = WidgetKind::ALL.iter().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), WidgetKind::ALL.len());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = "kanban".parse::<WidgetKind>().unwrap_err();
        assert_eq!(err.raw, "kanban");
        assert!(err.to_string().contains("kanban"));
    }

    #[test]
    fn serde_uses_command_names() {
        let json = serde_json::to_string(&WidgetKind::BlindVote).expect("serialize");
        assert_eq!(json, "\"blind-vote\"");
        let back: WidgetKind = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, WidgetKind::BlindVote);
        assert!(serde_json::from_str::<WidgetKind>("\"nope\"").is_err());
    }

    #[test]
    fn shapes_group_kinds() {
        assert_eq!(WidgetKind::RomanVoting.shape(), PayloadShape::Choice);
        assert_eq!(WidgetKind::LeanCanvas.shape(), PayloadShape::Board);
        assert_eq!(WidgetKind::Checklist.shape(), PayloadShape::Tasks);
        assert_eq!(WidgetKind::Nps.shape(), PayloadShape::Scale);
        assert_eq!(WidgetKind::RankedChoice.shape(), PayloadShape::Ranking);
        assert_eq!(WidgetKind::Brainwriting.shape(), PayloadShape::Rounds);
    }
}
