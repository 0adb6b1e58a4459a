use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{ActorId, ChannelKey, WidgetId};
use super::kind::WidgetKind;
use super::payload::Payload;
use crate::aggregate::Summary;

/// Participant role as asserted by the session layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Member,
    /// Privileged role that may delete items authored by others.
    Facilitator,
}

/// An authenticated participant issuing an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    #[serde(default)]
    pub role: Role,
}

impl Actor {
    #[must_use]
    pub fn member(id: impl Into<ActorId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: Role::Member,
        }
    }

    #[must_use]
    pub fn facilitator(id: impl Into<ActorId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: Role::Facilitator,
        }
    }

    #[must_use]
    pub const fn is_privileged(&self) -> bool {
        matches!(self.role, Role::Facilitator)
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// The unit of collaboration: one widget instance attached to a message.
///
/// Always broadcast whole. `version` starts at 0 on creation and grows by
/// exactly one per accepted mutation, which is what clients use to discard
/// stale broadcasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetDocument {
    pub id: WidgetId,
    pub kind: WidgetKind,
    pub channel: ChannelKey,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    pub closed: bool,
    /// Present only for vote-hiding kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revealed: Option<bool>,
    pub version: u64,
    pub payload: Payload,
    #[serde(default)]
    pub summary: Summary,
}

impl WidgetDocument {
    /// `true` while per-voter choices must stay hidden.
    #[must_use]
    pub const fn votes_hidden(&self) -> bool {
        matches!(self.revealed, Some(false))
    }

    #[must_use]
    pub fn is_creator(&self, actor: &ActorId) -> bool {
        &self.created_by == actor
    }
}
