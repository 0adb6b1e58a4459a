//! Lifecycle guard for widget documents.
//!
//! ```text
//! OPEN --reveal()--> OPEN(revealed) --close()--> CLOSED
//! OPEN --close()--> CLOSED
//! ```
//!
//! Both open states accept content operations; `CLOSED` accepts nothing.
//! `reveal()` exists only for vote-hiding kinds. Creator-only actions
//! (`reveal`, `close`, `advance_round`) check authority before the closed
//! state, so a non-creator always learns that they lack authority rather
//! than the state of the widget.

use std::fmt;

use crate::error::Rejection;
use crate::model::{Actor, OperationKind, WidgetDocument};
use crate::registry::{CloseAuthority, WidgetSchema};

/// Observable lifecycle position of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Open,
    Revealed,
    Closed,
}

impl LifecycleState {
    #[must_use]
    pub const fn of(document: &WidgetDocument) -> Self {
        if document.closed {
            Self::Closed
        } else if matches!(document.revealed, Some(true)) {
            Self::Revealed
        } else {
            Self::Open
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Revealed => "revealed",
            Self::Closed => "closed",
        }
    }

    #[must_use]
    pub const fn accepts_content(self) -> bool {
        !matches!(self, Self::Closed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check lifecycle state and authority for an operation.
///
/// # Errors
///
/// - [`Rejection::Forbidden`] when a creator-only action comes from someone else
/// - [`Rejection::Closed`] when the document is terminal
/// - [`Rejection::InvalidArgument`] for a second reveal
pub fn check(
    document: &WidgetDocument,
    schema: &WidgetSchema,
    operation: OperationKind,
    actor: &Actor,
) -> Result<(), Rejection> {
    match operation {
        OperationKind::Close => {
            if schema.close_authority == CloseAuthority::Creator
                && !document.is_creator(&actor.id)
            {
                return Err(Rejection::Forbidden { action: "close" });
            }
            ensure_open(document)
        }
        OperationKind::Reveal => {
            if !document.is_creator(&actor.id) {
                return Err(Rejection::Forbidden { action: "reveal" });
            }
            match LifecycleState::of(document) {
                LifecycleState::Open => Ok(()),
                LifecycleState::Revealed => Err(Rejection::invalid("votes are already revealed")),
                LifecycleState::Closed => Err(Rejection::Closed),
            }
        }
        OperationKind::AdvanceRound => {
            if !document.is_creator(&actor.id) {
                return Err(Rejection::Forbidden {
                    action: "advance the round",
                });
            }
            ensure_open(document)
        }
        _ => ensure_open(document),
    }
}

const fn ensure_open(document: &WidgetDocument) -> Result<(), Rejection> {
    if LifecycleState::of(document).accepts_content() {
        Ok(())
    } else {
        Err(Rejection::Closed)
    }
}

/// Apply the reveal transition. Only valid after [`check`] passed.
pub fn reveal(document: &mut WidgetDocument) {
    document.revealed = Some(true);
}

/// Apply the close transition. Only valid after [`check`] passed.
pub fn close(document: &mut WidgetDocument) {
    document.closed = true;
}
