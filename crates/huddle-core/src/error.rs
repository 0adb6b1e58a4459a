use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable error codes surfaced to sessions and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    UnknownWidgetKind,
    WidgetNotFound,
    WidgetClosed,
    Forbidden,
    DuplicateVote,
    InvalidArgument,
    StoreUnavailable,
    VersionConflict,
    CorruptDocument,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::UnknownWidgetKind => "E1002",
            Self::WidgetNotFound => "E2001",
            Self::WidgetClosed => "E2002",
            Self::Forbidden => "E2003",
            Self::DuplicateVote => "E2004",
            Self::InvalidArgument => "E2005",
            Self::StoreUnavailable => "E5001",
            Self::VersionConflict => "E5002",
            Self::CorruptDocument => "E5003",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and session output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::UnknownWidgetKind => "Unknown widget kind",
            Self::WidgetNotFound => "Widget not found",
            Self::WidgetClosed => "Widget is closed",
            Self::Forbidden => "Action not permitted for this participant",
            Self::DuplicateVote => "Already voted",
            Self::InvalidArgument => "Invalid operation",
            Self::StoreUnavailable => "Widget store unavailable",
            Self::VersionConflict => "Concurrent update conflict",
            Self::CorruptDocument => "Stored widget document is corrupt",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint for the calling session.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .huddle/config.toml and retry."),
            Self::UnknownWidgetKind => Some("Use one of the registered widget kinds."),
            Self::WidgetNotFound => None,
            Self::WidgetClosed => Some("Re-fetch the widget; nothing was changed."),
            Self::Forbidden => None,
            Self::DuplicateVote => Some("Each participant votes once on this widget."),
            Self::InvalidArgument => None,
            Self::StoreUnavailable => Some("Retry the operation; it had no effect."),
            Self::VersionConflict => Some("Retry the operation; it had no effect."),
            Self::CorruptDocument => Some("Inspect the stored document and report a bug."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Wire name of a rejection, as carried in an error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    Closed,
    Forbidden,
    DuplicateVote,
    NotFound,
    InvalidArgument,
    /// The store failed; nothing changed and the request may be retried.
    Unavailable,
}

/// Why an operation was not applied. The document is untouched in every case.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("widget is closed")]
    Closed,
    #[error("not permitted to {action}")]
    Forbidden { action: &'static str },
    #[error("already voted")]
    DuplicateVote,
    #[error("widget {0} not found")]
    NotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Rejection {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    #[must_use]
    pub const fn kind(&self) -> RejectionKind {
        match self {
            Self::Closed => RejectionKind::Closed,
            Self::Forbidden { .. } => RejectionKind::Forbidden,
            Self::DuplicateVote => RejectionKind::DuplicateVote,
            Self::NotFound(_) => RejectionKind::NotFound,
            Self::InvalidArgument(_) => RejectionKind::InvalidArgument,
        }
    }

    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Closed => ErrorCode::WidgetClosed,
            Self::Forbidden { .. } => ErrorCode::Forbidden,
            Self::DuplicateVote => ErrorCode::DuplicateVote,
            Self::NotFound(_) => ErrorCode::WidgetNotFound,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
        }
    }
}

/// Failures of the persistence layer, distinct from business rejections.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("document codec: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("widget {0} already exists")]
    AlreadyExists(String),
    #[error("widget {id} changed concurrently (expected version {expected})")]
    VersionConflict { id: String, expected: u64 },
    #[error("store lock poisoned")]
    Poisoned,
}

impl StoreError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Sqlite(_) | Self::Poisoned => ErrorCode::StoreUnavailable,
            Self::Codec(_) => ErrorCode::CorruptDocument,
            Self::VersionConflict { .. } => ErrorCode::VersionConflict,
            Self::AlreadyExists(_) => ErrorCode::InternalUnexpected,
        }
    }
}

/// Error returned by the engine's entry points.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Rejected(#[from] Rejection),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(StoreError::Sqlite(err))
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Store(StoreError::Codec(err))
    }
}

impl EngineError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Rejected(rejection) => rejection.code(),
            Self::Store(err) => err.code(),
        }
    }

    /// The business rejection, if this is one.
    #[must_use]
    pub const fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(rejection) => Some(rejection),
            Self::Store(_) => None,
        }
    }
}
