//! Wire types between a client session and the engine.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Rejection, RejectionKind};
use crate::model::{Actor, Operation, WidgetDocument, WidgetId};

/// One inbound mutation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRequest {
    pub widget_id: WidgetId,
    pub operation: Operation,
    pub actor: Actor,
}

/// Result of one request: the full new document, or why nothing changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OperationResponse {
    Ok {
        document: WidgetDocument,
    },
    Error {
        kind: RejectionKind,
        message: String,
    },
}

impl OperationResponse {
    #[must_use]
    pub fn rejected(rejection: &Rejection) -> Self {
        Self::Error {
            kind: rejection.kind(),
            message: rejection.to_string(),
        }
    }

    #[must_use]
    pub const fn document(&self) -> Option<&WidgetDocument> {
        match self {
            Self::Ok { document } => Some(document),
            Self::Error { .. } => None,
        }
    }

    #[must_use]
    pub const fn error_kind(&self) -> Option<RejectionKind> {
        match self {
            Self::Ok { .. } => None,
            Self::Error { kind, .. } => Some(*kind),
        }
    }
}

impl From<Result<WidgetDocument, EngineError>> for OperationResponse {
    fn from(result: Result<WidgetDocument, EngineError>) -> Self {
        match result {
            Ok(document) => Self::Ok { document },
            Err(EngineError::Rejected(rejection)) => Self::rejected(&rejection),
            Err(EngineError::Store(err)) => Self::Error {
                kind: RejectionKind::Unavailable,
                message: format!("{}: {err}", err.code()),
            },
        }
    }
}
