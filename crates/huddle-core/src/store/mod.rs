//! Widget document persistence.
//!
//! [`WidgetStore::atomic_update`] is the only write path for existing
//! documents. The transform runs against the latest stored value inside the
//! store's critical section, and the `committed` hook runs after the write
//! is durable but before the section is released, so observers see
//! commits in version order.

pub mod memory;
pub mod migrations;
pub mod schema;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::{EngineError, Rejection, StoreError};
use crate::model::{ChannelKey, WidgetDocument, WidgetId};

/// Pure document transform run inside the store's critical section.
pub type Transform<'a> = dyn FnMut(&WidgetDocument) -> Result<WidgetDocument, Rejection> + 'a;

/// Callback invoked with the committed document.
pub type CommitHook<'a> = dyn FnMut(&WidgetDocument) + 'a;

/// Storage of widget documents keyed by id.
pub trait WidgetStore: Send + Sync {
    /// Store a brand new document.
    ///
    /// # Errors
    ///
    /// [`StoreError::AlreadyExists`] if the id is taken, or a backend failure.
    fn insert(&self, document: &WidgetDocument) -> Result<(), StoreError>;

    /// Fetch the latest version of a document.
    ///
    /// # Errors
    ///
    /// Returns a backend failure; a missing id is `Ok(None)`.
    fn load(&self, id: &WidgetId) -> Result<Option<WidgetDocument>, StoreError>;

    /// All documents of one channel, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a backend failure.
    fn list_channel(&self, channel: &ChannelKey) -> Result<Vec<WidgetDocument>, StoreError>;

    /// Read, transform and write one document atomically.
    ///
    /// Nothing is written when the transform rejects. The version of the
    /// written document must be exactly one above the stored one.
    ///
    /// # Errors
    ///
    /// - [`Rejection::NotFound`] for an unknown id
    /// - the transform's own [`Rejection`]
    /// - [`StoreError`] for backend failures and version conflicts
    fn atomic_update(
        &self,
        id: &WidgetId,
        transform: &mut Transform<'_>,
        committed: &mut CommitHook<'_>,
    ) -> Result<WidgetDocument, EngineError>;
}

/// Run a transform and check that it produced the next version of the
/// same document.
pub(crate) fn next_version(
    current: &WidgetDocument,
    transform: &mut Transform<'_>,
) -> Result<WidgetDocument, EngineError> {
    let next = transform(current)?;
    if next.id != current.id || next.version != current.version + 1 {
        return Err(StoreError::VersionConflict {
            id: current.id.to_string(),
            expected: current.version + 1,
        }
        .into());
    }
    Ok(next)
}

pub(crate) fn not_found(id: &WidgetId) -> EngineError {
    EngineError::Rejected(Rejection::NotFound(id.to_string()))
}
