//! In-memory store with one mutex per document.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use super::{CommitHook, Transform, WidgetStore, next_version, not_found};
use crate::error::{EngineError, StoreError};
use crate::model::{ChannelKey, WidgetDocument, WidgetId};

type Slot = Arc<Mutex<WidgetDocument>>;

/// Process-local store. Updates to different documents run in parallel;
/// updates to the same document are serialized by its mutex.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<WidgetId, Slot>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: &WidgetId) -> Result<Option<Slot>, StoreError> {
        let documents = self.documents.read().map_err(|_| StoreError::Poisoned)?;
        Ok(documents.get(id).cloned())
    }

    fn snapshot(&self) -> Result<Vec<Slot>, StoreError> {
        let documents = self.documents.read().map_err(|_| StoreError::Poisoned)?;
        Ok(documents.values().cloned().collect())
    }
}

impl WidgetStore for MemoryStore {
    fn insert(&self, document: &WidgetDocument) -> Result<(), StoreError> {
        let mut documents = self.documents.write().map_err(|_| StoreError::Poisoned)?;
        if documents.contains_key(&document.id) {
            return Err(StoreError::AlreadyExists(document.id.to_string()));
        }
        documents.insert(document.id.clone(), Arc::new(Mutex::new(document.clone())));
        Ok(())
    }

    fn load(&self, id: &WidgetId) -> Result<Option<WidgetDocument>, StoreError> {
        let Some(slot) = self.slot(id)? else {
            return Ok(None);
        };
        let document = slot.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(Some(document.clone()))
    }

    fn list_channel(&self, channel: &ChannelKey) -> Result<Vec<WidgetDocument>, StoreError> {
        let mut found = Vec::new();
        for slot in self.snapshot()? {
            let document = slot.lock().map_err(|_| StoreError::Poisoned)?;
            if &document.channel == channel {
                found.push(document.clone());
            }
        }
        found.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(found)
    }

    fn atomic_update(
        &self,
        id: &WidgetId,
        transform: &mut Transform<'_>,
        committed: &mut CommitHook<'_>,
    ) -> Result<WidgetDocument, EngineError> {
        let slot = self.slot(id)?.ok_or_else(|| not_found(id))?;
        let mut stored = slot.lock().map_err(|_| StoreError::Poisoned)?;
        let next = next_version(&stored, transform)?;
        *stored = next.clone();
        committed(&next);
        Ok(next)
    }
}
