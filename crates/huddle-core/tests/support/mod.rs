//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use huddle_core::{
    Actor, ChannelHub, ChannelKey, CreateRequest, Engine, EngineConfig, ManualClock, MemoryStore,
    Setup, WidgetDocument, WidgetKind,
};

pub type MemoryEngine = Engine<MemoryStore, ChannelHub>;

pub fn conv() -> ChannelKey {
    ChannelKey::from("conv-1")
}

pub fn member(id: &str) -> Actor {
    Actor::member(id, format!("User {id}"))
}

pub fn memory_engine() -> MemoryEngine {
    Engine::new(MemoryStore::new(), ChannelHub::new(), EngineConfig::default())
        .with_clock(Arc::new(ManualClock::default()))
}

pub fn create(engine: &MemoryEngine, kind: WidgetKind, creator: &str, setup: Setup) -> WidgetDocument {
    engine
        .create(&CreateRequest {
            channel: conv(),
            kind,
            actor: member(creator),
            setup,
        })
        .expect("create widget")
}

/// Every voter appears in at most one option of a choice widget.
pub fn voters_unique(document: &WidgetDocument) -> bool {
    let Some(choice) = document.payload.as_choice() else {
        return true;
    };
    let mut seen = std::collections::HashSet::new();
    choice
        .options
        .iter()
        .flat_map(|o| o.votes.iter())
        .all(|v| seen.insert(v.voter_id.clone()))
}
