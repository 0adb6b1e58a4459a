#![no_main]

use std::sync::Arc;

use huddle_core::{
    Actor, ChannelKey, CreateRequest, Engine, EngineConfig, ManualClock, MemoryStore, NullNotifier,
    Operation, Setup, WidgetKind,
};
use libfuzzer_sys::fuzz_target;

// Input: one kind selector byte, then a JSON array of operations applied in
// turn by alternating participants.
fuzz_target!(|data: &[u8]| {
    let Some((&selector, rest)) = data.split_first() else {
        return;
    };
    let Ok(operations) = serde_json::from_slice::<Vec<Operation>>(rest) else {
        return;
    };
    let kind = WidgetKind::ALL[usize::from(selector) % WidgetKind::ALL.len()];
    let setup = match kind.shape() {
        huddle_core::model::PayloadShape::Choice if kind == WidgetKind::RomanVoting => {
            Setup::poll("q", &[])
        }
        huddle_core::model::PayloadShape::Choice => Setup::poll("q", &["A", "B", "C"]),
        huddle_core::model::PayloadShape::Board => Setup::board("p"),
        huddle_core::model::PayloadShape::Tasks => Setup::tasks("t"),
        huddle_core::model::PayloadShape::Scale => Setup::scale("q"),
        huddle_core::model::PayloadShape::Ranking => Setup::ranking("q", &["A", "B", "C"]),
        huddle_core::model::PayloadShape::Rounds => Setup::rounds("p", 2, 3),
    };

    let engine = Engine::new(MemoryStore::new(), NullNotifier, EngineConfig::default())
        .with_clock(Arc::new(ManualClock::default()));
    let actors = [
        Actor::member("u1", "Al"),
        Actor::member("u2", "Bo"),
        Actor::facilitator("u3", "Cy"),
    ];
    let Ok(mut current) = engine.create(&CreateRequest {
        channel: ChannelKey::from("fuzz"),
        kind,
        actor: actors[0].clone(),
        setup,
    }) else {
        return;
    };

    for (i, operation) in operations.iter().enumerate() {
        let before = current.clone();
        match engine.apply(&current.id, operation, &actors[i % actors.len()]) {
            Ok(next) => {
                assert!(!before.closed, "closed widget accepted {}", operation.kind());
                assert_eq!(next.version, before.version + 1);
                current = next;
            }
            Err(_) => {
                assert_eq!(engine.get(&current.id).expect("stored"), before);
            }
        }
    }
});
