use std::sync::Arc;

use chrono::{DateTime, Utc};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use huddle_core::{
    Actor, ApplyContext, ChannelKey, CreateRequest, Engine, EngineConfig, LimitsConfig,
    ManualClock, MemoryStore, NullNotifier, Operation, Setup, WidgetDocument, WidgetKind, apply,
};

const SIZES: [usize; 3] = [10, 100, 1_000];

fn engine() -> Engine<MemoryStore, NullNotifier> {
    let config = EngineConfig {
        limits: LimitsConfig {
            max_items: 10_000,
            ..LimitsConfig::default()
        },
        ..EngineConfig::default()
    };
    Engine::new(MemoryStore::new(), NullNotifier, config).with_clock(Arc::new(ManualClock::default()))
}

fn board_with_items(count: usize) -> WidgetDocument {
    let engine = engine();
    let board = engine
        .create(&CreateRequest {
            channel: ChannelKey::from("bench"),
            kind: WidgetKind::Brainstorm,
            actor: Actor::member("u0", "Owner"),
            setup: Setup::board("Ideas"),
        })
        .expect("create");
    let mut latest = board;
    for n in 0..count {
        latest = engine
            .apply(
                &latest.id,
                &Operation::add_text(format!("idea {n}")),
                &Actor::member(format!("u{}", n % 25), "Member"),
            )
            .expect("add");
    }
    latest
}

fn bench_toggle(c: &mut Criterion) {
    let limits = LimitsConfig {
        max_items: 10_000,
        ..LimitsConfig::default()
    };
    let ctx = ApplyContext::new(DateTime::<Utc>::UNIX_EPOCH, &limits);
    let voter = Actor::member("voter", "Voter");
    let mut group = c.benchmark_group("apply.toggle_vote");

    for size in SIZES {
        let board = board_with_items(size);
        let target = board.payload.as_board().expect("board").items[size / 2]
            .entry
            .id
            .clone();
        let op = Operation::toggle_vote(target);
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(size), &board, |b, board| {
            b.iter(|| black_box(apply(board, &op, &voter, &ctx)));
        });
    }
    group.finish();
}

fn bench_engine_votes(c: &mut Criterion) {
    c.bench_function("engine.poll_vote", |b| {
        let engine = engine();
        let poll = engine
            .create(&CreateRequest {
                channel: ChannelKey::from("bench"),
                kind: WidgetKind::Poll,
                actor: Actor::member("u0", "Owner"),
                setup: Setup::poll("Lunch?", &["A", "B", "C"]),
            })
            .expect("create");
        let mut n = 0_u64;
        b.iter(|| {
            n += 1;
            black_box(engine.apply(
                &poll.id,
                &Operation::vote_option("B"),
                &Actor::member(format!("v{n}"), "Voter"),
            ))
        });
    });
}

criterion_group!(benches, bench_toggle, bench_engine_votes);
criterion_main!(benches);
