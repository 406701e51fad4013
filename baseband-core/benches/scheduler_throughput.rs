//! Scheduler tick throughput under a saturated completion queue.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use baseband_core::config::SessionConfig;
use baseband_core::scheduler::Scheduler;
use baseband_core::session::SessionState;
use baseband_core::tag::{Event, EventKind, Tag};

fn bench_config() -> SessionConfig {
    SessionConfig {
        frame_window: 16,
        num_ant: 8,
        num_ue: 4,
        num_sc_blocks: 16,
        num_workers: 8,
        queue_capacity: 8192,
        ..SessionConfig::default()
    }
}

fn fill_completion_queue(session: &SessionState, n: usize) {
    for i in 0..n {
        let ant = (i % session.config.num_ant) as u32;
        let tag = Tag::for_antenna(0, 1, ant);
        session
            .completion_queue
            .try_enqueue(Event::new(EventKind::Fft, tag))
            .ok();
    }
}

fn bench_tick(c: &mut Criterion) {
    c.bench_function("scheduler_tick_256_fft_completions", |b| {
        b.iter_batched(
            || {
                let session = Arc::new(SessionState::new(bench_config()));
                fill_completion_queue(&session, 256);
                let scheduler = Scheduler::new(
                    Arc::clone(&session.config),
                    Arc::clone(&session.counters),
                    Arc::clone(&session.request_queues),
                    Arc::clone(&session.completion_queue),
                    Arc::clone(&session.admit_paused),
                );
                scheduler
            },
            |mut scheduler| {
                black_box(scheduler.tick().unwrap());
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_tick);
criterion_main!(benches);
