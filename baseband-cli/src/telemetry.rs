//! Periodic session telemetry sampling.
//!
//! Mirrors the teacher CLI's `TelemetryAggregator` sample-interval
//! pattern, retargeted at the scheduler's own counters and per-doer
//! duration stats instead of BER/EVM measurements.

use std::sync::Arc;
use std::time::{Duration, Instant};

use baseband_core::session::SessionState;
use baseband_core::tag::EventKind;

const SAMPLED_KINDS: [EventKind; 8] = [
    EventKind::Fft,
    EventKind::Csi,
    EventKind::Zf,
    EventKind::Demul,
    EventKind::Decode,
    EventKind::Encode,
    EventKind::Precode,
    EventKind::Ifft,
];

pub struct SessionTelemetry {
    session: Arc<SessionState>,
    interval: Duration,
    last_sample: Instant,
}

impl SessionTelemetry {
    pub fn new(session: Arc<SessionState>, interval_secs: f64) -> Self {
        Self {
            session,
            interval: Duration::from_secs_f64(interval_secs.max(0.05)),
            last_sample: Instant::now(),
        }
    }

    fn should_sample(&self) -> bool {
        self.last_sample.elapsed() >= self.interval
    }

    /// Emit one `tracing` telemetry event per worker/kind pair with at
    /// least one recorded task, if the sample interval has elapsed.
    pub fn sample(&mut self) {
        if !self.should_sample() {
            return;
        }
        self.last_sample = Instant::now();

        let cur_frame = self.session.counters.cur_frame();
        let latest_frame = self.session.counters.latest_frame();
        let admit_paused = self
            .session
            .admit_paused
            .load(std::sync::atomic::Ordering::Acquire);
        let total_slow_tasks = self.session.stats.total_slow_tasks();

        tracing::info!(
            cur_frame,
            latest_frame,
            in_flight = latest_frame.saturating_sub(cur_frame),
            admit_paused,
            total_slow_tasks,
            "session telemetry"
        );

        for worker_id in 0..self.session.config.num_workers {
            for kind in SAMPLED_KINDS {
                let stat = self.session.stats.get(worker_id, kind);
                if stat.count() == 0 {
                    continue;
                }
                tracing::debug!(
                    worker_id,
                    kind = ?kind,
                    count = stat.count(),
                    mean_us = stat.mean_us(),
                    slow_count = stat.slow_count(),
                    "doer stat"
                );
            }
        }
    }
}
