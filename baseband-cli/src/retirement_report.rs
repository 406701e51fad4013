//! Final per-run summary, replacing the teacher CLI's per-frame hex-dump
//! decoder with a scheduler-shaped summary: frames retired, slow-task
//! counts, per-kind mean durations.

use std::sync::Arc;
use std::time::Duration;

use baseband_core::session::SessionState;
use baseband_core::tag::EventKind;

const REPORTED_KINDS: [EventKind; 8] = [
    EventKind::Fft,
    EventKind::Csi,
    EventKind::Zf,
    EventKind::Demul,
    EventKind::Decode,
    EventKind::Encode,
    EventKind::Precode,
    EventKind::Ifft,
];

pub struct DoerSummary {
    pub kind: EventKind,
    pub count: u64,
    pub mean_us: f64,
    pub slow_count: u64,
}

pub struct RetirementReport {
    pub frames_retired: u64,
    pub latest_frame: u64,
    pub elapsed: Duration,
    pub total_slow_tasks: u64,
    pub doer_summaries: Vec<DoerSummary>,
}

pub fn build_report(session: &Arc<SessionState>, elapsed: Duration) -> RetirementReport {
    let frames_retired = session.counters.cur_frame();
    let latest_frame = session.counters.latest_frame();
    let total_slow_tasks = session.stats.total_slow_tasks();

    let mut doer_summaries = Vec::new();
    for worker_id in 0..session.config.num_workers {
        for kind in REPORTED_KINDS {
            let stat = session.stats.get(worker_id, kind);
            if stat.count() == 0 {
                continue;
            }
            doer_summaries.push(DoerSummary {
                kind,
                count: stat.count(),
                mean_us: stat.mean_us(),
                slow_count: stat.slow_count(),
            });
        }
    }

    RetirementReport {
        frames_retired,
        latest_frame,
        elapsed,
        total_slow_tasks,
        doer_summaries,
    }
}

pub fn log_report(report: &RetirementReport) {
    tracing::info!(
        frames_retired = report.frames_retired,
        latest_frame = report.latest_frame,
        elapsed_secs = report.elapsed.as_secs_f64(),
        total_slow_tasks = report.total_slow_tasks,
        "run summary"
    );
    for summary in &report.doer_summaries {
        tracing::info!(
            kind = ?summary.kind,
            count = summary.count,
            mean_us = summary.mean_us,
            slow_count = summary.slow_count,
            "doer summary"
        );
    }
}
