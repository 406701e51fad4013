//! Per-worker-per-stage duration statistics.
//!
//! Cache-line padded (`CachePadded`) to avoid false sharing between
//! workers updating adjacent stats concurrently (spec §9, Design Notes
//! "Duration stats"), grounded on Agora's `duration_stat_->task_duration_`
//! accounting in `doencode.cc`.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::utils::CachePadded;

use crate::tag::EventKind;

/// Running total duration (microseconds) and count for one `EventKind` on
/// one worker thread. Updated with relaxed ordering — these are
/// statistics, not gates.
#[derive(Default)]
pub struct DoerStat {
    total_us: CachePadded<AtomicU64>,
    count: CachePadded<AtomicU64>,
    slow_count: CachePadded<AtomicU64>,
}

impl DoerStat {
    pub fn record(&self, duration_us: u64, slow_threshold_us: u64) {
        self.total_us.fetch_add(duration_us, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        if duration_us > slow_threshold_us {
            self.slow_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn mean_us(&self) -> f64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.total_us.load(Ordering::Relaxed) as f64 / count as f64
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn slow_count(&self) -> u64 {
        self.slow_count.load(Ordering::Relaxed)
    }
}

/// One `DoerStat` per (worker, kind) pair.
pub struct WorkerStats {
    num_workers: usize,
    stats: Vec<DoerStat>,
}

const KINDS: [EventKind; 12] = [
    EventKind::PacketRx,
    EventKind::Fft,
    EventKind::Csi,
    EventKind::Zf,
    EventKind::Demul,
    EventKind::Decode,
    EventKind::Encode,
    EventKind::Precode,
    EventKind::Ifft,
    EventKind::PacketTx,
    EventKind::PacketPilotTx,
    EventKind::Rc,
];

fn kind_index(kind: EventKind) -> usize {
    KINDS.iter().position(|k| *k == kind).expect("exhaustive EventKind table")
}

impl WorkerStats {
    pub fn new(num_workers: usize) -> Self {
        let mut stats = Vec::with_capacity(num_workers * KINDS.len());
        stats.resize_with(num_workers * KINDS.len(), DoerStat::default);
        Self { num_workers, stats }
    }

    fn index(&self, worker_id: usize, kind: EventKind) -> usize {
        worker_id * KINDS.len() + kind_index(kind)
    }

    pub fn record(&self, worker_id: usize, kind: EventKind, duration_us: u64, slow_threshold_us: u64) {
        debug_assert!(worker_id < self.num_workers);
        self.stats[self.index(worker_id, kind)].record(duration_us, slow_threshold_us);
    }

    pub fn get(&self, worker_id: usize, kind: EventKind) -> &DoerStat {
        &self.stats[self.index(worker_id, kind)]
    }

    pub fn total_slow_tasks(&self) -> u64 {
        self.stats.iter().map(DoerStat::slow_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_mean_and_slow_count() {
        let stats = WorkerStats::new(2);
        stats.record(0, EventKind::Fft, 100, 500);
        stats.record(0, EventKind::Fft, 200, 500);
        stats.record(0, EventKind::Fft, 900, 500);
        let stat = stats.get(0, EventKind::Fft);
        assert_eq!(stat.count(), 3);
        assert_eq!(stat.slow_count(), 1);
        assert!((stat.mean_us() - 400.0).abs() < 1e-9);
    }

    #[test]
    fn worker_stats_are_isolated_per_worker() {
        let stats = WorkerStats::new(2);
        stats.record(0, EventKind::Decode, 10, 500);
        stats.record(1, EventKind::Decode, 20, 500);
        assert_eq!(stats.get(0, EventKind::Decode).count(), 1);
        assert_eq!(stats.get(1, EventKind::Decode).count(), 1);
        assert!((stats.get(0, EventKind::Decode).mean_us() - 10.0).abs() < 1e-9);
        assert!((stats.get(1, EventKind::Decode).mean_us() - 20.0).abs() < 1e-9);
    }
}
