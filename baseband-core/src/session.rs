//! The per-run shared-state bundle (spec §9, Design Notes).
//!
//! Everything a scheduler, worker, or radio thread needs is reached
//! through one `Arc<SessionState>` handed out at startup — the "cyclic
//! reference between scheduler and workers... broken by treating queues
//! and buffers as shared handles owned by a parent session object"
//! resolution to the Open Question in spec §9.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};

use crate::config::SessionConfig;
use crate::counters::FrameWindowCounters;
use crate::doer::DoerContext;
use crate::queue::{CompletionQueue, RequestQueue};
use crate::stats::WorkerStats;
use crate::topology::{discover_numa_nodes, Topology};

/// Bundled state shared by the scheduler, every worker thread, and the
/// radio front-end. Constructed once per run.
pub struct SessionState {
    pub config: Arc<SessionConfig>,
    pub counters: Arc<FrameWindowCounters>,
    pub request_queues: Arc<Vec<RequestQueue>>,
    pub completion_queue: Arc<CompletionQueue>,
    pub stats: Arc<WorkerStats>,
    pub doer_ctx: Arc<DoerContext>,
    pub topology: Arc<Topology>,
    /// Cleared by any thread to request an orderly shutdown (spec §8,
    /// "orderly shutdown under load").
    pub running: Arc<AtomicBool>,
    /// Set by the scheduler when the in-flight window nears capacity;
    /// read by the radio RX loop to pause admission (spec §4.5).
    pub admit_paused: Arc<AtomicBool>,
    /// Released once every worker has pinned its core; the radio
    /// front-end waits on this exactly once at startup before admitting
    /// any traffic (spec §5).
    pub startup_barrier: Arc<Barrier>,
}

impl SessionState {
    pub fn new(config: SessionConfig) -> Self {
        let config = Arc::new(config);
        let counters = Arc::new(FrameWindowCounters::new(&config));
        let request_queues = Arc::new(
            (0..config.num_workers)
                .map(|_| RequestQueue::new(config.queue_capacity))
                .collect::<Vec<_>>(),
        );
        let completion_queue = Arc::new(CompletionQueue::new(config.queue_capacity));
        let stats = Arc::new(WorkerStats::new(config.num_workers));
        let doer_ctx = Arc::new(DoerContext::new((*config).clone()));
        let topology = Arc::new(discover_numa_nodes());
        Self {
            config,
            counters,
            request_queues,
            completion_queue,
            stats,
            doer_ctx,
            topology,
            running: Arc::new(AtomicBool::new(true)),
            admit_paused: Arc::new(AtomicBool::new(false)),
            startup_barrier: Arc::new(Barrier::new(config.num_workers + 1)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn shut_down(&self) {
        self.running.store(false, Ordering::Release);
    }
}
