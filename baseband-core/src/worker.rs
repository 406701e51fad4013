//! Worker thread runtime (spec §4.6).
//!
//! Each worker owns a fixed set of [`WorkerDoers`], pinned to a core
//! chosen from the NUMA topology, and spins on its own `RequestQueue`:
//! dequeue, dispatch to the matching doer, push the completion onto the
//! shared `CompletionQueue`. No locks on this path; the only shared
//! mutable state touched is the counter fabric and buffer arenas, both
//! already externally synchronized (spec §5).

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::doer::WorkerDoers;
use crate::errors::{Result, SchedulerError};
use crate::session::SessionState;
use crate::tag::EventKind;

/// How long a worker backs off after finding its queue empty, before
/// checking again (spec §4.6, "brief pause on empty").
const EMPTY_QUEUE_BACKOFF: Duration = Duration::from_micros(50);

/// Spawn the worker thread for `worker_id`, pinned per the session's
/// NUMA topology. The thread runs until `session.running` clears.
pub fn spawn_worker(worker_id: usize, session: Arc<SessionState>) -> JoinHandle<Result<()>> {
    std::thread::Builder::new()
        .name(format!("baseband-worker-{worker_id}"))
        .spawn(move || run_worker(worker_id, session))
        .expect("failed to spawn worker thread")
}

fn run_worker(worker_id: usize, session: Arc<SessionState>) -> Result<()> {
    if let Some(core_id) = session.topology.core_for_worker(worker_id) {
        if !core_affinity::set_for_current(core_id) {
            tracing::warn!(worker_id, ?core_id, "failed to pin worker to core");
        }
    }

    let kinds = kinds_for_worker(worker_id, session.config.num_workers);
    let mut doers: Vec<WorkerDoers> = kinds
        .iter()
        .filter_map(|k| WorkerDoers::for_kind(*k))
        .collect();

    session.startup_barrier.wait();

    let queue = &session.request_queues[worker_id];
    while session.is_running() {
        match queue.try_dequeue() {
            Some(event) => {
                let doer = doers
                    .iter_mut()
                    .find(|d| d.kind() == event.kind)
                    .ok_or(SchedulerError::NoDoerForKind {
                        kind: event.kind,
                        worker_id,
                    })?;
                let (completion, elapsed_us) = doer.launch_timed(event.tag, &session.doer_ctx)?;
                session
                    .stats
                    .record(worker_id, event.kind, elapsed_us, session.config.slow_task_threshold_us);
                if elapsed_us > session.config.slow_task_threshold_us {
                    tracing::warn!(worker_id, kind = ?event.kind, elapsed_us, "slow doer task");
                }
                // Completion queue is shared and bounded; a full queue here
                // means the scheduler is falling behind. Retry rather than
                // drop, since dropping a completion would stall a gate
                // forever.
                while session
                    .completion_queue
                    .try_enqueue(completion)
                    .is_err()
                {
                    if !session.is_running() {
                        return Ok(());
                    }
                    std::thread::yield_now();
                }
            }
            None => std::thread::sleep(EMPTY_QUEUE_BACKOFF),
        }
    }
    Ok(())
}

/// Assigns `EventKind`s to workers. Every worker hosts every doer kind
/// (spec §4.4, "one doer per task kind per worker thread") — dispatch
/// fans out by hashing or round-robin at the scheduler, not by
/// restricting which kinds a given worker can run.
fn kinds_for_worker(_worker_id: usize, _num_workers: usize) -> Vec<EventKind> {
    vec![
        EventKind::Fft,
        EventKind::Csi,
        EventKind::Zf,
        EventKind::Demul,
        EventKind::Decode,
        EventKind::Encode,
        EventKind::Precode,
        EventKind::Ifft,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::tag::{Event, Tag};
    use std::time::Duration as StdDuration;

    #[test]
    fn worker_processes_one_task_and_emits_completion() {
        let session = Arc::new(SessionState::new(SessionConfig {
            num_workers: 1,
            ..SessionConfig::default()
        }));
        let tag = Tag::for_antenna(0, 0, 0);
        session.request_queues[0]
            .try_enqueue(Event::new(EventKind::Fft, tag))
            .unwrap();

        let running = Arc::clone(&session.running);
        let handle = spawn_worker(0, Arc::clone(&session));
        session.startup_barrier.wait();

        let mut got = None;
        for _ in 0..200 {
            if let Some(ev) = session.completion_queue.try_dequeue() {
                got = Some(ev);
                break;
            }
            std::thread::sleep(StdDuration::from_millis(5));
        }
        running.store(false, std::sync::atomic::Ordering::Release);
        handle.join().unwrap().unwrap();

        let ev = got.expect("worker should have produced a completion");
        assert_eq!(ev.kind, EventKind::Fft);
        assert_eq!(ev.tag, tag);
    }

    #[test]
    fn unregistered_kind_on_worker_is_an_error() {
        let session = Arc::new(SessionState::new(SessionConfig {
            num_workers: 1,
            ..SessionConfig::default()
        }));
        session.request_queues[0]
            .try_enqueue(Event::new(EventKind::PacketRx, Tag::for_frame_symbol(0, 0)))
            .unwrap();
        let result = run_worker_once_for_test(&session, 0);
        assert!(result.is_err());
    }

    /// Test helper: run one dequeue/dispatch iteration without the
    /// run-until-shutdown loop, so error paths are directly observable.
    fn run_worker_once_for_test(session: &Arc<SessionState>, worker_id: usize) -> Result<()> {
        let kinds = kinds_for_worker(worker_id, session.config.num_workers);
        let mut doers: Vec<WorkerDoers> = kinds
            .iter()
            .filter_map(|k| WorkerDoers::for_kind(*k))
            .collect();
        let event = session.request_queues[worker_id]
            .try_dequeue()
            .expect("queue should have one event");
        let doer = doers
            .iter_mut()
            .find(|d| d.kind() == event.kind)
            .ok_or(SchedulerError::NoDoerForKind {
                kind: event.kind,
                worker_id,
            })?;
        doer.launch_timed(event.tag, &session.doer_ctx)?;
        Ok(())
    }
}
