//! The master scheduler (spec §4.5).
//!
//! Single-threaded: consumes completion events, updates counters,
//! evaluates gate predicates, enqueues newly-eligible downstream tasks
//! onto workers, and attempts frame retirement. Grounded on the gate
//! evaluation in `examples/original_source/src/common/shared_counters.hpp`
//! and the stage ordering Agora's main loop follows.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::{SessionConfig, SymbolKind};
use crate::counters::FrameWindowCounters;
use crate::errors::{Result, SchedulerError};
use crate::queue::{CompletionQueue, RequestQueue};
use crate::tag::{Event, EventKind, Tag};

/// Scheduler-owned handles: the completion queue it drains and the
/// per-worker request queues it dispatches onto. Non-owning references
/// to the same queues are held by worker threads (spec §9, "cyclic
/// reference... broken by treating queues as shared handles owned by a
/// parent session object").
pub struct Scheduler {
    config: Arc<SessionConfig>,
    counters: Arc<FrameWindowCounters>,
    request_queues: Arc<Vec<RequestQueue>>,
    completion_queue: Arc<CompletionQueue>,
    admit_paused: Arc<AtomicBool>,
    round_robin: usize,
}

/// Selects a worker for embarrassingly-parallel, per-subcarrier-block
/// stages (demul, zf, precode) using a simple incrementing counter
/// (spec §4.5, "round-robin for embarrassingly parallel stages").
fn round_robin_worker(counter: &mut usize, num_workers: usize) -> usize {
    let w = *counter % num_workers;
    *counter = counter.wrapping_add(1);
    w
}

/// `hash(tag) mod num_workers` — the default worker-selection rule for
/// per-codeblock/per-antenna tasks (spec §4.5).
fn hashed_worker(tag: Tag, num_workers: usize) -> usize {
    (tag.hash() % num_workers as u64) as usize
}

impl Scheduler {
    pub fn new(
        config: Arc<SessionConfig>,
        counters: Arc<FrameWindowCounters>,
        request_queues: Arc<Vec<RequestQueue>>,
        completion_queue: Arc<CompletionQueue>,
        admit_paused: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config,
            counters,
            request_queues,
            completion_queue,
            admit_paused,
            round_robin: 0,
        }
    }

    fn dispatch(&self, worker_id: usize, event: Event) -> Result<()> {
        self.request_queues[worker_id]
            .try_enqueue(event)
            .map_err(|_| SchedulerError::EnqueueFailure { worker_id }.into())
    }

    fn check_range(&self, frame_id: u64) -> Result<()> {
        let cur = self.counters.cur_frame();
        let w = self.config.frame_window as u64;
        if frame_id < cur || frame_id >= cur + w {
            return Err(SchedulerError::GateViolation {
                frame_id,
                cur_frame: cur,
                window: self.config.frame_window,
            }
            .into());
        }
        Ok(())
    }

    /// One pass: drain the completion queue, react to each completion.
    /// Returns the number of completions processed. The caller loops this
    /// with a short spin/relax between calls (spec §4.2).
    pub fn tick(&mut self) -> Result<usize> {
        let mut batch = Vec::with_capacity(256);
        let n = self.completion_queue.try_dequeue_bulk(&mut batch, 256);
        for event in batch {
            self.handle_completion(event)?;
        }
        self.update_backpressure();
        Ok(n)
    }

    fn update_backpressure(&self) {
        self.admit_paused
            .store(self.counters.should_pause_admission(), Ordering::Release);
    }

    /// React to one completion: update gates it can open, dispatch newly
    /// eligible downstream work, and attempt retirement. This is the
    /// fairness-tie-break point (spec §4.5: lower frame_id first, FFT →
    /// CSI/Demul → ZF → Decode stage order) — we always evaluate the
    /// completion's own downstream implications immediately, so older
    /// frames (which entered the pipeline earlier) naturally drain first
    /// under FIFO production.
    fn handle_completion(&mut self, event: Event) -> Result<()> {
        self.check_range(event.tag.frame_id())?;
        match event.kind {
            EventKind::PacketRx => self.on_packet_rx(event.tag),
            EventKind::Fft => self.on_fft_done(event.tag),
            EventKind::Csi => self.on_csi_done(event.tag),
            EventKind::Zf => self.on_zf_done(event.tag),
            EventKind::Demul => self.on_demul_done(event.tag),
            EventKind::Decode => self.on_decode_done(event.tag),
            EventKind::Encode => self.on_encode_done(event.tag),
            EventKind::Precode => self.on_precode_done(event.tag),
            EventKind::Ifft | EventKind::PacketTx | EventKind::PacketPilotTx | EventKind::Rc => {
                Ok(())
            }
        }
    }

    /// A received packet (pilot or data, per antenna) immediately drives
    /// its own per-antenna FFT task; the aggregate FFT-complete gate
    /// (below) is what fans out to CSI once every antenna has landed.
    fn on_packet_rx(&mut self, tag: Tag) -> Result<()> {
        let frame = tag.frame_id();
        let worker = hashed_worker(tag, self.config.num_workers);
        self.dispatch(worker, Event::new(EventKind::Fft, tag))?;

        if self.counters.is_encode_ready(frame) {
            let worker = round_robin_worker(&mut self.round_robin, self.config.num_workers);
            self.dispatch(worker, Event::new(EventKind::Encode, tag))?;
        }
        Ok(())
    }

    /// Once every antenna's FFT has landed for a pilot symbol, fan out
    /// one CSI task per subcarrier block (spec §4.3 `csi_done` threshold
    /// of `num_sc_blocks`).
    fn on_fft_done(&mut self, tag: Tag) -> Result<()> {
        let frame = tag.frame_id();
        let symbol = tag.symbol_id() as usize;
        let is_pilot = self.config.symbol_layout.get(symbol) == Some(&SymbolKind::Pilot);
        if is_pilot && self.counters.fft_complete(frame, symbol) {
            for block in 0..self.config.num_sc_blocks as u32 {
                let t = Tag::for_subcarrier_block(frame, tag.symbol_id(), block);
                let worker = round_robin_worker(&mut self.round_robin, self.config.num_workers);
                self.dispatch(worker, Event::new(EventKind::Csi, t))?;
            }
        }
        Ok(())
    }

    /// Once every subcarrier block's CSI has completed, fan out one ZF
    /// task per subcarrier block (spec §4.3 `zf_done` threshold).
    fn on_csi_done(&mut self, tag: Tag) -> Result<()> {
        let frame = tag.frame_id();
        if self.counters.csi_complete(frame) {
            for block in 0..self.config.num_sc_blocks as u32 {
                let t = Tag::for_subcarrier_block(frame, tag.symbol_id(), block);
                let worker = round_robin_worker(&mut self.round_robin, self.config.num_workers);
                self.dispatch(worker, Event::new(EventKind::Zf, t))?;
            }
        }
        Ok(())
    }

    fn on_zf_done(&mut self, tag: Tag) -> Result<()> {
        let frame = tag.frame_id();
        if !self.counters.zf_complete(frame) {
            return Ok(());
        }
        for symbol in 0..self.config.max_symbols() {
            if self.counters.is_demod_ready(frame, symbol) {
                for block in 0..self.config.num_sc_blocks as u32 {
                    let t = Tag::for_subcarrier_block(frame, symbol as u64, block);
                    let worker = round_robin_worker(&mut self.round_robin, self.config.num_workers);
                    self.dispatch(worker, Event::new(EventKind::Demul, t))?;
                }
            }
        }
        Ok(())
    }

    fn on_demul_done(&mut self, tag: Tag) -> Result<()> {
        let frame = tag.frame_id();
        let symbol = tag.symbol_id() as usize;
        if !self.counters.demul_complete(frame, symbol) {
            return Ok(());
        }
        if self.counters.ready_to_decode(frame, symbol) {
            for ue in 0..self.config.num_ue as u32 {
                let t = Tag::for_codeblock(frame, tag.symbol_id(), ue, 0);
                let worker = hashed_worker(t, self.config.num_workers);
                self.dispatch(worker, Event::new(EventKind::Decode, t))?;
            }
        }
        Ok(())
    }

    fn on_decode_done(&mut self, tag: Tag) -> Result<()> {
        self.counters.decode_done(tag.frame_id())?;
        Ok(())
    }

    /// Once every UE's encode has landed for a downlink symbol, fan out
    /// one Precode task per subcarrier block (spec §4.3 `precode_done`
    /// threshold of `num_sc_blocks` per downlink symbol) — the downlink
    /// mirror of `on_fft_done`'s Csi fan-out.
    fn on_encode_done(&mut self, tag: Tag) -> Result<()> {
        let frame = tag.frame_id();
        let (ue, _) = tag.ue_cb();
        let symbol = tag.symbol_id() as usize;
        if !self.counters.encode_complete(frame, ue as usize, symbol) {
            return Ok(());
        }
        if self.counters.encode_symbol_complete(frame, symbol) {
            for block in 0..self.config.num_sc_blocks as u32 {
                let t = Tag::for_subcarrier_block(frame, tag.symbol_id(), block);
                let worker = round_robin_worker(&mut self.round_robin, self.config.num_workers);
                self.dispatch(worker, Event::new(EventKind::Precode, t))?;
            }
        }
        Ok(())
    }

    fn on_precode_done(&mut self, tag: Tag) -> Result<()> {
        self.counters.precode_complete(tag.frame_id())?;
        Ok(())
    }

    pub fn is_admission_paused(&self) -> bool {
        self.admit_paused.load(Ordering::Acquire)
    }
}
