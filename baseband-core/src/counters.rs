//! Frame-window shared counters (spec §4.3) — the centerpiece of the
//! coordination fabric.
//!
//! Directly grounded on `examples/original_source/src/common/shared_counters.hpp`
//! (`RxStatus`, `DemulStatus`, `DecodeStatus`, `EncodeStatus`, `PrecodeStatus`):
//! fixed-size per-slot atomic arrays, gate predicates that compare a counter
//! to a precomputed threshold, and a single retirement routine that zeroes a
//! slot and advances `cur_frame_` under one mutex.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use crossbeam::utils::CachePadded;

use crate::config::{RetirementMode, SessionConfig};
use crate::errors::OverrunError;
use crate::tag::Tag;

/// `num_data_pkts` / `fft_done` / `demul_done` are indexed `[slot][symbol]`.
type PerSymbolCounters = Vec<CachePadded<AtomicUsize>>;

/// `encode_done` is indexed `[slot][ue][symbol]`.
type PerUeSymbolCounters = Vec<Vec<CachePadded<AtomicUsize>>>;

/// The frame-window shared-counter fabric described in spec §4.3.
///
/// Every counter is an atomic word with release-store on increment and
/// acquire-load on the threshold comparisons that gate downstream work,
/// so that a consumer observing a gate open is guaranteed to see every
/// buffer write that preceded the increment that opened it.
pub struct FrameWindowCounters {
    window: usize,
    max_symbols: usize,
    num_ue: usize,

    // RxStatus-equivalent
    num_pkts: Vec<CachePadded<AtomicUsize>>,
    num_pilot_pkts: Vec<CachePadded<AtomicUsize>>,
    num_data_pkts: PerSymbolCounters,
    encode_ready: Vec<CachePadded<AtomicUsize>>, // 0/1, set once first packet for frame arrives

    // Stage-completion counters
    fft_done: PerSymbolCounters,
    csi_done: Vec<CachePadded<AtomicUsize>>,
    zf_done: Vec<CachePadded<AtomicUsize>>,
    demul_done: PerSymbolCounters,
    decode_done: Vec<CachePadded<AtomicUsize>>,
    encode_done: PerUeSymbolCounters,
    /// Aggregate, per-`(slot, symbol)` count of UEs whose encode has
    /// completed for that symbol — the downlink mirror of `fft_done`,
    /// gating the per-subcarrier-block `Precode` fan-out the same way
    /// `fft_done` gates the `Csi` fan-out.
    encode_done_per_symbol: PerSymbolCounters,
    precode_done: Vec<CachePadded<AtomicUsize>>,

    // Thresholds, precomputed once from config.
    num_pilot_pkts_threshold: usize,
    num_pkts_threshold: usize,
    num_ant: usize,
    num_sc_blocks: usize,
    num_decode_tasks_threshold: usize,
    num_precode_tasks_threshold: usize,

    cur_frame: AtomicU64,
    latest_frame: AtomicU64,
    retirement_mode: RetirementMode,
    cur_frame_mutex: Mutex<()>,
}

fn zeroed_padded(n: usize) -> Vec<CachePadded<AtomicUsize>> {
    (0..n).map(|_| CachePadded::new(AtomicUsize::new(0))).collect()
}

impl FrameWindowCounters {
    pub fn new(cfg: &SessionConfig) -> Self {
        let w = cfg.frame_window;
        let max_symbols = cfg.max_symbols();
        let num_ue = cfg.num_ue;

        Self {
            window: w,
            max_symbols,
            num_ue,
            num_pkts: zeroed_padded(w),
            num_pilot_pkts: zeroed_padded(w),
            num_data_pkts: zeroed_padded(w * max_symbols),
            encode_ready: zeroed_padded(w),
            fft_done: zeroed_padded(w * max_symbols),
            csi_done: zeroed_padded(w),
            zf_done: zeroed_padded(w),
            demul_done: zeroed_padded(w * max_symbols),
            decode_done: zeroed_padded(w),
            encode_done: (0..w)
                .map(|_| zeroed_padded(num_ue * max_symbols))
                .collect(),
            encode_done_per_symbol: zeroed_padded(w * max_symbols),
            precode_done: zeroed_padded(w),
            num_pilot_pkts_threshold: cfg.num_ant * cfg.num_pilot_symbols(),
            num_pkts_threshold: cfg.total_packets_per_frame(),
            num_ant: cfg.num_ant,
            num_sc_blocks: cfg.num_sc_blocks,
            num_decode_tasks_threshold: cfg.num_decode_completions_per_frame(),
            num_precode_tasks_threshold: cfg.num_precode_completions_per_frame(),
            cur_frame: AtomicU64::new(0),
            latest_frame: AtomicU64::new(0),
            retirement_mode: cfg.retirement_mode,
            cur_frame_mutex: Mutex::new(()),
        }
    }

    fn sym_idx(&self, slot: usize, symbol: usize) -> usize {
        slot * self.max_symbols + symbol
    }

    pub fn cur_frame(&self) -> u64 {
        self.cur_frame.load(Ordering::Acquire)
    }

    pub fn latest_frame(&self) -> u64 {
        self.latest_frame.load(Ordering::Acquire)
    }

    /// Invariant 1: reject any frame at or beyond `cur_frame + W`.
    fn admit(&self, frame_id: u64) -> Result<(), OverrunError> {
        let cur = self.cur_frame.load(Ordering::Acquire);
        if frame_id >= cur + self.window as u64 || frame_id < cur {
            return Err(OverrunError::FrameBeyondWindow {
                frame_id,
                cur_frame: cur,
                window: self.window,
            });
        }
        Ok(())
    }

    /// RX calls this on every accepted packet. Returns `Ok(true)` once this
    /// slot has just reached `num_pkts` threshold (all packets for the frame
    /// arrived), mirroring `RxStatus::add_new_packet`.
    pub fn record_packet(&self, tag: Tag, is_pilot: bool) -> Result<bool, OverrunError> {
        let frame = tag.frame_id();
        self.admit(frame)?;
        if frame > self.latest_frame.load(Ordering::Acquire) {
            self.latest_frame.store(frame, Ordering::Release);
        }
        let slot = tag.slot(self.window);

        self.encode_ready[slot].store(1, Ordering::Release);
        let n = self.num_pkts[slot].fetch_add(1, Ordering::AcqRel) + 1;
        let full = n == self.num_pkts_threshold;

        if is_pilot {
            self.num_pilot_pkts[slot].fetch_add(1, Ordering::AcqRel);
        } else {
            let idx = self.sym_idx(slot, tag.symbol_id() as usize);
            self.num_data_pkts[idx].fetch_add(1, Ordering::AcqRel);
        }
        Ok(full)
    }

    pub fn received_all_pilots(&self, frame_id: u64) -> bool {
        if self.admit(frame_id).is_err() {
            return false;
        }
        let slot = (frame_id as usize) & (self.window - 1);
        self.num_pilot_pkts[slot].load(Ordering::Acquire) == self.num_pilot_pkts_threshold
    }

    pub fn is_demod_ready(&self, frame_id: u64, symbol_id: usize) -> bool {
        if self.admit(frame_id).is_err() {
            return false;
        }
        let slot = (frame_id as usize) & (self.window - 1);
        let idx = self.sym_idx(slot, symbol_id);
        self.num_data_pkts[idx].load(Ordering::Acquire) == self.num_ant
            && self.zf_done[slot].load(Ordering::Acquire) == self.num_sc_blocks
    }

    pub fn is_encode_ready(&self, frame_id: u64) -> bool {
        if self.admit(frame_id).is_err() {
            return false;
        }
        let slot = (frame_id as usize) & (self.window - 1);
        self.encode_ready[slot].load(Ordering::Acquire) != 0
    }

    pub fn fft_complete(&self, frame_id: u64, symbol_id: usize) -> bool {
        let slot = (frame_id as usize) & (self.window - 1);
        let idx = self.sym_idx(slot, symbol_id);
        let n = self.fft_done[idx].fetch_add(1, Ordering::AcqRel) + 1;
        n == self.num_ant
    }

    pub fn csi_complete(&self, frame_id: u64) -> bool {
        let slot = (frame_id as usize) & (self.window - 1);
        let n = self.csi_done[slot].fetch_add(1, Ordering::AcqRel) + 1;
        n == self.num_sc_blocks
    }

    pub fn zf_complete(&self, frame_id: u64) -> bool {
        let slot = (frame_id as usize) & (self.window - 1);
        let n = self.zf_done[slot].fetch_add(1, Ordering::AcqRel) + 1;
        n == self.num_sc_blocks
    }

    pub fn demul_complete(&self, frame_id: u64, symbol_id: usize) -> bool {
        let slot = (frame_id as usize) & (self.window - 1);
        let idx = self.sym_idx(slot, symbol_id);
        let n = self.demul_done[idx].fetch_add(1, Ordering::AcqRel) + 1;
        n == self.num_sc_blocks
    }

    pub fn ready_to_decode(&self, frame_id: u64, symbol_id: usize) -> bool {
        if self.admit(frame_id).is_err() {
            return false;
        }
        let slot = (frame_id as usize) & (self.window - 1);
        let idx = self.sym_idx(slot, symbol_id);
        self.demul_done[idx].load(Ordering::Acquire) == self.num_sc_blocks
    }

    pub fn encode_complete(&self, frame_id: u64, ue: usize, symbol_id: usize) -> bool {
        let slot = (frame_id as usize) & (self.window - 1);
        let idx = ue * self.max_symbols + symbol_id;
        let n = self.encode_done[slot][idx].fetch_add(1, Ordering::AcqRel) + 1;
        n == 1
    }

    /// Aggregate encode-complete gate for a `(frame, symbol)` pair: true
    /// once every UE's encode has landed for that symbol, mirroring
    /// `fft_complete`'s per-antenna aggregation. This is what fans out
    /// `Precode` per subcarrier block, the downlink counterpart of the
    /// `Fft` -> `Csi` fan-out.
    pub fn encode_symbol_complete(&self, frame_id: u64, symbol_id: usize) -> bool {
        let slot = (frame_id as usize) & (self.window - 1);
        let idx = self.sym_idx(slot, symbol_id);
        let n = self.encode_done_per_symbol[idx].fetch_add(1, Ordering::AcqRel) + 1;
        n == self.num_ue
    }

    /// Called by a decode worker on task completion. Returns `true` if this
    /// call made `cur_frame_` advance (frame retired).
    pub fn decode_done(&self, frame_id: u64) -> Result<bool, OverrunError> {
        self.admit(frame_id)?;
        let slot = (frame_id as usize) & (self.window - 1);
        let n = self.decode_done[slot].fetch_add(1, Ordering::AcqRel) + 1;
        if n < self.num_decode_tasks_threshold {
            return Ok(false);
        }
        Ok(self.retire_if_ready(RetirementMode::Uplink))
    }

    /// Called by a precode worker on task completion. Returns `true` if this
    /// call made `cur_frame_` advance (frame retired).
    pub fn precode_complete(&self, frame_id: u64) -> Result<bool, OverrunError> {
        self.admit(frame_id)?;
        let slot = (frame_id as usize) & (self.window - 1);
        let n = self.precode_done[slot].fetch_add(1, Ordering::AcqRel) + 1;
        if n < self.num_precode_tasks_threshold {
            return Ok(false);
        }
        Ok(self.retire_if_ready(RetirementMode::Downlink))
    }

    /// Single retirement reducer shared by both retirement paths (resolves
    /// the Open Question of spec §9: the two paths are mutually exclusive
    /// per session, selected by `retirement_mode`, but funnel through one
    /// routine). Holds `cur_frame_mutex_` for the whole critical section,
    /// the only permitted blocking point besides I/O and the startup
    /// barrier (spec §5). Loops in case the next slot is already complete.
    fn retire_if_ready(&self, path: RetirementMode) -> bool {
        if path != self.retirement_mode {
            return false;
        }
        let _guard = self.cur_frame_mutex.lock().unwrap();
        let mut advanced = false;
        loop {
            let cur = self.cur_frame.load(Ordering::Acquire);
            let slot = (cur as usize) & (self.window - 1);
            let ready = match self.retirement_mode {
                RetirementMode::Uplink => {
                    self.decode_done[slot].load(Ordering::Acquire) == self.num_decode_tasks_threshold
                }
                RetirementMode::Downlink => {
                    self.precode_done[slot].load(Ordering::Acquire) == self.num_precode_tasks_threshold
                }
            };
            if !ready {
                break;
            }
            self.zero_slot(slot);
            self.cur_frame.store(cur + 1, Ordering::Release);
            advanced = true;
        }
        advanced
    }

    /// Zero every per-slot counter. Only ever called from within the
    /// retirement critical section (invariant 4).
    fn zero_slot(&self, slot: usize) {
        self.num_pkts[slot].store(0, Ordering::Release);
        self.num_pilot_pkts[slot].store(0, Ordering::Release);
        self.encode_ready[slot].store(0, Ordering::Release);
        self.csi_done[slot].store(0, Ordering::Release);
        self.zf_done[slot].store(0, Ordering::Release);
        self.decode_done[slot].store(0, Ordering::Release);
        self.precode_done[slot].store(0, Ordering::Release);
        for sym in 0..self.max_symbols {
            let idx = self.sym_idx(slot, sym);
            self.num_data_pkts[idx].store(0, Ordering::Release);
            self.fft_done[idx].store(0, Ordering::Release);
            self.demul_done[idx].store(0, Ordering::Release);
            self.encode_done_per_symbol[idx].store(0, Ordering::Release);
        }
        for ue_sym in self.encode_done[slot].iter() {
            ue_sym.store(0, Ordering::Release);
        }
    }

    /// All per-slot counters for `slot` are currently zero (used by tests
    /// and the backpressure check).
    pub fn slot_is_clean(&self, slot: usize) -> bool {
        self.num_pkts[slot].load(Ordering::Acquire) == 0
            && self.num_pilot_pkts[slot].load(Ordering::Acquire) == 0
            && self.decode_done[slot].load(Ordering::Acquire) == 0
            && self.precode_done[slot].load(Ordering::Acquire) == 0
    }

    /// Backpressure predicate (spec §4.5): admission should pause when the
    /// in-flight window is nearly full.
    pub fn should_pause_admission(&self) -> bool {
        let cur = self.cur_frame.load(Ordering::Acquire);
        let latest = self.latest_frame.load(Ordering::Acquire);
        latest.saturating_sub(cur) >= (self.window as u64).saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;

    fn small_config() -> SessionConfig {
        SessionConfig {
            frame_window: 2,
            num_ant: 4,
            num_ue: 2,
            num_sc_blocks: 2,
            num_workers: 2,
            ..SessionConfig::default()
        }
    }

    #[test]
    fn happy_path_one_frame_retires() {
        let cfg = small_config();
        let counters = FrameWindowCounters::new(&cfg);

        // 4 antennas * (1 pilot + 2 ul-data) = 12 packets
        let ul0 = cfg.ul_data_symbol_index(0).unwrap();
        let ul1 = cfg.ul_data_symbol_index(1).unwrap();
        for ant in 0..4u32 {
            counters
                .record_packet(Tag::for_antenna(0, 1, ant), true)
                .unwrap();
            counters
                .record_packet(Tag::for_antenna(0, ul0 as u64, ant), false)
                .unwrap();
            counters
                .record_packet(Tag::for_antenna(0, ul1 as u64, ant), false)
                .unwrap();
        }
        assert!(counters.received_all_pilots(0));

        for _ in 0..cfg.num_decode_completions_per_frame() {
            counters.decode_done(0).unwrap();
        }
        assert_eq!(counters.cur_frame(), 1);
        assert!(counters.slot_is_clean(0));
    }

    #[test]
    fn overrun_rejected_beyond_window() {
        let cfg = small_config();
        let counters = FrameWindowCounters::new(&cfg);
        // window = 2, cur_frame = 0: frame 2 is out of range.
        let res = counters.record_packet(Tag::for_antenna(2, 0, 0), true);
        assert!(res.is_err());
    }

    #[test]
    fn retirement_is_in_order_across_frames() {
        let cfg = small_config();
        let counters = FrameWindowCounters::new(&cfg);
        for _ in 0..cfg.num_decode_completions_per_frame() {
            counters.decode_done(1).unwrap();
        }
        // Frame 1 cannot retire before frame 0: cur_frame stays at 0.
        assert_eq!(counters.cur_frame(), 0);
        for _ in 0..cfg.num_decode_completions_per_frame() {
            counters.decode_done(0).unwrap();
        }
        // Releasing frame 0 also retires the already-complete frame 1.
        assert_eq!(counters.cur_frame(), 2);
    }

    #[test]
    fn downlink_mode_ignores_decode_done() {
        let mut cfg = small_config();
        cfg.retirement_mode = RetirementMode::Downlink;
        let counters = FrameWindowCounters::new(&cfg);
        for _ in 0..cfg.num_decode_completions_per_frame() {
            counters.decode_done(0).unwrap();
        }
        assert_eq!(counters.cur_frame(), 0, "decode path must not retire in Downlink mode");
        for _ in 0..cfg.num_precode_completions_per_frame() {
            counters.precode_complete(0).unwrap();
        }
        assert_eq!(counters.cur_frame(), 1);
    }

    #[test]
    fn precode_threshold_scales_with_dl_data_symbol_count() {
        let mut cfg = small_config();
        cfg.retirement_mode = RetirementMode::Downlink;
        cfg.symbol_layout.push(crate::config::SymbolKind::DownlinkData);
        cfg.symbol_layout.push(crate::config::SymbolKind::DownlinkData);
        let counters = FrameWindowCounters::new(&cfg);

        // One subcarrier block short of two full downlink symbols' worth
        // of precode completions must not retire the frame.
        for _ in 0..cfg.num_precode_completions_per_frame() - 1 {
            counters.precode_complete(0).unwrap();
        }
        assert_eq!(counters.cur_frame(), 0);
        counters.precode_complete(0).unwrap();
        assert_eq!(counters.cur_frame(), 1);
    }

    #[test]
    fn encode_symbol_complete_gates_on_every_ue() {
        let cfg = small_config();
        let counters = FrameWindowCounters::new(&cfg);
        let symbol = 2;
        assert!(!counters.encode_symbol_complete(0, symbol));
        assert!(counters.encode_symbol_complete(0, symbol));
    }

    #[test]
    fn backpressure_flag_trips_near_window_edge() {
        let cfg = small_config();
        let counters = FrameWindowCounters::new(&cfg);
        assert!(!counters.should_pause_admission());
        counters.latest_frame.store(1, Ordering::Release);
        assert!(counters.should_pause_admission());
    }
}
