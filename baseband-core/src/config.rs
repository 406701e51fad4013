//! Static configuration for a scheduler session.

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Classification of a symbol within a frame, fixed at configuration time
/// (spec §3, "Symbol").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Beacon,
    Pilot,
    UplinkData,
    DownlinkData,
    Guard,
}

/// Which retirement path advances `cur_frame_` for this deployment.
///
/// Resolves the Open Question in spec §9: both `decode_done` and
/// `precode_done` exist in the counter fabric, but only one retires a
/// given session's frames, selected by static config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetirementMode {
    /// Uplink-dominant deployment: `decode_done` retires frames.
    Uplink,
    /// Downlink-dominant deployment: `precode_done` retires frames.
    Downlink,
}

/// How the number of decode tasks per frame is derived (spec §4.3,
/// `num_decode_tasks` row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeTaskMode {
    /// `num_ue * decode_threads_per_ue`.
    PerUe,
    /// `num_sc_blocks` (test mode).
    PerSubcarrierBlock,
}

/// Static, immutable session configuration. Built once at startup and
/// shared by `Arc` with every thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sliding window of in-flight frames (`W`). Must be a power of two.
    pub frame_window: usize,
    /// Number of base-station antennas.
    pub num_ant: usize,
    /// Number of users/UEs.
    pub num_ue: usize,
    /// Number of subcarrier blocks per frame.
    pub num_sc_blocks: usize,
    /// Number of worker threads (one request queue each).
    pub num_workers: usize,
    /// Per-frame symbol layout, fixed length.
    pub symbol_layout: Vec<SymbolKind>,
    /// Decode thread count per UE (used when `decode_task_mode == PerUe`).
    pub decode_threads_per_ue: usize,
    pub decode_task_mode: DecodeTaskMode,
    pub retirement_mode: RetirementMode,
    /// Per-stage Launch duration above which a slow-task warning is logged (spec §4.5).
    pub slow_task_threshold_us: u64,
    /// Consecutive resync failures before the radio thread signals `running = false`.
    pub resync_retry_max: usize,
    /// Frame interval between proactive beacon resync attempts.
    pub resync_interval_frames: u64,
    /// Consecutive beacon-detect attempts before giving up (still `UNSYNCED`).
    pub beacon_detect_interval: usize,
    /// Queue capacity for each request/completion queue.
    pub queue_capacity: usize,
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.frame_window.is_power_of_two() {
            return Err(ConfigError::WindowNotPowerOfTwo(self.frame_window));
        }
        if self.num_workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.symbol_layout.is_empty() {
            return Err(ConfigError::InvalidSymbolLayout {
                reason: "symbol_layout must not be empty".into(),
            });
        }
        Ok(())
    }

    pub fn num_pilot_symbols(&self) -> usize {
        self.symbol_layout
            .iter()
            .filter(|s| **s == SymbolKind::Pilot)
            .count()
    }

    pub fn num_ul_data_symbols(&self) -> usize {
        self.symbol_layout
            .iter()
            .filter(|s| **s == SymbolKind::UplinkData)
            .count()
    }

    pub fn num_dl_data_symbols(&self) -> usize {
        self.symbol_layout
            .iter()
            .filter(|s| **s == SymbolKind::DownlinkData)
            .count()
    }

    pub fn max_symbols(&self) -> usize {
        self.symbol_layout.len()
    }

    /// `num_ant * (num_pilot_sym + num_ul_data_sym)` — threshold for `num_pkts`.
    pub fn total_packets_per_frame(&self) -> usize {
        self.num_ant * (self.num_pilot_symbols() + self.num_ul_data_symbols())
    }

    /// Derived `num_decode_tasks` threshold (spec §4.3).
    pub fn num_decode_tasks(&self) -> usize {
        match self.decode_task_mode {
            DecodeTaskMode::PerUe => self.num_ue * self.decode_threads_per_ue,
            DecodeTaskMode::PerSubcarrierBlock => self.num_sc_blocks,
        }
    }

    /// Index of the n-th uplink-data symbol within `symbol_layout`.
    pub fn ul_data_symbol_index(&self, n: usize) -> Option<usize> {
        self.symbol_layout
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == SymbolKind::UplinkData)
            .nth(n)
            .map(|(i, _)| i)
    }

    /// Total `decode_done` completions expected per frame before
    /// `RetirementMode::Uplink` retires it (spec §4.3): one decode
    /// completion per UE (or UE × thread) for every UL-data symbol, since
    /// each symbol's demod gate fans out its own decode tasks
    /// independently. `.max(1)` keeps the threshold reachable even for a
    /// layout with no UL-data symbols.
    pub fn num_decode_completions_per_frame(&self) -> usize {
        self.num_decode_tasks() * self.num_ul_data_symbols().max(1)
    }

    /// Total `precode_complete` completions expected per frame before
    /// `RetirementMode::Downlink` retires it: one precode completion per
    /// subcarrier block for every DL-data symbol.
    pub fn num_precode_completions_per_frame(&self) -> usize {
        self.num_sc_blocks * self.num_dl_data_symbols().max(1)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        let mut layout = vec![SymbolKind::Beacon, SymbolKind::Pilot];
        layout.extend(std::iter::repeat(SymbolKind::UplinkData).take(2));
        Self {
            frame_window: 8,
            num_ant: 4,
            num_ue: 2,
            num_sc_blocks: 8,
            num_workers: 4,
            symbol_layout: layout,
            decode_threads_per_ue: 1,
            decode_task_mode: DecodeTaskMode::PerUe,
            retirement_mode: RetirementMode::Uplink,
            slow_task_threshold_us: 500,
            resync_retry_max: 5,
            resync_interval_frames: 1000,
            beacon_detect_interval: 50,
            queue_capacity: 4096,
        }
    }
}

/// Named configuration presets, mirroring the teacher CLI's preset
/// convention (`raman-whisper`, `burst-telemetry`, `deep-space-probe`).
pub fn preset(name: &str) -> Option<SessionConfig> {
    match name {
        "single-cell-udp-sim" => Some(SessionConfig::default()),
        "sdr-sw-framer" => Some(SessionConfig {
            num_ant: 8,
            num_ue: 4,
            num_sc_blocks: 16,
            num_workers: 8,
            ..SessionConfig::default()
        }),
        "sdr-hw-framer" => Some(SessionConfig {
            num_ant: 8,
            num_ue: 4,
            num_sc_blocks: 16,
            num_workers: 8,
            retirement_mode: RetirementMode::Downlink,
            ..SessionConfig::default()
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        SessionConfig::default().validate().unwrap();
    }

    #[test]
    fn non_power_of_two_window_rejected() {
        let cfg = SessionConfig {
            frame_window: 7,
            ..SessionConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::WindowNotPowerOfTwo(7))
        ));
    }

    #[test]
    fn presets_resolve_and_validate() {
        for name in ["single-cell-udp-sim", "sdr-sw-framer", "sdr-hw-framer"] {
            let cfg = preset(name).expect("known preset");
            cfg.validate().unwrap();
        }
        assert!(preset("unknown").is_none());
    }

    #[test]
    fn derived_thresholds_match_spec_formula() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.num_pilot_symbols(), 1);
        assert_eq!(cfg.num_ul_data_symbols(), 2);
        assert_eq!(cfg.total_packets_per_frame(), 4 * (1 + 2));
        assert_eq!(cfg.num_decode_tasks(), 2 * 1);
    }

    #[test]
    fn decode_completions_scale_with_ul_data_symbol_count() {
        let cfg = SessionConfig::default();
        // 2 UE * 1 thread each, across 2 UL-data symbols.
        assert_eq!(cfg.num_decode_completions_per_frame(), 2 * 1 * 2);
    }

    #[test]
    fn precode_completions_never_zero_even_with_no_dl_symbols() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.num_dl_data_symbols(), 0);
        assert_eq!(cfg.num_precode_completions_per_frame(), cfg.num_sc_blocks);
    }
}
