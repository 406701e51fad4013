//! Baseband scheduler error types with granular categories

use thiserror::Error;

/// Top-level error type for all baseband scheduler operations
#[derive(Debug, Error)]
pub enum BasebandError {
    #[error("Frame window overrun: {0}")]
    Overrun(#[from] OverrunError),

    #[error("Radio I/O error: {0}")]
    Radio(#[from] RadioError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Raised when a packet or completion references a frame outside `[cur_frame_, cur_frame_+W)`
#[derive(Debug, Error)]
pub enum OverrunError {
    #[error("packet for frame {frame_id} beyond window [{cur_frame}, {cur_frame}+{window})")]
    FrameBeyondWindow {
        frame_id: u64,
        cur_frame: u64,
        window: usize,
    },

    #[error("buffer for slot {slot} symbol {symbol} already marked full")]
    BufferFull { slot: usize, symbol: usize },
}

/// Radio front-end errors
#[derive(Debug, Error)]
pub enum RadioError {
    #[error("underrun: requested {requested} samples, received {received}")]
    Underrun { requested: usize, received: usize },

    #[error("hard driver error: return code {code}")]
    HardError { code: i32 },

    #[error("beacon sync lost after {attempts} resync attempts")]
    BeaconLoss { attempts: usize },

    #[error("beacon not detected within {tries} tries")]
    BeaconNotFound { tries: usize },
}

/// Scheduler/coordination-fabric errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(
        "gate violation: completion for frame {frame_id} outside [{cur_frame}, {cur_frame}+{window})"
    )]
    GateViolation {
        frame_id: u64,
        cur_frame: u64,
        window: usize,
    },

    #[error("enqueue failed: queue for worker {worker_id} is full")]
    EnqueueFailure { worker_id: usize },

    #[error("no doer registered for event kind {kind:?} on worker {worker_id}")]
    NoDoerForKind {
        kind: crate::tag::EventKind,
        worker_id: usize,
    },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("frame window must be a power of two, got {0}")]
    WindowNotPowerOfTwo(usize),

    #[error("num_workers must be > 0")]
    NoWorkers,

    #[error("invalid symbol layout: {reason}")]
    InvalidSymbolLayout { reason: String },

    #[error("failed to parse config: {0}")]
    Parse(String),
}

/// Result type alias for baseband scheduler operations
pub type Result<T> = std::result::Result<T, BasebandError>;
