//! Real-time baseband frame scheduler and shared-state coordination
//! fabric.
//!
//! This crate implements the scheduler side of a software-defined
//! cellular baseband stack: tag/event encoding, lock-free request/
//! completion queues, the frame-window shared-counter fabric, the
//! `Doer` task abstraction, the master scheduler, the worker runtime,
//! and the RX/TX front-end's software-framer state machine. DSP kernels
//! (FFT, LDPC, zero-forcing, demodulation) and radio I/O drivers are
//! pluggable collaborators behind thin trait boundaries; this crate
//! ships deterministic stand-ins sufficient to exercise the scheduling
//! machinery end to end.

pub mod buffers;
pub mod config;
pub mod counters;
pub mod doer;
pub mod errors;
pub mod queue;
pub mod radio;
pub mod scheduler;
pub mod session;
pub mod stats;
pub mod tag;
pub mod topology;
pub mod wire;
pub mod worker;

pub use config::{RetirementMode, SessionConfig, SymbolKind};
pub use errors::{BasebandError, Result};
pub use session::SessionState;
pub use tag::{Event, EventKind, Tag};
