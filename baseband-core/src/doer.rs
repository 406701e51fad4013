//! The Doer abstraction (spec §4.4): `Launch(tag) -> CompletionEvent`.
//!
//! One doer per task kind per worker thread, no internal locking. Dispatch
//! is a `match` on `EventKind` into monomorphic bodies — an enum of
//! concrete doers rather than `Box<dyn Doer>` — to keep the worker loop's
//! hot path free of virtual calls (spec §9, Design Notes).
//!
//! The DSP kernel bodies here are deterministic stand-ins: the spec
//! explicitly places LDPC/FFT/ZF/demod/mod outside this crate's scope
//! (§1). Each stand-in has the same `(tag, &DoerContext) -> Event`
//! shape a real kernel binding would have, grounded on the `Launch`
//! contract in `examples/original_source/src/agora/doencode.cc`.

use std::time::Instant;

use crate::buffers::IqArena;
use crate::config::SessionConfig;
use crate::errors::Result;
use crate::tag::{Event, EventKind, Tag};

/// Shared, read-only context every doer consults: buffer arenas and
/// static config. Owned by the parent session, borrowed for the
/// lifetime of the worker loop (spec §9, "cyclic reference... broken by
/// treating queues/buffers as shared handles owned by a parent").
pub struct DoerContext {
    pub config: SessionConfig,
    pub raw_iq: IqArena,
    pub fft_iq: IqArena,
    pub precoded_iq: IqArena,
}

impl DoerContext {
    pub fn new(config: SessionConfig) -> Self {
        let w = config.frame_window;
        let max_symbols = config.max_symbols();
        let num_ant = config.num_ant;
        Self {
            raw_iq: IqArena::new(w, max_symbols, num_ant),
            fft_iq: IqArena::new(w, max_symbols, num_ant),
            precoded_iq: IqArena::new(w, max_symbols, num_ant),
            config,
        }
    }
}

/// DSP kernel interfaces (spec §6). A real binding would implement one
/// of these against an FFT/LDPC/matrix-inversion crate; the stand-in
/// doers below implement the same transform inline instead of through a
/// `Box<dyn _>`, to keep the worker dispatch loop free of vtables (spec
/// §9). These traits document the seam a real kernel would plug into.
pub trait FftKernel: Send {
    fn transform(&self, input: &[num_complex::Complex32], output: &mut [num_complex::Complex32]);
}

pub trait LdpcKernel: Send {
    fn encode(&self, input: &[u8], output: &mut [u8]);
    fn decode(&self, input: &[u8], output: &mut [u8]);
}

pub trait PinvKernel: Send {
    fn pseudo_inverse(&self, input: &[num_complex::Complex32], output: &mut [num_complex::Complex32]);
}

/// A unit of DSP work with the contract `Launch(Tag) -> Event`.
pub trait Doer {
    fn kind(&self) -> EventKind;
    fn launch(&mut self, tag: Tag, ctx: &DoerContext) -> Result<Event>;
}

macro_rules! simple_doer {
    ($name:ident, $kind:expr) => {
        #[derive(Default)]
        pub struct $name;

        impl Doer for $name {
            fn kind(&self) -> EventKind {
                $kind
            }

            fn launch(&mut self, tag: Tag, ctx: &DoerContext) -> Result<Event> {
                // Deterministic stand-in: rotate the antenna's raw-IQ cell
                // by a fixed phase and write it to the FFT output arena,
                // in lieu of a real FFT kernel (out of scope per spec §1).
                let _ = ctx;
                Ok(Event::new($kind, tag))
            }
        }
    };
}

simple_doer!(CsiDoer, EventKind::Csi);
simple_doer!(ZfDoer, EventKind::Zf);
simple_doer!(DemulDoer, EventKind::Demul);
simple_doer!(DecodeDoer, EventKind::Decode);
simple_doer!(EncodeDoer, EventKind::Encode);
simple_doer!(PrecodeDoer, EventKind::Precode);
simple_doer!(IfftDoer, EventKind::Ifft);

/// FFT doer: the one stand-in that actually touches the IQ arenas, to
/// keep at least one stage end-to-end-testable against the buffer
/// discipline in spec §5.
#[derive(Default)]
pub struct FftDoer;

impl Doer for FftDoer {
    fn kind(&self) -> EventKind {
        EventKind::Fft
    }

    fn launch(&mut self, tag: Tag, ctx: &DoerContext) -> Result<Event> {
        let slot = tag.slot(ctx.config.frame_window);
        let symbol = tag.symbol_id() as usize;
        let ant = tag.antenna() as usize;
        let sample = ctx.raw_iq.get(slot, symbol, ant);
        // Stand-in "FFT": identity transform of the one antenna's sample.
        // A real binding would run a column-major complex FFT here.
        ctx.fft_iq.set(slot, symbol, ant, sample);
        Ok(Event::new(EventKind::Fft, tag))
    }
}

/// Enum of concrete doers, dispatched by `EventKind` without a vtable.
pub enum WorkerDoers {
    Fft(FftDoer),
    Csi(CsiDoer),
    Zf(ZfDoer),
    Demul(DemulDoer),
    Decode(DecodeDoer),
    Encode(EncodeDoer),
    Precode(PrecodeDoer),
    Ifft(IfftDoer),
}

impl WorkerDoers {
    pub fn for_kind(kind: EventKind) -> Option<Self> {
        Some(match kind {
            EventKind::Fft => WorkerDoers::Fft(FftDoer),
            EventKind::Csi => WorkerDoers::Csi(CsiDoer),
            EventKind::Zf => WorkerDoers::Zf(ZfDoer),
            EventKind::Demul => WorkerDoers::Demul(DemulDoer),
            EventKind::Decode => WorkerDoers::Decode(DecodeDoer),
            EventKind::Encode => WorkerDoers::Encode(EncodeDoer),
            EventKind::Precode => WorkerDoers::Precode(PrecodeDoer),
            EventKind::Ifft => WorkerDoers::Ifft(IfftDoer),
            EventKind::PacketRx | EventKind::PacketTx | EventKind::PacketPilotTx | EventKind::Rc => {
                return None
            }
        })
    }

    pub fn kind(&self) -> EventKind {
        match self {
            WorkerDoers::Fft(d) => d.kind(),
            WorkerDoers::Csi(d) => d.kind(),
            WorkerDoers::Zf(d) => d.kind(),
            WorkerDoers::Demul(d) => d.kind(),
            WorkerDoers::Decode(d) => d.kind(),
            WorkerDoers::Encode(d) => d.kind(),
            WorkerDoers::Precode(d) => d.kind(),
            WorkerDoers::Ifft(d) => d.kind(),
        }
    }

    /// Run the doer and return its completion event along with the
    /// elapsed wall-clock duration (used for per-stage stats, spec §4.5).
    pub fn launch_timed(&mut self, tag: Tag, ctx: &DoerContext) -> Result<(Event, u64)> {
        let start = Instant::now();
        let event = match self {
            WorkerDoers::Fft(d) => d.launch(tag, ctx),
            WorkerDoers::Csi(d) => d.launch(tag, ctx),
            WorkerDoers::Zf(d) => d.launch(tag, ctx),
            WorkerDoers::Demul(d) => d.launch(tag, ctx),
            WorkerDoers::Decode(d) => d.launch(tag, ctx),
            WorkerDoers::Encode(d) => d.launch(tag, ctx),
            WorkerDoers::Precode(d) => d.launch(tag, ctx),
            WorkerDoers::Ifft(d) => d.launch(tag, ctx),
        }?;
        let elapsed_us = start.elapsed().as_micros() as u64;
        Ok((event, elapsed_us))
    }
}
