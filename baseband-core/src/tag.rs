//! Compact 64-bit tags and the event types built from them.
//!
//! Mirrors Agora's `gen_tag_t` union (see `doencode.cc`): a tag packs a
//! frame id, a symbol id, and a payload whose interpretation depends on
//! which constructor built it (codeblock, subcarrier block, or antenna).

use std::fmt;

const FRAME_BITS: u32 = 24;
const SYMBOL_BITS: u32 = 10;
const DISC_BITS: u32 = 2;
const PAYLOAD_BITS: u32 = 64 - FRAME_BITS - SYMBOL_BITS - DISC_BITS;

const FRAME_MASK: u64 = (1 << FRAME_BITS) - 1;
const SYMBOL_MASK: u64 = (1 << SYMBOL_BITS) - 1;
const DISC_MASK: u64 = (1 << DISC_BITS) - 1;
const PAYLOAD_MASK: u64 = (1 << PAYLOAD_BITS) - 1;

const SYMBOL_SHIFT: u32 = PAYLOAD_BITS + DISC_BITS;
const FRAME_SHIFT: u32 = SYMBOL_SHIFT + SYMBOL_BITS;

const SUBFIELD_BITS: u32 = 14;
const SUBFIELD_MASK: u64 = (1 << SUBFIELD_BITS) - 1;

/// Discriminant for how a tag's payload field is packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum PayloadKind {
    /// No payload beyond (frame, symbol).
    FrameSymbol = 0,
    /// (ue_id, cb_index) packed into the payload.
    Codeblock = 1,
    /// A single subcarrier block index.
    SubcarrierBlock = 2,
    /// A single antenna index.
    Antenna = 3,
}

impl PayloadKind {
    fn from_disc(disc: u64) -> Self {
        match disc {
            0 => PayloadKind::FrameSymbol,
            1 => PayloadKind::Codeblock,
            2 => PayloadKind::SubcarrierBlock,
            3 => PayloadKind::Antenna,
            _ => unreachable!("2-bit discriminant"),
        }
    }
}

/// A packed 64-bit task identifier. Cheap to copy, comparable by equality.
///
/// Bit layout (MSB to LSB): `frame:24 | symbol:10 | disc:2 | payload:28`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag(u64);

impl Tag {
    fn pack(frame: u64, symbol: u64, disc: PayloadKind, payload: u64) -> Self {
        debug_assert!(frame <= FRAME_MASK, "frame_id {frame} exceeds 24 bits");
        debug_assert!(symbol <= SYMBOL_MASK, "symbol_id {symbol} exceeds 10 bits");
        debug_assert!(payload <= PAYLOAD_MASK, "payload {payload} exceeds 28 bits");
        let raw = (frame << FRAME_SHIFT)
            | (symbol << SYMBOL_SHIFT)
            | ((disc as u64 & DISC_MASK) << PAYLOAD_BITS)
            | (payload & PAYLOAD_MASK);
        Tag(raw)
    }

    /// Tag carrying only (frame, symbol) — used for beacon/pilot bookkeeping.
    pub fn for_frame_symbol(frame: u64, symbol: u64) -> Self {
        Self::pack(frame, symbol, PayloadKind::FrameSymbol, 0)
    }

    /// Tag carrying (frame, symbol, ue, codeblock) — encode/decode tasks.
    pub fn for_codeblock(frame: u64, symbol: u64, ue: u32, cb: u32) -> Self {
        let payload = ((ue as u64 & SUBFIELD_MASK) << SUBFIELD_BITS) | (cb as u64 & SUBFIELD_MASK);
        Self::pack(frame, symbol, PayloadKind::Codeblock, payload)
    }

    /// Tag carrying (frame, symbol, subcarrier_block) — demul/zf/precode tasks.
    pub fn for_subcarrier_block(frame: u64, symbol: u64, block: u32) -> Self {
        Self::pack(frame, symbol, PayloadKind::SubcarrierBlock, block as u64)
    }

    /// Tag carrying (frame, symbol, antenna) — FFT/CSI tasks.
    pub fn for_antenna(frame: u64, symbol: u64, antenna: u32) -> Self {
        Self::pack(frame, symbol, PayloadKind::Antenna, antenna as u64)
    }

    pub fn frame_id(self) -> u64 {
        (self.0 >> FRAME_SHIFT) & FRAME_MASK
    }

    pub fn symbol_id(self) -> u64 {
        (self.0 >> SYMBOL_SHIFT) & SYMBOL_MASK
    }

    fn payload(self) -> u64 {
        self.0 & PAYLOAD_MASK
    }

    fn disc(self) -> PayloadKind {
        PayloadKind::from_disc((self.0 >> PAYLOAD_BITS) & DISC_MASK)
    }

    /// `(ue_id, cb_index)` — only meaningful for tags built with [`Tag::for_codeblock`].
    pub fn ue_cb(self) -> (u32, u32) {
        debug_assert_eq!(self.disc(), PayloadKind::Codeblock);
        let payload = self.payload();
        let ue = (payload >> SUBFIELD_BITS) & SUBFIELD_MASK;
        let cb = payload & SUBFIELD_MASK;
        (ue as u32, cb as u32)
    }

    /// Subcarrier block index — only meaningful for tags built with
    /// [`Tag::for_subcarrier_block`].
    pub fn subcarrier_block(self) -> u32 {
        debug_assert_eq!(self.disc(), PayloadKind::SubcarrierBlock);
        self.payload() as u32
    }

    /// Antenna index — only meaningful for tags built with [`Tag::for_antenna`].
    pub fn antenna(self) -> u32 {
        debug_assert_eq!(self.disc(), PayloadKind::Antenna);
        self.payload() as u32
    }

    /// Slot index for this tag's frame, given a window width `w` (power of two).
    pub fn slot(self, w: usize) -> usize {
        (self.frame_id() as usize) & (w - 1)
    }

    /// A cheap, well-distributed hash used for `worker_id = hash(tag) mod num_workers`.
    pub fn hash(self) -> u64 {
        // SplitMix64 finalizer — fast, good avalanche for a 64-bit key.
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
        z ^ (z >> 31)
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tag")
            .field("frame", &self.frame_id())
            .field("symbol", &self.symbol_id())
            .field("raw", &format_args!("{:#018x}", self.0))
            .finish()
    }
}

/// The kind of task or completion an [`Event`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PacketRx,
    Fft,
    Csi,
    Zf,
    Demul,
    Decode,
    Encode,
    Precode,
    Ifft,
    PacketTx,
    PacketPilotTx,
    Rc,
}

/// `{kind, tag}` — the sole message exchanged through the queues in §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub tag: Tag,
}

impl Event {
    pub fn new(kind: EventKind, tag: Tag) -> Self {
        Self { kind, tag }
    }
}
