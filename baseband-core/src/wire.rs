//! UDP emulated-radio wire format (spec §6).
//!
//! Fixed-size `Packet{frame_id, symbol_id, cell_id, ant_id, reserved,
//! data}`, with `data` holding `samps_per_symbol` complex int16 IQ
//! samples. The on-wire header fields use network byte order; the
//! payload is received directly into the per-slot buffer by the caller
//! to avoid an extra copy (spec §6 "Payload is received directly into
//! the per-slot buffer").

pub const HEADER_LEN: usize = 4 + 2 + 2 + 2 + 2; // frame, symbol, cell, ant, reserved

/// One complex int16 IQ sample, as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IqSampleI16 {
    pub i: i16,
    pub q: i16,
}

/// Parsed packet header. The payload is left in the caller's receive
/// buffer rather than copied into this struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub frame_id: u32,
    pub symbol_id: u16,
    pub cell_id: u16,
    pub ant_id: u16,
    pub reserved: u16,
}

impl PacketHeader {
    pub fn to_bytes(self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..4].copy_from_slice(&self.frame_id.to_be_bytes());
        buf[4..6].copy_from_slice(&self.symbol_id.to_be_bytes());
        buf[6..8].copy_from_slice(&self.cell_id.to_be_bytes());
        buf[8..10].copy_from_slice(&self.ant_id.to_be_bytes());
        buf[10..12].copy_from_slice(&self.reserved.to_be_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_LEN {
            return None;
        }
        Some(Self {
            frame_id: u32::from_be_bytes(buf[0..4].try_into().ok()?),
            symbol_id: u16::from_be_bytes(buf[4..6].try_into().ok()?),
            cell_id: u16::from_be_bytes(buf[6..8].try_into().ok()?),
            ant_id: u16::from_be_bytes(buf[8..10].try_into().ok()?),
            reserved: u16::from_be_bytes(buf[10..12].try_into().ok()?),
        })
    }
}

/// Flag bits for `RadioTx` (spec §6).
pub const HAS_TIME: u32 = 1;
pub const END_BURST: u32 = 2;

/// Encode a TX timestamp for software-framer mode (spec §4.7).
pub fn sw_framer_tx_timestamp(
    time0: u64,
    frame: u64,
    symbol: u64,
    frm_num_samps: u64,
    num_samps: u64,
    tx_frame_delta: u64,
    cl_tx_advance: u64,
) -> u64 {
    time0 + (frame + tx_frame_delta) * frm_num_samps + symbol * num_samps - cl_tx_advance
}

/// Encode a TX timestamp for hardware-framer mode (spec §4.7).
pub fn hw_framer_tx_timestamp(frame: u64, symbol: u64) -> u64 {
    (frame << 32) | (symbol << 16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrips_through_bytes() {
        let h = PacketHeader {
            frame_id: 123456,
            symbol_id: 17,
            cell_id: 2,
            ant_id: 5,
            reserved: 0,
        };
        let bytes = h.to_bytes();
        let parsed = PacketHeader::from_bytes(&bytes).unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn truncated_buffer_fails_to_parse() {
        let buf = [0u8; 4];
        assert!(PacketHeader::from_bytes(&buf).is_none());
    }

    #[test]
    fn hw_framer_timestamp_packs_frame_and_symbol() {
        let ts = hw_framer_tx_timestamp(7, 3);
        assert_eq!(ts, (7u64 << 32) | (3u64 << 16));
    }

    #[test]
    fn sw_framer_timestamp_matches_formula() {
        let ts = sw_framer_tx_timestamp(1000, 2, 5, 100, 10, 4, 3);
        assert_eq!(ts, 1000 + (2 + 4) * 100 + 5 * 10 - 3);
    }
}
