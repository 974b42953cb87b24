// src/codec.rs
// Wire formats at both edges of the engine.
//
// Inbound: TCP stream of [u16 big-endian length][record] where the record is
// a fixed 36-byte ITCH-like message:
//   [0]      type ('A' add / 'X' partial cancel / 'E' execute / 'D' delete)
//   [1..15]  reserved
//   [15..19] order_ref (u32 BE)
//   [19]     side (0 = buy, 1 = sell)
//   [20..24] quantity (u32 BE)
//   [24..28] instrument id (u32 BE)
//   [28..32] reserved
//   [32..36] price, fixed-point x10000 (u32 BE)
// Unknown types are skipped; a frame whose declared length exceeds the
// buffered bytes stays buffered until the rest arrives.
//
// Outbound: 48-byte OUCH-like order records, batch-framed by a 4-byte
// portfolio value and word-reversed before transmission (see OrderRecord and
// reverse_words).

use zerocopy::byteorder::{BigEndian, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

pub const EVENT_MSG_BYTES: usize = 36;
pub const ORDER_MSG_BYTES: usize = 48;

/// Value carried by the 2-byte length prefix on every inbound frame.
#[allow(dead_code)] // wire contract; exercised by tests and the replay tool
pub const EVENT_FRAME_LEN: u16 = EVENT_MSG_BYTES as u16;

pub const SIDE_BUY: u8 = 0;
pub const SIDE_SELL: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Bid,
    Ask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Add {
        instr: u32,
        order_ref: u32,
        side: Side,
        qty: u64,
        px: u32,
    },
    Cancel { instr: u32, order_ref: u32, qty: u64 },
    Execute { instr: u32, order_ref: u32, qty: u64 },
    Delete { instr: u32, order_ref: u32 },
}

#[inline]
fn be_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

/// Decode one framed record (length prefix already stripped).
/// Returns None for unknown types or records too short to carry the fields.
pub fn decode_record(frame: &[u8]) -> Option<Event> {
    if frame.len() < EVENT_MSG_BYTES {
        return None;
    }
    let order_ref = be_u32(&frame[15..19]);
    let side = match frame[19] {
        SIDE_BUY => Side::Bid,
        SIDE_SELL => Side::Ask,
        _ => return None,
    };
    let qty = be_u32(&frame[20..24]) as u64;
    let instr = be_u32(&frame[24..28]);
    let px = be_u32(&frame[32..36]);

    match frame[0] {
        b'A' => Some(Event::Add { instr, order_ref, side, qty, px }),
        b'X' => Some(Event::Cancel { instr, order_ref, qty }),
        b'E' => Some(Event::Execute { instr, order_ref, qty }),
        b'D' => Some(Event::Delete { instr, order_ref }),
        _ => None,
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainStats {
    pub decoded: usize,
    pub skipped: usize,
}

/// Incremental framer over a TCP byte stream. Bytes are appended as they
/// arrive; complete frames are decoded and consumed, a trailing partial frame
/// is kept until more data shows up.
pub struct StreamFramer {
    buf: Vec<u8>,
}

impl StreamFramer {
    pub fn new() -> Self {
        Self { buf: Vec::with_capacity(64 * 1024) }
    }

    #[inline]
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    #[inline]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn drain_into(&mut self, out: &mut Vec<Event>) -> DrainStats {
        let mut stats = DrainStats::default();
        let mut off = 0usize;
        while off + 2 <= self.buf.len() {
            let len = u16::from_be_bytes([self.buf[off], self.buf[off + 1]]) as usize;
            if off + 2 + len > self.buf.len() {
                // declared length exceeds buffered bytes; wait for more
                break;
            }
            let frame = &self.buf[off + 2..off + 2 + len];
            match decode_record(frame) {
                Some(ev) => {
                    out.push(ev);
                    stats.decoded += 1;
                }
                None => stats.skipped += 1,
            }
            off += 2 + len;
        }
        if off > 0 {
            self.buf.drain(..off);
        }
        stats
    }
}

impl Default for StreamFramer {
    fn default() -> Self {
        Self::new()
    }
}

// --------------------------- Outbound records ----------------------------

/// Protocol flag bytes at offsets 26..=30 of every order record:
/// time-in-force '0', display 'Y', capacity 'P', ISE 'Y', cross type 'N'.
pub const PROTOCOL_FLAGS: [u8; 5] = *b"0YPYN";
pub const CL_ORD_ID: [u8; 14] = *b"CLORD_ID001XXX";

pub const ORDER_SIDE_BUY: u8 = b'B';
pub const ORDER_SIDE_SELL: u8 = b'S';
pub const ORDER_SIDE_NONE: u8 = b'N';

#[repr(C)]
#[derive(Clone, Copy, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct OrderRecord {
    pub kind: u8, // 'O'
    pub user_ref: U32<BigEndian>,
    pub side: u8, // 'B' / 'S' / 'N'
    pub quantity: U32<BigEndian>,
    pub symbol: [u8; 8], // space-padded
    pub reserved: [u8; 4],
    pub price: U32<BigEndian>, // fixed-point x10000
    pub flags: [u8; 5],
    pub cl_ord_id: [u8; 14],
    pub tail: [u8; 3],
}

impl OrderRecord {
    pub fn new(user_ref: u32, side: u8, quantity: u32, symbol: [u8; 8], price: u32) -> Self {
        Self {
            kind: b'O',
            user_ref: U32::new(user_ref),
            side,
            quantity: U32::new(quantity),
            symbol,
            reserved: [0; 4],
            price: U32::new(price),
            flags: PROTOCOL_FLAGS,
            cl_ord_id: CL_ORD_ID,
            tail: [0; 3],
        }
    }
}

/// Reverse the byte order within every 4-byte word in place. The transform is
/// its own inverse; the outbound batch must pass through it exactly once
/// before hitting the wire.
pub fn reverse_words(buf: &mut [u8]) {
    debug_assert!(buf.len() % 4 == 0, "word reversal needs a 4-byte aligned length");
    for word in buf.chunks_exact_mut(4) {
        word.reverse();
    }
}

/// Dollars to fixed-point x10000, truncating.
#[inline]
pub fn to_fixed_point(value: f64) -> u32 {
    (value * 10_000.0) as u32
}

#[inline]
pub fn from_fixed_point(px: u32) -> f64 {
    px as f64 / 10_000.0
}
