//! # Streaming Frame Parser
//!
//! Byte-driven state machine that turns the raw transport stream into
//! accepted [`Packet`]s plus drop accounting. The parser consumes exactly one
//! byte per step, never buffers across a failed frame, and resynchronises on
//! the next `SYNC1` byte after any drop.
//!
//! State flow:
//!
//! ```text
//! SeekSync1 -> SeekSync2 -> ReadFixedHeader -> ReadBody -> ReadCrc -> (accept/drop) -> SeekSync1
//! ```
//!
//! A repeated `0xAA` while waiting for `SYNC2` stays in `SeekSync2`, so a
//! sync byte appearing inside a dropped frame's tail cannot push a following
//! valid frame out of alignment.

use crate::constants::{FIXED_HEADER_LEN, PROTOCOL_VERSION, SYNC1, SYNC2};
use crate::link::crc::crc16_update;
use crate::link::frame::{decode_header, Packet};
use serde::Serialize;

/// Monotonic drop and accept counters.
///
/// Counters are never decremented and wrap silently on `u32` overflow after
/// long uptimes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DropStats {
    /// Bytes discarded while hunting for the sync word
    pub sync_misses: u32,
    /// Frames dropped on CRC mismatch
    pub crc_failures: u32,
    /// Frames dropped on an unsupported protocol version
    pub invalid_version: u32,
    /// Frames dropped because `len` exceeds the payload limit
    pub length_overflow: u32,
    /// Accepted packets discarded because the receive queue was full
    pub queue_overflow: u32,
    /// Frames that passed all checks
    pub packets_accepted: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    SeekSync1,
    SeekSync2,
    ReadFixedHeader,
    ReadBody,
    ReadCrc,
}

/// Streaming parser for InterLink frames.
#[derive(Debug)]
pub struct FrameParser {
    max_payload: usize,
    state: ParserState,
    header: [u8; FIXED_HEADER_LEN],
    header_index: usize,
    body: Vec<u8>,
    crc_bytes: [u8; 2],
    crc_index: usize,
}

impl FrameParser {
    /// Create a parser enforcing the given body length limit.
    pub fn new(max_payload: usize) -> Self {
        FrameParser {
            max_payload,
            state: ParserState::SeekSync1,
            header: [0; FIXED_HEADER_LEN],
            header_index: 0,
            body: Vec::with_capacity(max_payload),
            crc_bytes: [0; 2],
            crc_index: 0,
        }
    }

    /// Feed one byte; returns an accepted packet as soon as its final CRC
    /// byte arrives. Drops are recorded in `stats` and never surface as
    /// errors.
    pub fn feed(&mut self, byte: u8, stats: &mut DropStats) -> Option<Packet> {
        match self.state {
            ParserState::SeekSync1 => {
                if byte == SYNC1 {
                    self.state = ParserState::SeekSync2;
                } else {
                    stats.sync_misses = stats.sync_misses.wrapping_add(1);
                }
                None
            }
            ParserState::SeekSync2 => {
                if byte == SYNC2 {
                    self.state = ParserState::ReadFixedHeader;
                    self.header_index = 0;
                } else if byte == SYNC1 {
                    // A repeating 0xAA prefix still frames correctly.
                } else {
                    stats.sync_misses = stats.sync_misses.wrapping_add(1);
                    self.state = ParserState::SeekSync1;
                }
                None
            }
            ParserState::ReadFixedHeader => {
                self.header[self.header_index] = byte;
                self.header_index += 1;
                if self.header_index == FIXED_HEADER_LEN {
                    let header = decode_header(&self.header);
                    if header.ver != PROTOCOL_VERSION {
                        stats.invalid_version = stats.invalid_version.wrapping_add(1);
                        self.reset();
                    } else if usize::from(header.len) > self.max_payload {
                        stats.length_overflow = stats.length_overflow.wrapping_add(1);
                        self.reset();
                    } else if header.len == 0 {
                        self.state = ParserState::ReadCrc;
                        self.crc_index = 0;
                    } else {
                        self.body.clear();
                        self.state = ParserState::ReadBody;
                    }
                }
                None
            }
            ParserState::ReadBody => {
                self.body.push(byte);
                if self.body.len() == self.header[5] as usize {
                    self.state = ParserState::ReadCrc;
                    self.crc_index = 0;
                }
                None
            }
            ParserState::ReadCrc => {
                self.crc_bytes[self.crc_index] = byte;
                self.crc_index += 1;
                if self.crc_index < 2 {
                    return None;
                }
                let received = u16::from_le_bytes(self.crc_bytes);
                let computed = self.staged_crc();
                let packet = if received == computed {
                    stats.packets_accepted = stats.packets_accepted.wrapping_add(1);
                    Some(self.take_packet(received))
                } else {
                    stats.crc_failures = stats.crc_failures.wrapping_add(1);
                    None
                };
                self.reset();
                packet
            }
        }
    }

    /// Feed a whole slice, collecting every accepted packet in arrival order.
    pub fn feed_all(&mut self, data: &[u8], stats: &mut DropStats) -> Vec<Packet> {
        data.iter()
            .filter_map(|&byte| self.feed(byte, stats))
            .collect()
    }

    /// Discard any partially staged frame and return to sync hunting.
    pub fn reset(&mut self) {
        self.state = ParserState::SeekSync1;
        self.header_index = 0;
        self.body.clear();
        self.crc_index = 0;
    }

    // CRC over the raw header and body bytes exactly as received.
    fn staged_crc(&self) -> u16 {
        let mut crc = 0x0000;
        for &byte in &self.header {
            crc = crc16_update(crc, byte);
        }
        for &byte in &self.body {
            crc = crc16_update(crc, byte);
        }
        crc
    }

    fn take_packet(&mut self, crc: u16) -> Packet {
        let header = decode_header(&self.header);
        Packet {
            ver: header.ver,
            flags: header.flags,
            cmd: header.cmd,
            seq: header.seq,
            body: self.body.clone(),
            crc,
        }
    }
}
