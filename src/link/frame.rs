//! # InterLink Frame Codec
//!
//! Serialisation and deserialisation of the InterLink wire layout:
//!
//! ```text
//! SYNC1=0xAA | SYNC2=0x55 | ver | flags | cmd_lo | cmd_hi | seq | len | body[0..len] | crc_lo | crc_hi
//! ```
//!
//! All multi-byte integers are little-endian. The CRC-16/ARC covers the six
//! fixed header bytes starting at `ver` plus the body; the sync word and the
//! CRC itself are excluded. The minimum frame is 10 bytes (empty body).
//!
//! Two decode paths exist: [`decode_packet`] parses a complete frame from a
//! contiguous buffer (used by tools and tests), while the streaming
//! [`FrameParser`](crate::link::parser::FrameParser) consumes the transport
//! byte stream field by field and never needs an intermediate buffer.

use crate::constants::{FIXED_HEADER_LEN, MIN_FRAME_LEN, PROTOCOL_VERSION, SYNC1, SYNC2};
use crate::constants::{FLAG_ACK_REQ, FLAG_IS_ACK, FLAG_IS_ERR, FLAG_IS_RESP};
use crate::error::LinkError;
use crate::link::crc::crc16_update;
use bitflags::bitflags;
use bytes::{BufMut, BytesMut};
use nom::bytes::complete::{tag, take};
use nom::number::complete::{le_u16, u8 as nom_u8};
use nom::IResult;

bitflags! {
    /// Frame flag bits. The upper nibble of the wire byte is reserved and
    /// always transmitted as zero.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PacketFlags: u8 {
        /// Sender requests an acknowledgement
        const ACK_REQ = FLAG_ACK_REQ;
        /// Frame is a bare acknowledgement
        const IS_ACK = FLAG_IS_ACK;
        /// Frame is a data response
        const IS_RESP = FLAG_IS_RESP;
        /// Reply carries an error
        const IS_ERR = FLAG_IS_ERR;
    }
}

impl PacketFlags {
    /// True for acks and responses, the two frame kinds the request tracker
    /// correlates against pending requests.
    pub fn is_reply(self) -> bool {
        self.intersects(PacketFlags::IS_ACK | PacketFlags::IS_RESP)
    }
}

/// In-memory representation of one InterLink frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub ver: u8,
    pub flags: PacketFlags,
    pub cmd: u16,
    pub seq: u8,
    pub body: Vec<u8>,
    pub crc: u16,
}

impl Packet {
    /// Build a packet with the current protocol version and a freshly
    /// computed CRC. User-supplied flags are clamped to the low nibble.
    pub fn new(cmd: u16, flags: PacketFlags, seq: u8, body: &[u8]) -> Self {
        let mut packet = Packet {
            ver: PROTOCOL_VERSION,
            flags,
            cmd,
            seq,
            body: body.to_vec(),
            crc: 0,
        };
        packet.crc = compute_crc(&packet);
        packet
    }

    /// Body length as carried in the `len` header byte.
    pub fn len(&self) -> u8 {
        self.body.len() as u8
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// The eight bytes preceding the body on the wire: sync word plus fixed
    /// header. The engine writes these, then the body, then the CRC, so no
    /// full-frame buffer is needed on the send path.
    pub fn header_bytes(&self) -> [u8; 8] {
        [
            SYNC1,
            SYNC2,
            self.ver,
            self.flags.bits(),
            (self.cmd & 0xFF) as u8,
            (self.cmd >> 8) as u8,
            self.seq,
            self.len(),
        ]
    }

    /// The trailing CRC, little-endian.
    pub fn crc_bytes(&self) -> [u8; 2] {
        self.crc.to_le_bytes()
    }
}

impl Default for Packet {
    fn default() -> Self {
        Packet::new(0, PacketFlags::empty(), 0, &[])
    }
}

/// Parsed view of the six fixed header bytes following the sync word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub ver: u8,
    pub flags: PacketFlags,
    pub cmd: u16,
    pub seq: u8,
    pub len: u8,
}

/// Decode the fixed header staged by the streaming parser. Field order on
/// the wire: ver, flags, cmd_lo, cmd_hi, seq, len.
pub fn decode_header(bytes: &[u8; FIXED_HEADER_LEN]) -> FrameHeader {
    FrameHeader {
        ver: bytes[0],
        flags: PacketFlags::from_bits_truncate(bytes[1]),
        cmd: u16::from_le_bytes([bytes[2], bytes[3]]),
        seq: bytes[4],
        len: bytes[5],
    }
}

/// Computes the CRC-16/ARC over a packet's header fields and body.
pub fn compute_crc(packet: &Packet) -> u16 {
    let mut crc = crc16_update(0x0000, packet.ver);
    crc = crc16_update(crc, packet.flags.bits());
    crc = crc16_update(crc, (packet.cmd & 0xFF) as u8);
    crc = crc16_update(crc, (packet.cmd >> 8) as u8);
    crc = crc16_update(crc, packet.seq);
    crc = crc16_update(crc, packet.len());
    for &byte in &packet.body {
        crc = crc16_update(crc, byte);
    }
    crc
}

/// Packs a packet into its contiguous wire image.
pub fn pack_packet(packet: &Packet) -> BytesMut {
    let mut buf = BytesMut::with_capacity(MIN_FRAME_LEN + packet.body.len());
    buf.put_slice(&packet.header_bytes());
    buf.put_slice(&packet.body);
    buf.put_slice(&packet.crc_bytes());
    buf
}

/// Uses the `nom` crate to decode one complete frame from a byte slice.
///
/// Structural decode only: the CRC field is parsed but not checked. Call
/// [`verify_packet`] to validate it.
pub fn decode_packet(input: &[u8]) -> IResult<&[u8], Packet> {
    let (input, _) = tag(&[SYNC1, SYNC2][..])(input)?;
    let (input, ver) = nom_u8(input)?;
    let (input, flags) = nom_u8(input)?;
    let (input, cmd) = le_u16(input)?;
    let (input, seq) = nom_u8(input)?;
    let (input, len) = nom_u8(input)?;
    let (input, body) = take(len as usize)(input)?;
    let (input, crc) = le_u16(input)?;

    Ok((
        input,
        Packet {
            ver,
            flags: PacketFlags::from_bits_truncate(flags),
            cmd,
            seq,
            body: body.to_vec(),
            crc,
        },
    ))
}

/// Verifies the integrity of a decoded packet.
pub fn verify_packet(packet: &Packet) -> Result<(), LinkError> {
    let calculated = compute_crc(packet);
    if packet.crc != calculated {
        return Err(LinkError::InvalidCrc {
            expected: packet.crc,
            calculated,
        });
    }
    Ok(())
}
