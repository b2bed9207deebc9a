//! The link module contains the components of the InterLink protocol
//! engine: the CRC and frame codecs, the streaming parser, the pending
//! request tracker, the engine façade, and the serial transport binding.

pub mod crc;
pub mod engine;
pub mod frame;
pub mod gpio;
pub mod parser;
pub mod serial;
pub mod tracker;

#[cfg(test)]
pub mod serial_mock;

pub use crc::{crc16, crc16_update};
pub use engine::{monotonic_millis, LinkConfig, LinkEngine, LinkPort};
pub use frame::{
    compute_crc, decode_header, decode_packet, pack_packet, verify_packet, FrameHeader, Packet,
    PacketFlags,
};
pub use gpio::{DirectionConfig, DirectionControl};
pub use parser::{DropStats, FrameParser};
pub use serial::{SerialLink, SerialPortConfig};
pub use tracker::{RequestResult, RequestStatus, RequestTracker};
