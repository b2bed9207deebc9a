//! # InterLink Error Handling
//!
//! This module defines the LinkError enum, which represents the different
//! error types that can occur in the interlink-rs crate. Framing faults
//! (bad sync, bad CRC, bad version, oversized length) are deliberately NOT
//! errors: the parser counts them in [`DropStats`](crate::link::parser::DropStats)
//! and resynchronises silently.

use thiserror::Error;

/// Represents the different error types that can occur in the InterLink crate.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Indicates an error related to the serial port communication.
    #[error("Serial port error: {0}")]
    SerialPortError(String),

    /// Indicates an error when decoding a complete frame buffer.
    #[error("Error decoding InterLink frame: {0}")]
    FrameDecodeError(String),

    /// Indicates a CRC mismatch on a decoded frame.
    #[error("Invalid CRC: expected {expected:#06X}, calculated {calculated:#06X}")]
    InvalidCrc { expected: u16, calculated: u16 },

    /// Indicates a send was refused because the body exceeds the payload limit.
    #[error("Payload too large: {len} bytes exceeds limit of {max}")]
    PayloadTooLarge { len: usize, max: usize },

    /// Indicates a request could not be tracked because all slots are active.
    #[error("No free request slot (max pending {0})")]
    NoFreeSlot(usize),

    /// Indicates a request with the same correlation tag is already pending.
    #[error("Request {cmd:#06X}/{seq} is already pending")]
    DuplicateRequest { cmd: u16, seq: u8 },

    /// Indicates the transport accepted none of the frame bytes.
    #[error("Transport wrote zero bytes")]
    NothingWritten,

    /// Indicates an error driving the RS-485 direction line.
    #[error("Direction line error: {0}")]
    DirectionLine(String),

    /// Indicates an invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Indicates a command identifier outside the reserved range.
    #[error("Unknown command id: {0:#06X}")]
    UnknownCommand(u16),

    /// Indicates a command body that does not match its command's layout.
    #[error("Malformed command payload: {0}")]
    MalformedCommand(String),
}
