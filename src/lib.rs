//! # interlink-rs - A Rust Crate for the InterLink Serial Protocol
//!
//! The interlink-rs crate implements the InterLink protocol, a full-duplex,
//! half-duplex-capable framed messaging link for exchanging short
//! command/response packets over a byte-oriented serial transport
//! (typically UART, optionally RS-485 with direction control).
//!
//! ## Features
//!
//! - Connect to an InterLink peer over a serial port
//! - Sync-word framing with CRC-16/ARC integrity checking
//! - Streaming parser that resynchronises after any fault, with drop accounting
//! - Tracked requests with bounded retries, timeouts and a result queue
//! - Receive queue or per-packet callback dispatch
//! - RS-485 direction-line sequencing with configurable polarity and turnaround delay
//! - Typed decoding of the reserved command identifier range
//! - Support for logging and error handling
//!
//! ## Usage
//!
//! To use the interlink-rs crate in your Rust project, add the following to
//! your Cargo.toml file:
//!
//! ```toml
//! [dependencies]
//! interlink-rs = "0.1.0"
//! ```
//!
//! Then, in your Rust code, you can import the necessary modules and functions:
//!
//! ```rust
//! use interlink_rs::{
//!     connect, parse_command, init_logger,
//!     Command, DropStats, LinkError, Packet, PacketFlags, RequestStatus,
//! };
//! ```

pub mod command;
pub mod constants;
pub mod error;
pub mod link;
pub mod logging;
pub mod util;

pub use crate::error::LinkError;
pub use crate::logging::{init_logger, log_info};

// Core link types
pub use link::engine::{monotonic_millis, LinkConfig, LinkEngine, LinkPort};
pub use link::frame::{compute_crc, decode_packet, pack_packet, verify_packet, Packet, PacketFlags};
pub use link::gpio::{DirectionConfig, DirectionControl};
pub use link::parser::DropStats;
pub use link::serial::{SerialLink, SerialPortConfig};
pub use link::tracker::{RequestResult, RequestStatus};

// Typed command decoding
pub use command::{parse_command, Command};

/// Connect to an InterLink peer via serial port.
///
/// # Arguments
/// * `port` - Serial port path (e.g., "/dev/ttyUSB0" on Linux, "COM3" on Windows)
///
/// # Returns
/// * `Ok(SerialLink)` - Connected link engine
/// * `Err(LinkError)` - Connection failed
pub async fn connect(port: &str) -> Result<SerialLink, LinkError> {
    SerialLink::connect(port).await
}

/// Connect with explicit link capacities and serial settings.
pub async fn connect_with_config(
    port: &str,
    link_config: LinkConfig,
    serial_config: SerialPortConfig,
) -> Result<SerialLink, LinkError> {
    SerialLink::connect_with_config(port, link_config, serial_config).await
}
