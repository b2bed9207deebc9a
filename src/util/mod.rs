//! # Utility Modules
//!
//! Common helpers used throughout the interlink-rs crate: hex
//! encoding/decoding for frame dumps and rate-limited logging.

pub mod hex;
pub mod logging;

// Re-export commonly used types and functions
pub use hex::{decode_hex, encode_hex, HexError};
pub use logging::LogThrottle;
