//! # Serial Transport
//!
//! Opens and configures the UART behind a [`LinkEngine`]. The engine itself
//! is transport-agnostic; this module provides the `tokio-serial` binding
//! used on real hardware, 8N1 at a configurable baud rate.

use crate::error::LinkError;
use crate::link::engine::{LinkConfig, LinkEngine, LinkPort};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_serial::SerialPortBuilderExt;

/// A link engine bound to a native serial port.
pub type SerialLink = LinkEngine<tokio_serial::SerialStream>;

#[async_trait::async_trait]
impl LinkPort for tokio_serial::SerialStream {
    async fn flush_port(&mut self) -> Result<(), std::io::Error> {
        AsyncWriteExt::flush(self).await
    }
}

/// Configuration for the serial connection.
#[derive(Debug, Clone)]
pub struct SerialPortConfig {
    pub baudrate: u32,
    /// Character-level read timeout handed to the port driver
    pub timeout: Duration,
}

impl Default for SerialPortConfig {
    fn default() -> Self {
        SerialPortConfig {
            baudrate: 115_200,
            timeout: Duration::from_millis(500),
        }
    }
}

impl LinkEngine<tokio_serial::SerialStream> {
    /// Open `port_name` with default serial and link configuration.
    ///
    /// # Arguments
    /// * `port_name` - Serial port path (e.g., "/dev/ttyUSB0" on Linux, "COM3" on Windows)
    pub async fn connect(port_name: &str) -> Result<SerialLink, LinkError> {
        Self::connect_with_config(port_name, LinkConfig::default(), SerialPortConfig::default())
            .await
    }

    /// Open `port_name` with explicit link capacities and serial settings.
    pub async fn connect_with_config(
        port_name: &str,
        link_config: LinkConfig,
        serial_config: SerialPortConfig,
    ) -> Result<SerialLink, LinkError> {
        let port = tokio_serial::new(port_name, serial_config.baudrate)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .parity(tokio_serial::Parity::None)
            .timeout(serial_config.timeout)
            .open_native_async()
            .map_err(|e| LinkError::SerialPortError(e.to_string()))?;

        LinkEngine::with_config(port, link_config)
    }
}
