//! Mock serial port implementation for testing
//!
//! This module provides a mock serial port that can be used to test the
//! link engine without requiring actual hardware. Bytes written by the
//! engine land in a shared tx buffer; tests queue incoming frames into the
//! rx buffer.

use crate::link::engine::LinkPort;
use crate::link::frame::{pack_packet, Packet};
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Mock serial port that simulates bidirectional communication
#[derive(Clone, Default)]
pub struct MockSerialPort {
    /// Data written to the port (outgoing)
    pub tx_buffer: Arc<Mutex<Vec<u8>>>,
    /// Data to be read from the port (incoming)
    pub rx_buffer: Arc<Mutex<VecDeque<u8>>>,
    /// Simulated error returned by the next read or write
    pub next_error: Arc<Mutex<Option<io::Error>>>,
}

impl MockSerialPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue raw bytes to be read from the port
    pub fn queue_rx_data(&self, data: &[u8]) {
        self.rx_buffer.lock().unwrap().extend(data);
    }

    /// Queue one complete frame to be read from the port
    pub fn queue_packet(&self, packet: &Packet) {
        self.queue_rx_data(&pack_packet(packet));
    }

    /// Get data that was written to the port
    pub fn get_tx_data(&self) -> Vec<u8> {
        self.tx_buffer.lock().unwrap().clone()
    }

    /// Clear all buffers
    pub fn clear(&self) {
        self.tx_buffer.lock().unwrap().clear();
        self.rx_buffer.lock().unwrap().clear();
    }

    /// Set an error to be returned on the next operation
    pub fn set_next_error(&self, error: io::Error) {
        *self.next_error.lock().unwrap() = Some(error);
    }
}

impl AsyncRead for MockSerialPort {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if let Some(error) = self.next_error.lock().unwrap().take() {
            return Poll::Ready(Err(error));
        }

        let mut rx = self.rx_buffer.lock().unwrap();
        let available = rx.len().min(buf.remaining());
        if available > 0 {
            let data: Vec<u8> = rx.drain(..available).collect();
            buf.put_slice(&data);
        }
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockSerialPort {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if let Some(error) = self.next_error.lock().unwrap().take() {
            return Poll::Ready(Err(error));
        }

        self.tx_buffer.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[async_trait::async_trait]
impl LinkPort for MockSerialPort {
    async fn flush_port(&mut self) -> Result<(), std::io::Error> {
        Ok(())
    }
}
