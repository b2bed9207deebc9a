//! # Link Engine
//!
//! The façade that owns the transport, the streaming parser, the request
//! tracker and the receive queue. The host integrates it cooperatively:
//! call [`LinkEngine::poll`] to drain the port and [`LinkEngine::tick`] to
//! advance retry/timeout deadlines, at whatever cadence the main loop
//! chooses. Neither suspends beyond the transport's own write semantics.
//!
//! Receive dispatch order for every accepted packet: the request tracker
//! first (it only acts on acks/responses for pending requests), then the
//! registered packet callback, or, with no callback, the bounded receive
//! queue. The callback sees every accepted packet including acks and
//! responses; it is informational, not filtering.

use crate::constants::{DEFAULT_MAX_PAYLOAD, DEFAULT_MAX_PENDING, DEFAULT_RX_QUEUE};
use crate::error::LinkError;
use crate::link::frame::{Packet, PacketFlags};
use crate::link::gpio::{DirectionConfig, DirectionControl};
use crate::link::parser::{DropStats, FrameParser};
use crate::link::tracker::{RequestResult, RequestStatus, RequestTracker};
use crate::util::hex::encode_hex;
use crate::util::logging::LogThrottle;
use once_cell::sync::Lazy;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{sleep, timeout};

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Milliseconds since the process first asked for the time. Wraps at `u32`;
/// all deadline arithmetic in the tracker is wrap-safe.
pub fn monotonic_millis() -> u32 {
    EPOCH.elapsed().as_millis() as u32
}

/// Trait for transport port operations
#[async_trait::async_trait]
pub trait LinkPort: AsyncReadExt + AsyncWriteExt + Unpin + Send {
    async fn flush_port(&mut self) -> Result<(), std::io::Error>;
}

/// Capacity configuration of one link instance.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Maximum body length accepted and sent, in bytes (<= 255)
    pub max_payload: usize,
    /// Receive queue depth in packets
    pub rx_queue_depth: usize,
    /// Maximum concurrently tracked requests (also sizes the result FIFO)
    pub max_pending: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            max_payload: DEFAULT_MAX_PAYLOAD,
            rx_queue_depth: DEFAULT_RX_QUEUE,
            max_pending: DEFAULT_MAX_PENDING,
        }
    }
}

impl LinkConfig {
    fn validate(&self) -> Result<(), LinkError> {
        if self.max_payload > 255 {
            return Err(LinkError::InvalidConfig(format!(
                "max_payload {} exceeds the one-byte length field",
                self.max_payload
            )));
        }
        if self.rx_queue_depth == 0 || self.max_pending == 0 {
            return Err(LinkError::InvalidConfig(
                "queue depths must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

type PacketCallback = Box<dyn FnMut(&Packet) + Send>;

/// The InterLink protocol engine over an arbitrary byte transport.
pub struct LinkEngine<P: LinkPort> {
    port: P,
    config: LinkConfig,
    parser: FrameParser,
    tracker: RequestTracker,
    rx_queue: VecDeque<Packet>,
    stats: DropStats,
    callback: Option<PacketCallback>,
    direction: Option<(Box<dyn DirectionControl>, DirectionConfig)>,
    drop_throttle: LogThrottle,
}

impl<P: LinkPort> LinkEngine<P> {
    /// Create an engine with default capacities (64-byte payloads, queue
    /// depth 4, 4 pending requests).
    pub fn new(port: P) -> Self {
        Self::with_config(port, LinkConfig::default())
            .expect("default link configuration is valid")
    }

    /// Create an engine with explicit capacities.
    pub fn with_config(port: P, config: LinkConfig) -> Result<Self, LinkError> {
        config.validate()?;
        Ok(LinkEngine {
            parser: FrameParser::new(config.max_payload),
            tracker: RequestTracker::new(config.max_pending),
            rx_queue: VecDeque::with_capacity(config.rx_queue_depth),
            stats: DropStats::default(),
            callback: None,
            direction: None,
            drop_throttle: LogThrottle::new(1000, 5),
            port,
            config,
        })
    }

    /// Register a callback invoked with every accepted packet. While a
    /// callback is registered nothing reaches the receive queue.
    pub fn set_packet_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&Packet) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    /// Remove the packet callback; accepted packets queue up again.
    pub fn clear_packet_callback(&mut self) {
        self.callback = None;
    }

    /// Attach an RS-485 direction line. The line is driven to its receive
    /// level immediately and around every transmission afterwards.
    pub fn set_direction_control(
        &mut self,
        mut line: Box<dyn DirectionControl>,
        config: DirectionConfig,
    ) -> Result<(), LinkError> {
        line.set_level(!config.active_high)?;
        self.direction = Some((line, config));
        Ok(())
    }

    /// Snapshot of the drop/accept counters.
    pub fn stats(&self) -> DropStats {
        self.stats
    }

    /// Packets waiting in the receive queue.
    pub fn available_packets(&self) -> usize {
        self.rx_queue.len()
    }

    /// Pop the oldest queued packet.
    pub fn read_packet(&mut self) -> Option<Packet> {
        self.rx_queue.pop_front()
    }

    /// Drain every byte the transport has buffered through the parser and
    /// dispatch accepted packets. Returns how many packets were accepted.
    /// Never blocks: a would-block read ends the drain.
    pub async fn poll(&mut self) -> Result<usize, LinkError> {
        let drops_before = self.dropped_total();
        let mut chunk = [0u8; 64];
        let mut accepted = 0;

        loop {
            let n = match timeout(Duration::ZERO, self.port.read(&mut chunk)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return Err(LinkError::SerialPortError(e.to_string())),
                Err(_) => break,
            };
            for &byte in &chunk[..n] {
                if let Some(packet) = self.parser.feed(byte, &mut self.stats) {
                    accepted += 1;
                    self.deliver(packet);
                }
            }
        }

        if self.dropped_total() != drops_before && self.drop_throttle.allow() {
            log::warn!("link dropped data, stats now {:?}", self.stats);
        }
        Ok(accepted)
    }

    /// Advance retry/timeout deadlines to `now_ms`, retransmitting requests
    /// that consumed a retry and queueing Timeout results for exhausted ones.
    pub async fn tick(&mut self, now_ms: u32) -> Result<(), LinkError> {
        for due in self.tracker.advance(now_ms) {
            log::debug!(
                "retransmitting request cmd={:#06X} seq={} ({} bytes)",
                due.cmd,
                due.seq,
                due.payload.len()
            );
            self.send(due.cmd, PacketFlags::ACK_REQ, due.seq, &due.payload)
                .await?;
        }
        Ok(())
    }

    /// Send one frame with the provided fields. Returns the number of bytes
    /// handed to the transport.
    pub async fn send(
        &mut self,
        cmd: u16,
        flags: PacketFlags,
        seq: u8,
        body: &[u8],
    ) -> Result<usize, LinkError> {
        if body.len() > self.config.max_payload {
            return Err(LinkError::PayloadTooLarge {
                len: body.len(),
                max: self.config.max_payload,
            });
        }
        let packet = Packet::new(cmd, flags, seq, body);
        self.transmit(&packet).await
    }

    /// Send a bare acknowledgement for (cmd, seq).
    pub async fn send_ack(&mut self, cmd: u16, seq: u8) -> Result<usize, LinkError> {
        self.send(cmd, PacketFlags::IS_ACK, seq, &[]).await
    }

    /// Send an error acknowledgement carrying a one-byte error code.
    pub async fn send_error_ack(
        &mut self,
        cmd: u16,
        seq: u8,
        error_code: u8,
    ) -> Result<usize, LinkError> {
        self.send(
            cmd,
            PacketFlags::IS_ACK | PacketFlags::IS_ERR,
            seq,
            &[error_code],
        )
        .await
    }

    /// Send a data response for (cmd, seq).
    pub async fn send_response(
        &mut self,
        cmd: u16,
        seq: u8,
        body: &[u8],
        is_error: bool,
    ) -> Result<usize, LinkError> {
        let mut flags = PacketFlags::IS_RESP;
        if is_error {
            flags |= PacketFlags::IS_ERR;
        }
        self.send(cmd, flags, seq, body).await
    }

    /// Send a request that expects an ack or response, tracked with the
    /// given per-attempt timeout and retry budget. `now_ms` seeds the first
    /// deadline so tests can drive time deterministically.
    pub async fn send_request(
        &mut self,
        cmd: u16,
        seq: u8,
        body: &[u8],
        timeout_ms: u32,
        retries: u8,
        now_ms: u32,
    ) -> Result<(), LinkError> {
        if body.len() > self.config.max_payload {
            return Err(LinkError::PayloadTooLarge {
                len: body.len(),
                max: self.config.max_payload,
            });
        }
        let slot = self
            .tracker
            .claim(cmd, seq, body, timeout_ms, retries, now_ms)?;
        match self.send(cmd, PacketFlags::ACK_REQ, seq, body).await {
            Ok(written) if written > 0 => Ok(()),
            Ok(_) => {
                self.tracker.release(slot);
                Err(LinkError::NothingWritten)
            }
            Err(e) => {
                self.tracker.release(slot);
                Err(e)
            }
        }
    }

    /// Drain one completed request result, oldest first.
    pub fn poll_request_result(&mut self) -> Option<RequestResult> {
        self.tracker.poll_result()
    }

    /// Requests currently awaiting a reply.
    pub fn pending_requests(&self) -> usize {
        self.tracker.active_count()
    }

    /// Blocking convenience: send a request and cooperatively poll + tick
    /// until its result arrives or `timeout_ms * (retries + 1)` elapses.
    /// Results for other requests drained meanwhile are put back in their
    /// original order of appearance.
    pub async fn send_request_and_wait(
        &mut self,
        cmd: u16,
        seq: u8,
        body: &[u8],
        timeout_ms: u32,
        retries: u8,
    ) -> Result<RequestResult, LinkError> {
        let started = monotonic_millis();
        self.send_request(cmd, seq, body, timeout_ms, retries, started)
            .await?;

        let overall = timeout_ms.saturating_mul(u32::from(retries) + 1);
        loop {
            self.poll().await?;
            self.tick(monotonic_millis()).await?;
            if let Some(result) = self.poll_request_result() {
                if result.cmd == cmd && result.seq == seq {
                    return Ok(result);
                }
                self.tracker.push_result(result);
            }
            if monotonic_millis().wrapping_sub(started) >= overall {
                return Ok(RequestResult {
                    status: RequestStatus::Timeout,
                    cmd,
                    seq,
                    response: None,
                });
            }
            sleep(Duration::from_millis(1)).await;
        }
    }

    // Tracker first, then callback XOR receive queue.
    fn deliver(&mut self, packet: Packet) {
        self.tracker.dispatch(&packet);
        if let Some(callback) = &mut self.callback {
            callback(&packet);
            return;
        }
        if self.rx_queue.len() < self.config.rx_queue_depth {
            self.rx_queue.push_back(packet);
        } else {
            self.stats.queue_overflow = self.stats.queue_overflow.wrapping_add(1);
        }
    }

    // Half-duplex transmit sequencing: assert the direction line, write
    // header / body / CRC, flush, hold through the turnaround delay, then
    // release the line. The line is released even when a write fails.
    async fn transmit(&mut self, packet: &Packet) -> Result<usize, LinkError> {
        self.set_direction(true)?;
        let result = self.write_frame(packet).await;

        if result.is_ok() {
            let delay_us = self
                .direction
                .as_ref()
                .map(|(_, cfg)| cfg.turnaround_delay_us)
                .unwrap_or(0);
            if delay_us > 0 {
                sleep(Duration::from_micros(u64::from(delay_us))).await;
            }
        }
        let release = self.set_direction(false);

        let written = result?;
        release?;
        Ok(written)
    }

    async fn write_frame(&mut self, packet: &Packet) -> Result<usize, LinkError> {
        let header = packet.header_bytes();
        let crc = packet.crc_bytes();
        log::trace!(
            "tx frame {} body={}",
            encode_hex(&header),
            encode_hex(&packet.body)
        );

        self.port
            .write_all(&header)
            .await
            .map_err(|e| LinkError::SerialPortError(e.to_string()))?;
        if !packet.body.is_empty() {
            self.port
                .write_all(&packet.body)
                .await
                .map_err(|e| LinkError::SerialPortError(e.to_string()))?;
        }
        self.port
            .write_all(&crc)
            .await
            .map_err(|e| LinkError::SerialPortError(e.to_string()))?;
        self.port
            .flush_port()
            .await
            .map_err(|e| LinkError::SerialPortError(e.to_string()))?;

        Ok(header.len() + packet.body.len() + crc.len())
    }

    fn set_direction(&mut self, transmit: bool) -> Result<(), LinkError> {
        if let Some((line, cfg)) = &mut self.direction {
            line.set_level(cfg.active_high == transmit)?;
        }
        Ok(())
    }

    fn dropped_total(&self) -> u32 {
        self.stats
            .sync_misses
            .wrapping_add(self.stats.crc_failures)
            .wrapping_add(self.stats.invalid_version)
            .wrapping_add(self.stats.length_overflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::gpio::test_support::RecordingPin;
    use crate::link::serial_mock::MockSerialPort;
    use std::sync::{Arc, Mutex};

    fn engine() -> (LinkEngine<MockSerialPort>, MockSerialPort) {
        let mock = MockSerialPort::new();
        (LinkEngine::new(mock.clone()), mock)
    }

    #[tokio::test]
    async fn send_writes_complete_wire_image() {
        let (mut link, mock) = engine();
        let written = link
            .send(0x0001, PacketFlags::empty(), 0, &[])
            .await
            .unwrap();

        assert_eq!(written, 10);
        assert_eq!(
            mock.get_tx_data(),
            vec![0xAA, 0x55, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2D]
        );
    }

    #[tokio::test]
    async fn send_rejects_oversized_body() {
        let (mut link, mock) = engine();
        let body = vec![0u8; 65];
        let result = link.send(0x0003, PacketFlags::empty(), 0, &body).await;

        assert!(matches!(
            result,
            Err(LinkError::PayloadTooLarge { len: 65, max: 64 })
        ));
        assert!(mock.get_tx_data().is_empty());
    }

    #[tokio::test]
    async fn poll_queues_accepted_packets_in_order() {
        let (mut link, mock) = engine();
        mock.queue_packet(&Packet::new(0x0003, PacketFlags::empty(), 1, b"hi"));
        mock.queue_packet(&Packet::new(0x0002, PacketFlags::empty(), 2, &[7]));

        assert_eq!(link.poll().await.unwrap(), 2);
        assert_eq!(link.available_packets(), 2);
        assert_eq!(link.read_packet().unwrap().cmd, 0x0003);
        assert_eq!(link.read_packet().unwrap().cmd, 0x0002);
        assert_eq!(link.stats().packets_accepted, 2);
    }

    #[tokio::test]
    async fn callback_keeps_receive_queue_empty() {
        let (mut link, mock) = engine();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        link.set_packet_callback(move |packet: &Packet| {
            sink.lock().unwrap().push(packet.cmd);
        });

        mock.queue_packet(&Packet::new(0x0001, PacketFlags::empty(), 0, &[]));
        mock.queue_packet(&Packet::new(0x0002, PacketFlags::IS_ACK, 5, &[]));
        link.poll().await.unwrap();

        // The callback sees every accepted packet, acks included.
        assert_eq!(*seen.lock().unwrap(), vec![0x0001, 0x0002]);
        assert_eq!(link.available_packets(), 0);
        assert_eq!(link.stats().queue_overflow, 0);
    }

    #[tokio::test]
    async fn full_queue_counts_overflow() {
        let (mut link, mock) = engine();
        for seq in 0..5 {
            mock.queue_packet(&Packet::new(0x0003, PacketFlags::empty(), seq, &[]));
        }
        link.poll().await.unwrap();

        assert_eq!(link.available_packets(), 4);
        assert_eq!(link.stats().queue_overflow, 1);
        assert_eq!(link.stats().packets_accepted, 5);
    }

    #[tokio::test]
    async fn request_ack_roundtrip() {
        let (mut link, mock) = engine();
        link.send_request(0x0002, 7, &[], 100, 2, 0).await.unwrap();
        assert_eq!(link.pending_requests(), 1);

        mock.queue_packet(&Packet::new(0x0002, PacketFlags::IS_ACK, 7, &[]));
        link.poll().await.unwrap();

        let result = link.poll_request_result().unwrap();
        assert_eq!(result.status, RequestStatus::Ack);
        assert_eq!((result.cmd, result.seq), (0x0002, 7));
        assert_eq!(link.pending_requests(), 0);
    }

    #[tokio::test]
    async fn retry_then_timeout_transmits_twice() {
        let (mut link, mock) = engine();
        link.send_request(0x0003, 1, b"x", 50, 1, 0).await.unwrap();
        let first_tx = mock.get_tx_data().len();

        link.tick(50).await.unwrap();
        assert_eq!(mock.get_tx_data().len(), first_tx * 2);

        link.tick(100).await.unwrap();
        assert_eq!(mock.get_tx_data().len(), first_tx * 2);

        let result = link.poll_request_result().unwrap();
        assert_eq!(result.status, RequestStatus::Timeout);
        assert_eq!((result.cmd, result.seq), (0x0003, 1));
    }

    #[tokio::test]
    async fn failed_transmission_releases_slot() {
        let (mut link, mock) = engine();
        mock.set_next_error(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "wire gone",
        ));

        let result = link.send_request(0x0002, 1, &[], 100, 0, 0).await;
        assert!(matches!(result, Err(LinkError::SerialPortError(_))));
        assert_eq!(link.pending_requests(), 0);
    }

    #[tokio::test]
    async fn send_request_and_wait_returns_matching_result() {
        let (mut link, mock) = engine();
        mock.queue_packet(&Packet::new(0x0002, PacketFlags::IS_RESP, 9, &[0xAB]));

        let result = link
            .send_request_and_wait(0x0002, 9, &[], 100, 1)
            .await
            .unwrap();
        assert_eq!(result.status, RequestStatus::Response);
        assert_eq!(result.response.unwrap().body, vec![0xAB]);
    }

    #[tokio::test]
    async fn direction_line_asserts_around_transmission() {
        let (mut link, _mock) = engine();
        let pin = RecordingPin::default();
        let levels = pin.levels.clone();
        link.set_direction_control(
            Box::new(pin),
            DirectionConfig {
                active_high: true,
                turnaround_delay_us: 10,
            },
        )
        .unwrap();

        link.send_ack(0x0004, 2).await.unwrap();

        // Receive level on attach, then transmit/receive around the frame.
        assert_eq!(*levels.lock().unwrap(), vec![false, true, false]);
    }

    #[tokio::test]
    async fn stray_reply_reports_unexpected() {
        let (mut link, mock) = engine();
        mock.queue_packet(&Packet::new(0x0005, PacketFlags::IS_ACK, 3, &[]));
        link.poll().await.unwrap();

        let result = link.poll_request_result().unwrap();
        assert_eq!(result.status, RequestStatus::Unexpected);
        assert_eq!(result.response.unwrap().cmd, 0x0005);
    }
}
