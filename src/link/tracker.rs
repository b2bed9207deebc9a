//! # Pending Request Tracker
//!
//! Bounded table of outstanding requests plus the result FIFO that carries
//! their terminal outcomes. The tracker is pure bookkeeping: it never touches
//! the transport. [`RequestTracker::advance`] reports which requests are due
//! for retransmission and the [`LinkEngine`](crate::link::engine::LinkEngine)
//! performs the writes.
//!
//! Deadline arithmetic uses wrapping subtraction, so a wrapping millisecond
//! clock is safe within a single timeout window.

use crate::error::LinkError;
use crate::link::frame::{Packet, PacketFlags};
use serde::Serialize;
use std::collections::VecDeque;

/// Terminal outcome classification of a tracked request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RequestStatus {
    Pending,
    Ack,
    Response,
    Timeout,
    Unexpected,
}

/// One entry of the result FIFO.
///
/// `response` carries a copy of the incoming packet for `Ack`, `Response`
/// and `Unexpected`; it is `None` for `Timeout`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestResult {
    pub status: RequestStatus,
    pub cmd: u16,
    pub seq: u8,
    pub response: Option<Packet>,
}

/// A retransmission the engine must perform after a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retransmit {
    pub cmd: u16,
    pub seq: u8,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
struct PendingRequest {
    active: bool,
    cmd: u16,
    seq: u8,
    retries_left: u8,
    timeout_ms: u32,
    last_send_ms: u32,
    payload: Vec<u8>,
}

/// Fixed-capacity tracker for requests awaiting an ack or response.
#[derive(Debug)]
pub struct RequestTracker {
    slots: Vec<PendingRequest>,
    results: VecDeque<RequestResult>,
    max_results: usize,
}

impl RequestTracker {
    pub fn new(max_pending: usize) -> Self {
        RequestTracker {
            slots: vec![PendingRequest::default(); max_pending],
            results: VecDeque::with_capacity(max_pending),
            max_results: max_pending,
        }
    }

    /// Claim the first inactive slot for a new request. The body is copied
    /// into the slot so the caller's buffer need not outlive the call.
    /// A (cmd, seq) pair can occupy at most one slot, so replies always
    /// correlate unambiguously.
    pub fn claim(
        &mut self,
        cmd: u16,
        seq: u8,
        body: &[u8],
        timeout_ms: u32,
        retries: u8,
        now_ms: u32,
    ) -> Result<usize, LinkError> {
        if self.is_pending(cmd, seq) {
            return Err(LinkError::DuplicateRequest { cmd, seq });
        }
        let index = self
            .slots
            .iter()
            .position(|slot| !slot.active)
            .ok_or(LinkError::NoFreeSlot(self.slots.len()))?;
        self.slots[index] = PendingRequest {
            active: true,
            cmd,
            seq,
            retries_left: retries,
            timeout_ms,
            last_send_ms: now_ms,
            payload: body.to_vec(),
        };
        Ok(index)
    }

    /// Release a slot without producing a result (used when the initial
    /// transmission fails).
    pub fn release(&mut self, index: usize) {
        self.slots[index].active = false;
    }

    /// Advance deadlines to `now_ms`. Requests past their timeout either
    /// consume one retry (returned for the engine to retransmit) or, with no
    /// retries left, terminate with a queued `Timeout` result.
    pub fn advance(&mut self, now_ms: u32) -> Vec<Retransmit> {
        let mut due = Vec::new();
        let mut timed_out = Vec::new();
        for slot in &mut self.slots {
            if !slot.active || now_ms.wrapping_sub(slot.last_send_ms) < slot.timeout_ms {
                continue;
            }
            if slot.retries_left > 0 {
                slot.retries_left -= 1;
                slot.last_send_ms = now_ms;
                due.push(Retransmit {
                    cmd: slot.cmd,
                    seq: slot.seq,
                    payload: slot.payload.clone(),
                });
            } else {
                slot.active = false;
                timed_out.push(RequestResult {
                    status: RequestStatus::Timeout,
                    cmd: slot.cmd,
                    seq: slot.seq,
                    response: None,
                });
            }
        }
        for result in timed_out {
            self.push_result(result);
        }
        due
    }

    /// Route an accepted packet to its pending request, if any.
    ///
    /// Packets without ack/response flags are ignored. A reply with no
    /// matching active slot is queued as `Unexpected`. When both flag bits
    /// are present (never produced by this codec) `Ack` takes precedence.
    pub fn dispatch(&mut self, packet: &Packet) {
        if !packet.flags.is_reply() {
            return;
        }

        let status = if packet.flags.contains(PacketFlags::IS_ACK) {
            RequestStatus::Ack
        } else {
            RequestStatus::Response
        };

        let matched = self
            .slots
            .iter_mut()
            .find(|slot| slot.active && slot.cmd == packet.cmd && slot.seq == packet.seq);

        let result = match matched {
            Some(slot) => {
                slot.active = false;
                RequestResult {
                    status,
                    cmd: packet.cmd,
                    seq: packet.seq,
                    response: Some(packet.clone()),
                }
            }
            None => RequestResult {
                status: RequestStatus::Unexpected,
                cmd: packet.cmd,
                seq: packet.seq,
                response: Some(packet.clone()),
            },
        };
        self.push_result(result);
    }

    /// Drain one terminal result, oldest first.
    pub fn poll_result(&mut self) -> Option<RequestResult> {
        self.results.pop_front()
    }

    /// Append a result, dropping it when the FIFO is full. Also used to
    /// put back results drained while waiting for a different request.
    pub fn push_result(&mut self, result: RequestResult) -> bool {
        if self.results.len() >= self.max_results {
            return false;
        }
        self.results.push_back(result);
        true
    }

    /// Number of requests currently awaiting a reply.
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.active).count()
    }

    /// True while (cmd, seq) occupies a slot.
    pub fn is_pending(&self, cmd: u16, seq: u8) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.active && slot.cmd == cmd && slot.seq == seq)
    }
}
