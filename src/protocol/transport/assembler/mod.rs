//! Extended-message assembler: rebuilds logical messages from the
//! consecutive extended frames of a multi-frame transfer.
//!
//! Each endpoint owns exactly one buffer. A transfer starts with frame
//! sequence zero, whose first payload byte is the logical sender ID;
//! continuation frames must carry the same message type or they are
//! dropped (no partial recovery across message types). A buffer idle
//! for [`REASSEMBLY_TIMEOUT_MS`](super::REASSEMBLY_TIMEOUT_MS) is
//! discarded silently, and accumulation is capped at
//! [`MAX_EXTENDED_PAYLOAD`] bytes with excess dropped, so an oversized
//! message is delivered truncated.
use crate::core::{Payload, MAX_EXTENDED_PAYLOAD};
use crate::protocol::transport::can_frame::{CanFrame, CanId};
use crate::protocol::transport::REASSEMBLY_TIMEOUT_MS;

#[derive(Debug, PartialEq, Eq)]
pub enum AssemblyResult {
    /// Frame not recognized as part of the active transfer (wrong
    /// message type, no active buffer, or not an extended frame).
    Ignored,
    /// Frame successfully integrated; more fragments are expected.
    FragmentConsumed,
    /// Final fragment received; the complete message is available.
    Complete(CompletedMessage),
}

/// Reassembled message handed to the endpoint's dispatcher.
///
/// `payload` holds the logical body *minus* the leading sender byte,
/// which the dispatcher re-prefixes before routing so that short and
/// long frames share one handler path.
#[derive(Debug, PartialEq, Eq)]
pub struct CompletedMessage {
    pub msg_type: u8,
    pub sender_id: u8,
    pub payload: Payload,
}

/// Single-buffer assembler owned by one endpoint.
#[derive(Debug)]
pub struct ExtendedAssembler {
    msg_type: u8,
    sender_id: u8,
    buffer: [u8; MAX_EXTENDED_PAYLOAD],
    received: usize,
    last_frame_ms: u64,
    active: bool,
}

impl Default for ExtendedAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtendedAssembler {
    /// Instantiate an idle assembler.
    pub const fn new() -> Self {
        Self {
            msg_type: 0,
            sender_id: 0,
            buffer: [0; MAX_EXTENDED_PAYLOAD],
            received: 0,
            last_frame_ms: 0,
            active: false,
        }
    }

    /// Discard any in-progress transfer.
    pub fn reset(&mut self) {
        self.active = false;
        self.received = 0;
        self.msg_type = 0;
        self.sender_id = 0;
        // The buffer itself need not be wiped; appends overwrite it.
    }

    /// Process one incoming frame against the buffer state.
    ///
    /// `now_ms` drives the idle-timeout check; standard frames are
    /// ignored so callers may feed every received frame through here.
    pub fn process_frame(&mut self, frame: &CanFrame, now_ms: u64) -> AssemblyResult {
        let CanId::Extended(ext_id) = frame.id else {
            return AssemblyResult::Ignored;
        };
        let msg_type = ext_id.msg_type();
        let frame_seq = ext_id.frame_seq();
        let total_frames = ext_id.total_frames();

        if self.active && now_ms.saturating_sub(self.last_frame_ms) > REASSEMBLY_TIMEOUT_MS {
            #[cfg(feature = "defmt")]
            defmt::debug!("reassembly timeout, dropping partial type {=u8:x}", self.msg_type);
            self.reset();
        }

        if total_frames == 0 {
            return AssemblyResult::Ignored;
        }

        if frame_seq == 0 {
            // First frame: carries the logical sender ID up front.
            self.reset();
            let Some((&sender_id, rest)) = frame.payload().split_first() else {
                return AssemblyResult::Ignored;
            };
            self.active = true;
            self.msg_type = msg_type;
            self.sender_id = sender_id;
            self.append(rest);
        } else {
            if !self.active || self.msg_type != msg_type {
                return AssemblyResult::Ignored;
            }
            self.append(frame.payload());
        }
        self.last_frame_ms = now_ms;

        if u16::from(frame_seq) == total_frames - 1 {
            let completed = CompletedMessage {
                msg_type: self.msg_type,
                sender_id: self.sender_id,
                payload: Payload::from_slice(&self.buffer[..self.received]),
            };
            self.reset();
            AssemblyResult::Complete(completed)
        } else {
            AssemblyResult::FragmentConsumed
        }
    }

    fn append(&mut self, bytes: &[u8]) {
        let room = MAX_EXTENDED_PAYLOAD - self.received;
        let copied = bytes.len().min(room);
        self.buffer[self.received..self.received + copied].copy_from_slice(&bytes[..copied]);
        self.received += copied;
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
