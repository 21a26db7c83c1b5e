//! In-memory representation of a protocol CAN frame, and the 29-bit
//! extended identifier carrying the multi-frame transfer header.
use crate::core::CAN_FRAME_DATA_LEN;

// Extended-ID layout: [msg_type:8][frame_seq:8][total_frames:13].

//==================================================================================EXTENDED_ID
/// Encapsulates an extended CAN identifier (29 bits) and exposes
/// accessors for the message type, frame sequence, and total frame
/// count of a multi-frame transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ExtendedId(u32);

impl ExtendedId {
    /// Only 13 bits are defined for the frame count; the spare upper
    /// bits are written as zero and ignored on receive.
    pub const TOTAL_FRAMES_MASK: u16 = 0x1FFF;

    /// Compose an identifier from its three fields.
    pub const fn new(msg_type: u8, frame_seq: u8, total_frames: u16) -> Self {
        Self(
            ((msg_type as u32) << 21)
                | ((frame_seq as u32) << 13)
                | (total_frames & Self::TOTAL_FRAMES_MASK) as u32,
        )
    }

    /// Wrap a raw 29-bit identifier as read from the bus.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw & 0x1FFF_FFFF)
    }

    /// Raw 29-bit value for transmission.
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Message type carried in the upper byte.
    pub const fn msg_type(&self) -> u8 {
        (self.0 >> 21) as u8
    }

    /// Zero-based sequence number of this frame.
    pub const fn frame_seq(&self) -> u8 {
        (self.0 >> 13) as u8
    }

    /// Total number of frames in the transfer.
    pub const fn total_frames(&self) -> u16 {
        (self.0 as u16) & Self::TOTAL_FRAMES_MASK
    }
}

//==================================================================================CAN_ID
/// CAN identifier in either addressing form.
///
/// Short-form protocol frames put the message type directly in the
/// 11-bit standard identifier; long-form frames use the 29-bit
/// extended identifier above.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CanId {
    Standard(u16),
    Extended(ExtendedId),
}

impl CanId {
    pub const fn is_extended(&self) -> bool {
        matches!(self, Self::Extended(_))
    }
}

//==================================================================================CAN_FRAME
/// Raw frame as exchanged with the bus driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanFrame {
    pub id: CanId,
    /// Payload buffer. Classic CAN frames always provide eight bytes.
    pub data: [u8; CAN_FRAME_DATA_LEN],
    /// Number of valid payload bytes (0 to 8).
    pub len: usize,
}

impl CanFrame {
    /// Build a short-form frame; `body` must fit one CAN frame and is
    /// truncated otherwise.
    pub fn standard(msg_type: u8, body: &[u8]) -> Self {
        Self::with_id(CanId::Standard(msg_type as u16), body)
    }

    /// Build a long-form frame chunk under the given extended ID.
    pub fn extended(id: ExtendedId, chunk: &[u8]) -> Self {
        Self::with_id(CanId::Extended(id), chunk)
    }

    fn with_id(id: CanId, body: &[u8]) -> Self {
        let len = body.len().min(CAN_FRAME_DATA_LEN);
        let mut data = [0u8; CAN_FRAME_DATA_LEN];
        data[..len].copy_from_slice(&body[..len]);
        Self { id, data, len }
    }

    /// Valid payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

//==================================================================================TESTS
#[cfg(test)]
#[path = "tests.rs"]
mod tests;
