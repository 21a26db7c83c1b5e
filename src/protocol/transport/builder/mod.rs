//! Extended-frame generator: splits a logical message body into the
//! ordered sequence of 29-bit-ID frames the assembler on the other
//! side expects.
use crate::core::CAN_FRAME_DATA_LEN;
use crate::protocol::transport::can_frame::{CanFrame, ExtendedId};

/// Shared parameters for all frames composing one extended message.
#[derive(Debug)]
pub struct ExtendedFrameBuilder<'a> {
    msg_type: u8,
    body: &'a [u8],
}

/// Lazy iterator returning frames one by one as they are encoded.
pub struct FrameIterator<'a> {
    msg_type: u8,
    body: &'a [u8],
    total_frames: u16,
    next_seq: u16,
}

impl<'a> Iterator for FrameIterator<'a> {
    type Item = CanFrame;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_seq >= self.total_frames {
            return None;
        }
        let offset = usize::from(self.next_seq) * CAN_FRAME_DATA_LEN;
        let chunk_end = (offset + CAN_FRAME_DATA_LEN).min(self.body.len());
        let id = ExtendedId::new(self.msg_type, self.next_seq as u8, self.total_frames);
        self.next_seq += 1;
        Some(CanFrame::extended(id, &self.body[offset..chunk_end]))
    }
}

impl<'a> ExtendedFrameBuilder<'a> {
    /// Prepare a builder for one logical body. Callers cap the body at
    /// [`MAX_EXTENDED_PAYLOAD`](crate::core::MAX_EXTENDED_PAYLOAD)
    /// beforehand; the sequence counter limits transfers to 256 frames
    /// either way.
    pub fn new(msg_type: u8, body: &'a [u8]) -> Self {
        Self { msg_type, body }
    }

    /// Start the iteration; each call to `next` yields the next frame.
    pub fn frames(self) -> FrameIterator<'a> {
        FrameIterator {
            msg_type: self.msg_type,
            body: self.body,
            total_frames: self.body.len().div_ceil(CAN_FRAME_DATA_LEN) as u16,
            next_seq: 0,
        }
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
