//! CAN transport layer: frame and identifier representations,
//! multi-frame assembly/building, bus and clock abstraction traits,
//! and the timing constants of the protocol.
//!
//! ## Timing constants
//!
//! Cheap CAN front-ends drop back-to-back frames (a three-frame TX
//! buffer is common), so every multi-frame or multi-recipient send is
//! paced. The values below are part of the protocol's behavior, not
//! tuning knobs.

use crate::core::{CAN_FRAME_DATA_LEN, MAX_EXTENDED_PAYLOAD};

pub mod assembler;
pub mod builder;
pub mod can_frame;
pub mod traits;

use self::builder::ExtendedFrameBuilder;
use self::can_frame::CanFrame;
use self::traits::can_bus::CanBus;
use self::traits::clock::Clock;

/// Delay between two extended frames of the same logical message (ms).
pub const INTER_FRAME_DELAY_MS: u32 = 5;
/// Delay between deliveries to successive subscribers of a topic (ms).
pub const FORWARD_DELAY_MS: u32 = 10;
/// Delay between SUB_RESTORE frames replayed after a handshake (ms).
pub const RESTORE_FRAME_DELAY_MS: u32 = 15;
/// Settling delay before the broker starts replaying stored
/// subscriptions to a freshly identified client (ms).
pub const RESTORE_SETTLE_DELAY_MS: u32 = 100;
/// A reassembly buffer that has not seen a frame for this long is
/// silently discarded (ms).
pub const REASSEMBLY_TIMEOUT_MS: u64 = 1000;

/// Send one logical message, choosing the frame form by size.
///
/// Bodies of at most eight bytes go out as a single standard frame
/// whose CAN ID is the message type; anything longer is split into a
/// paced sequence of extended frames. Bodies beyond
/// [`MAX_EXTENDED_PAYLOAD`] are truncated silently, mirroring the
/// receive-side cap.
pub(crate) fn send_message<C: CanBus, T: Clock>(
    bus: &mut C,
    clock: &mut T,
    msg_type: u8,
    body: &[u8],
) -> Result<(), C::Error> {
    let body = &body[..body.len().min(MAX_EXTENDED_PAYLOAD)];

    if body.len() <= CAN_FRAME_DATA_LEN {
        return bus.send(&CanFrame::standard(msg_type, body));
    }

    let mut first = true;
    for frame in ExtendedFrameBuilder::new(msg_type, body).frames() {
        if !first {
            clock.delay_ms(INTER_FRAME_DELAY_MS);
        }
        bus.send(&frame)?;
        first = false;
    }
    Ok(())
}
