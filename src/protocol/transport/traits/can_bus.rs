//! Minimal abstraction for a polled CAN bus. Allows the library to
//! plug into various implementations (embedded HAL, desktop driver,
//! in-memory test double, etc.).
use crate::protocol::transport::can_frame::CanFrame;

/// Contract to send and receive CAN frames without blocking.
///
/// The endpoint owns its bus exclusively and drives it from a
/// single-threaded poll loop, so no interior synchronization is
/// expected from implementations.
pub trait CanBus {
    type Error: core::fmt::Debug;

    /// Emit a frame on the bus. May block for the frame duration but
    /// must not wait for bus idle indefinitely.
    fn send(&mut self, frame: &CanFrame) -> Result<(), Self::Error>;

    /// Fetch the next pending frame, or `Ok(None)` when the receive
    /// queue is empty.
    fn try_recv(&mut self) -> Result<Option<CanFrame>, Self::Error>;
}
