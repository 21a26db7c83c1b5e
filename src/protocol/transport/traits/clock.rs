//! Monotonic clock abstraction providing the timing primitives needed
//! by reassembly timeouts, inter-frame pacing, and the liveness engine.

/// Millisecond-resolution monotonic time source.
pub trait Clock {
    /// Milliseconds elapsed since an arbitrary fixed origin.
    fn now_ms(&mut self) -> u64;

    /// Busy-wait for `millis` milliseconds. Implementations should
    /// yield to the CAN controller where the platform allows it.
    fn delay_ms(&mut self, millis: u32);
}
