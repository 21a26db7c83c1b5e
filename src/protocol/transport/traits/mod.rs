//! Abstraction traits decoupling the protocol core from the CAN
//! controller driver and the host's monotonic clock.
pub mod can_bus;
pub mod clock;
