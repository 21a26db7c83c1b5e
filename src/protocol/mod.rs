//! Protocol implementation: wire message contract, CAN transport with
//! multi-frame support, the shared topic directory, and the broker and
//! client endpoints.
pub mod broker;
pub mod client;
pub mod messages;
pub mod topics;
pub mod transport;
