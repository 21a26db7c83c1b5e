//! `can-pubsub` library: a publish/subscribe messaging protocol layered
//! over classic CAN (8-byte frames), for `no_std` environments.
//!
//! A single **broker** coordinates many **clients** on a shared bus:
//! it hands out client identities (permanent ones bound to a serial
//! number, temporary ones for anonymous nodes), maintains the
//! per-topic subscriber table, forwards published payloads, relays
//! unicast peer messages, and runs the liveness (ping) engine.
//! Registry, subscription, and topic-name state survive power cycles
//! through a pluggable key/value store, so a rebooting client gets its
//! previous identity and subscriptions replayed.
//!
//! Payloads larger than one CAN frame travel as a sequence of
//! 29-bit-ID extended frames carrying a message type, a frame
//! sequence number, and the total frame count; both endpoints share
//! the same reassembler.
//!
//! The crate is strictly single-threaded and cooperative: both
//! endpoints expose a `poll()` that the host calls repeatedly, and all
//! I/O goes through the [`CanBus`](protocol::transport::traits::can_bus::CanBus)
//! and [`Clock`](protocol::transport::traits::clock::Clock) traits.
#![no_std]

extern crate alloc;

/// Shared data contract: identifier ranges, table limits, the topic
/// hash function, and bounded buffer/string types.
pub mod core;
/// Domain errors (broker, client, registry, persisted-record decoding).
pub mod error;
/// Infrastructure: persistent key/value storage and record codecs.
pub mod infra;
/// Protocol implementation: wire messages, CAN transport, broker and
/// client endpoints.
pub mod protocol;
