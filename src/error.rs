//! Error definitions shared across library modules. Driver and store
//! error types flow through generic parameters so hosts keep their own
//! failure detail.
use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Failures of the broker-side client registry.
pub enum RegistryError {
    /// Every slot is taken, or the permanent ID range is exhausted.
    #[error("registry full")]
    Full,
    /// The requested serial number is already bound to another client.
    #[error("serial already in use")]
    SerialConflict,
    /// No mapping exists for the given client ID or serial number.
    #[error("unknown client")]
    UnknownClient,
}

#[derive(Error, Debug)]
/// Errors surfaced by broker operations.
pub enum BrokerError<B: core::fmt::Debug, S: core::fmt::Debug> {
    /// CAN bus rejected a frame during transmission or reception.
    #[error("CAN bus error: {0:?}")]
    Bus(B),

    /// The persistent store failed to read or write a namespace.
    #[error("storage error: {0:?}")]
    Store(S),

    /// Registry mutation failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Ping configuration value outside its validated range.
    #[error("invalid ping configuration")]
    InvalidPingConfig,
}

#[derive(Error, Debug)]
/// Errors surfaced by client operations.
pub enum ClientError<B: core::fmt::Debug> {
    /// CAN bus rejected a frame during transmission or reception.
    #[error("CAN bus error: {0:?}")]
    Bus(B),

    /// Operation requires an assigned identity.
    #[error("not connected to a broker")]
    NotConnected,

    /// No (matching) ID_RESPONSE arrived within the caller's timeout.
    #[error("connect timed out")]
    ConnectTimeout,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Failures while decoding a persisted record.
pub enum RecordError {
    /// Record bytes are shorter than the fixed layout requires.
    #[error("record too short")]
    Truncated,
    /// A length or count field exceeds its table limit.
    #[error("record field out of range")]
    OutOfRange,
    /// A stored name is not valid UTF-8.
    #[error("malformed stored name")]
    MalformedName,
}
