//! Byte-exact codecs for the persisted records.
//!
//! Every record has a fixed size so that a namespace round-trips
//! through any [`KeyValueStore`](super::KeyValueStore) without a
//! schema: names and serials are stored as a length byte plus a
//! zero-padded field of [`MAX_NAME_LEN`] bytes.

use crate::core::{ShortName, MAX_CLIENT_TOPICS, MAX_NAME_LEN};
use crate::error::RecordError;

/// One registered client: permanent ID, serial number, and whether the
/// registration is still active. Flagged inactive (not deleted) on
/// explicit unregister so the ID stays reserved for the serial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientMapping {
    pub client_id: u8,
    pub serial: ShortName,
    pub registered: bool,
}

impl ClientMapping {
    /// Encoded size: id, flag, length byte, padded serial.
    pub const SIZE: usize = 3 + MAX_NAME_LEN;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0] = self.client_id;
        out[1] = self.registered as u8;
        out[2] = self.serial.len() as u8;
        out[3..3 + self.serial.len()].copy_from_slice(self.serial.as_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, RecordError> {
        if bytes.len() < Self::SIZE {
            return Err(RecordError::Truncated);
        }
        let serial_len = bytes[2] as usize;
        if serial_len > MAX_NAME_LEN {
            return Err(RecordError::OutOfRange);
        }
        let serial_str = core::str::from_utf8(&bytes[3..3 + serial_len])
            .map_err(|_| RecordError::MalformedName)?;
        let serial = ShortName::try_from(serial_str).map_err(|_| RecordError::MalformedName)?;
        Ok(Self {
            client_id: bytes[0],
            serial,
            registered: bytes[1] != 0,
        })
    }
}

/// Persisted snapshot of one permanent client's topic set, replayed
/// when the client reconnects after a reboot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientTopics {
    pub client_id: u8,
    pub topics: heapless::Vec<u16, MAX_CLIENT_TOPICS>,
}

impl ClientTopics {
    /// Encoded size: id, count, fixed topic slots (big-endian).
    pub const SIZE: usize = 2 + 2 * MAX_CLIENT_TOPICS;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0] = self.client_id;
        out[1] = self.topics.len() as u8;
        for (slot, hash) in self.topics.iter().enumerate() {
            out[2 + 2 * slot..4 + 2 * slot].copy_from_slice(&hash.to_be_bytes());
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, RecordError> {
        if bytes.len() < Self::SIZE {
            return Err(RecordError::Truncated);
        }
        let count = bytes[1] as usize;
        if count > MAX_CLIENT_TOPICS {
            return Err(RecordError::OutOfRange);
        }
        let mut topics = heapless::Vec::new();
        for slot in 0..count {
            let hash = u16::from_be_bytes([bytes[2 + 2 * slot], bytes[3 + 2 * slot]]);
            // Capacity equals the decoded bound; push cannot fail here.
            let _ = topics.push(hash);
        }
        Ok(Self {
            client_id: bytes[0],
            topics,
        })
    }
}

/// Persisted topic-hash→name mapping, used to re-send human-readable
/// names during subscription restoration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTopicName {
    pub hash: u16,
    pub name: ShortName,
    /// Whether the hash currently has subscribers in the active table.
    pub active: bool,
}

impl StoredTopicName {
    /// Encoded size: hash, flag, length byte, padded name.
    pub const SIZE: usize = 4 + MAX_NAME_LEN;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[..2].copy_from_slice(&self.hash.to_be_bytes());
        out[2] = self.active as u8;
        out[3] = self.name.len() as u8;
        out[4..4 + self.name.len()].copy_from_slice(self.name.as_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, RecordError> {
        if bytes.len() < Self::SIZE {
            return Err(RecordError::Truncated);
        }
        let name_len = bytes[3] as usize;
        if name_len > MAX_NAME_LEN {
            return Err(RecordError::OutOfRange);
        }
        let name_str = core::str::from_utf8(&bytes[4..4 + name_len])
            .map_err(|_| RecordError::MalformedName)?;
        let name = ShortName::try_from(name_str).map_err(|_| RecordError::MalformedName)?;
        Ok(Self {
            hash: u16::from_be_bytes([bytes[0], bytes[1]]),
            name,
            active: bytes[2] != 0,
        })
    }
}
