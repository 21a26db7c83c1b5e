//! Persistent key/value storage abstraction.
//!
//! The broker persists four namespaces (registry, stored
//! subscriptions, stored topic names, ping configuration) through a
//! small typed get/put surface keyed by short strings, matching what
//! flash-preference stores on common MCUs offer. Each namespace is
//! guarded by a distinct magic sentinel; a missing or mismatched
//! sentinel means the namespace is treated as empty.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;

pub mod records;

/// Magic sentinel guarding the client registry namespace.
pub const REGISTRY_MAGIC: u16 = 0xCABE;
/// Magic sentinel guarding the stored-subscription namespace.
pub const SUBSCRIPTION_MAGIC: u16 = 0xCAFF;
/// Magic sentinel guarding the stored-topic-name namespace.
pub const TOPIC_NAME_MAGIC: u16 = 0xCA7E;

/// Contract for the persistent key/value store the broker owns.
///
/// Writes are expected to be durable once `put_*` returns: the broker
/// flushes every mutated namespace eagerly, before the triggering
/// operation completes.
pub trait KeyValueStore {
    type Error: core::fmt::Debug;

    /// Read a `u8`, or `None` when the key is absent.
    fn get_u8(&mut self, key: &str) -> Option<u8>;
    /// Read a `u16`, or `None` when the key is absent.
    fn get_u16(&mut self, key: &str) -> Option<u16>;
    /// Read a `u32`, or `None` when the key is absent.
    fn get_u32(&mut self, key: &str) -> Option<u32>;
    /// Copy a byte record into `out`; returns the stored length, or
    /// `None` when the key is absent or `out` is too small.
    fn get_bytes(&mut self, key: &str, out: &mut [u8]) -> Option<usize>;

    fn put_u8(&mut self, key: &str, value: u8) -> Result<(), Self::Error>;
    fn put_u16(&mut self, key: &str, value: u16) -> Result<(), Self::Error>;
    fn put_u32(&mut self, key: &str, value: u32) -> Result<(), Self::Error>;
    fn put_bytes(&mut self, key: &str, value: &[u8]) -> Result<(), Self::Error>;

    /// Drop every key in the store.
    fn clear(&mut self) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    U8(u8),
    U16(u16),
    U32(u32),
    Bytes(Vec<u8>),
}

/// RAM-backed [`KeyValueStore`].
///
/// Handle semantics: clones share the same backing map, so a "reboot"
/// can reopen the store a previous broker instance wrote. Contents do
/// not survive the process; production targets plug in a flash-backed
/// implementation instead.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<BTreeMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    type Error = core::convert::Infallible;

    fn get_u8(&mut self, key: &str) -> Option<u8> {
        match self.entries.borrow().get(key) {
            Some(Entry::U8(value)) => Some(*value),
            _ => None,
        }
    }

    fn get_u16(&mut self, key: &str) -> Option<u16> {
        match self.entries.borrow().get(key) {
            Some(Entry::U16(value)) => Some(*value),
            _ => None,
        }
    }

    fn get_u32(&mut self, key: &str) -> Option<u32> {
        match self.entries.borrow().get(key) {
            Some(Entry::U32(value)) => Some(*value),
            _ => None,
        }
    }

    fn get_bytes(&mut self, key: &str, out: &mut [u8]) -> Option<usize> {
        match self.entries.borrow().get(key) {
            Some(Entry::Bytes(bytes)) if bytes.len() <= out.len() => {
                out[..bytes.len()].copy_from_slice(bytes);
                Some(bytes.len())
            }
            _ => None,
        }
    }

    fn put_u8(&mut self, key: &str, value: u8) -> Result<(), Self::Error> {
        self.entries
            .borrow_mut()
            .insert(String::from(key), Entry::U8(value));
        Ok(())
    }

    fn put_u16(&mut self, key: &str, value: u16) -> Result<(), Self::Error> {
        self.entries
            .borrow_mut()
            .insert(String::from(key), Entry::U16(value));
        Ok(())
    }

    fn put_u32(&mut self, key: &str, value: u32) -> Result<(), Self::Error> {
        self.entries
            .borrow_mut()
            .insert(String::from(key), Entry::U32(value));
        Ok(())
    }

    fn put_bytes(&mut self, key: &str, value: &[u8]) -> Result<(), Self::Error> {
        self.entries
            .borrow_mut()
            .insert(String::from(key), Entry::Bytes(Vec::from(value)));
        Ok(())
    }

    fn clear(&mut self) -> Result<(), Self::Error> {
        self.entries.borrow_mut().clear();
        Ok(())
    }
}
