//! Broker-side client registry: serial→ID mappings with permanent and
//! temporary identifier allocation.
//!
//! Permanent IDs (0x01–0x64) are bound to a serial number and
//! persisted; temporary IDs (0x65–0xFE) go to anonymous clients and
//! never touch storage. Both allocators wrap within their range and
//! skip values still in use, so a wrap cannot silently collide; a full
//! sweep without a free value reports exhaustion instead.
use crate::core::{
    is_permanent_id, short_name, MAX_CLIENT_MAPPINGS, PERMANENT_ID_MAX, PERMANENT_ID_MIN,
    TEMPORARY_ID_MAX, TEMPORARY_ID_MIN,
};
use crate::error::RegistryError;
use crate::infra::storage::records::ClientMapping;

/// Outcome of a by-serial identity lookup/creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub client_id: u8,
    /// Whether the serial was already known before this call.
    pub rejoined: bool,
}

/// Serial→ID mapping table plus the two ID allocators.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    mappings: heapless::Vec<ClientMapping, MAX_CLIENT_MAPPINGS>,
    next_permanent: u8,
    next_temporary: u8,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            mappings: heapless::Vec::new(),
            next_permanent: PERMANENT_ID_MIN,
            next_temporary: TEMPORARY_ID_MIN,
        }
    }

    /// Return the existing identity for `serial`, or bind it to a
    /// freshly allocated permanent ID. Either way the mapping ends up
    /// flagged registered.
    pub fn register(&mut self, serial: &str) -> Result<Identity, RegistryError> {
        let serial = short_name(serial);
        if let Some(mapping) = self
            .mappings
            .iter_mut()
            .find(|mapping| mapping.serial == serial)
        {
            mapping.registered = true;
            return Ok(Identity {
                client_id: mapping.client_id,
                rejoined: true,
            });
        }

        if self.mappings.is_full() {
            return Err(RegistryError::Full);
        }
        let client_id = self.allocate_permanent().ok_or(RegistryError::Full)?;
        // Capacity was checked above; push cannot fail.
        let _ = self.mappings.push(ClientMapping {
            client_id,
            serial,
            registered: true,
        });
        Ok(Identity {
            client_id,
            rejoined: false,
        })
    }

    /// Flag a mapping inactive by ID. The ID stays reserved for the
    /// serial so a later rejoin gets it back.
    pub fn unregister(&mut self, client_id: u8) -> Result<(), RegistryError> {
        let mapping = self
            .mappings
            .iter_mut()
            .find(|mapping| mapping.client_id == client_id)
            .ok_or(RegistryError::UnknownClient)?;
        mapping.registered = false;
        Ok(())
    }

    /// Flag a mapping inactive by serial; returns the freed client ID.
    pub fn unregister_by_serial(&mut self, serial: &str) -> Result<u8, RegistryError> {
        let serial = short_name(serial);
        let mapping = self
            .mappings
            .iter_mut()
            .find(|mapping| mapping.serial == serial)
            .ok_or(RegistryError::UnknownClient)?;
        mapping.registered = false;
        Ok(mapping.client_id)
    }

    /// Rebind a client to a new serial number.
    pub fn update_serial(&mut self, client_id: u8, new_serial: &str) -> Result<(), RegistryError> {
        let new_serial = short_name(new_serial);
        if self
            .mappings
            .iter()
            .any(|mapping| mapping.serial == new_serial && mapping.client_id != client_id)
        {
            return Err(RegistryError::SerialConflict);
        }
        let mapping = self
            .mappings
            .iter_mut()
            .find(|mapping| mapping.client_id == client_id)
            .ok_or(RegistryError::UnknownClient)?;
        mapping.serial = new_serial;
        Ok(())
    }

    pub fn find_by_id(&self, client_id: u8) -> Option<&ClientMapping> {
        self.mappings
            .iter()
            .find(|mapping| mapping.client_id == client_id)
    }

    pub fn find_by_serial(&self, serial: &str) -> Option<&ClientMapping> {
        let serial = short_name(serial);
        self.mappings.iter().find(|mapping| mapping.serial == serial)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientMapping> {
        self.mappings.iter()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Reset to an empty table and rewound allocators.
    pub fn clear(&mut self) {
        self.mappings.clear();
        self.next_permanent = PERMANENT_ID_MIN;
        self.next_temporary = TEMPORARY_ID_MIN;
    }

    /// Next permanent ID candidate, as persisted in the registry
    /// namespace.
    pub fn next_permanent(&self) -> u8 {
        self.next_permanent
    }

    /// Restore state from the persisted namespace.
    pub fn restore(&mut self, mappings: &[ClientMapping], next_permanent: u8) {
        self.mappings.clear();
        for mapping in mappings.iter().take(MAX_CLIENT_MAPPINGS) {
            let _ = self.mappings.push(mapping.clone());
        }
        self.next_permanent = if is_permanent_id(next_permanent) {
            next_permanent
        } else {
            PERMANENT_ID_MIN
        };
    }

    /// Allocate the next temporary ID, skipping values the caller
    /// still considers in use (typically the connected set).
    pub fn allocate_temporary(&mut self, mut in_use: impl FnMut(u8) -> bool) -> Option<u8> {
        let range = u16::from(TEMPORARY_ID_MAX - TEMPORARY_ID_MIN) + 1;
        for _ in 0..range {
            let candidate = self.next_temporary;
            self.next_temporary = if candidate >= TEMPORARY_ID_MAX {
                TEMPORARY_ID_MIN
            } else {
                candidate + 1
            };
            if !in_use(candidate) {
                return Some(candidate);
            }
        }
        None
    }

    fn allocate_permanent(&mut self) -> Option<u8> {
        let range = u16::from(PERMANENT_ID_MAX - PERMANENT_ID_MIN) + 1;
        for _ in 0..range {
            let candidate = self.next_permanent;
            self.next_permanent = if candidate >= PERMANENT_ID_MAX {
                PERMANENT_ID_MIN
            } else {
                candidate + 1
            };
            if self.find_by_id(candidate).is_none() {
                return Some(candidate);
            }
        }
        None
    }
}
