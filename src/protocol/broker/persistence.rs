//! Namespace load/save helpers over the key/value store.
//!
//! Each namespace leads with its magic sentinel; a missing or
//! mismatched sentinel, an out-of-range count, or an undecodable
//! record makes the whole namespace read as empty (fresh start).
//! Saves rewrite the sentinel last-known-good data eagerly.
use core::fmt::Write;

use crate::core::{MAX_CLIENT_MAPPINGS, MAX_TOPICS};
use crate::infra::storage::records::{ClientMapping, ClientTopics, StoredTopicName};
use crate::infra::storage::{
    KeyValueStore, REGISTRY_MAGIC, SUBSCRIPTION_MAGIC, TOPIC_NAME_MAGIC,
};
use crate::protocol::broker::liveness::PingConfig;
use crate::protocol::broker::registry::ClientRegistry;
use crate::protocol::broker::subscriptions::{StoredSubscriptionTable, SubscriptionTable};
use crate::protocol::topics::TopicDirectory;

const KEY_REGISTRY_MAGIC: &str = "magic";
const KEY_REGISTRY_COUNT: &str = "count";
const KEY_REGISTRY_NEXT_ID: &str = "nextID";
const KEY_SUB_MAGIC: &str = "subMagic";
const KEY_SUB_COUNT: &str = "subCount";
const KEY_TOPIC_MAGIC: &str = "topMagic";
const KEY_TOPIC_COUNT: &str = "topCount";
const KEY_PING_ENABLED: &str = "pingEn";
const KEY_PING_INTERVAL: &str = "pingIv";
const KEY_PING_MAX_MISSED: &str = "pingMax";

fn slot_key(prefix: &str, index: usize) -> heapless::String<12> {
    let mut key = heapless::String::new();
    let _ = write!(key, "{prefix}{index}");
    key
}

pub(super) fn load_registry<K: KeyValueStore>(
    store: &mut K,
) -> Option<(heapless::Vec<ClientMapping, MAX_CLIENT_MAPPINGS>, u8)> {
    if store.get_u16(KEY_REGISTRY_MAGIC)? != REGISTRY_MAGIC {
        return None;
    }
    let count = store.get_u8(KEY_REGISTRY_COUNT)? as usize;
    if count > MAX_CLIENT_MAPPINGS {
        return None;
    }
    let next_id = store.get_u8(KEY_REGISTRY_NEXT_ID)?;

    let mut mappings = heapless::Vec::new();
    let mut record = [0u8; ClientMapping::SIZE];
    for index in 0..count {
        store.get_bytes(&slot_key("map", index), &mut record)?;
        let mapping = ClientMapping::decode(&record).ok()?;
        let _ = mappings.push(mapping);
    }
    Some((mappings, next_id))
}

pub(super) fn save_registry<K: KeyValueStore>(
    store: &mut K,
    registry: &ClientRegistry,
) -> Result<(), K::Error> {
    store.put_u16(KEY_REGISTRY_MAGIC, REGISTRY_MAGIC)?;
    store.put_u8(KEY_REGISTRY_COUNT, registry.len() as u8)?;
    store.put_u8(KEY_REGISTRY_NEXT_ID, registry.next_permanent())?;
    for (index, mapping) in registry.iter().enumerate() {
        store.put_bytes(&slot_key("map", index), &mapping.encode())?;
    }
    Ok(())
}

pub(super) fn clear_registry<K: KeyValueStore>(store: &mut K) -> Result<(), K::Error> {
    store.put_u16(KEY_REGISTRY_MAGIC, 0)
}

pub(super) fn load_stored_subscriptions<K: KeyValueStore>(
    store: &mut K,
) -> Option<heapless::Vec<ClientTopics, MAX_CLIENT_MAPPINGS>> {
    if store.get_u16(KEY_SUB_MAGIC)? != SUBSCRIPTION_MAGIC {
        return None;
    }
    let count = store.get_u8(KEY_SUB_COUNT)? as usize;
    if count > MAX_CLIENT_MAPPINGS {
        return None;
    }

    let mut entries = heapless::Vec::new();
    let mut record = [0u8; ClientTopics::SIZE];
    for index in 0..count {
        store.get_bytes(&slot_key("sub", index), &mut record)?;
        let entry = ClientTopics::decode(&record).ok()?;
        let _ = entries.push(entry);
    }
    Some(entries)
}

pub(super) fn save_stored_subscriptions<K: KeyValueStore>(
    store: &mut K,
    stored: &StoredSubscriptionTable,
) -> Result<(), K::Error> {
    store.put_u16(KEY_SUB_MAGIC, SUBSCRIPTION_MAGIC)?;
    store.put_u8(KEY_SUB_COUNT, stored.len() as u8)?;
    for (index, entry) in stored.iter().enumerate() {
        store.put_bytes(&slot_key("sub", index), &entry.encode())?;
    }
    Ok(())
}

pub(super) fn clear_stored_subscriptions<K: KeyValueStore>(store: &mut K) -> Result<(), K::Error> {
    store.put_u16(KEY_SUB_MAGIC, 0)?;
    store.put_u8(KEY_SUB_COUNT, 0)
}

pub(super) fn load_topic_names<K: KeyValueStore>(
    store: &mut K,
) -> Option<heapless::Vec<StoredTopicName, MAX_TOPICS>> {
    if store.get_u16(KEY_TOPIC_MAGIC)? != TOPIC_NAME_MAGIC {
        return None;
    }
    let count = store.get_u8(KEY_TOPIC_COUNT)? as usize;
    if count > MAX_TOPICS {
        return None;
    }

    let mut names = heapless::Vec::new();
    let mut record = [0u8; StoredTopicName::SIZE];
    for index in 0..count {
        store.get_bytes(&slot_key("top", index), &mut record)?;
        let name = StoredTopicName::decode(&record).ok()?;
        let _ = names.push(name);
    }
    Some(names)
}

pub(super) fn save_topic_names<K: KeyValueStore>(
    store: &mut K,
    topics: &TopicDirectory,
    active: &SubscriptionTable,
) -> Result<(), K::Error> {
    store.put_u16(KEY_TOPIC_MAGIC, TOPIC_NAME_MAGIC)?;
    let mut count = 0usize;
    for (hash, name) in topics.iter() {
        let record = StoredTopicName {
            hash,
            name: crate::core::short_name(name),
            active: !active.subscribers_of(hash).is_empty(),
        };
        store.put_bytes(&slot_key("top", count), &record.encode())?;
        count += 1;
    }
    store.put_u8(KEY_TOPIC_COUNT, count as u8)
}

pub(super) fn clear_topic_names<K: KeyValueStore>(store: &mut K) -> Result<(), K::Error> {
    store.put_u16(KEY_TOPIC_MAGIC, 0)?;
    store.put_u8(KEY_TOPIC_COUNT, 0)
}

pub(super) fn load_ping_config<K: KeyValueStore>(store: &mut K) -> PingConfig {
    let mut config = PingConfig::default();
    if let Some(enabled) = store.get_u8(KEY_PING_ENABLED) {
        config.enabled = enabled != 0;
    }
    if let Some(interval) = store.get_u32(KEY_PING_INTERVAL) {
        if PingConfig::valid_interval(interval) {
            config.interval_ms = interval;
        }
    }
    if let Some(max_missed) = store.get_u8(KEY_PING_MAX_MISSED) {
        if PingConfig::valid_max_missed(max_missed) {
            config.max_missed = max_missed;
        }
    }
    config
}

pub(super) fn save_ping_config<K: KeyValueStore>(
    store: &mut K,
    config: &PingConfig,
) -> Result<(), K::Error> {
    store.put_u8(KEY_PING_ENABLED, config.enabled as u8)?;
    store.put_u32(KEY_PING_INTERVAL, config.interval_ms)?;
    store.put_u8(KEY_PING_MAX_MISSED, config.max_missed)
}
