//! Broker subscription state: the active per-topic subscriber table
//! and the persisted per-client topic sets replayed at reconnect.
use crate::core::{MAX_CLIENT_MAPPINGS, MAX_CLIENT_TOPICS, MAX_SUBSCRIBERS_PER_TOPIC, MAX_TOPICS};
use crate::infra::storage::records::ClientTopics;

/// One active topic row: subscribers in insertion order, which is
/// also the delivery order of the forward loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicRow {
    pub hash: u16,
    pub subscribers: heapless::Vec<u8, MAX_SUBSCRIBERS_PER_TOPIC>,
}

/// Active subscription table. Invariants: no duplicate subscriber
/// within a row, and no row with an empty subscriber list.
#[derive(Debug, Default)]
pub struct SubscriptionTable {
    rows: heapless::Vec<TopicRow, MAX_TOPICS>,
}

impl SubscriptionTable {
    pub const fn new() -> Self {
        Self {
            rows: heapless::Vec::new(),
        }
    }

    /// Insert a subscriber, creating the row if needed. Duplicates are
    /// a no-op and overflow is silently dropped; returns whether the
    /// table changed.
    pub fn add(&mut self, client_id: u8, hash: u16) -> bool {
        if let Some(row) = self.rows.iter_mut().find(|row| row.hash == hash) {
            if row.subscribers.contains(&client_id) {
                return false;
            }
            return row.subscribers.push(client_id).is_ok();
        }

        let mut row = TopicRow {
            hash,
            subscribers: heapless::Vec::new(),
        };
        // A fresh row always has room for its first subscriber.
        let _ = row.subscribers.push(client_id);
        self.rows.push(row).is_ok()
    }

    /// Remove a subscriber; a row left empty is removed with it.
    /// Returns whether the table changed.
    pub fn remove(&mut self, client_id: u8, hash: u16) -> bool {
        let Some(row_index) = self.rows.iter().position(|row| row.hash == hash) else {
            return false;
        };
        let row = &mut self.rows[row_index];
        let Some(sub_index) = row.subscribers.iter().position(|&id| id == client_id) else {
            return false;
        };
        row.subscribers.remove(sub_index);
        if row.subscribers.is_empty() {
            self.rows.remove(row_index);
        }
        true
    }

    /// Strip a client from every row. Returns whether anything changed.
    pub fn remove_client(&mut self, client_id: u8) -> bool {
        let mut changed = false;
        let mut row_index = 0;
        while row_index < self.rows.len() {
            let row = &mut self.rows[row_index];
            if let Some(sub_index) = row.subscribers.iter().position(|&id| id == client_id) {
                row.subscribers.remove(sub_index);
                changed = true;
            }
            if row.subscribers.is_empty() {
                self.rows.remove(row_index);
            } else {
                row_index += 1;
            }
        }
        changed
    }

    /// Subscribers of a topic, in delivery order.
    pub fn subscribers_of(&self, hash: u16) -> &[u8] {
        self.rows
            .iter()
            .find(|row| row.hash == hash)
            .map(|row| row.subscribers.as_slice())
            .unwrap_or(&[])
    }

    /// Number of topics the client is subscribed to.
    pub fn client_topic_count(&self, client_id: u8) -> u8 {
        self.rows
            .iter()
            .filter(|row| row.subscribers.contains(&client_id))
            .count() as u8
    }

    /// Snapshot the client's topic set, bounded like the stored form.
    pub fn topics_of(&self, client_id: u8) -> heapless::Vec<u16, MAX_CLIENT_TOPICS> {
        let mut topics = heapless::Vec::new();
        for row in self
            .rows
            .iter()
            .filter(|row| row.subscribers.contains(&client_id))
        {
            if topics.push(row.hash).is_err() {
                break;
            }
        }
        topics
    }

    pub fn iter(&self) -> impl Iterator<Item = &TopicRow> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

/// Persisted mirror of each permanent client's topic set.
#[derive(Debug, Default)]
pub struct StoredSubscriptionTable {
    entries: heapless::Vec<ClientTopics, MAX_CLIENT_MAPPINGS>,
}

impl StoredSubscriptionTable {
    pub const fn new() -> Self {
        Self {
            entries: heapless::Vec::new(),
        }
    }

    /// Re-snapshot a client's topic set from the active table. Returns
    /// whether the stored form changed (callers persist on change).
    pub fn capture(&mut self, client_id: u8, active: &SubscriptionTable) -> bool {
        let topics = active.topics_of(client_id);
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| entry.client_id == client_id)
        {
            if entry.topics == topics {
                return false;
            }
            entry.topics = topics;
            return true;
        }
        if topics.is_empty() {
            // Nothing to replay later; do not burn a slot.
            return false;
        }
        self.entries
            .push(ClientTopics { client_id, topics })
            .is_ok()
    }

    pub fn find(&self, client_id: u8) -> Option<&ClientTopics> {
        self.entries
            .iter()
            .find(|entry| entry.client_id == client_id)
    }

    /// Whether a reconnecting client has topics worth replaying.
    pub fn has_stored_topics(&self, client_id: u8) -> bool {
        self.find(client_id)
            .is_some_and(|entry| !entry.topics.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientTopics> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Restore state from the persisted namespace.
    pub fn restore(&mut self, entries: &[ClientTopics]) {
        self.entries.clear();
        for entry in entries.iter().take(MAX_CLIENT_MAPPINGS) {
            let _ = self.entries.push(entry.clone());
        }
    }
}
