//! Runtime topic directory: the in-memory hash→name cache shared by
//! both endpoints, learned from SUBSCRIBE frames, host API calls, or
//! the persisted topic-name namespace.
use crate::core::{hash_topic, short_name, ShortName, MAX_TOPICS};

#[derive(Debug, Clone, PartialEq, Eq)]
struct TopicEntry {
    hash: u16,
    name: ShortName,
}

/// Bounded hash→name cache. Names are cosmetic (the hash is the wire
/// key), so overflow and invalid names degrade to hash-only entries
/// rather than errors.
#[derive(Debug, Default)]
pub struct TopicDirectory {
    entries: heapless::Vec<TopicEntry, MAX_TOPICS>,
}

impl TopicDirectory {
    pub const fn new() -> Self {
        Self {
            entries: heapless::Vec::new(),
        }
    }

    /// Learn a topic from its name; returns the wire hash either way.
    pub fn register(&mut self, name: &str) -> u16 {
        let hash = hash_topic(name);
        self.learn(hash, name);
        hash
    }

    /// Learn a (hash, name) pair where the hash is already fixed by
    /// the wire (SUB_RESTORE, persisted records). Raw bytes that are
    /// not valid UTF-8 are skipped. Returns whether the cache changed.
    pub fn learn_raw(&mut self, hash: u16, name: &[u8]) -> bool {
        match core::str::from_utf8(name) {
            Ok(name) => self.learn(hash, name),
            Err(_) => false,
        }
    }

    fn learn(&mut self, hash: u16, name: &str) -> bool {
        if name.is_empty() || self.entries.iter().any(|entry| entry.hash == hash) {
            return false;
        }
        self.entries
            .push(TopicEntry {
                hash,
                name: short_name(name),
            })
            .is_ok()
    }

    /// Human-readable name for a hash, when known.
    pub fn name_of(&self, hash: u16) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.hash == hash)
            .map(|entry| entry.name.as_str())
    }

    /// Iterate over every known (hash, name) pair.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &str)> {
        self.entries
            .iter()
            .map(|entry| (entry.hash, entry.name.as_str()))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_look_up() {
        let mut topics = TopicDirectory::new();
        let hash = topics.register("temp/1");
        assert_eq!(hash, hash_topic("temp/1"));
        assert_eq!(topics.name_of(hash), Some("temp/1"));
        assert_eq!(topics.name_of(hash.wrapping_add(1)), None);
    }

    #[test]
    fn first_name_for_a_hash_wins() {
        let mut topics = TopicDirectory::new();
        topics.register("x");
        topics.learn_raw(hash_topic("x"), b"other");
        assert_eq!(topics.name_of(hash_topic("x")), Some("x"));
    }

    #[test]
    fn invalid_utf8_and_empty_names_are_skipped() {
        let mut topics = TopicDirectory::new();
        topics.learn_raw(0x1234, &[0xFF, 0xFE]);
        topics.learn_raw(0x1234, b"");
        assert_eq!(topics.name_of(0x1234), None);
    }

    #[test]
    fn directory_is_bounded() {
        let mut topics = TopicDirectory::new();
        let mut name = heapless::String::<8>::new();
        for index in 0..(MAX_TOPICS + 5) as u32 {
            name.clear();
            core::fmt::Write::write_fmt(&mut name, format_args!("t{index}")).unwrap();
            topics.register(name.as_str());
        }
        assert_eq!(topics.iter().count(), MAX_TOPICS);
    }
}
