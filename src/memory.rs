//! Conversation memory
//!
//! This module handles:
//! - The immutable `InteractionRecord` (one user input / assistant reply pair)
//! - The `MemoryManager` interface shared by every provider client
//! - `InMemoryStore`, a bounded process-lifetime log of records
//!
//! A SQLite-backed implementation of the same interface lives in `db`.

use crate::error::{Error, Result};
use crate::logging;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::str::FromStr;
use uuid::Uuid;

// ============ Records ============

/// One stored exchange. Owned by the store; callers only ever see clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: i64,
    pub session_id: Uuid,
    pub timestamp: DateTime<Local>,
    pub topic: String,
    pub user_input: String,
    pub assistant_response: String,
}

impl InteractionRecord {
    /// JSON-like block used inside the system prompt's history section.
    ///
    /// Only the free-text fields get their double quotes escaped.
    pub fn to_prompt_format(&self) -> String {
        format!(
            "{{\n  \"session_id\": \"{}\",\n  \"timestamp\": \"{}\",\n  \"topic\": \"{}\",\n  \"user_input\": \"{}\",\n  \"assistant_response\": \"{}\"\n}}",
            self.session_id,
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.topic,
            self.user_input.replace('"', "\\\""),
            self.assistant_response.replace('"', "\\\""),
        )
    }
}

/// Recency order: newest timestamp first, later id first on ties.
pub(crate) fn sort_recent_first(records: &mut [InteractionRecord]) {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
}

pub(crate) fn topic_matches(record_topic: &str, needle: &str) -> bool {
    record_topic.to_lowercase().contains(&needle.to_lowercase())
}

// ============ Configuration ============

/// Which records compete for capacity when the store is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionScope {
    /// Oldest record across all sessions goes first.
    #[default]
    Global,
    /// Each session keeps up to `capacity` records of its own.
    PerSession,
}

impl FromStr for EvictionScope {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "global" => Ok(Self::Global),
            "per_session" | "per-session" | "session" => Ok(Self::PerSession),
            _ => Err(Error::Config(format!("unknown eviction scope '{}'", s.trim()))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub capacity: usize,
    pub recent_limit: usize,
    pub topic_limit: usize,
    pub eviction: EvictionScope,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            recent_limit: 10,
            topic_limit: 5,
            eviction: EvictionScope::Global,
        }
    }
}

// ============ Memory Manager ============

/// Session-scoped interaction log shared by all providers.
pub trait MemoryManager: Send + Sync {
    fn config(&self) -> &MemoryConfig;

    /// Up to `limit` records of the session, most recent first.
    fn get_recent(&self, session_id: Uuid, limit: usize) -> Result<Vec<InteractionRecord>>;

    /// Like `get_recent`, restricted to records whose topic contains `topic` (case-insensitive).
    fn get_by_topic(
        &self,
        session_id: Uuid,
        topic: &str,
        limit: usize,
    ) -> Result<Vec<InteractionRecord>>;

    /// Append a record and apply the capacity policy.
    fn save(
        &self,
        session_id: Uuid,
        topic: &str,
        user_input: &str,
        response: &str,
    ) -> Result<InteractionRecord>;

    fn has_previous(&self, session_id: Uuid) -> Result<bool>;

    /// Total records across all sessions.
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn recent(&self, session_id: Uuid) -> Result<Vec<InteractionRecord>> {
        self.get_recent(session_id, self.config().recent_limit)
    }

    fn by_topic(&self, session_id: Uuid, topic: &str) -> Result<Vec<InteractionRecord>> {
        self.get_by_topic(session_id, topic, self.config().topic_limit)
    }
}

// ============ In-Memory Store ============

#[derive(Debug, Default)]
struct Inner {
    // Insertion order == id order
    records: VecDeque<InteractionRecord>,
    next_id: i64,
    last_timestamp: Option<DateTime<Local>>,
}

impl Inner {
    /// Drop the oldest records until the scope is within capacity. Returns the evicted ids.
    fn evict(&mut self, config: &MemoryConfig, session_id: Uuid) -> Vec<i64> {
        let mut evicted = Vec::new();
        match config.eviction {
            EvictionScope::Global => {
                while self.records.len() > config.capacity {
                    match self.records.pop_front() {
                        Some(record) => evicted.push(record.id),
                        None => break,
                    }
                }
            }
            EvictionScope::PerSession => {
                let mut in_session = self
                    .records
                    .iter()
                    .filter(|r| r.session_id == session_id)
                    .count();
                while in_session > config.capacity {
                    let Some(pos) = self.records.iter().position(|r| r.session_id == session_id) else {
                        break;
                    };
                    if let Some(record) = self.records.remove(pos) {
                        evicted.push(record.id);
                    }
                    in_session -= 1;
                }
            }
        }
        evicted
    }
}

/// Bounded in-process store. Nothing survives a restart.
#[derive(Debug)]
pub struct InMemoryStore {
    config: MemoryConfig,
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_config(MemoryConfig::default())
    }

    pub fn with_config(config: MemoryConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                next_id: 1,
                ..Inner::default()
            }),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryManager for InMemoryStore {
    fn config(&self) -> &MemoryConfig {
        &self.config
    }

    fn get_recent(&self, session_id: Uuid, limit: usize) -> Result<Vec<InteractionRecord>> {
        let inner = self.inner.lock();
        let mut records: Vec<InteractionRecord> = inner
            .records
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect();
        drop(inner);

        sort_recent_first(&mut records);
        records.truncate(limit);
        Ok(records)
    }

    fn get_by_topic(
        &self,
        session_id: Uuid,
        topic: &str,
        limit: usize,
    ) -> Result<Vec<InteractionRecord>> {
        let inner = self.inner.lock();
        let mut records: Vec<InteractionRecord> = inner
            .records
            .iter()
            .filter(|r| r.session_id == session_id && topic_matches(&r.topic, topic))
            .cloned()
            .collect();
        drop(inner);

        sort_recent_first(&mut records);
        records.truncate(limit);
        Ok(records)
    }

    fn save(
        &self,
        session_id: Uuid,
        topic: &str,
        user_input: &str,
        response: &str,
    ) -> Result<InteractionRecord> {
        let mut inner = self.inner.lock();

        // Never let the clock run backwards inside one store
        let now = Local::now();
        let timestamp = match inner.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };

        let record = InteractionRecord {
            id: inner.next_id,
            session_id,
            timestamp,
            topic: topic.to_string(),
            user_input: user_input.to_string(),
            assistant_response: response.to_string(),
        };
        inner.next_id += 1;
        inner.last_timestamp = Some(timestamp);
        inner.records.push_back(record.clone());

        let evicted = inner.evict(&self.config, session_id);
        let total = inner.records.len();
        drop(inner);

        logging::log_memory(
            Some(session_id),
            &format!("Saved interaction #{} (topic: '{}', total: {})", record.id, record.topic, total),
        );
        if !evicted.is_empty() {
            logging::log_debug(
                logging::LogCategory::Memory,
                Some(session_id),
                &format!("Capacity {} reached, evicted interactions {:?}", self.config.capacity, evicted),
            );
        }

        Ok(record)
    }

    fn has_previous(&self, session_id: Uuid) -> Result<bool> {
        Ok(self.inner.lock().records.iter().any(|r| r.session_id == session_id))
    }

    fn len(&self) -> Result<usize> {
        Ok(self.inner.lock().records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn store_with_capacity(capacity: usize, eviction: EvictionScope) -> InMemoryStore {
        InMemoryStore::with_config(MemoryConfig {
            capacity,
            eviction,
            ..MemoryConfig::default()
        })
    }

    #[test]
    fn test_recent_is_newest_first() {
        let store = InMemoryStore::new();
        let sid = Uuid::new_v4();
        for i in 0..5 {
            store.save(sid, "t", &format!("q{}", i), &format!("a{}", i)).unwrap();
        }

        let recent = store.get_recent(sid, 3).unwrap();
        let inputs: Vec<_> = recent.iter().map(|r| r.user_input.as_str()).collect();
        assert_eq!(inputs, vec!["q4", "q3", "q2"]);
        assert!(recent.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[test]
    fn test_ids_strictly_increase() {
        let store = InMemoryStore::new();
        let a = store.save(Uuid::new_v4(), "", "x", "y").unwrap();
        let b = store.save(Uuid::new_v4(), "", "x", "y").unwrap();
        assert_eq!(a.id, 1);
        assert!(b.id > a.id);
    }

    #[test]
    fn test_unknown_session_is_empty_not_error() {
        let store = InMemoryStore::new();
        let sid = Uuid::new_v4();
        assert!(store.get_recent(sid, 10).unwrap().is_empty());
        assert!(store.get_by_topic(sid, "rust", 5).unwrap().is_empty());
        assert!(!store.has_previous(sid).unwrap());
    }

    #[test]
    fn test_sessions_are_isolated() {
        let store = InMemoryStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.save(a, "rust_borrow", "a-input", "a-reply").unwrap();
        store.save(b, "rust_traits", "b-input", "b-reply").unwrap();

        let recent = store.get_recent(b, 10).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].user_input, "b-input");

        let by_topic = store.get_by_topic(b, "rust", 5).unwrap();
        assert!(by_topic.iter().all(|r| r.session_id == b));
        assert_eq!(by_topic.len(), 1);
    }

    #[test]
    fn test_topic_match_is_case_insensitive_substring() {
        let store = InMemoryStore::new();
        let sid = Uuid::new_v4();
        store.save(sid, "weather_forecast", "1", "1").unwrap();
        store.save(sid, "cooking_pasta", "2", "2").unwrap();
        store.save(sid, "Weather_Today", "3", "3").unwrap();

        let found = store.get_by_topic(sid, "WEATHER", 5).unwrap();
        let inputs: Vec<_> = found.iter().map(|r| r.user_input.as_str()).collect();
        assert_eq!(inputs, vec!["3", "1"]);

        assert_eq!(store.get_by_topic(sid, "weather", 1).unwrap().len(), 1);
    }

    #[test]
    fn test_global_capacity_evicts_oldest_first() {
        let store = InMemoryStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let first = store.save(a, "", "first", "r").unwrap();
        for i in 0..120 {
            let sid = if i % 2 == 0 { a } else { b };
            store.save(sid, "", &format!("m{}", i), "r").unwrap();
            assert!(store.len().unwrap() <= 100);
        }

        assert_eq!(store.len().unwrap(), 100);
        let all_a = store.get_recent(a, 1000).unwrap();
        assert!(all_a.iter().all(|r| r.id != first.id));
        // 121 saves, 21 evicted: ids 1..=21 are gone
        let oldest = all_a.iter().chain(store.get_recent(b, 1000).unwrap().iter()).map(|r| r.id).min();
        assert_eq!(oldest, Some(22));
    }

    #[test]
    fn test_global_eviction_crosses_sessions() {
        let store = store_with_capacity(3, EvictionScope::Global);
        let quiet = Uuid::new_v4();
        let busy = Uuid::new_v4();

        store.save(quiet, "", "only", "r").unwrap();
        for _ in 0..3 {
            store.save(busy, "", "chatter", "r").unwrap();
        }

        assert!(!store.has_previous(quiet).unwrap());
        assert_eq!(store.len().unwrap(), 3);
    }

    #[test]
    fn test_per_session_eviction_spares_other_sessions() {
        let store = store_with_capacity(3, EvictionScope::PerSession);
        let quiet = Uuid::new_v4();
        let busy = Uuid::new_v4();

        store.save(quiet, "", "only", "r").unwrap();
        for i in 0..5 {
            store.save(busy, "", &format!("b{}", i), "r").unwrap();
        }

        assert!(store.has_previous(quiet).unwrap());
        let busy_records = store.get_recent(busy, 10).unwrap();
        let inputs: Vec<_> = busy_records.iter().map(|r| r.user_input.as_str()).collect();
        assert_eq!(inputs, vec!["b4", "b3", "b2"]);
        assert_eq!(store.len().unwrap(), 4);
    }

    #[test]
    fn test_default_limits_come_from_config() {
        let store = InMemoryStore::with_config(MemoryConfig {
            recent_limit: 2,
            topic_limit: 1,
            ..MemoryConfig::default()
        });
        let sid = Uuid::new_v4();
        for _ in 0..4 {
            store.save(sid, "same", "q", "a").unwrap();
        }
        assert_eq!(store.recent(sid).unwrap().len(), 2);
        assert_eq!(store.by_topic(sid, "same").unwrap().len(), 1);
    }

    #[test]
    fn test_prompt_format_escapes_quotes() {
        let record = InteractionRecord {
            id: 1,
            session_id: Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap(),
            timestamp: Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap(),
            topic: "quotes".to_string(),
            user_input: "say \"hi\"".to_string(),
            assistant_response: "\"hi\"".to_string(),
        };

        let expected = "{\n  \"session_id\": \"67e55044-10b1-426f-9247-bb680e5fe0c8\",\n  \"timestamp\": \"2024-03-05 14:07:09\",\n  \"topic\": \"quotes\",\n  \"user_input\": \"say \\\"hi\\\"\",\n  \"assistant_response\": \"\\\"hi\\\"\"\n}";
        pretty_assertions::assert_eq!(record.to_prompt_format(), expected);
    }

    #[test]
    fn test_eviction_scope_parsing() {
        assert_eq!("GLOBAL".parse::<EvictionScope>().unwrap(), EvictionScope::Global);
        assert_eq!(" per-session ".parse::<EvictionScope>().unwrap(), EvictionScope::PerSession);
        assert!(matches!("lru".parse::<EvictionScope>(), Err(Error::Config(_))));
    }

    #[test]
    fn test_evict_drains_every_excess_record() {
        let sid = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut inner = Inner {
            next_id: 1,
            ..Inner::default()
        };
        for i in 0..6 {
            let session_id = if i == 0 { other } else { sid };
            inner.records.push_back(InteractionRecord {
                id: i + 1,
                session_id,
                timestamp: Local::now(),
                topic: String::new(),
                user_input: format!("m{}", i),
                assistant_response: String::new(),
            });
        }

        let per_session = MemoryConfig {
            capacity: 2,
            eviction: EvictionScope::PerSession,
            ..MemoryConfig::default()
        };
        assert_eq!(inner.evict(&per_session, sid), vec![2, 3, 4]);
        assert_eq!(inner.records.len(), 3);

        let global = MemoryConfig {
            capacity: 1,
            ..MemoryConfig::default()
        };
        assert_eq!(inner.evict(&global, sid), vec![1, 5]);
        assert_eq!(inner.records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![6]);
    }
}
