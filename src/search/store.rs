//! Bounded record store and append-only inverted index.
//!
//! The store is the single source of truth for record content: every index
//! lookup is re-verified against it before a record can match. The inverted
//! index itself is append-only; postings are never removed, even when the
//! bounded store drops its oldest records, so stale ids may linger in
//! posting sets until filtered out by store verification at query time.

use std::collections::{HashMap, HashSet, VecDeque};
use uuid::Uuid;

use crate::models::LogRecord;
use crate::search::tokenizer::record_tokens;

/// Map from token to the set of record ids containing it
#[derive(Debug, Default)]
pub struct InvertedIndex {
    postings: HashMap<String, HashSet<Uuid>>,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record id under every given token
    pub fn insert(&mut self, id: Uuid, tokens: &[String]) {
        for token in tokens {
            self.postings.entry(token.clone()).or_default().insert(id);
        }
    }

    /// Posting set for a token, if any
    pub fn lookup(&self, token: &str) -> Option<&HashSet<Uuid>> {
        self.postings.get(token)
    }

    /// Number of distinct tokens
    pub fn token_count(&self) -> usize {
        self.postings.len()
    }

    /// Indexed tokens starting with the given prefix, in alphabetical order
    pub fn tokens_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut matches: Vec<String> = self
            .postings
            .keys()
            .filter(|t| t.starts_with(prefix))
            .cloned()
            .collect();
        matches.sort();
        matches
    }
}

/// Insertion-ordered record store bounded by a maximum record count
#[derive(Debug)]
pub struct RecordStore {
    records: HashMap<Uuid, LogRecord>,
    order: VecDeque<Uuid>,
    index: InvertedIndex,
    max_records: usize,
}

impl RecordStore {
    pub fn new(max_records: usize) -> Self {
        Self {
            records: HashMap::new(),
            order: VecDeque::new(),
            index: InvertedIndex::new(),
            max_records,
        }
    }

    /// Index a record: store it, evict the oldest if over the ceiling, and
    /// add its tokens to the inverted index.
    pub fn insert(&mut self, record: LogRecord) {
        let id = record.id;
        let tokens = record_tokens(&record);

        self.records.insert(id, record);
        self.order.push_back(id);

        while self.order.len() > self.max_records {
            if let Some(oldest) = self.order.pop_front() {
                self.records.remove(&oldest);
                tracing::debug!(record_id = %oldest, "record evicted from bounded store");
            }
        }

        self.index.insert(id, &tokens);
    }

    pub fn get(&self, id: &Uuid) -> Option<&LogRecord> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Live records in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &LogRecord> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    /// All live record ids
    pub fn ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.order.iter().copied()
    }

    pub fn index(&self) -> &InvertedIndex {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LogLevel;

    fn record(message: &str) -> LogRecord {
        LogRecord::new(LogLevel::Info, message)
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut store = RecordStore::new(100);
        let rec = record("database timeout");
        let id = rec.id;
        store.insert(rec);

        assert_eq!(store.len(), 1);
        assert!(store.index().lookup("database").unwrap().contains(&id));
        assert!(store.index().lookup("timeout").unwrap().contains(&id));
        assert!(store.index().lookup("nothing").is_none());
    }

    #[test]
    fn test_oldest_evicted_first() {
        let mut store = RecordStore::new(2);
        let first = record("first entry");
        let first_id = first.id;
        store.insert(first);
        store.insert(record("second entry"));
        store.insert(record("third entry"));

        assert_eq!(store.len(), 2);
        assert!(store.get(&first_id).is_none());
        let messages: Vec<&str> = store.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["second entry", "third entry"]);
    }

    #[test]
    fn test_postings_survive_store_eviction() {
        let mut store = RecordStore::new(1);
        let first = record("unique marker");
        let first_id = first.id;
        store.insert(first);
        store.insert(record("replacement"));

        // The posting still names the evicted id; the store no longer does.
        assert!(store.index().lookup("marker").unwrap().contains(&first_id));
        assert!(store.get(&first_id).is_none());
    }

    #[test]
    fn test_tokens_with_prefix_sorted() {
        let mut store = RecordStore::new(10);
        store.insert(record("gateway gamma gate"));

        assert_eq!(
            store.index().tokens_with_prefix("ga"),
            vec!["gamma".to_string(), "gate".to_string(), "gateway".to_string()]
        );
    }
}
