//! Saved searches and query history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

/// A named, reusable query with usage bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedSearch {
    /// Unique identifier
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// The raw query string to execute
    pub query: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Timestamp of the most recent execution
    pub last_used_at: DateTime<Utc>,

    /// Number of times the search has been executed
    pub usage_count: u64,
}

impl SavedSearch {
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            query: query.into(),
            created_at: now,
            last_used_at: now,
            usage_count: 0,
        }
    }

    /// Record an execution
    pub fn touch(&mut self) {
        self.usage_count += 1;
        self.last_used_at = Utc::now();
    }
}

/// Registry of saved searches keyed by id
#[derive(Debug, Default)]
pub struct SavedSearchStore {
    searches: HashMap<Uuid, SavedSearch>,
}

impl SavedSearchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new saved search and return its id
    pub fn save(&mut self, name: impl Into<String>, query: impl Into<String>) -> Uuid {
        let search = SavedSearch::new(name, query);
        let id = search.id;
        self.searches.insert(id, search);
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<&SavedSearch> {
        self.searches.get(id)
    }

    pub fn get_mut(&mut self, id: &Uuid) -> Option<&mut SavedSearch> {
        self.searches.get_mut(id)
    }

    pub fn delete(&mut self, id: &Uuid) -> bool {
        self.searches.remove(id).is_some()
    }

    /// Snapshot of all saved searches, oldest first
    pub fn list(&self) -> Vec<SavedSearch> {
        let mut all: Vec<SavedSearch> = self.searches.values().cloned().collect();
        all.sort_by_key(|s| s.created_at);
        all
    }
}

/// Recency-ordered, deduplicated history of executed queries
#[derive(Debug)]
pub struct QueryHistory {
    entries: VecDeque<String>,
    capacity: usize,
}

impl QueryHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    /// Record an executed query. Re-executing an existing query moves it
    /// to the front; entries beyond the capacity are dropped oldest-first.
    pub fn record(&mut self, query: &str) {
        if query.trim().is_empty() {
            return;
        }

        self.entries.retain(|q| q != query);
        self.entries.push_front(query.to_string());
        self.entries.truncate(self.capacity);
    }

    /// Entries, most recent first
    pub fn entries(&self) -> impl Iterator<Item = &String> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
