use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::model::flag::FlagRecord;

#[derive(Debug, Clone, Default)]
struct CacheEntry {
    flags: HashMap<String, bool>,
    updated_at: Option<DateTime<Utc>>,
}

/// In-memory store of the last known feature flag states.
///
/// Reads never block. Writes replace the whole entry, so a reader sees either
/// the state before or after an [`FlagCache::upsert_all`], never a mix.
pub struct FlagCache {
    entry: ArcSwap<CacheEntry>,
}

impl FlagCache {
    pub fn new() -> Self {
        Self {
            entry: ArcSwap::from_pointee(CacheEntry::default()),
        }
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        self.entry.load().flags.get(name).copied()
    }

    pub fn upsert(&self, name: &str, state: bool) {
        self.entry.rcu(|current| {
            let mut flags = current.flags.clone();
            flags.insert(name.to_owned(), state);
            CacheEntry {
                flags,
                updated_at: Some(Utc::now()),
            }
        });
    }

    pub fn upsert_all(&self, records: &[FlagRecord]) {
        self.entry.rcu(|current| {
            let mut flags = current.flags.clone();
            for record in records {
                flags.insert(record.name.clone(), record.state);
            }
            CacheEntry {
                flags,
                updated_at: Some(Utc::now()),
            }
        });
    }

    pub fn snapshot(&self) -> HashMap<String, bool> {
        self.entry.load().flags.clone()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.entry.load().updated_at
    }
}
