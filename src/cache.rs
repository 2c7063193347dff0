use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use crate::models::NormalizedTable;
use crate::source::SourceFormat;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(bytes: &[u8], format: SourceFormat, alias_version: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(alias_version.as_bytes());
        hasher.update([0u8]);
        hasher.update(format.label().as_bytes());
        hasher.update([0u8]);
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub trait TableCache {
    fn get(&mut self, key: &CacheKey) -> Option<Arc<NormalizedTable>>;
    fn put(&mut self, key: CacheKey, table: Arc<NormalizedTable>);
}

/// Never stores anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl TableCache for NoCache {
    fn get(&mut self, _key: &CacheKey) -> Option<Arc<NormalizedTable>> {
        None
    }

    fn put(&mut self, _key: CacheKey, _table: Arc<NormalizedTable>) {}
}

#[derive(Debug)]
struct Entry {
    stored_at: Instant,
    table: Arc<NormalizedTable>,
}

/// Keeps tables by content hash; entries older than `max_age` are re-read.
#[derive(Debug)]
pub struct ContentCache {
    max_age: Duration,
    entries: HashMap<CacheKey, Entry>,
}

impl ContentCache {
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age,
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn evict_expired(&mut self) {
        let max_age = self.max_age;
        self.entries
            .retain(|_, entry| entry.stored_at.elapsed() < max_age);
    }
}

impl TableCache for ContentCache {
    fn get(&mut self, key: &CacheKey) -> Option<Arc<NormalizedTable>> {
        self.evict_expired();
        self.entries.get(key).map(|entry| Arc::clone(&entry.table))
    }

    fn put(&mut self, key: CacheKey, table: Arc<NormalizedTable>) {
        self.evict_expired();
        self.entries.insert(
            key,
            Entry {
                stored_at: Instant::now(),
                table,
            },
        );
    }
}
