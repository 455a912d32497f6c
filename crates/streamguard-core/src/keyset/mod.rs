//! Exact duplicate detection over unbounded key streams.
//!
//! `MemoryBoundedKeySet` keeps up to `memory_limit` keys in an in-memory
//! table. Once that table is full, new keys go to a SQLite spill store in a
//! temporary file owned by the set. Keys stored before the spill stay in
//! memory, so lookups consult both tiers.
//!
//! An optional Bloom pre-filter lets inserts of keys that were certainly
//! never seen skip the authoritative lookup. The filter has no false
//! negatives, so turning it on or off never changes which keys are reported
//! as duplicates.
mod bloom;
mod config;
mod key;
mod spill;

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::errors::KeySetError;
use crate::utils::hasher::Xxh3Builder;

pub use bloom::BloomFilter;
pub use config::{KeySetConfig, KeySetConfigBuilder, PrefilterConfig};
pub use key::SpillKey;
use spill::SpillStore;

/// Outcome of an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    Inserted,
    /// The key was already present; `first_seen` is the row recorded by the
    /// insert that added it.
    Duplicate { first_seen: u64 },
}

impl Insertion {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Insertion::Duplicate { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySetStatistics {
    /// Insert attempts, duplicates included
    pub total_keys: u64,
    pub unique_keys: u64,
    pub is_spilled: bool,
    pub in_memory_keys: u64,
    pub spilled_keys: u64,
    /// Inserts that skipped the authoritative lookup thanks to the pre-filter
    pub prefilter_skips: u64,
}

impl KeySetStatistics {
    pub fn duplicates(&self) -> u64 {
        self.total_keys - self.unique_keys
    }
}

pub struct MemoryBoundedKeySet {
    memory_limit: usize,
    in_memory: HashMap<Box<[u8]>, u64, Xxh3Builder>,
    spill: Option<SpillStore>,
    spill_dir: Option<PathBuf>,
    is_spilled: bool,
    prefilter: Option<BloomFilter>,
    total_keys_added: u64,
    unique_keys: u64,
    spilled_keys: u64,
    prefilter_skips: u64,
    closed: bool,
    scratch: Vec<u8>,
}

impl MemoryBoundedKeySet {
    pub fn new(config: KeySetConfig) -> Result<Self, KeySetError> {
        config.validate()?;
        let prefilter = config
            .prefilter
            .map(|p| BloomFilter::with_rate(p.expected_items, p.false_positive_rate));

        Ok(Self {
            memory_limit: config.memory_limit,
            in_memory: HashMap::with_capacity_and_hasher(
                config.memory_limit.min(1 << 16),
                Xxh3Builder,
            ),
            spill: None,
            spill_dir: config.spill_dir,
            is_spilled: false,
            prefilter,
            total_keys_added: 0,
            unique_keys: 0,
            spilled_keys: 0,
            prefilter_skips: 0,
            closed: false,
            scratch: Vec::new(),
        })
    }

    /// Shorthand for a set without pre-filter spilling to the system temp directory.
    pub fn with_memory_limit(memory_limit: usize) -> Result<Self, KeySetError> {
        Self::new(KeySetConfig {
            memory_limit,
            ..KeySetConfig::default()
        })
    }

    /// Insert `key`. Returns `true` if it was not present before.
    ///
    /// The insertion ordinal is recorded as the key's first-seen row.
    pub fn add<K: SpillKey + ?Sized>(&mut self, key: &K) -> Result<bool, KeySetError> {
        let ordinal = self.total_keys_added;
        Ok(!self.add_at(key, ordinal)?.is_duplicate())
    }

    /// Insert `key`, reporting `(was_duplicate, was_added)`.
    pub fn add_and_check<K: SpillKey + ?Sized>(
        &mut self,
        key: &K,
    ) -> Result<(bool, bool), KeySetError> {
        let added = self.add(key)?;
        Ok((!added, added))
    }

    /// Insert `key` seen at dataset row `row`.
    pub fn add_at<K: SpillKey + ?Sized>(
        &mut self,
        key: &K,
        row: u64,
    ) -> Result<Insertion, KeySetError> {
        self.ensure_open()?;
        let mut encoded = std::mem::take(&mut self.scratch);
        encoded.clear();
        key.encode_key(&mut encoded);
        let result = self.insert_encoded(&encoded, row);
        self.scratch = encoded;
        result
    }

    /// Membership test. Lookups take `&self` and never touch the counters.
    pub fn contains<K: SpillKey + ?Sized>(&self, key: &K) -> Result<bool, KeySetError> {
        Ok(self.first_seen(key)?.is_some())
    }

    /// Row at which `key` was first inserted, if present.
    pub fn first_seen<K: SpillKey + ?Sized>(&self, key: &K) -> Result<Option<u64>, KeySetError> {
        self.ensure_open()?;
        self.lookup_filtered(&key.to_key_bytes())
    }

    pub fn statistics(&self) -> KeySetStatistics {
        KeySetStatistics {
            total_keys: self.total_keys_added,
            unique_keys: self.unique_keys,
            is_spilled: self.is_spilled,
            in_memory_keys: self.unique_keys - self.spilled_keys,
            spilled_keys: self.spilled_keys,
            prefilter_skips: self.prefilter_skips,
        }
    }

    pub fn is_spilled(&self) -> bool {
        self.is_spilled
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Path of the spill file while it exists.
    pub fn spill_path(&self) -> Option<PathBuf> {
        self.spill.as_ref().map(SpillStore::path)
    }

    /// Release memory and delete the spill file. Safe to call repeatedly.
    ///
    /// Statistics stay readable after closing; every other operation
    /// returns [`KeySetError::Closed`].
    pub fn close(&mut self) -> Result<(), KeySetError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.in_memory = HashMap::with_hasher(Xxh3Builder);
        self.prefilter = None;
        self.scratch = Vec::new();
        match self.spill.take() {
            Some(store) => store.close(),
            None => Ok(()),
        }
    }

    fn ensure_open(&self) -> Result<(), KeySetError> {
        if self.closed {
            Err(KeySetError::Closed)
        } else {
            Ok(())
        }
    }

    fn insert_encoded(&mut self, key: &[u8], row: u64) -> Result<Insertion, KeySetError> {
        self.total_keys_added += 1;

        let definitely_new = self
            .prefilter
            .as_ref()
            .is_some_and(|filter| !filter.may_contain(key));

        if definitely_new {
            self.prefilter_skips += 1;
        } else if let Some(first_seen) = self.lookup(key)? {
            return Ok(Insertion::Duplicate { first_seen });
        }

        self.store_new(key, row)?;
        if let Some(filter) = self.prefilter.as_mut() {
            filter.insert(key);
        }
        self.unique_keys += 1;
        Ok(Insertion::Inserted)
    }

    fn lookup_filtered(&self, key: &[u8]) -> Result<Option<u64>, KeySetError> {
        if let Some(filter) = &self.prefilter {
            if !filter.may_contain(key) {
                return Ok(None);
            }
        }
        self.lookup(key)
    }

    /// Authoritative lookup across both tiers.
    fn lookup(&self, key: &[u8]) -> Result<Option<u64>, KeySetError> {
        if let Some(first_seen) = self.in_memory.get(key) {
            return Ok(Some(*first_seen));
        }
        match &self.spill {
            Some(store) => store.get(key),
            None => Ok(None),
        }
    }

    fn store_new(&mut self, key: &[u8], row: u64) -> Result<(), KeySetError> {
        if self.in_memory.len() < self.memory_limit {
            self.in_memory.insert(key.into(), row);
            return Ok(());
        }

        if self.spill.is_none() {
            let store = SpillStore::create(self.spill_dir.as_deref())?;
            info!(
                memory_limit = self.memory_limit,
                unique_keys = self.unique_keys,
                path = %store.path().display(),
                "key set memory limit reached, spilling to disk"
            );
            self.spill = Some(store);
            self.is_spilled = true;
        }

        // Checked just above
        if let Some(store) = self.spill.as_mut() {
            if store.insert(key, row)? {
                self.spilled_keys += 1;
            }
        }
        Ok(())
    }
}

impl Drop for MemoryBoundedKeySet {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to release key set spill store");
        }
    }
}
