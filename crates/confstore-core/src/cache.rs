//! In-process cache of the Latest row per configuration name.
//!
//! The cache is an accelerator, never the system of record: every entry can
//! be dropped and rebuilt from the store at any time.

use dashmap::{DashMap, mapref::entry::Entry};

use crate::record::LatestConfiguration;

/// Concurrency-safe map from configuration name to its Latest record.
///
/// Unbounded, no TTL. Owned explicitly by whoever constructs the service.
#[derive(Debug, Default)]
pub struct LatestCache {
  entries: DashMap<String, LatestConfiguration>,
}

impl LatestCache {
  pub fn new() -> Self { Self::default() }

  pub fn get(&self, name: &str) -> Option<LatestConfiguration> {
    self.entries.get(name).map(|e| e.value().clone())
  }

  /// Store `value` under `name` unless the cached entry is newer.
  ///
  /// Entries are ordered by `(version, updated_at)`: a later version always
  /// wins, and within one version the later in-place revision wins.
  pub fn put(&self, name: &str, value: LatestConfiguration) {
    match self.entries.entry(name.to_owned()) {
      Entry::Occupied(mut e) => {
        let cached = e.get();
        if (value.version, value.updated_at) >= (cached.version, cached.updated_at) {
          e.insert(value);
        }
      }
      Entry::Vacant(e) => {
        e.insert(value);
      }
    }
  }

  pub fn invalidate(&self, name: &str) { self.entries.remove(name); }

  pub fn clear(&self) { self.entries.clear(); }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}
