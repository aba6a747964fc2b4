use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use tracing::{debug, trace};

use crate::maven::coordinates::ArtifactMetadata;

pub const VERSION_CACHE_SIZE_ENV: &str = "ARTI_RESOLVE_VERSION_CACHE_SIZE";
pub const DEFAULT_VERSION_CACHE_SIZE: usize = 1024;

/// Bounded LRU cache of version query results. Keys are the canonical query together with a
///  fingerprint of the repository set that answered it. A capacity of 0 disables caching.
///
/// One instance can be shared by many readers (e.g. process wide, behind an `Arc`).
pub struct VersionCache {
    entries: Option<Mutex<LruCache<String, Vec<ArtifactMetadata>>>>,
}
impl VersionCache {
    pub fn new(capacity: usize) -> VersionCache {
        VersionCache {
            entries: NonZeroUsize::new(capacity).map(|c| Mutex::new(LruCache::new(c))),
        }
    }

    pub fn disabled() -> VersionCache {
        VersionCache::new(0)
    }

    /// capacity from `ARTI_RESOLVE_VERSION_CACHE_SIZE`, defaulting to 1024
    pub fn from_env() -> VersionCache {
        let capacity = match std::env::var(VERSION_CACHE_SIZE_ENV) {
            Ok(s) => match s.trim().parse::<usize>() {
                Ok(n) => n,
                Err(e) => {
                    debug!("ignoring invalid {}={:?}: {}", VERSION_CACHE_SIZE_ENV, s, e);
                    DEFAULT_VERSION_CACHE_SIZE
                }
            },
            Err(_) => DEFAULT_VERSION_CACHE_SIZE,
        };
        VersionCache::new(capacity)
    }

    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    pub fn get(&self, key: &str) -> Option<Vec<ArtifactMetadata>> {
        let entries = self.entries.as_ref()?;
        let mut entries = entries.lock().unwrap_or_else(|e| e.into_inner());
        let result = entries.get(key).cloned();
        trace!("version cache {} for {}", if result.is_some() { "hit" } else { "miss" }, key);
        result
    }

    pub fn put(&self, key: String, versions: Vec<ArtifactMetadata>) {
        if let Some(entries) = &self.entries {
            entries.lock().unwrap_or_else(|e| e.into_inner())
                .put(key, versions);
        }
    }

    pub fn len(&self) -> usize {
        match &self.entries {
            Some(entries) => entries.lock().unwrap_or_else(|e| e.into_inner()).len(),
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Some(entries) = &self.entries {
            entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
        }
    }
}
impl Default for VersionCache {
    fn default() -> Self {
        VersionCache::new(DEFAULT_VERSION_CACHE_SIZE)
    }
}
