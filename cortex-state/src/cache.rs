//! Byte- and entry-capped LRU cache for fetched documents.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use cortex_types::CacheConfig;
use cortex_types::compress::{gunzip, gzip};

/// Outcome of a cache write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheWrite {
    /// The entry was stored.
    Inserted,
    /// The entry replaced an existing one under the same key.
    Replaced,
    /// The entry was larger than the per-entry cap and was rejected.
    RejectedTooLarge,
}

/// Aggregate cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Live entries.
    pub count: usize,
    /// Stored bytes (compressed entries count their compressed size).
    pub bytes: usize,
    /// `bytes` over the configured budget.
    pub utilization: f64,
    /// Mean stored entry size.
    pub avg_entry_bytes: usize,
    /// Entries evicted so far.
    pub evictions: u64,
    /// Writes rejected for exceeding the per-entry cap.
    pub rejections: u64,
}

/// One entry in the deterministic snapshot, ordered by URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Stored size in bytes.
    pub size: usize,
    /// Whether the content is stored gzipped.
    pub compressed: bool,
    /// Reads served for this entry.
    pub access_count: u64,
}

struct Entry {
    data: Vec<u8>,
    compressed: bool,
    last_access: u64,
    access_count: u64,
}

/// LRU document cache keyed by normalized URL or path.
///
/// Invariants after every write: total stored bytes ≤ `max_bytes`, entry
/// count ≤ `max_entries`, and no single entry exceeds 80% of `max_bytes`
/// (oversized writes are rejected). Eviction order is least-recent
/// access first; entries touched in the same tick evict the one with the
/// lower access count first.
///
/// # Example
///
/// ```
/// use cortex_state::DocumentCache;
/// use cortex_types::CacheConfig;
///
/// let mut cache = DocumentCache::new(CacheConfig::default());
/// cache.insert("https://docs.rs/serde", "serde docs");
/// assert_eq!(cache.get("https://docs.rs/serde").as_deref(), Some("serde docs"));
/// ```
pub struct DocumentCache {
    cfg: CacheConfig,
    entries: HashMap<String, Entry>,
    total_bytes: usize,
    tick: u64,
    evictions: u64,
    rejections: u64,
}

impl DocumentCache {
    /// Create an empty cache with validated bounds.
    #[must_use]
    pub fn new(cfg: CacheConfig) -> Self {
        Self {
            cfg: cfg.validated(),
            entries: HashMap::new(),
            total_bytes: 0,
            tick: 0,
            evictions: 0,
            rejections: 0,
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.cfg
    }

    /// Store a document, evicting least-recently-used entries as needed.
    pub fn insert(&mut self, url: &str, content: &str) -> CacheWrite {
        let key = normalize_url(url);
        let raw = content.as_bytes();
        if raw.len() > self.cfg.max_entry_bytes() {
            warn!(
                url = %key,
                size = raw.len(),
                cap = self.cfg.max_entry_bytes(),
                "rejecting oversized cache entry"
            );
            self.rejections += 1;
            return CacheWrite::RejectedTooLarge;
        }

        let (data, compressed) = if raw.len() > self.cfg.compress_threshold {
            match gzip(raw) {
                Ok(packed) if packed.len() < raw.len() => (packed, true),
                Ok(_) | Err(_) => (raw.to_vec(), false),
            }
        } else {
            (raw.to_vec(), false)
        };

        // Subtract an overwritten entry before accounting the new size.
        let replaced = match self.entries.remove(&key) {
            Some(old) => {
                self.total_bytes -= old.data.len();
                true
            }
            None => false,
        };

        while self.total_bytes + data.len() > self.cfg.max_bytes
            || self.entries.len() + 1 > self.cfg.max_entries
        {
            if !self.evict_one() {
                break;
            }
        }

        self.tick += 1;
        self.total_bytes += data.len();
        self.entries.insert(
            key,
            Entry {
                data,
                compressed,
                last_access: self.tick,
                access_count: 0,
            },
        );
        if replaced {
            CacheWrite::Replaced
        } else {
            CacheWrite::Inserted
        }
    }

    /// Fetch a document, bumping its recency and access count.
    pub fn get(&mut self, url: &str) -> Option<String> {
        let key = normalize_url(url);
        self.tick += 1;
        let tick = self.tick;
        let entry = self.entries.get_mut(&key)?;
        entry.last_access = tick;
        entry.access_count += 1;
        let bytes = if entry.compressed {
            gunzip(&entry.data).ok()?
        } else {
            entry.data.clone()
        };
        String::from_utf8(bytes).ok()
    }

    /// Whether a document is cached, without touching recency.
    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(&normalize_url(url))
    }

    /// Drop one document. Returns whether it was present.
    pub fn remove(&mut self, url: &str) -> bool {
        match self.entries.remove(&normalize_url(url)) {
            Some(entry) => {
                self.total_bytes -= entry.data.len();
                true
            }
            None => false,
        }
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_bytes = 0;
    }

    /// Apply a batch of (url, content) updates through the normal write
    /// path, maintaining all bounds. This is the reducer form: the same
    /// cache instance is mutated and returned by reference.
    pub fn apply_updates<'a, I>(&mut self, updates: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (url, content) in updates {
            self.insert(url, content);
        }
    }

    /// Live entry count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored bytes across all entries.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Aggregate counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let count = self.entries.len();
        CacheStats {
            count,
            bytes: self.total_bytes,
            utilization: self.total_bytes as f64 / self.cfg.max_bytes as f64,
            avg_entry_bytes: if count == 0 { 0 } else { self.total_bytes / count },
            evictions: self.evictions,
            rejections: self.rejections,
        }
    }

    /// Deterministic snapshot ordered by URL, for state serialization.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, SnapshotEntry> {
        self.entries
            .iter()
            .map(|(url, entry)| {
                (
                    url.clone(),
                    SnapshotEntry {
                        size: entry.data.len(),
                        compressed: entry.compressed,
                        access_count: entry.access_count,
                    },
                )
            })
            .collect()
    }

    /// Evict the least-recently-used entry; same-tick ties evict the
    /// entry with the lower access count first.
    fn evict_one(&mut self) -> bool {
        let victim = self
            .entries
            .iter()
            .min_by(|(key_a, a), (key_b, b)| {
                (a.last_access, a.access_count, key_a.as_str())
                    .cmp(&(b.last_access, b.access_count, key_b.as_str()))
            })
            .map(|(key, _)| key.clone());
        match victim {
            Some(key) => {
                if let Some(entry) = self.entries.remove(&key) {
                    self.total_bytes -= entry.data.len();
                    self.evictions += 1;
                    debug!(url = %key, "evicted cache entry");
                }
                true
            }
            None => false,
        }
    }
}

/// Normalize a URL/path key: trim whitespace and a trailing slash.
fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    trimmed.to_string()
}
