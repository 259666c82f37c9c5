//! The resolver cache (§4.1): `lookup`/`insert`/`getLastSuccess`/
//! `setLastSuccess`/`purge` over a `DashMap` keyed by `(recordType, name)`,
//! plus a name-keyed side index of the last record type that produced a
//! non-empty answer.
//!
//! Grounded on `CachedResolver`'s `cache: Arc<dyn DnsCacheAccess>` field and
//! `check_cache`/`store_in_cache` split in the teacher's cache layer,
//! generalized from "one upstream cache" to the full §4.1 contract.

use super::entry::CachedEntry;
use super::key::CacheKey;
use compact_str::CompactString;
use dashmap::DashMap;
use flowdns_application::{Clock, SystemClock};
use flowdns_domain::{RecordType, ResourceRecord};
use rustc_hash::FxBuildHasher;
use std::sync::Arc;

/// Result of a `lookup`: the cached answer (if any) and whether the name is
/// currently flagged `ttl0`.
pub struct LookupResult {
    pub entry: Option<Arc<Vec<ResourceRecord>>>,
    pub ttl0: bool,
}

pub struct DnsCache {
    entries: DashMap<CacheKey, CachedEntry, FxBuildHasher>,
    last_success: DashMap<CompactString, RecordType, FxBuildHasher>,
    bad_ttl: u32,
    clock: Arc<dyn Clock>,
}

impl DnsCache {
    pub fn new(bad_ttl: u32) -> Self {
        Self::with_clock(bad_ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(bad_ttl: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::with_hasher(FxBuildHasher),
            last_success: DashMap::with_hasher(FxBuildHasher),
            bad_ttl,
            clock,
        }
    }

    /// §4.1 lookup semantics, verbatim.
    pub fn lookup(&self, record_type: RecordType, name: &str, peek: bool) -> LookupResult {
        let key = CacheKey::new(name, record_type);
        let now = self.clock.now_secs();

        let Some(mut slot) = self.entries.get_mut(&key) else {
            return LookupResult {
                entry: None,
                ttl0: false,
            };
        };

        if slot.ttl0 {
            slot.touch(now);
            return LookupResult {
                entry: None,
                ttl0: true,
            };
        }

        if peek {
            slot.touch(now);
            return LookupResult {
                entry: Some(Arc::clone(&slot.records)),
                ttl0: false,
            };
        }

        if slot.is_expired(now) {
            drop(slot);
            self.entries.remove(&key);
            return LookupResult {
                entry: None,
                ttl0: false,
            };
        }

        slot.touch(now);
        LookupResult {
            entry: Some(Arc::clone(&slot.records)),
            ttl0: false,
        }
    }

    /// Inserts `records` under the key derived from the first record's
    /// `(type, name)` when non-empty, or `(record_type, name)` otherwise.
    /// TTL is `min` over all records, or `bad_ttl` for an empty answer.
    pub fn insert(&self, records: Vec<ResourceRecord>, name: &str, record_type: RecordType) {
        let now = self.clock.now_secs();

        if records.is_empty() {
            let key = CacheKey::new(name, record_type);
            self.entries
                .insert(key, CachedEntry::new(records, now, self.bad_ttl, false));
            return;
        }

        let key_name = records[0].name.clone();
        let key_type = records[0].record_type();
        let ttl = records.iter().map(|r| r.ttl).min().unwrap_or(self.bad_ttl);
        let ttl0 = records.iter().any(|r| r.ttl == 0);

        let key = CacheKey::new(key_name, key_type);
        self.entries
            .insert(key, CachedEntry::new(records, now, ttl, ttl0));
    }

    pub fn get_last_success(&self, name: &str) -> Option<RecordType> {
        self.last_success.get(name).map(|v| *v)
    }

    pub fn set_last_success(&self, name: &str, record_type: Option<RecordType>) {
        match record_type {
            Some(rt) => {
                self.last_success.insert(CompactString::new(name), rt);
            }
            None => {
                self.last_success.remove(name);
            }
        }
    }

    /// Removes every entry whose `expireAt < now`, and — if `idle_threshold`
    /// is given — every entry untouched for at least that long, regardless
    /// of expiry. See §9 Open Question (a): the source's `touched == nil`
    /// check is a bug (always true); this is the corrected behavior.
    pub fn purge(&self, idle_threshold_secs: Option<u64>) {
        let now = self.clock.now_secs();
        self.entries.retain(|_, entry| {
            if entry.is_expired(now) {
                return false;
            }
            if let Some(threshold) = idle_threshold_secs {
                if entry.is_idle_since(now, threshold) {
                    return false;
                }
            }
            true
        });
    }

    /// Current time per this cache's clock — reused by the balancer to
    /// decide when a host's DNS answer has gone stale (§4.4).
    pub fn clock_now_secs(&self) -> u64 {
        self.clock.now_secs()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every cached entry and last-success index. Used by
    /// `Resolver::init` re-invocation (§6).
    pub fn clear(&self) {
        self.entries.clear();
        self.last_success.clear();
    }
}
