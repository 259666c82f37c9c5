//! Cache entry value (§4.1).
//!
//! Carries an ordered answer set plus the bookkeeping `lookup`/`insert`/
//! `purge` need: `expires_at_secs` (monotonic), `touched_at_secs` (for the
//! `purge(idleThreshold)` path), and the `ttl0` flag.

use flowdns_domain::ResourceRecord;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct CachedEntry {
    pub records: Arc<Vec<ResourceRecord>>,
    pub expires_at_secs: u64,
    pub touched_at_secs: u64,
    pub ttl0: bool,
}

impl CachedEntry {
    pub fn new(records: Vec<ResourceRecord>, now_secs: u64, ttl_secs: u32, ttl0: bool) -> Self {
        Self {
            records: Arc::new(records),
            expires_at_secs: now_secs + ttl_secs as u64,
            touched_at_secs: now_secs,
            ttl0,
        }
    }

    pub fn touch(&mut self, now_secs: u64) {
        self.touched_at_secs = now_secs;
    }

    pub fn is_expired(&self, now_secs: u64) -> bool {
        now_secs >= self.expires_at_secs
    }

    pub fn is_idle_since(&self, now_secs: u64, idle_threshold_secs: u64) -> bool {
        now_secs.saturating_sub(self.touched_at_secs) >= idle_threshold_secs
    }
}
