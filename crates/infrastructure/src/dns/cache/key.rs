//! Cache key: `(recordType, name)` (§3 Data model).
//!
//! Uses `CompactString` instead of `String` to store domain names —
//! `CompactString` stores strings up to 24 bytes inline, which covers the
//! overwhelming majority of real domain names and avoids a heap allocation
//! on every lookup.

use compact_str::CompactString;
use flowdns_domain::RecordType;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub name: CompactString,
    pub record_type: RecordType,
}

impl CacheKey {
    pub fn new(name: impl Into<CompactString>, record_type: RecordType) -> Self {
        Self {
            name: name.into(),
            record_type,
        }
    }
}
