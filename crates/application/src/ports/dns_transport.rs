use async_trait::async_trait;
use flowdns_domain::{DnsQuery, DomainError, ResourceRecord};

/// The boundary past which "DNS wire protocol" is out of scope (§1): send
/// one query, get one answer. Implementations own retrying a single
/// attempt within its own timeout; the resolver above this trait owns
/// cache, single-flight, and CNAME chasing.
#[async_trait]
pub trait DnsTransport: Send + Sync {
    /// Performs exactly one query against the configured nameservers.
    ///
    /// Returns `Ok(records)` with zero records for an authoritative empty
    /// answer (NODATA/NXDOMAIN) — the resolver turns that into a negative
    /// cache entry, not an error. `Err` is reserved for transport failure
    /// (timeout exhausted, malformed response, server-signalled error).
    async fn query(&self, query: &DnsQuery) -> Result<Vec<ResourceRecord>, DomainError>;
}
