//! The resolver (§4.3): orchestrates cache lookup, literal-IP short
//! circuit, the type-order try loop, CNAME dereferencing, negative
//! caching, and `toip` peer selection.
//!
//! Grounded on the teacher's `CoreResolver`/`CachedResolver` delegation
//! shape (`resolver/core.rs`, `resolver/cache_layer.rs`) and
//! `ResolverBuilder`'s layered construction (`resolver/builder.rs`),
//! collapsed into one concrete type since this spec has no DNSSEC/filter
//! layering to compose — cache and single-flight are internal stages of
//! one `_lookup`, not separate `DnsResolver` decorators.

use super::literal;
use super::rr_cursor::{RrCursor, SrvWeightedPool};
use crate::dns::cache::{CacheKey, DnsCache};
use crate::dns::singleflight::SingleFlightGate;
use compact_str::CompactString;
use dashmap::DashMap;
use flowdns_application::DnsTransport;
use flowdns_domain::{
    DnsQuery, DnsRecordData, DomainError, OrderSlot, RecordType, ResolveOptions, ResolverConfig,
    ResourceRecord,
};
use rustc_hash::FxBuildHasher;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

struct SrvPoolSlot {
    weights: Vec<u16>,
    pool: SrvWeightedPool,
}

/// A client-side DNS resolver bound to one immutable configuration (§6).
/// Re-running `init` (constructing a new `Resolver`) clears the cache.
pub struct Resolver {
    config: ResolverConfig,
    cache: DnsCache,
    gate: SingleFlightGate<Vec<ResourceRecord>>,
    transport: Arc<dyn DnsTransport>,
    rr_cursors: DashMap<CompactString, Arc<RrCursor>, FxBuildHasher>,
    srv_pools: DashMap<CompactString, Arc<SrvPoolSlot>, FxBuildHasher>,
}

impl Resolver {
    pub fn new(config: ResolverConfig, transport: Arc<dyn DnsTransport>) -> Self {
        let bad_ttl = config.bad_ttl;
        Self {
            config,
            cache: DnsCache::new(bad_ttl),
            gate: SingleFlightGate::new(1), // maxRetry = 1, §4.2
            transport,
            rr_cursors: DashMap::with_hasher(FxBuildHasher),
            srv_pools: DashMap::with_hasher(FxBuildHasher),
        }
    }

    /// `resolve(name, opts, cacheOnly)` (§6).
    pub async fn resolve(
        &self,
        name: &str,
        opts: ResolveOptions,
        cache_only: bool,
    ) -> Result<Vec<ResourceRecord>, DomainError> {
        if opts.qtype.is_none() {
            // A literal-shaped name resolves to its natural family directly,
            // bypassing the type-order loop so no SRV/CNAME probe is ever
            // sent for an address the caller already spelled out (§4.3).
            if let Some(effective_type) = literal::literal_record_type(name) {
                return self.lookup_one(name, effective_type, cache_only).await;
            }
        }

        match opts.qtype {
            Some(qtype) => self.lookup_one(name, qtype, cache_only).await,
            None => {
                self.resolve_type_order(name, cache_only, 0)
                    .await
                    .map(|(records, _winner)| records)
            }
        }
    }

    /// Runs the type-order try-list (§4.3): substitutes `LAST` with the
    /// name's `lastSuccessType` if present, tries each candidate type in
    /// order, and chases a winning `CNAME` answer to its target.
    fn resolve_type_order<'a>(
        &'a self,
        name: &'a str,
        cache_only: bool,
        depth: u32,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<(Vec<ResourceRecord>, RecordType), DomainError>> + 'a>,
    > {
        Box::pin(async move {
            if depth > self.config.max_cname_depth {
                return Err(DomainError::DnsRecursionLimit);
            }

            let order = build_order(&self.config.order, self.cache.get_last_success(name));
            let mut last_err: Option<DomainError> = None;

            for record_type in order {
                match self.lookup_one(name, record_type, cache_only).await {
                    Ok(records) if !records.is_empty() => {
                        if record_type == RecordType::Cname {
                            let target = cname_target(&records)?;
                            let (chased, winner) =
                                self.resolve_type_order(&target, cache_only, depth + 1).await?;
                            self.cache.set_last_success(name, Some(winner));
                            return Ok((chased, winner));
                        }
                        self.cache.set_last_success(name, Some(record_type));
                        return Ok((records, record_type));
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        last_err = Some(e);
                        continue;
                    }
                }
            }

            self.cache.set_last_success(name, None);
            Err(last_err.unwrap_or_else(|| DomainError::DnsEmpty(name.to_string())))
        })
    }

    /// `_lookup(name, type)` (§4.3): cache → literal short-circuit →
    /// single-flight → DNS, with cross-type normalization of the answer.
    async fn lookup_one(
        &self,
        name: &str,
        record_type: RecordType,
        cache_only: bool,
    ) -> Result<Vec<ResourceRecord>, DomainError> {
        let lookup = self.cache.lookup(record_type, name, cache_only);
        if let Some(records) = lookup.entry {
            return Ok((*records).clone());
        }

        // Literal addresses need no DNS I/O at all, so they short-circuit
        // ahead of the cache-only gate below — a cache-only caller must be
        // able to resolve "1.2.3.4" just as freely as a network-allowed one.
        if !lookup.ttl0 {
            if let Some(result) = literal::try_literal(name, record_type) {
                return match result {
                    Ok(records) => {
                        self.cache.insert(records.clone(), name, record_type);
                        Ok(records)
                    }
                    Err(e) => Err(e),
                };
            }
        }

        if cache_only {
            return Err(DomainError::DnsNoCache(name.to_string()));
        }

        let key = CacheKey::new(name, record_type);
        let query = DnsQuery::new(name.to_string(), record_type);
        let max_wait = Duration::from_millis(self.config.max_wait_ms());
        let transport = Arc::clone(&self.transport);

        let result = self
            .gate
            .run(key, lookup.ttl0, max_wait, || {
                let transport = Arc::clone(&transport);
                let query = query.clone();
                async move { transport.query(&query).await }
            })
            .await?;

        Ok(self.normalize_and_cache(name, record_type, result))
    }

    /// Splits out records whose type differs from `record_type` (CNAME
    /// glue riding with an A/SRV answer), caches each under its own
    /// `(type, name)` key, and caches/returns the remainder.
    fn normalize_and_cache(
        &self,
        name: &str,
        record_type: RecordType,
        answer: Vec<ResourceRecord>,
    ) -> Vec<ResourceRecord> {
        let mut matching = Vec::with_capacity(answer.len());
        let mut others: HashMap<(RecordType, String), Vec<ResourceRecord>> = HashMap::new();

        for record in answer {
            if record.record_type() == record_type {
                matching.push(record);
            } else {
                others
                    .entry((record.record_type(), record.name.clone()))
                    .or_default()
                    .push(record);
            }
        }

        for ((other_type, other_name), records) in others {
            self.cache.insert(records, &other_name, other_type);
        }

        self.cache.insert(matching.clone(), name, record_type);
        matching
    }

    /// `toip(name, port?, cacheOnly?)` (§4.3): resolves and then picks one
    /// peer — weighted RR over an SRV priority band, recursing on its
    /// target, or a plain RR cursor over A/AAAA.
    pub fn toip<'a>(
        &'a self,
        name: &'a str,
        port: Option<u16>,
        cache_only: bool,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(IpAddr, u16), DomainError>> + 'a>>
    {
        Box::pin(async move {
            let records = self.resolve(name, ResolveOptions::new(), cache_only).await?;
            if records.is_empty() {
                return Err(DomainError::DnsEmpty(name.to_string()));
            }

            match records[0].record_type() {
                RecordType::Srv => {
                    let min_priority = records
                        .iter()
                        .filter_map(|r| match &r.data {
                            DnsRecordData::Srv { priority, .. } => Some(*priority),
                            _ => None,
                        })
                        .min()
                        .ok_or_else(|| DomainError::DnsEmpty(name.to_string()))?;

                    let band: Vec<&ResourceRecord> = records
                        .iter()
                        .filter(|r| {
                            matches!(&r.data, DnsRecordData::Srv { priority, .. } if *priority == min_priority)
                        })
                        .collect();

                    let weights: Vec<u16> = band
                        .iter()
                        .map(|r| match &r.data {
                            DnsRecordData::Srv { weight, .. } => *weight,
                            _ => 0,
                        })
                        .collect();

                    let pool = self.srv_pool_for(name, &weights);
                    let idx = pool.pick();
                    match &band[idx].data {
                        DnsRecordData::Srv { target, port: srv_port, .. } => {
                            self.toip(target, Some(*srv_port), cache_only).await
                        }
                        _ => unreachable!("band filtered to SRV records"),
                    }
                }
                RecordType::A | RecordType::Aaaa => {
                    let cursor = self.rr_cursor_for(name);
                    let idx = cursor.pick(records.len());
                    let ip = match &records[idx].data {
                        DnsRecordData::A(ip) => IpAddr::V4(*ip),
                        DnsRecordData::Aaaa(ip) => IpAddr::V6(*ip),
                        _ => return Err(DomainError::DnsEmpty(name.to_string())),
                    };
                    Ok((ip, port.unwrap_or(0)))
                }
                RecordType::Cname => {
                    unreachable!("resolve() dereferences CNAME before toip sees a result")
                }
            }
        })
    }

    fn rr_cursor_for(&self, name: &str) -> Arc<RrCursor> {
        Arc::clone(
            self.rr_cursors
                .entry(CompactString::new(name))
                .or_insert_with(|| Arc::new(RrCursor::new()))
                .value(),
        )
    }

    fn srv_pool_for(&self, name: &str, weights: &[u16]) -> Arc<SrvPoolSlot> {
        let key = CompactString::new(name);
        if let Some(existing) = self.srv_pools.get(&key) {
            if existing.weights.as_slice() == weights {
                return Arc::clone(existing.value());
            }
        }
        let fresh = Arc::new(SrvPoolSlot {
            weights: weights.to_vec(),
            pool: SrvWeightedPool::new(weights),
        });
        self.srv_pools.insert(key, Arc::clone(&fresh));
        fresh
    }

    pub fn cache(&self) -> &DnsCache {
        &self.cache
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }
}

impl SrvPoolSlot {
    fn pick(&self) -> usize {
        self.pool.pick()
    }
}

fn build_order(order: &[OrderSlot], last_success: Option<RecordType>) -> Vec<RecordType> {
    let mut seen = HashSet::new();
    let mut result = Vec::with_capacity(order.len());
    for slot in order {
        let record_type = match slot {
            OrderSlot::Last => match last_success {
                Some(rt) => rt,
                None => continue,
            },
            OrderSlot::Type(rt) => *rt,
        };
        if seen.insert(record_type) {
            result.push(record_type);
        }
    }
    result
}

fn cname_target(records: &[ResourceRecord]) -> Result<String, DomainError> {
    records
        .first()
        .and_then(|r| match &r.data {
            DnsRecordData::Cname(target) => Some(target.clone()),
            _ => None,
        })
        .ok_or_else(|| DomainError::DnsEmpty("cname answer had no target".to_string()))
}
