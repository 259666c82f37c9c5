//! Shared balancer machinery (§4.4): the host map, weight bookkeeping,
//! the DNS-refresh reconciliation protocol, and the `getPeer` retry loop.
//! Each concrete policy (round-robin, consistent-hash, least-connections)
//! plugs in by implementing `SelectionPolicy`; everything else is common.
//!
//! Grounded on `load_balancer/pool.rs`'s `PoolManager` for the
//! host-map-plus-total-weight shape and on `load_balancer/health.rs`'s
//! `HealthChecker` for the available/healthy bookkeeping, generalized from
//! the teacher's fixed upstream-server list to a DNS-refreshed one.

use super::address::Address;
use super::handle::Handle;
use super::host::{Host, ResolvedEndpoint};
use crate::dns::resolver::Resolver;
use flowdns_domain::{DnsRecordData, DomainError, RecordType, ResolveOptions, ResourceRecord};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

pub type HostKey = (String, u16);

/// Plugs policy-specific selection into `BalancerBase`. All methods run
/// synchronously under the base's lock — no I/O happens here, only
/// bookkeeping over already-resolved `Host`/`Address` data.
pub trait SelectionPolicy: Send {
    /// Rebuild whatever index the policy keeps (wheel, continuum, counts)
    /// from the current host map. Called after every reconciliation that
    /// reported a change, and after `add_host`/`remove_host`.
    fn rebuild(&mut self, hosts: &HashMap<HostKey, Host>);

    /// Pick one live address, honoring `handle`'s already-tried set and
    /// (for hash-based policies) `hash_value`.
    fn pick(
        &mut self,
        hosts: &HashMap<HostKey, Host>,
        handle: &Handle,
        hash_value: Option<&str>,
    ) -> Result<(HostKey, usize), DomainError>;
}

struct Inner<P> {
    hosts: HashMap<HostKey, Host>,
    total_weight: u32,
    healthy: bool,
    policy: P,
}

pub struct BalancerBase<P> {
    resolver: Arc<Resolver>,
    inner: Mutex<Inner<P>>,
    log_prefix: String,
}

impl<P: SelectionPolicy> BalancerBase<P> {
    pub fn new(resolver: Arc<Resolver>, log_prefix: impl Into<String>, policy: P) -> Self {
        Self {
            resolver,
            inner: Mutex::new(Inner {
                hosts: HashMap::new(),
                total_weight: 0,
                healthy: false,
                policy,
            }),
            log_prefix: log_prefix.into(),
        }
    }

    pub fn log_prefix(&self) -> &str {
        &self.log_prefix
    }

    pub fn is_healthy(&self) -> bool {
        self.inner.lock().unwrap().healthy
    }

    pub fn weight(&self) -> u32 {
        self.inner.lock().unwrap().total_weight
    }

    /// §4.4 `addHost`: refuses duplicate `(name, port)` pairs, resolves the
    /// host's initial address set, and runs the policy rebuild hook.
    pub async fn add_host(
        &self,
        name: &str,
        port: Option<u16>,
        weight: Option<u32>,
    ) -> Result<(), DomainError> {
        let key = (name.to_string(), port.unwrap_or(0));
        {
            let inner = self.inner.lock().unwrap();
            if inner.hosts.contains_key(&key) {
                return Err(DomainError::DuplicateHost(key.0, key.1));
            }
        }

        let mut host = Host::new(name, port, weight.unwrap_or(1));
        let (record_type, endpoints, ttl) = self.resolve_endpoints(&host, false).await?;
        host.reconcile(record_type, &endpoints, ttl, self.now_secs());

        let mut inner = self.inner.lock().unwrap();
        inner.hosts.insert(key, host);
        recompute_weight(&mut inner);
        inner.policy.rebuild(&inner.hosts);
        Ok(())
    }

    /// §4.4 `removeHost`: disables every address, reconciles the policy,
    /// then detaches the host — no wheel/continuum slot can reference it
    /// afterwards.
    pub fn remove_host(&self, name: &str, port: Option<u16>) {
        let key = (name.to_string(), port.unwrap_or(0));
        let mut inner = self.inner.lock().unwrap();
        if let Some(host) = inner.hosts.get_mut(&key) {
            for addr in &mut host.addresses {
                addr.disabled = true;
                addr.weight = 0;
            }
        }
        inner.policy.rebuild(&inner.hosts);
        inner.hosts.remove(&key);
        recompute_weight(&mut inner);
    }

    /// §4.4 `setAddressStatus`: flips availability in place.
    pub fn set_address_status(&self, name: &str, port: Option<u16>, address_index: usize, available: bool) {
        let key = (name.to_string(), port.unwrap_or(0));
        let mut inner = self.inner.lock().unwrap();
        if let Some(host) = inner.hosts.get_mut(&key) {
            if let Some(addr) = host.addresses.get_mut(address_index) {
                addr.available = available;
            }
        }
        recompute_weight(&mut inner);
    }

    /// Escape hatch for policy-specific operations that don't fit the
    /// common `SelectionPolicy` contract (e.g. `LeastConnectionsBalancer`'s
    /// `release`).
    pub fn with_policy_mut<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        let mut inner = self.inner.lock().unwrap();
        f(&mut inner.policy)
    }

    pub fn hosts_snapshot(&self) -> Vec<(HostKey, Vec<Address>)> {
        self.inner
            .lock()
            .unwrap()
            .hosts
            .iter()
            .map(|(k, h)| (k.clone(), h.addresses.to_vec()))
            .collect()
    }

    /// §4.4 `getPeer`. Loops internally over `DnsUpdated`/`AddressUnavailable`
    /// (§5, `DomainError::is_loop_internal`) until a live address is found,
    /// the host tree is exhausted, or the balancer is unhealthy.
    pub async fn get_peer(
        &self,
        cache_only: bool,
        handle: Option<Handle>,
        hash_value: Option<&str>,
    ) -> Result<(IpAddr, u16, String, Handle), DomainError> {
        let mut handle = handle.unwrap_or_default();
        if handle.address.is_some() {
            handle.retry_count += 1;
        }
        if let Some(hv) = hash_value {
            handle.hash_value = Some(hv.to_string());
        }

        // A host with `ttl_secs == 0` (a valid, always-stale DNS answer,
        // §4.1) reports `is_stale` on every check, so refreshing is capped
        // at once per host per call — otherwise such a host would spin
        // this loop forever re-resolving instead of ever returning a peer.
        let mut refreshed_this_call: HashSet<HostKey> = HashSet::new();

        loop {
            if !self.is_healthy() {
                return Err(DomainError::BalancerUnhealthy);
            }

            let (host_key, address_index) = {
                let mut inner = self.inner.lock().unwrap();
                inner
                    .policy
                    .pick(&inner.hosts, &handle, handle.hash_value.as_deref())?
            };

            if self.needs_refresh(&host_key) && refreshed_this_call.insert(host_key.clone()) {
                match self.refresh_host(&host_key, cache_only).await {
                    Ok(_) => continue,
                    Err(e) if e.is_loop_internal() => continue,
                    Err(e) => return Err(e),
                }
            }

            let inner = self.inner.lock().unwrap();
            let Some(host) = inner.hosts.get(&host_key) else {
                continue;
            };
            let Some(addr) = host.addresses.get(address_index) else {
                continue;
            };
            if !addr.is_live() {
                continue;
            }

            let (ip, port) = (addr.ip, addr.port);
            drop(inner);

            handle.mark_tried(&host_key, address_index);
            handle.address = Some((ip, port));
            return Ok((ip, port, host_key.0, handle));
        }
    }

    fn needs_refresh(&self, key: &HostKey) -> bool {
        let inner = self.inner.lock().unwrap();
        inner
            .hosts
            .get(key)
            .map(|h| h.is_stale(self.now_secs()))
            .unwrap_or(false)
    }

    /// Re-resolves one host's DNS answer and reconciles it (§4.4). Always
    /// returns `DnsUpdated` on success so `get_peer`'s loop re-picks rather
    /// than handing back an address that just vanished.
    async fn refresh_host(&self, key: &HostKey, cache_only: bool) -> Result<(), DomainError> {
        let host_snapshot = {
            let inner = self.inner.lock().unwrap();
            inner.hosts.get(key).cloned()
        };
        let Some(host) = host_snapshot else {
            return Ok(());
        };

        let (record_type, endpoints, ttl) = self.resolve_endpoints(&host, cache_only).await?;

        let mut inner = self.inner.lock().unwrap();
        if let Some(host) = inner.hosts.get_mut(key) {
            host.reconcile(record_type, &endpoints, ttl, self.now_secs());
        }
        recompute_weight(&mut inner);
        inner.policy.rebuild(&inner.hosts);
        Err(DomainError::DnsUpdated)
    }

    /// Resolves `host.hostname` and reduces the answer to a flat endpoint
    /// list: one per A/AAAA address, or one per address backing an SRV
    /// target within the lowest-numbered priority band (§4.3, "only the
    /// lowest numeric priority is ever selected").
    async fn resolve_endpoints(
        &self,
        host: &Host,
        cache_only: bool,
    ) -> Result<(Option<RecordType>, Vec<ResolvedEndpoint>, u32), DomainError> {
        let records = match self
            .resolver
            .resolve(&host.hostname, ResolveOptions::new(), cache_only)
            .await
        {
            Ok(records) => records,
            Err(DomainError::DnsEmpty(_)) => Vec::new(),
            Err(e) => return Err(e),
        };

        if records.is_empty() {
            return Ok((host.record_type, Vec::new(), host.ttl_secs));
        }

        let record_type = records[0].record_type();
        let ttl = records.iter().map(|r| r.ttl).min().unwrap_or(host.ttl_secs);

        let endpoints = match record_type {
            RecordType::A | RecordType::Aaaa => records
                .iter()
                .filter_map(|r| address_endpoint(r, host))
                .collect(),
            RecordType::Srv => self.resolve_srv_endpoints(&records, cache_only).await?,
            RecordType::Cname => Vec::new(),
        };

        Ok((Some(record_type), endpoints, ttl))
    }

    async fn resolve_srv_endpoints(
        &self,
        records: &[ResourceRecord],
        cache_only: bool,
    ) -> Result<Vec<ResolvedEndpoint>, DomainError> {
        let min_priority = records
            .iter()
            .filter_map(|r| match r.data {
                DnsRecordData::Srv { priority, .. } => Some(priority),
                _ => None,
            })
            .min();
        let Some(min_priority) = min_priority else {
            return Ok(Vec::new());
        };

        let band: Vec<(u16, String, u16, u16)> = records
            .iter()
            .filter_map(|r| match r.data {
                DnsRecordData::Srv {
                    priority,
                    weight,
                    port,
                    ref target,
                } if priority == min_priority => Some((priority, target.clone(), port, weight)),
                _ => None,
            })
            .collect();

        // Each target is an independent name lookup; resolve the whole
        // band concurrently rather than one-at-a-time.
        let resolutions = futures::future::join_all(band.iter().map(|(_, target, _, _)| {
            self.resolver
                .resolve(target, ResolveOptions::with_qtype(RecordType::A), cache_only)
        }))
        .await;

        let mut endpoints = Vec::new();
        for ((priority, target, port, weight), resolution) in band.iter().zip(resolutions) {
            let Ok(target_records) = resolution else {
                continue;
            };
            let sort_key = Address::srv_sort_key(*priority, target, *port, *weight);
            for target_record in &target_records {
                if let DnsRecordData::A(ip) = target_record.data {
                    endpoints.push(ResolvedEndpoint {
                        ip: ip.into(),
                        port: *port,
                        weight: *weight as u32,
                        sort_key: sort_key.clone(),
                    });
                }
            }
        }
        Ok(endpoints)
    }

    fn now_secs(&self) -> u64 {
        self.resolver.cache().clock_now_secs()
    }
}

fn address_endpoint(record: &ResourceRecord, host: &Host) -> Option<ResolvedEndpoint> {
    let ip: IpAddr = match record.data {
        DnsRecordData::A(ip) => ip.into(),
        DnsRecordData::Aaaa(ip) => ip.into(),
        _ => return None,
    };
    Some(ResolvedEndpoint {
        ip,
        port: host.default_port.unwrap_or(0),
        weight: host.node_weight,
        sort_key: Address::a_sort_key(ip),
    })
}

fn recompute_weight<P>(inner: &mut Inner<P>) {
    inner.total_weight = inner.hosts.values().map(|h| h.live_weight()).sum();
    inner.healthy = inner.total_weight > 0;
}
