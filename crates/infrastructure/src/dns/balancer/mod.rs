//! DNS-aware load balancers (§3, §4.4-§4.7): a shared host/address model
//! and bookkeeping core (`base`), with three pluggable selection policies.

mod address;
mod base;
mod consistent_hash;
mod handle;
mod host;
mod least_connections;
mod round_robin;

pub use address::Address;
pub use base::HostKey;
pub use consistent_hash::DEFAULT_POINTS;
pub use handle::Handle;
pub use host::Host;

use async_trait::async_trait;
use base::BalancerBase;
use consistent_hash::ConsistentHashPolicy;
use flowdns_domain::DomainError;
use least_connections::LeastConnectionsPolicy;
use round_robin::RoundRobinPolicy;
use std::net::IpAddr;
use std::sync::Arc;

use crate::dns::resolver::Resolver;

/// One registered `(hostname, port)` seed for a balancer's initial host
/// set (§6 Balancer API: construction accepts `hosts[]`).
#[derive(Debug, Clone)]
pub struct HostSpec {
    pub name: String,
    pub port: Option<u16>,
    pub weight: Option<u32>,
}

impl HostSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port: None,
            weight: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = Some(weight);
        self
    }
}

/// The common operations every DNS-aware balancer policy exposes (§4.4).
#[async_trait]
pub trait Balancer: Send + Sync {
    async fn add_host(&self, name: &str, port: Option<u16>, weight: Option<u32>) -> Result<(), DomainError>;
    fn remove_host(&self, name: &str, port: Option<u16>);
    fn set_address_status(&self, name: &str, port: Option<u16>, address_index: usize, available: bool);
    async fn get_peer(
        &self,
        cache_only: bool,
        handle: Option<Handle>,
        hash_value: Option<&str>,
    ) -> Result<(IpAddr, u16, String, Handle), DomainError>;
    fn is_healthy(&self) -> bool;
    fn weight(&self) -> u32;
}

macro_rules! impl_balancer_delegate {
    ($ty:ident, $policy:ty) => {
        #[async_trait]
        impl Balancer for $ty {
            async fn add_host(
                &self,
                name: &str,
                port: Option<u16>,
                weight: Option<u32>,
            ) -> Result<(), DomainError> {
                self.base.add_host(name, port, weight).await
            }

            fn remove_host(&self, name: &str, port: Option<u16>) {
                self.base.remove_host(name, port)
            }

            fn set_address_status(&self, name: &str, port: Option<u16>, address_index: usize, available: bool) {
                self.base.set_address_status(name, port, address_index, available)
            }

            async fn get_peer(
                &self,
                cache_only: bool,
                handle: Option<Handle>,
                hash_value: Option<&str>,
            ) -> Result<(IpAddr, u16, String, Handle), DomainError> {
                self.base.get_peer(cache_only, handle, hash_value).await
            }

            fn is_healthy(&self) -> bool {
                self.base.is_healthy()
            }

            fn weight(&self) -> u32 {
                self.base.weight()
            }
        }
    };
}

/// §4.5 weighted round-robin over a shuffled wheel.
pub struct RoundRobinBalancer {
    base: BalancerBase<RoundRobinPolicy>,
}

impl RoundRobinBalancer {
    pub async fn new(
        resolver: Arc<Resolver>,
        hosts: Vec<HostSpec>,
        log_prefix: impl Into<String>,
        max_wheel_size: Option<u64>,
    ) -> Result<Self, DomainError> {
        let policy = match max_wheel_size {
            Some(size) => RoundRobinPolicy::with_max_wheel_size(size),
            None => RoundRobinPolicy::new(),
        };
        let base = BalancerBase::new(resolver, log_prefix, policy);
        for spec in hosts {
            base.add_host(&spec.name, spec.port, spec.weight).await?;
        }
        Ok(Self { base })
    }
}

impl_balancer_delegate!(RoundRobinBalancer, RoundRobinPolicy);

/// §4.6 consistent hashing over a Ketama-style continuum.
pub struct ConsistentHashBalancer {
    base: BalancerBase<ConsistentHashPolicy>,
    points: u32,
}

impl ConsistentHashBalancer {
    pub async fn new(
        resolver: Arc<Resolver>,
        hosts: Vec<HostSpec>,
        log_prefix: impl Into<String>,
        points: Option<u32>,
    ) -> Result<Self, DomainError> {
        let points = points.unwrap_or(DEFAULT_POINTS);
        consistent_hash::check_capacity(hosts.len() as u64, points)?;
        let base = BalancerBase::new(resolver, log_prefix, ConsistentHashPolicy::new(points));
        for spec in hosts {
            base.add_host(&spec.name, spec.port, spec.weight).await?;
        }
        Ok(Self { base, points })
    }
}

#[async_trait]
impl Balancer for ConsistentHashBalancer {
    /// Unlike the delegating balancers, `add_host` re-checks capacity
    /// against the host count this add would produce (§4.6) before
    /// touching the host map — `ConsistentHashPolicy::rebuild` silently
    /// empties the continuum rather than erroring when it's over capacity,
    /// so the check has to happen here, not there.
    async fn add_host(&self, name: &str, port: Option<u16>, weight: Option<u32>) -> Result<(), DomainError> {
        let current = self.base.hosts_snapshot().len() as u64;
        consistent_hash::check_capacity(current + 1, self.points)?;
        self.base.add_host(name, port, weight).await
    }

    fn remove_host(&self, name: &str, port: Option<u16>) {
        self.base.remove_host(name, port)
    }

    fn set_address_status(&self, name: &str, port: Option<u16>, address_index: usize, available: bool) {
        self.base.set_address_status(name, port, address_index, available)
    }

    async fn get_peer(
        &self,
        cache_only: bool,
        handle: Option<Handle>,
        hash_value: Option<&str>,
    ) -> Result<(IpAddr, u16, String, Handle), DomainError> {
        self.base.get_peer(cache_only, handle, hash_value).await
    }

    fn is_healthy(&self) -> bool {
        self.base.is_healthy()
    }

    fn weight(&self) -> u32 {
        self.base.weight()
    }
}

/// §4.7 least-connections: minimum live in-flight count, stable under
/// ties.
pub struct LeastConnectionsBalancer {
    base: BalancerBase<LeastConnectionsPolicy>,
}

impl LeastConnectionsBalancer {
    pub async fn new(
        resolver: Arc<Resolver>,
        hosts: Vec<HostSpec>,
        log_prefix: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let base = BalancerBase::new(resolver, log_prefix, LeastConnectionsPolicy::new());
        for spec in hosts {
            base.add_host(&spec.name, spec.port, spec.weight).await?;
        }
        Ok(Self { base })
    }

    /// Decrements the live-connection counter for the address `handle` was
    /// last given — call this once the request it represents has finished.
    pub fn release(&self, handle: &Handle) {
        let Some((name, port, address_index)) = handle.last_selection.clone() else {
            return;
        };
        self.base
            .with_policy_mut(|policy| policy.release(&(name, port), address_index));
    }
}

impl_balancer_delegate!(LeastConnectionsBalancer, LeastConnectionsPolicy);
