use crate::dns_record::{OrderSlot, DEFAULT_ORDER};
use serde::{Deserialize, Serialize};

/// One configured upstream nameserver, optionally on a non-standard port.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Nameserver {
    pub host: String,
    #[serde(default = "default_dns_port")]
    pub port: u16,
}

fn default_dns_port() -> u16 {
    53
}

impl Nameserver {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl From<&str> for Nameserver {
    fn from(host: &str) -> Self {
        Self {
            host: host.to_string(),
            port: default_dns_port(),
        }
    }
}

/// Immutable resolver configuration, assembled once by `init` (§6).
/// Re-running `init` with a new `ResolverConfig` clears the cache.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolverConfig {
    pub nameservers: Vec<Nameserver>,

    #[serde(default = "default_retrans")]
    pub retrans: u32,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_bad_ttl")]
    pub bad_ttl: u32,

    #[serde(default = "default_max_cname_depth")]
    pub max_cname_depth: u32,

    #[serde(skip, default = "default_order")]
    pub order: Vec<OrderSlot>,
}

fn default_retrans() -> u32 {
    5
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_bad_ttl() -> u32 {
    1
}

fn default_max_cname_depth() -> u32 {
    20
}

fn default_order() -> Vec<OrderSlot> {
    DEFAULT_ORDER.to_vec()
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            nameservers: Vec::new(),
            retrans: default_retrans(),
            timeout_ms: default_timeout_ms(),
            bad_ttl: default_bad_ttl(),
            max_cname_depth: default_max_cname_depth(),
            order: default_order(),
        }
    }
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nameservers(mut self, nameservers: Vec<Nameserver>) -> Self {
        self.nameservers = nameservers;
        self
    }

    pub fn with_retrans(mut self, retrans: u32) -> Self {
        self.retrans = retrans;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_bad_ttl(mut self, bad_ttl: u32) -> Self {
        self.bad_ttl = bad_ttl;
        self
    }

    pub fn with_order(mut self, order: Vec<OrderSlot>) -> Self {
        self.order = order;
        self
    }

    /// `timeout_ms * retrans`, the single-flight follower's max wait (§4.2).
    pub fn max_wait_ms(&self) -> u64 {
        self.timeout_ms * self.retrans as u64
    }
}
