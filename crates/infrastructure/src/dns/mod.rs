pub mod balancer;
pub mod cache;
pub mod resolver;
pub mod singleflight;

pub use balancer::{
    Address, Balancer, ConsistentHashBalancer, Handle, Host, LeastConnectionsBalancer,
    RoundRobinBalancer,
};
pub use cache::{CacheKey, CachedEntry, DnsCache};
pub use resolver::Resolver;
pub use singleflight::SingleFlightGate;
