//! Domain layer: plain types and errors shared by the resolver and the
//! balancer. No async runtime, no I/O.
pub mod config;
pub mod dns_query;
pub mod dns_record;
pub mod errors;

pub use config::{HostsFile, ResolvConf, ResolverConfig};
pub use dns_query::{DnsQuery, ResolveOptions};
pub use dns_record::{DnsRecordData, OrderSlot, RecordType, ResourceRecord};
pub use errors::DomainError;
