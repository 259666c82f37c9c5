pub mod hosts_file;
pub mod logging;
pub mod resolv_conf;
pub mod resolver_config;

pub use hosts_file::{Family, HostAddresses, HostsEntry, HostsFile};
pub use logging::LoggingConfig;
pub use resolv_conf::ResolvConf;
pub use resolver_config::{Nameserver, ResolverConfig};
