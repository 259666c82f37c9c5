mod clock;
mod dns_transport;

pub use clock::{Clock, FakeClock, SystemClock};
pub use dns_transport::DnsTransport;

pub use flowdns_domain::DnsQuery;
