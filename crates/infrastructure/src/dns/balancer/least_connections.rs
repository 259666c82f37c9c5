//! Least-connections policy (§4.7): a priority structure keyed by live
//! in-flight count. `pick` extracts the minimum, stable under ties by
//! address order; `release` (called when the caller's request completes)
//! decrements the chosen address's count.
//!
//! New; grounded on `load_balancer/health.rs`'s per-address bookkeeping
//! style, replacing its health counters with live-connection counters.

use super::base::{HostKey, SelectionPolicy};
use super::handle::Handle;
use super::host::Host;
use flowdns_domain::DomainError;
use std::collections::HashMap;

pub struct LeastConnectionsPolicy {
    counts: HashMap<(HostKey, usize), u32>,
}

impl LeastConnectionsPolicy {
    pub fn new() -> Self {
        Self {
            counts: HashMap::new(),
        }
    }

    pub fn release(&mut self, host_key: &HostKey, address_index: usize) {
        if let Some(count) = self.counts.get_mut(&(host_key.clone(), address_index)) {
            *count = count.saturating_sub(1);
        }
    }
}

impl Default for LeastConnectionsPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionPolicy for LeastConnectionsPolicy {
    fn rebuild(&mut self, hosts: &HashMap<HostKey, Host>) {
        let mut live = std::collections::HashSet::new();
        for (key, host) in hosts {
            for (idx, addr) in host.addresses.iter().enumerate() {
                if addr.is_live() {
                    live.insert((key.clone(), idx));
                }
            }
        }
        self.counts.retain(|k, _| live.contains(k));
        for k in live {
            self.counts.entry(k).or_insert(0);
        }
    }

    fn pick(
        &mut self,
        hosts: &HashMap<HostKey, Host>,
        handle: &Handle,
        _hash_value: Option<&str>,
    ) -> Result<(HostKey, usize), DomainError> {
        // Stable tie-break: sort candidates by (count, host_key, address
        // index) and take the first that is still live and untried.
        let mut candidates: Vec<(u32, HostKey, usize)> = self
            .counts
            .iter()
            .map(|((key, idx), count)| (*count, key.clone(), *idx))
            .collect();
        candidates.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        for (_, host_key, address_index) in candidates {
            if handle.was_tried(&host_key, address_index) {
                continue;
            }
            let Some(host) = hosts.get(&host_key) else {
                continue;
            };
            let Some(addr) = host.addresses.get(address_index) else {
                continue;
            };
            if !addr.is_live() {
                continue;
            }
            *self
                .counts
                .entry((host_key.clone(), address_index))
                .or_insert(0) += 1;
            return Ok((host_key, address_index));
        }

        Err(DomainError::NoPeersAvailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::balancer::host::ResolvedEndpoint;
    use flowdns_domain::RecordType;
    use std::net::{IpAddr, Ipv4Addr};

    fn hosts_ab() -> HashMap<HostKey, Host> {
        let mut hosts = HashMap::new();
        for (name, ip) in [("a", [1, 1, 1, 1]), ("b", [2, 2, 2, 2])] {
            let mut host = Host::new(name, Some(80), 10);
            let addr: IpAddr = Ipv4Addr::from(ip).into();
            host.reconcile(
                Some(RecordType::A),
                &[ResolvedEndpoint {
                    ip: addr,
                    port: 80,
                    weight: 10,
                    sort_key: addr.to_string(),
                }],
                30,
                0,
            );
            hosts.insert((name.to_string(), 80), host);
        }
        hosts
    }

    #[test]
    fn picks_the_address_with_fewest_live_connections() {
        let hosts = hosts_ab();
        let mut policy = LeastConnectionsPolicy::new();
        policy.rebuild(&hosts);
        let handle = Handle::new();

        let (first_key, first_idx) = policy.pick(&hosts, &handle, None).unwrap();
        let (second_key, _) = policy.pick(&hosts, &handle, None).unwrap();
        assert_ne!(first_key, second_key, "second pick goes to the other, less-loaded host");

        policy.release(&first_key, first_idx);
        assert_eq!(*policy.counts.get(&(first_key, first_idx)).unwrap(), 0);
    }

    #[test]
    fn ties_break_by_stable_host_and_address_order() {
        let hosts = hosts_ab();
        let mut policy = LeastConnectionsPolicy::new();
        policy.rebuild(&hosts);
        let handle = Handle::new();
        let (key, _) = policy.pick(&hosts, &handle, None).unwrap();
        assert_eq!(key.0, "a");
    }
}
