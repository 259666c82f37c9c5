//! Weighted round-robin policy (§4.5): a shuffled wheel of address slots,
//! sized by GCD-reduced weights and bounded by `max_wheel_size`.
//!
//! Grounded on `load_balancer/balanced.rs`'s `BalancedStrategy`, generalized
//! from the teacher's fixed-size upstream array to a wheel rebuilt whenever
//! the host map changes.

use super::base::{HostKey, SelectionPolicy};
use super::handle::Handle;
use super::host::Host;
use flowdns_domain::DomainError;
use std::collections::HashMap;

const DEFAULT_MAX_WHEEL_SIZE: u64 = 1 << 20;

#[derive(Clone)]
struct WheelSlot {
    host_key: HostKey,
    address_index: usize,
}

pub struct RoundRobinPolicy {
    wheel: Vec<WheelSlot>,
    pointer: usize,
    max_wheel_size: u64,
}

impl RoundRobinPolicy {
    pub fn new() -> Self {
        Self::with_max_wheel_size(DEFAULT_MAX_WHEEL_SIZE)
    }

    pub fn with_max_wheel_size(max_wheel_size: u64) -> Self {
        Self {
            wheel: Vec::new(),
            pointer: 0,
            max_wheel_size: max_wheel_size.max(1),
        }
    }
}

impl Default for RoundRobinPolicy {
    fn default() -> Self {
        Self::new()
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

impl SelectionPolicy for RoundRobinPolicy {
    fn rebuild(&mut self, hosts: &HashMap<HostKey, Host>) {
        let mut live: Vec<(HostKey, usize, u64)> = Vec::new();
        // Deterministic base order (before the shuffle) so ties within a
        // test build reproducibly.
        let mut keys: Vec<&HostKey> = hosts.keys().collect();
        keys.sort();
        for key in keys {
            let host = &hosts[key];
            for (idx, addr) in host.addresses.iter().enumerate() {
                if addr.is_live() {
                    live.push((key.clone(), idx, addr.weight as u64));
                }
            }
        }

        if live.is_empty() {
            self.wheel.clear();
            self.pointer = 0;
            return;
        }

        let divisor = live.iter().map(|(_, _, w)| *w).fold(0u64, gcd).max(1);

        let mut wheel = Vec::new();
        'outer: for (host_key, idx, weight) in &live {
            let slots = (*weight / divisor).max(1);
            for _ in 0..slots {
                if wheel.len() as u64 >= self.max_wheel_size {
                    break 'outer;
                }
                wheel.push(WheelSlot {
                    host_key: host_key.clone(),
                    address_index: *idx,
                });
            }
        }

        // Fisher-Yates shuffle so weight proportions hold without runs of
        // the same address (§4.5).
        for i in (1..wheel.len()).rev() {
            let j = fastrand::usize(0..=i);
            wheel.swap(i, j);
        }

        self.wheel = wheel;
        self.pointer = 0;
    }

    fn pick(
        &mut self,
        hosts: &HashMap<HostKey, Host>,
        handle: &Handle,
        _hash_value: Option<&str>,
    ) -> Result<(HostKey, usize), DomainError> {
        if self.wheel.is_empty() {
            return Err(DomainError::NoPeersAvailable);
        }

        let len = self.wheel.len();
        for _ in 0..len {
            let slot = self.wheel[self.pointer % len].clone();
            self.pointer = self.pointer.wrapping_add(1);

            if handle.was_tried(&slot.host_key, slot.address_index) {
                continue;
            }
            if let Some(host) = hosts.get(&slot.host_key) {
                if let Some(addr) = host.addresses.get(slot.address_index) {
                    if addr.is_live() {
                        return Ok((slot.host_key, slot.address_index));
                    }
                }
            }
        }

        Err(DomainError::NoPeersAvailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::balancer::host::ResolvedEndpoint;
    use std::net::{IpAddr, Ipv4Addr};

    fn host_with(ips: &[([u8; 4], u32)]) -> Host {
        let mut host = Host::new("h", Some(80), 10);
        let endpoints: Vec<ResolvedEndpoint> = ips
            .iter()
            .map(|(ip, weight)| {
                let addr: IpAddr = Ipv4Addr::from(*ip).into();
                ResolvedEndpoint {
                    ip: addr,
                    port: 80,
                    weight: *weight,
                    sort_key: addr.to_string(),
                }
            })
            .collect();
        host.reconcile(Some(flowdns_domain::RecordType::A), &endpoints, 30, 0);
        host
    }

    #[test]
    fn wheel_size_matches_gcd_reduced_weights() {
        let mut hosts = HashMap::new();
        hosts.insert(
            ("h".to_string(), 80),
            host_with(&[([1, 1, 1, 1], 20), ([2, 2, 2, 2], 10)]),
        );
        let mut policy = RoundRobinPolicy::new();
        policy.rebuild(&hosts);
        assert_eq!(policy.wheel.len(), 3);
    }

    #[test]
    fn empty_host_map_yields_no_peers() {
        let hosts = HashMap::new();
        let mut policy = RoundRobinPolicy::new();
        policy.rebuild(&hosts);
        let handle = Handle::new();
        assert!(matches!(
            policy.pick(&hosts, &handle, None),
            Err(DomainError::NoPeersAvailable)
        ));
    }

    #[test]
    fn pick_advances_through_full_wheel_over_wheel_size_calls() {
        let mut hosts = HashMap::new();
        hosts.insert(("h".to_string(), 80), host_with(&[([1, 1, 1, 1], 10), ([2, 2, 2, 2], 10)]));
        let mut policy = RoundRobinPolicy::new();
        policy.rebuild(&hosts);
        let handle = Handle::new();
        let mut counts: HashMap<usize, u32> = HashMap::new();
        for _ in 0..2 {
            let (_, idx) = policy.pick(&hosts, &handle, None).unwrap();
            *counts.entry(idx).or_default() += 1;
        }
        assert_eq!(counts.get(&0), Some(&1));
        assert_eq!(counts.get(&1), Some(&1));
    }
}
