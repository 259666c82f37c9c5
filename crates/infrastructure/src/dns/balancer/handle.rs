//! Opaque per-call selection context returned alongside a chosen peer
//! (§3, §4.4). Carries enough state across a retry that the policy can
//! avoid re-picking a just-failed address and a consistent-hash anchor
//! survives the retry even though the continuum may have been rebuilt
//! in between by another concurrent caller.

use std::collections::HashSet;
use std::net::IpAddr;

#[derive(Debug, Clone, Default)]
pub struct Handle {
    pub address: Option<(IpAddr, u16)>,
    pub retry_count: u32,
    pub hash_value: Option<String>,
    /// Addresses already returned during this logical request's retries,
    /// keyed by `(host_key, address_index)` — skipped on the next pick
    /// when another candidate exists.
    pub(super) tried: HashSet<(String, u16, usize)>,
    /// The most recent `(host_key, address_index)` this handle was given —
    /// used by `LeastConnectionsBalancer::release` to decrement the right
    /// counter without re-deriving it from an `(ip, port)` pair.
    pub(super) last_selection: Option<(String, u16, usize)>,
}

impl Handle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hash_value(hash_value: impl Into<String>) -> Self {
        Self {
            hash_value: Some(hash_value.into()),
            ..Self::default()
        }
    }

    pub(super) fn mark_tried(&mut self, host_key: &(String, u16), address_index: usize) {
        self.tried
            .insert((host_key.0.clone(), host_key.1, address_index));
        self.last_selection = Some((host_key.0.clone(), host_key.1, address_index));
    }

    pub(super) fn was_tried(&self, host_key: &(String, u16), address_index: usize) -> bool {
        self.tried
            .contains(&(host_key.0.clone(), host_key.1, address_index))
    }
}
