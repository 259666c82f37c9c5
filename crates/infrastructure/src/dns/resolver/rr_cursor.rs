//! Peer selection over a resolved record set (§4.3.1).
//!
//! Two pickers: a plain round-robin cursor for A/AAAA answers, and a
//! GCD-reduced weighted pool/served picker for SRV answers within one
//! priority band. Grounded on `load_balancer/balanced.rs`'s
//! `BalancedStrategy { counter: AtomicUsize }` for the plain cursor shape,
//! generalizing the teacher's upstream-*server* pool selection in
//! `load_balancer/pool.rs` to SRV *target* selection.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Plain RR cursor over A/AAAA record sets: `counter mod len`, advanced on
/// every pick.
#[derive(Debug, Default)]
pub struct RrCursor {
    counter: AtomicUsize,
}

impl RrCursor {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }

    /// Returns the next index in `[0, len)`. Panics if `len == 0` — callers
    /// must not invoke this on an empty record set.
    pub fn pick(&self, len: usize) -> usize {
        assert!(len > 0, "rr_cursor: cannot pick from an empty set");
        self.counter.fetch_add(1, Ordering::Relaxed) % len
    }
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Weighted round-robin over one SRV priority band (§4.3.1).
///
/// The very first pick ever made through this instance trusts DNS ordering
/// and returns entry 0 directly; every later pick — including later ones in
/// the very first cycle — draws from a GCD-reduced multiset via a
/// pool/served swap so that, over any window of `sum(reduced weights)`
/// consecutive picks (after the first), each entry is chosen exactly its
/// reduced-weight number of times.
pub struct SrvWeightedPool {
    full_multiset: Vec<usize>,
    state: Mutex<PoolState>,
}

struct PoolState {
    first_pick_done: bool,
    pool: Vec<usize>,
    boundary: usize,
}

impl SrvWeightedPool {
    /// `weights` must be non-empty and entry 0 must be the first in DNS
    /// answer order.
    pub fn new(weights: &[u16]) -> Self {
        assert!(!weights.is_empty(), "SrvWeightedPool: empty weight set");

        let divisor = weights
            .iter()
            .filter(|&&w| w > 0)
            .fold(0u32, |acc, &w| gcd(acc, w as u32))
            .max(1);

        let reduced: Vec<usize> = weights
            .iter()
            .map(|&w| ((w as u32 / divisor).max(1)) as usize)
            .collect();

        let full_multiset: Vec<usize> = reduced
            .iter()
            .enumerate()
            .flat_map(|(idx, &count)| std::iter::repeat(idx).take(count))
            .collect();

        // Seed the lazy pool as the full multiset minus one occurrence of
        // entry 0 — the unit the special first pick already accounts for.
        let mut initial_pool = full_multiset.clone();
        if let Some(pos) = initial_pool.iter().position(|&idx| idx == 0) {
            initial_pool.remove(pos);
        }
        let boundary = initial_pool.len();

        Self {
            full_multiset,
            state: Mutex::new(PoolState {
                first_pick_done: false,
                pool: initial_pool,
                boundary,
            }),
        }
    }

    /// Returns the index into the original `weights`/entry slice to serve.
    pub fn pick(&self) -> usize {
        let mut state = self.state.lock().unwrap();

        if !state.first_pick_done {
            state.first_pick_done = true;
            return 0;
        }

        if state.boundary == 0 {
            state.pool = self.full_multiset.clone();
            state.boundary = state.pool.len();
        }

        let i = fastrand::usize(0..state.boundary);
        let chosen = state.pool[i];
        let last = state.boundary - 1;
        state.pool.swap(i, last);
        state.boundary = last;
        chosen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn plain_cursor_advances_in_order() {
        let cursor = RrCursor::new();
        let picks: Vec<usize> = (0..4).map(|_| cursor.pick(3)).collect();
        assert_eq!(picks, vec![0, 1, 2, 0]);
    }

    #[test]
    fn weighted_pool_matches_proportions_over_thirty_picks() {
        let pool = SrvWeightedPool::new(&[20, 5, 5]);
        let mut counts: HashMap<usize, u32> = HashMap::new();
        for _ in 0..30 {
            *counts.entry(pool.pick()).or_default() += 1;
        }
        assert_eq!(counts.get(&0).copied().unwrap_or(0), 20);
        assert_eq!(counts.get(&1).copied().unwrap_or(0), 5);
        assert_eq!(counts.get(&2).copied().unwrap_or(0), 5);
    }

    #[test]
    fn first_pick_trusts_dns_order() {
        let pool = SrvWeightedPool::new(&[1, 1000]);
        assert_eq!(pool.pick(), 0);
    }

    #[test]
    fn single_entry_always_returns_itself() {
        let pool = SrvWeightedPool::new(&[10]);
        for _ in 0..5 {
            assert_eq!(pool.pick(), 0);
        }
    }
}
