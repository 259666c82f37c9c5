//! End-to-end scenarios (§8) exercised across the domain/application/
//! infrastructure crate boundary, the way an embedding reverse proxy would
//! use this library: build a `Resolver` or `Balancer` from a fake
//! `DnsTransport` and drive it through its public API only.

mod common;

use common::ScriptedTransport;
use flowdns_domain::config::Nameserver;
use flowdns_domain::{DnsRecordData, RecordType, ResolverConfig, ResourceRecord};
use flowdns_infrastructure::dns::balancer::{
    Balancer, ConsistentHashBalancer, Handle, HostSpec, RoundRobinBalancer,
};
use flowdns_infrastructure::dns::resolver::Resolver;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

fn a_record(name: &str, ttl: u32, ip: [u8; 4]) -> ResourceRecord {
    ResourceRecord::new(name, ttl, DnsRecordData::A(Ipv4Addr::from(ip)))
}

fn resolver(transport: Arc<ScriptedTransport>) -> Arc<Resolver> {
    let config = ResolverConfig::new().with_nameservers(vec![Nameserver::new("127.0.0.1", 53)]);
    Arc::new(Resolver::new(config, transport))
}

/// S5: 100 concurrent `resolve("hot")` calls on a cold cache must trigger
/// exactly one underlying transport query and every caller must observe
/// the same resulting address.
#[tokio::test]
async fn dog_pile_suppression_across_concurrent_resolves() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.set(
        "hot.example.com",
        RecordType::A,
        vec![a_record("hot.example.com", 60, [9, 9, 9, 9])],
    );
    let resolver = resolver(transport.clone());

    let mut handles = Vec::new();
    for _ in 0..100 {
        let resolver = Arc::clone(&resolver);
        handles.push(tokio::spawn(async move {
            resolver.toip("hot.example.com", None, false).await
        }));
    }

    let mut seen = HashSet::new();
    for h in handles {
        let (ip, _) = h.await.unwrap().unwrap();
        seen.insert(ip);
    }

    assert_eq!(seen, HashSet::from([IpAddr::V4(Ipv4Addr::new(9, 9, 9, 9))]));
    assert_eq!(
        transport.call_count("hot.example.com", RecordType::A),
        1,
        "single-flight must collapse concurrent identical queries into one"
    );
}

/// Once cached, repeated `toip` calls for the same name must not issue
/// further transport queries until the TTL expires.
#[tokio::test]
async fn cached_answer_is_not_requeried_within_ttl() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.set(
        "cached.example.com",
        RecordType::A,
        vec![a_record("cached.example.com", 3600, [5, 5, 5, 5])],
    );
    let resolver = resolver(transport.clone());

    for _ in 0..10 {
        resolver
            .toip("cached.example.com", None, false)
            .await
            .unwrap();
    }

    assert_eq!(transport.call_count("cached.example.com", RecordType::A), 1);
}

/// Negative answers (§4.1) are cached under `bad_ttl` and still answered
/// from cache, dampening repeated failures rather than re-querying every
/// call.
#[tokio::test]
async fn empty_answer_is_negatively_cached() {
    let transport = Arc::new(ScriptedTransport::new());
    // An authoritative empty answer (NODATA/NXDOMAIN) is `Ok(vec![])`, not
    // an error -- see `DnsTransport::query`'s contract.
    transport.set("missing.example.com", RecordType::A, Vec::new());
    let resolver = resolver(transport.clone());

    for _ in 0..5 {
        let result = resolver
            .resolve(
                "missing.example.com",
                flowdns_domain::ResolveOptions::with_qtype(RecordType::A),
                false,
            )
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    assert_eq!(
        transport.call_count("missing.example.com", RecordType::A),
        1,
        "negative answers are cached under bad_ttl, not re-queried every call"
    );
}

/// §8 property 1: balancer weight bookkeeping stays consistent across
/// `addHost`/`removeHost`/`setAddressStatus`.
#[tokio::test]
async fn balancer_weight_invariant_holds_across_operations() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.set(
        "svc-a",
        RecordType::A,
        vec![a_record("svc-a", 60, [10, 0, 0, 1]), a_record("svc-a", 60, [10, 0, 0, 2])],
    );
    transport.set("svc-b", RecordType::A, vec![a_record("svc-b", 60, [10, 0, 1, 1])]);
    let resolver = resolver(transport);

    let balancer = RoundRobinBalancer::new(
        resolver,
        vec![
            HostSpec::new("svc-a").with_port(80).with_weight(10),
            HostSpec::new("svc-b").with_port(80).with_weight(10),
        ],
        "weight-invariant-test",
        None,
    )
    .await
    .unwrap();

    // Two addresses at weight 10 + one address at weight 10 == 30.
    assert_eq!(balancer.weight(), 30);
    assert!(balancer.is_healthy());

    balancer.set_address_status("svc-a", Some(80), 0, false);
    // Disabling availability does not zero weight; only removal/ttl0 does.
    // live_weight only counts available, non-disabled addresses though, so
    // total weight should drop by svc-a's first address.
    assert_eq!(balancer.weight(), 20);

    balancer.remove_host("svc-b", Some(80));
    assert_eq!(balancer.weight(), 10);
    assert!(balancer.is_healthy());

    balancer.set_address_status("svc-a", Some(80), 1, false);
    assert_eq!(balancer.weight(), 0);
    assert!(!balancer.is_healthy());
}

/// §8 S6 / property 4: consistent-hash stability. Adding a host moves at
/// most the newly added host's own slots — a previously routed key either
/// stays on its original address or moves to the new host, never to an
/// unrelated pre-existing one.
#[tokio::test]
async fn consistent_hash_balancer_is_stable_across_membership_changes() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.set("a", RecordType::A, vec![a_record("a", 60, [10, 0, 0, 1])]);
    transport.set("b", RecordType::A, vec![a_record("b", 60, [10, 0, 0, 2])]);
    transport.set("c", RecordType::A, vec![a_record("c", 60, [10, 0, 0, 3])]);
    transport.set("d", RecordType::A, vec![a_record("d", 60, [10, 0, 0, 4])]);
    let resolver = resolver(transport);

    let balancer = ConsistentHashBalancer::new(
        resolver,
        vec![
            HostSpec::new("a").with_port(80).with_weight(10),
            HostSpec::new("b").with_port(80).with_weight(10),
            HostSpec::new("c").with_port(80).with_weight(10),
        ],
        "hash-stability-test",
        Some(1000),
    )
    .await
    .unwrap();

    let (before_ip, _, before_host, _) = balancer
        .get_peer(false, None, Some("user-42"))
        .await
        .unwrap();

    balancer
        .add_host("d", Some(80), Some(10))
        .await
        .unwrap();

    let (after_ip, _, after_host, _) = balancer
        .get_peer(false, None, Some("user-42"))
        .await
        .unwrap();

    assert!(
        after_ip == before_ip || after_host == "d",
        "user-42 either stays on its original address ({before_host}) or moves to the newly added host, \
         never to an unrelated pre-existing one (landed on {after_host})"
    );
}

/// A retried `getPeer` call must not return the address a prior attempt on
/// the same `Handle` already tried, as long as another live candidate
/// exists.
#[tokio::test]
async fn retry_handle_avoids_the_previously_tried_address() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.set(
        "retry-svc",
        RecordType::A,
        vec![
            a_record("retry-svc", 60, [1, 1, 1, 1]),
            a_record("retry-svc", 60, [2, 2, 2, 2]),
        ],
    );
    let resolver = resolver(transport);

    let balancer = RoundRobinBalancer::new(
        resolver,
        vec![HostSpec::new("retry-svc").with_port(80).with_weight(10)],
        "retry-test",
        None,
    )
    .await
    .unwrap();

    let (first_ip, _, _, handle) = balancer.get_peer(false, None, None).await.unwrap();
    let (second_ip, _, _, handle) = balancer
        .get_peer(false, Some(handle), None)
        .await
        .unwrap();

    assert_ne!(first_ip, second_ip);
    assert_eq!(handle.retry_count, 1);
}

/// Handles default-construct cleanly for a caller's first `getPeer` call.
#[test]
fn fresh_handle_has_no_retries() {
    let handle = Handle::new();
    assert_eq!(handle.retry_count, 0);
    assert!(handle.address.is_none());
}
