//! Literal address short-circuit (§4.3), performed before any network I/O.
//!
//! Grounded on the teacher's idea of a pre-network short-circuit (the
//! teacher kept one in `dns/fast_path.rs` for its own server-side handling
//! of literal PTR lookups) and on std's `Ipv4Addr`/`Ipv6Addr` `FromStr` for
//! validation — the IPv6 rule ("eight colon-separated groups of 1-4 hex
//! digits after `::` expansion") is exactly what std's parser implements.

use flowdns_domain::{DnsRecordData, DomainError, RecordType, ResourceRecord};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// TTL assigned to a synthesized literal-address record: ten years.
pub const LITERAL_TTL_SECS: u32 = 315_360_000;

/// The record type a literal-shaped `name` would short-circuit to, if any —
/// used by the resolver to route straight to `_lookup(name, that type)`
/// instead of running the full type-order loop for an address literal.
pub fn literal_record_type(name: &str) -> Option<RecordType> {
    if name.contains(':') {
        Some(RecordType::Aaaa)
    } else if looks_like_ipv4(name) {
        Some(RecordType::A)
    } else {
        None
    }
}

fn looks_like_ipv4(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.len() <= 3 && p.bytes().all(|b| b.is_ascii_digit()))
}

/// Returns `Some` when `name`/`qtype` match one of the two literal-address
/// shapes in §4.3, short-circuiting the resolver before cache/DNS are
/// consulted. Returns `None` when the literal path doesn't apply and normal
/// resolution should proceed.
pub fn try_literal(name: &str, qtype: RecordType) -> Option<Result<Vec<ResourceRecord>, DomainError>> {
    if qtype == RecordType::Aaaa && name.contains(':') {
        return Some(match Ipv6Addr::from_str(name) {
            Ok(ip) => Ok(vec![ResourceRecord::new(
                name,
                LITERAL_TTL_SECS,
                DnsRecordData::Aaaa(ip),
            )]),
            Err(_) => Err(name_error(name)),
        });
    }

    if qtype == RecordType::A && looks_like_ipv4(name) {
        return Some(match Ipv4Addr::from_str(name) {
            Ok(ip) => Ok(vec![ResourceRecord::new(
                name,
                LITERAL_TTL_SECS,
                DnsRecordData::A(ip),
            )]),
            Err(_) => Err(name_error(name)),
        });
    }

    None
}

fn name_error(name: &str) -> DomainError {
    DomainError::DnsServerError {
        rcode: 3,
        message: format!("name error: invalid literal address {name}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_ipv4_literal_short_circuits() {
        let result = try_literal("1.2.3.4", RecordType::A).unwrap().unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].ttl, LITERAL_TTL_SECS);
        assert_eq!(result[0].data, DnsRecordData::A(Ipv4Addr::new(1, 2, 3, 4)));
    }

    #[test]
    fn invalid_ipv4_literal_yields_name_error() {
        let err = try_literal("999.999.999.999", RecordType::A).unwrap().unwrap_err();
        assert!(matches!(err, DomainError::DnsServerError { rcode: 3, .. }));
    }

    #[test]
    fn valid_ipv6_literal_short_circuits() {
        let result = try_literal("::1", RecordType::Aaaa).unwrap().unwrap();
        assert_eq!(result[0].data, DnsRecordData::Aaaa(Ipv6Addr::LOCALHOST));
    }

    #[test]
    fn invalid_ipv6_literal_yields_name_error() {
        let err = try_literal("not:a:valid:address", RecordType::Aaaa)
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, DomainError::DnsServerError { rcode: 3, .. }));
    }

    #[test]
    fn non_literal_name_does_not_short_circuit() {
        assert!(try_literal("example.com", RecordType::A).is_none());
        assert!(try_literal("example.com", RecordType::Aaaa).is_none());
    }

    #[test]
    fn ipv4_shaped_name_requested_as_aaaa_does_not_short_circuit() {
        assert!(try_literal("1.2.3.4", RecordType::Aaaa).is_none());
    }
}
