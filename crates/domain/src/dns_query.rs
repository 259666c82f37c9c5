use super::RecordType;

/// A query for one name, optionally pinned to a single record type.
#[derive(Debug, Clone)]
pub struct DnsQuery {
    pub domain: String,
    pub record_type: RecordType,
}

impl DnsQuery {
    pub fn new(domain: String, record_type: RecordType) -> Self {
        Self {
            domain,
            record_type,
        }
    }
}

/// Options accepted by `Resolver::resolve` (§6 Resolver API).
///
/// `qtype` unset means "run the type-order try-list"; set, it pins the
/// resolver to a single type and skips CNAME chasing unless that type is
/// itself `Cname`.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub qtype: Option<RecordType>,
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_qtype(qtype: RecordType) -> Self {
        Self { qtype: Some(qtype) }
    }
}
