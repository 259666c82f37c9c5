use super::RecordType;
use std::net::{Ipv4Addr, Ipv6Addr};

/// The type-specific payload of one resource record.
///
/// Records of a type other than the one requested (CNAME glue riding along
/// with an A/SRV answer) are split out and cached under their own key by
/// the resolver before the remaining set is returned — see §4.3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsRecordData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Cname(String),
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    },
}

impl DnsRecordData {
    pub fn record_type(&self) -> RecordType {
        match self {
            DnsRecordData::A(_) => RecordType::A,
            DnsRecordData::Aaaa(_) => RecordType::Aaaa,
            DnsRecordData::Cname(_) => RecordType::Cname,
            DnsRecordData::Srv { .. } => RecordType::Srv,
        }
    }
}

/// One answer record: a name, its per-record TTL, and its typed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub name: String,
    pub ttl: u32,
    pub data: DnsRecordData,
}

impl ResourceRecord {
    pub fn new(name: impl Into<String>, ttl: u32, data: DnsRecordData) -> Self {
        Self {
            name: name.into(),
            ttl,
            data,
        }
    }

    pub fn record_type(&self) -> RecordType {
        self.data.record_type()
    }
}
