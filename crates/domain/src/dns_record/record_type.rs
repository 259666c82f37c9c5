use std::fmt;
use std::str::FromStr;

/// The record types this resolver ever caches or queries for.
///
/// Numeric codes match the underlying DNS resolver library (A=1, AAAA=28,
/// CNAME=5, SRV=33) — see §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordType {
    A,
    Aaaa,
    Cname,
    Srv,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Srv => "SRV",
        }
    }

    pub fn to_u16(self) -> u16 {
        match self {
            RecordType::A => 1,
            RecordType::Cname => 5,
            RecordType::Aaaa => 28,
            RecordType::Srv => 33,
        }
    }

    pub fn from_u16(code: u16) -> Option<Self> {
        Some(match code {
            1 => RecordType::A,
            5 => RecordType::Cname,
            28 => RecordType::Aaaa,
            33 => RecordType::Srv,
            _ => return None,
        })
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "A" => RecordType::A,
            "AAAA" => RecordType::Aaaa,
            "CNAME" => RecordType::Cname,
            "SRV" => RecordType::Srv,
            _ => return Err(()),
        })
    }
}

/// One slot in a resolver try-order list (§4.3). `Last` is a placeholder
/// substituted at resolve time with the name's `lastSuccessType`, if any —
/// it is never itself a cached record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSlot {
    Last,
    Type(RecordType),
}

/// The resolver's default try-order: last-known type first, then SRV, A,
/// AAAA, CNAME.
pub const DEFAULT_ORDER: [OrderSlot; 5] = [
    OrderSlot::Last,
    OrderSlot::Type(RecordType::Srv),
    OrderSlot::Type(RecordType::A),
    OrderSlot::Type(RecordType::Aaaa),
    OrderSlot::Type(RecordType::Cname),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_codes_match_wire_format() {
        assert_eq!(RecordType::A.to_u16(), 1);
        assert_eq!(RecordType::Cname.to_u16(), 5);
        assert_eq!(RecordType::Aaaa.to_u16(), 28);
        assert_eq!(RecordType::Srv.to_u16(), 33);
    }

    #[test]
    fn round_trips_through_u16() {
        for rt in [RecordType::A, RecordType::Aaaa, RecordType::Cname, RecordType::Srv] {
            assert_eq!(RecordType::from_u16(rt.to_u16()), Some(rt));
        }
    }
}
