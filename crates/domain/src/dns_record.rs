pub mod record;
pub mod record_type;

pub use record::{DnsRecordData, ResourceRecord};
pub use record_type::{OrderSlot, RecordType, DEFAULT_ORDER};
