//! Shared `DnsTransport` fake for the end-to-end tests in this crate.
//! Each test configures its own answer map and, where it cares, counts
//! calls per `(name, type)` pair to assert single-flight and cache
//! behavior from outside the resolver's own crate.

use async_trait::async_trait;
use flowdns_application::ports::DnsTransport;
use flowdns_domain::{DnsQuery, DomainError, RecordType, ResourceRecord};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub struct ScriptedTransport {
    answers: Mutex<HashMap<(String, RecordType), Vec<ResourceRecord>>>,
    calls: Mutex<HashMap<(String, RecordType), AtomicUsize>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            answers: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn set(&self, name: &str, record_type: RecordType, records: Vec<ResourceRecord>) {
        self.answers
            .lock()
            .unwrap()
            .insert((name.to_string(), record_type), records);
    }

    pub fn call_count(&self, name: &str, record_type: RecordType) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&(name.to_string(), record_type))
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .values()
            .map(|c| c.load(Ordering::SeqCst))
            .sum()
    }
}

#[async_trait]
impl DnsTransport for ScriptedTransport {
    async fn query(&self, query: &DnsQuery) -> Result<Vec<ResourceRecord>, DomainError> {
        let key = (query.domain.clone(), query.record_type);
        self.calls
            .lock()
            .unwrap()
            .entry(key.clone())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::SeqCst);

        let answers = self.answers.lock().unwrap();
        match answers.get(&key) {
            Some(records) => Ok(records.clone()),
            None => Err(DomainError::DnsEmpty(query.domain.clone())),
        }
    }
}
