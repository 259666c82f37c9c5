//! Parser for the hosts-file contract (§6): `IP HOST [HOST ...]` lines,
//! `#`/`;` comments, first-occurrence-wins per address family.

use crate::errors::DomainError;
use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostAddresses {
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Family {
    V4,
    V6,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostsEntry {
    pub ip: String,
    pub family: Family,
    pub canonical: String,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct HostsFile {
    pub by_name: HashMap<String, HostAddresses>,
    pub entries: Vec<HostsEntry>,
}

impl HostsFile {
    pub fn parse(text: &str) -> Result<Self, DomainError> {
        let mut file = HostsFile::default();

        for raw_line in text.lines() {
            let line = strip_comment(raw_line).trim();
            if line.is_empty() {
                continue;
            }

            let mut parts = line.split_whitespace();
            let ip_str = parts
                .next()
                .ok_or_else(|| DomainError::InvalidHostsLine(raw_line.to_string()))?;
            let names: Vec<&str> = parts.collect();
            if names.is_empty() {
                return Err(DomainError::InvalidHostsLine(raw_line.to_string()));
            }

            let family = if let Ok(v4) = Ipv4Addr::from_str(ip_str) {
                for name in &names {
                    let key = name.to_ascii_lowercase();
                    let entry = file.by_name.entry(key).or_default();
                    if entry.ipv4.is_none() {
                        entry.ipv4 = Some(v4);
                    }
                }
                Family::V4
            } else if let Ok(v6) = Ipv6Addr::from_str(ip_str) {
                for name in &names {
                    let key = name.to_ascii_lowercase();
                    let entry = file.by_name.entry(key).or_default();
                    if entry.ipv6.is_none() {
                        entry.ipv6 = Some(v6);
                    }
                }
                Family::V6
            } else {
                return Err(DomainError::InvalidHostsLine(raw_line.to_string()));
            };

            file.entries.push(HostsEntry {
                ip: ip_str.to_string(),
                family,
                canonical: names[0].to_ascii_lowercase(),
                aliases: names[1..].iter().map(|s| s.to_ascii_lowercase()).collect(),
            });
        }

        Ok(file)
    }

    pub fn lookup(&self, name: &str) -> Option<&HostAddresses> {
        self.by_name.get(&name.to_ascii_lowercase())
    }
}

fn strip_comment(line: &str) -> &str {
    let cut = line
        .find(['#', ';'])
        .unwrap_or(line.len());
    &line[..cut]
}
