//! Parser for the resolv.conf contract (§6): `nameserver`/`domain`/`search`/
//! `sortlist`/`options` directives plus `LOCALDOMAIN`/`RES_OPTIONS`
//! environment overrides.

use std::collections::HashSet;

const BOOLEAN_OPTIONS: &[&str] = &[
    "debug",
    "rotate",
    "no-check-names",
    "inet6",
    "ip6-bytestring",
    "ip6-dotint",
    "no-ip6-dotint",
    "edns0",
    "single-request",
    "single-request-reopen",
    "no-tld-query",
    "use-vc",
];

const NUMERIC_OPTIONS: &[&str] = &["ndots", "timeout", "attempts"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvConf {
    pub nameservers: Vec<String>,
    pub domain: Option<String>,
    pub search: Vec<String>,
    pub sortlist: Vec<String>,
    pub boolean_options: HashSet<String>,
    pub numeric_options: Vec<(String, u32)>,
}

impl ResolvConf {
    pub fn parse(text: &str) -> Self {
        let mut conf = ResolvConf::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let Some(directive) = parts.next() else {
                continue;
            };
            let rest: Vec<&str> = parts.collect();

            match directive {
                "nameserver" => {
                    if let Some(ns) = rest.first() {
                        conf.nameservers.push((*ns).to_string());
                    }
                }
                "domain" => {
                    conf.domain = rest.first().map(|s| s.to_string());
                    conf.search.clear();
                }
                "search" => {
                    conf.search = rest.iter().map(|s| s.to_string()).collect();
                    conf.domain = None;
                }
                "sortlist" => {
                    conf.sortlist = rest.iter().map(|s| s.to_string()).collect();
                }
                "options" => {
                    for opt in rest {
                        conf.apply_option(opt);
                    }
                }
                _ => {}
            }
        }
        conf
    }

    fn apply_option(&mut self, opt: &str) {
        if let Some((name, value)) = opt.split_once(':') {
            if NUMERIC_OPTIONS.contains(&name) {
                if let Ok(n) = value.parse::<u32>() {
                    self.numeric_options.retain(|(existing, _)| existing != name);
                    self.numeric_options.push((name.to_string(), n));
                }
            }
            return;
        }

        if BOOLEAN_OPTIONS.contains(&opt) {
            match opt {
                "ip6-dotint" => {
                    self.boolean_options.remove("no-ip6-dotint");
                }
                "no-ip6-dotint" => {
                    self.boolean_options.remove("ip6-dotint");
                }
                _ => {}
            }
            self.boolean_options.insert(opt.to_string());
        }
    }

    /// Applies `LOCALDOMAIN` (as a `search` list) and `RES_OPTIONS` (as an
    /// `options` line) on top of an already-parsed file, matching the
    /// resolver library's environment-override precedence.
    pub fn apply_env_overrides(mut self, localdomain: Option<&str>, res_options: Option<&str>) -> Self {
        if let Some(localdomain) = localdomain {
            self.search = localdomain.split_whitespace().map(|s| s.to_string()).collect();
            self.domain = None;
        }
        if let Some(res_options) = res_options {
            for opt in res_options.split_whitespace() {
                self.apply_option(opt);
            }
        }
        self
    }

    pub fn numeric_option(&self, name: &str) -> Option<u32> {
        self.numeric_options
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn has_option(&self, name: &str) -> bool {
        self.boolean_options.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nameservers_and_domain() {
        let conf = ResolvConf::parse("nameserver 8.8.8.8\nnameserver 1.1.1.1\ndomain example.com\n");
        assert_eq!(conf.nameservers, vec!["8.8.8.8", "1.1.1.1"]);
        assert_eq!(conf.domain.as_deref(), Some("example.com"));
        assert!(conf.search.is_empty());
    }

    #[test]
    fn domain_and_search_are_mutually_exclusive_last_wins() {
        let conf = ResolvConf::parse("domain a.com\nsearch b.com c.com\n");
        assert_eq!(conf.domain, None);
        assert_eq!(conf.search, vec!["b.com", "c.com"]);
    }

    #[test]
    fn parses_numeric_and_boolean_options() {
        let conf = ResolvConf::parse("options ndots:2 timeout:3 rotate edns0\n");
        assert_eq!(conf.numeric_option("ndots"), Some(2));
        assert_eq!(conf.numeric_option("timeout"), Some(3));
        assert!(conf.has_option("rotate"));
        assert!(conf.has_option("edns0"));
    }

    #[test]
    fn ip6_dotint_options_are_mutually_exclusive() {
        let conf = ResolvConf::parse("options ip6-dotint no-ip6-dotint\n");
        assert!(conf.has_option("no-ip6-dotint"));
        assert!(!conf.has_option("ip6-dotint"));
    }

    #[test]
    fn env_overrides_apply_on_top() {
        let conf = ResolvConf::parse("domain example.com\n")
            .apply_env_overrides(Some("override.com"), Some("ndots:5"));
        assert_eq!(conf.domain, None);
        assert_eq!(conf.search, vec!["override.com"]);
        assert_eq!(conf.numeric_option("ndots"), Some(5));
    }
}
