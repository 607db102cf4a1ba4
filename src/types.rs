//! Type definitions for the bonjour-records library

use crate::error::{BonjourError, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, net::Ipv4Addr, str::FromStr};

/// Suffixes that already make a host name resolvable on the local link
const LOCAL_SUFFIXES: [&str; 2] = [".local", ".lan"];

/// Kind of record a configuration entry asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    /// Alias of another canonical name
    Cname,
    /// IPv4 address record
    A,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cname => write!(f, "CNAME"),
            Self::A => write!(f, "A"),
        }
    }
}

/// One requested registration, resolved from a configuration entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSpec {
    /// Owner name of the record
    pub name: String,
    /// Record type
    pub kind: RecordKind,
    /// Canonical name for CNAME records, dotted IPv4 address for A records
    pub target: String,
    /// Claim the name exclusively instead of sharing it
    pub unique: bool,
}

impl RecordSpec {
    /// CNAME record spec
    pub fn cname<N: Into<String>, T: Into<String>>(name: N, target: T, unique: bool) -> Self {
        Self {
            name: name.into(),
            kind: RecordKind::Cname,
            target: target.into(),
            unique,
        }
    }

    /// A record spec
    pub fn a<N: Into<String>>(name: N, addr: Ipv4Addr, unique: bool) -> Self {
        Self {
            name: name.into(),
            kind: RecordKind::A,
            target: addr.to_string(),
            unique,
        }
    }

    /// Resolve one configuration entry.
    ///
    /// An entry containing `=` is a comma separated `key=value` list with the
    /// keys `name`, `cname`, `ip` (or `a`) and `unique`. Anything else is a
    /// bare name that gets a shared CNAME pointing at `self_name`.
    pub fn parse(entry: &str, self_name: &str) -> Result<Self> {
        if !entry.contains('=') {
            return Ok(Self::cname(entry, self_name, false));
        }

        let mut name = None;
        let mut cname = None;
        let mut ip = None;
        let mut unique = None;

        for (key, value) in parse_kvlist(entry)? {
            match key.as_str() {
                "name" => name = Some(value),
                "cname" => cname = Some(value),
                "ip" | "a" => ip = Some(value),
                "unique" => unique = Some(value),
                other => {
                    return Err(BonjourError::configuration(format!(
                        "invalid keyval syntax: unknown key `{other}` in `{entry}`"
                    )));
                }
            }
        }

        let name = name.ok_or_else(|| {
            BonjourError::configuration(format!(
                "you need to specify the name key to register a record: `{entry}`"
            ))
        })?;
        // any value, even `0` or empty, claims exclusive ownership
        let unique = unique.is_some();

        if let Some(cname) = cname {
            Ok(Self::cname(name, cname, unique))
        } else if let Some(ip) = ip {
            Ok(Self::a(name, parse_ipv4(&ip)?, unique))
        } else {
            Ok(Self::cname(name, self_name, unique))
        }
    }
}

impl fmt::Display for RecordSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.kind, self.target)?;
        if self.unique {
            write!(f, " (unique)")?;
        }
        Ok(())
    }
}

/// Name this host advertises itself under.
///
/// Host names already ending in `.local` or `.lan` are kept as they are,
/// anything else gets `.local` appended.
pub fn default_target(hostname: &str) -> String {
    if LOCAL_SUFFIXES.iter().any(|suffix| hostname.ends_with(suffix)) {
        hostname.to_string()
    } else {
        format!("{hostname}.local")
    }
}

/// Strict dotted-quad IPv4 parsing
pub fn parse_ipv4(addr: &str) -> Result<Ipv4Addr> {
    Ipv4Addr::from_str(addr.trim()).map_err(|e| {
        BonjourError::configuration(format!("invalid IPv4 address `{addr}`: {e}"))
    })
}

/// Split `k1=v1,k2=v2` into pairs.
///
/// `\` escapes the following character, so `\,` and `\=` can appear inside
/// values. Repeated keys are all returned; callers keep the last one.
fn parse_kvlist(entry: &str) -> Result<Vec<(String, String)>> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut key: Option<String> = None;
    let mut chars = entry.chars();

    let mut finish = |key: Option<String>, value: String| -> Result<()> {
        match key {
            Some(key) if !key.is_empty() => {
                items.push((key, value));
                Ok(())
            }
            _ => Err(BonjourError::configuration(format!(
                "invalid keyval syntax: `{entry}`"
            ))),
        }
    };

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            '=' if key.is_none() => key = Some(std::mem::take(&mut current)),
            ',' => finish(key.take(), std::mem::take(&mut current))?,
            _ => current.push(c),
        }
    }
    finish(key, current)?;

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SELF: &str = "web01.local";

    #[test]
    fn test_default_target() {
        assert_eq!(default_target("foo"), "foo.local");
        assert_eq!(default_target("bar.local"), "bar.local");
        assert_eq!(default_target("bar.lan"), "bar.lan");
        assert_eq!(default_target("example.com"), "example.com.local");
    }

    #[test]
    fn test_bare_entry() {
        let spec = RecordSpec::parse("myhost", SELF).unwrap();
        assert_eq!(spec, RecordSpec::cname("myhost", SELF, false));
    }

    #[test]
    fn test_explicit_cname() {
        let spec = RecordSpec::parse("name=svc,cname=alias.local", SELF).unwrap();
        assert_eq!(spec, RecordSpec::cname("svc", "alias.local", false));
    }

    #[test]
    fn test_a_record_unique() {
        let spec = RecordSpec::parse("name=svc,ip=192.168.1.5,unique=1", SELF).unwrap();
        assert_eq!(spec.kind, RecordKind::A);
        assert_eq!(spec.target, "192.168.1.5");
        assert!(spec.unique);

        let alias = RecordSpec::parse("name=svc,a=10.0.0.1", SELF).unwrap();
        assert_eq!(alias, RecordSpec::a("svc", Ipv4Addr::new(10, 0, 0, 1), false));
    }

    #[test]
    fn test_name_only_points_at_self() {
        let spec = RecordSpec::parse("name=svc", SELF).unwrap();
        assert_eq!(spec, RecordSpec::cname("svc", SELF, false));
    }

    #[test]
    fn test_cname_wins_over_ip() {
        let spec = RecordSpec::parse("name=svc,ip=10.0.0.1,cname=x.local", SELF).unwrap();
        assert_eq!(spec.kind, RecordKind::Cname);
        assert_eq!(spec.target, "x.local");
    }

    #[test]
    fn test_missing_name_is_rejected() {
        let err = RecordSpec::parse("cname=alias.local", SELF).unwrap_err();
        assert!(matches!(err, BonjourError::Configuration(_)));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(RecordSpec::parse("name=svc,port=80", SELF).is_err());
    }

    #[test]
    fn test_malformed_kvlist_is_rejected() {
        assert!(RecordSpec::parse("name=svc,unique", SELF).is_err());
        assert!(RecordSpec::parse("=svc", SELF).is_err());
        assert!(RecordSpec::parse("name=svc,", SELF).is_err());
    }

    #[test]
    fn test_malformed_ipv4_is_rejected() {
        assert!(RecordSpec::parse("name=svc,ip=300.1.1.1", SELF).is_err());
        assert!(RecordSpec::parse("name=svc,ip=not-an-ip", SELF).is_err());
    }

    #[test]
    fn test_unique_key_presence_is_exclusive() {
        for value in ["1", "yes", "0", "false", ""] {
            let spec = RecordSpec::parse(&format!("name=svc,unique={value}"), SELF).unwrap();
            assert!(spec.unique, "unique={value}");
        }
        assert!(!RecordSpec::parse("name=svc,ip=10.0.0.1", SELF).unwrap().unique);
    }

    #[test]
    fn test_escaped_separators() {
        let items = parse_kvlist(r"name=a\,b,cname=c\=d").unwrap();
        assert_eq!(
            items,
            vec![
                ("name".to_string(), "a,b".to_string()),
                ("cname".to_string(), "c=d".to_string()),
            ]
        );
    }

    #[test]
    fn test_last_repeated_key_wins() {
        let spec = RecordSpec::parse("name=one,name=two", SELF).unwrap();
        assert_eq!(spec.name, "two");
    }

    #[test]
    fn test_display() {
        let spec = RecordSpec::a("svc", Ipv4Addr::new(192, 168, 1, 5), true);
        assert_eq!(spec.to_string(), "svc A 192.168.1.5 (unique)");
        assert_eq!(RecordKind::Cname.to_string(), "CNAME");
    }
}
