//! Configuration types for record registration

use crate::{
    error::{BonjourError, Result},
    types::{default_target, RecordSpec},
};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use tracing::debug;

/// Configuration of the records a process registers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BonjourConfig {
    /// Record entries, each a bare name or a `key=value` list
    #[serde(
        rename = "bonjour-register",
        alias = "bonjour-register-record",
        alias = "bonjour-rr"
    )]
    records: Vec<String>,
    /// Host name to derive the default CNAME target from; the system host
    /// name when unset
    hostname: Option<String>,
    /// Settings of the built-in responder
    responder: ResponderConfig,
}

impl BonjourConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record entry
    pub fn with_record<S: Into<String>>(mut self, entry: S) -> Self {
        self.records.push(entry.into());
        self
    }

    /// Add several record entries
    pub fn with_records<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.records.extend(entries.into_iter().map(Into::into));
        self
    }

    /// Override the host name
    pub fn with_hostname<S: Into<String>>(mut self, hostname: S) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Set responder settings
    pub fn with_responder(mut self, responder: ResponderConfig) -> Self {
        self.responder = responder;
        self
    }

    /// Get record entries
    pub fn records(&self) -> &[String] {
        &self.records
    }

    /// Get the host name override
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// Get responder settings
    pub fn responder(&self) -> &ResponderConfig {
        &self.responder
    }

    /// Whether there is anything to register
    pub fn has_records(&self) -> bool {
        !self.records.is_empty()
    }

    /// Host name the default CNAME target is derived from
    pub fn resolve_hostname(&self) -> Result<String> {
        if let Some(hostname) = &self.hostname {
            return Ok(hostname.clone());
        }
        let hostname = hostname::get()?;
        hostname.into_string().map_err(|raw| {
            BonjourError::configuration(format!("host name {raw:?} is not valid UTF-8"))
        })
    }

    /// Name bare entries point at: the host name under `.local`
    pub fn self_name(&self) -> Result<String> {
        self.resolve_hostname().map(|hostname| default_target(&hostname))
    }

    /// Resolve every entry against `self_name`, in configuration order
    pub fn record_specs(&self, self_name: &str) -> Result<Vec<RecordSpec>> {
        let specs = self
            .records
            .iter()
            .map(|entry| RecordSpec::parse(entry, self_name))
            .collect::<Result<Vec<_>>>()?;
        debug!("Resolved {} record entries against {}", specs.len(), self_name);
        Ok(specs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.records.iter().any(|entry| entry.trim().is_empty()) {
            return Err(BonjourError::configuration("record entries cannot be empty"));
        }

        if self.hostname.as_deref().is_some_and(|h| h.trim().is_empty()) {
            return Err(BonjourError::configuration("hostname cannot be empty"));
        }

        self.responder.validate()
    }
}

/// Settings of the built-in multicast responder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    /// Interface address to join the mDNS group on; unspecified means the
    /// system default
    pub interface: Ipv4Addr,
    /// UDP port to bind
    pub port: u16,
    /// Deliver our own multicast packets back to this host
    pub multicast_loop: bool,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            interface: Ipv4Addr::UNSPECIFIED,
            port: 5353,
            multicast_loop: true,
        }
    }
}

impl ResponderConfig {
    /// Create a new responder configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the interface address
    pub fn interface(mut self, interface: Ipv4Addr) -> Self {
        self.interface = interface;
        self
    }

    /// Set the UDP port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Enable or disable multicast loopback
    pub fn multicast_loop(mut self, enable: bool) -> Self {
        self.multicast_loop = enable;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(BonjourError::configuration("responder port cannot be zero"));
        }

        if self.interface.is_multicast() || self.interface.is_broadcast() {
            return Err(BonjourError::configuration(format!(
                "{} is not a valid interface address",
                self.interface
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordKind;

    #[test]
    fn test_config_defaults() {
        let config = BonjourConfig::new();
        assert!(!config.has_records());
        assert!(config.hostname().is_none());
        assert_eq!(config.responder().port, 5353);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() -> Result<()> {
        let config = BonjourConfig::new()
            .with_hostname("web01")
            .with_record("myhost")
            .with_records(["name=svc,ip=10.0.0.5"]);

        assert_eq!(config.records().len(), 2);
        assert_eq!(config.self_name()?, "web01.local");

        let specs = config.record_specs(&config.self_name()?)?;
        assert_eq!(specs[0], RecordSpec::cname("myhost", "web01.local", false));
        assert_eq!(specs[1].kind, RecordKind::A);
        Ok(())
    }

    #[test]
    fn test_first_bad_entry_fails_resolution() {
        let config = BonjourConfig::new()
            .with_record("good")
            .with_record("cname=alias.local");
        assert!(config.record_specs("web01.local").is_err());
    }

    #[test]
    fn test_config_validation() {
        assert!(BonjourConfig::new().with_record("  ").validate().is_err());
        assert!(BonjourConfig::new().with_hostname("").validate().is_err());

        let responder = ResponderConfig::new().port(0);
        assert!(BonjourConfig::new().with_responder(responder).validate().is_err());

        let responder = ResponderConfig::new().interface(Ipv4Addr::new(224, 0, 0, 251));
        assert!(responder.validate().is_err());
    }

    #[test]
    fn test_option_aliases() {
        for key in ["bonjour-register", "bonjour-register-record", "bonjour-rr"] {
            let json = format!(r#"{{"{key}": ["myhost", "name=svc,cname=alias.local"]}}"#);
            let config: BonjourConfig = serde_json::from_str(&json).unwrap();
            assert_eq!(config.records().len(), 2, "{key}");
        }
    }

    #[test]
    fn test_deserialize_responder_settings() {
        let config: BonjourConfig = serde_json::from_str(
            r#"{"hostname": "web01.lan", "responder": {"interface": "192.168.1.2", "multicast_loop": false}}"#,
        )
        .unwrap();
        assert_eq!(config.self_name().unwrap(), "web01.lan");
        assert_eq!(config.responder().interface, Ipv4Addr::new(192, 168, 1, 2));
        assert_eq!(config.responder().port, 5353);
        assert!(!config.responder().multicast_loop);
    }

    #[test]
    fn test_system_hostname() {
        let name = BonjourConfig::new().self_name().unwrap();
        assert!(name.ends_with(".local") || name.ends_with(".lan"));
    }
}
