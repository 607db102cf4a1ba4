//! Record registration over a single responder connection

use std::{net::Ipv4Addr, sync::Arc};

use tracing::{error, info};

use crate::{
    encoding::encode_name,
    error::{BonjourError, ResponderError, Result},
    responder::{RecordFlags, RecordId, RecordRequest, RecordType, Responder},
    types::{parse_ipv4, RecordKind, RecordSpec},
};

#[cfg(feature = "multicast")]
use crate::{config::ResponderConfig, responder::multicast::MulticastResponder};

/// A record the responder accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredRecord {
    /// Handle returned by the responder
    pub id: RecordId,
    /// Owner name
    pub name: String,
    /// Record type
    pub kind: RecordKind,
    /// CNAME target or IPv4 address
    pub target: String,
    /// Whether the name was claimed exclusively
    pub unique: bool,
}

/// Registers records through one shared responder connection
pub struct Registrar<R> {
    responder: Arc<R>,
}

#[cfg(feature = "multicast")]
impl Registrar<MulticastResponder> {
    /// Open a connection to the built-in multicast responder
    ///
    /// # Errors
    ///
    /// Returns [`BonjourError::Connection`] if the responder cannot be started
    pub fn open_multicast(config: &ResponderConfig) -> Result<Self> {
        Self::open(|| MulticastResponder::open(config))
    }
}

impl<R: Responder> Registrar<R> {
    /// Open the connection all registrations go through
    ///
    /// # Errors
    ///
    /// Returns [`BonjourError::Connection`] if the responder cannot be reached
    pub fn open<F>(connect: F) -> Result<Self>
    where
        F: FnOnce() -> std::result::Result<R, ResponderError>,
    {
        let responder = connect().map_err(|source| {
            error!("[bonjour] unable to initialize DNS resolution, error code: {}", source.code());
            BonjourError::Connection { source }
        })?;
        Ok(Self::new(Arc::new(responder)))
    }

    /// Wrap an already opened connection
    pub fn new(responder: Arc<R>) -> Self {
        Self { responder }
    }

    /// The shared connection
    pub fn responder(&self) -> &Arc<R> {
        &self.responder
    }

    /// Register `name` as an alias of `cname`
    pub fn register_cname(&self, name: &str, cname: &str, unique: bool) -> Result<RegisteredRecord> {
        let target = encode_name(cname).inspect_err(|e| error!("[bonjour] {}", e))?;
        let request = RecordRequest::new(name, RecordType::Cname, target.to_bytes())
            .with_flags(RecordFlags::from_unique(unique));

        let id = self.submit(request, RecordKind::Cname)?;
        info!("[bonjour] registered record {} CNAME {}", name, cname);
        Ok(RegisteredRecord {
            id,
            name: name.to_string(),
            kind: RecordKind::Cname,
            target: cname.to_string(),
            unique,
        })
    }

    /// Register an A record for `name`
    ///
    /// # Errors
    ///
    /// Malformed addresses are rejected with [`BonjourError::Configuration`]
    /// before anything is submitted.
    pub fn register_a(&self, name: &str, addr: &str, unique: bool) -> Result<RegisteredRecord> {
        let ip = parse_ipv4(addr).inspect_err(|e| error!("[bonjour] {}", e))?;
        self.register_ipv4(name, ip, unique)
    }

    /// Register an A record for an already parsed address
    pub fn register_ipv4(&self, name: &str, ip: Ipv4Addr, unique: bool) -> Result<RegisteredRecord> {
        let rdata = bytes::Bytes::copy_from_slice(&ip.octets());
        let request = RecordRequest::new(name, RecordType::A, rdata)
            .with_flags(RecordFlags::from_unique(unique));

        let id = self.submit(request, RecordKind::A)?;
        info!("[bonjour] registered record {} A {}", name, ip);
        Ok(RegisteredRecord {
            id,
            name: name.to_string(),
            kind: RecordKind::A,
            target: ip.to_string(),
            unique,
        })
    }

    /// Register one resolved entry
    pub fn register(&self, spec: &RecordSpec) -> Result<RegisteredRecord> {
        match spec.kind {
            RecordKind::Cname => self.register_cname(&spec.name, &spec.target, spec.unique),
            RecordKind::A => self.register_a(&spec.name, &spec.target, spec.unique),
        }
    }

    /// Register entries in order, stopping at the first failure
    pub fn register_all(&self, specs: &[RecordSpec]) -> Result<Vec<RegisteredRecord>> {
        specs.iter().map(|spec| self.register(spec)).collect()
    }

    fn submit(&self, request: RecordRequest, kind: RecordKind) -> Result<RecordId> {
        let name = request.fullname.clone();
        self.responder.register_record(request).map_err(|source| {
            error!(
                "[bonjour] unable to register {} for {}, error code: {}",
                kind,
                name,
                source.code()
            );
            BonjourError::registration(name, kind, source)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responder::{MockResponder, RECORD_TTL};

    fn registrar(mock: MockResponder) -> Registrar<MockResponder> {
        Registrar::new(Arc::new(mock))
    }

    #[test]
    fn test_open_failure_is_connection_error() {
        let err = Registrar::<MockResponder>::open(|| Err(ResponderError::ServiceNotRunning))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            BonjourError::Connection { source: ResponderError::ServiceNotRunning }
        ));
    }

    #[test]
    fn test_register_cname_request() {
        let mut mock = MockResponder::new();
        mock.expect_register_record()
            .withf(|req| {
                req.fullname == "svc"
                    && req.rrtype == RecordType::Cname
                    && req.rdata.as_ref() == b"\x05alias\x05local\x00"
                    && req.ttl == RECORD_TTL
                    && req.flags == RecordFlags::Shared
            })
            .times(1)
            .returning(|_| Ok(RecordId(1)));

        let record = registrar(mock).register_cname("svc", "alias.local", false).unwrap();
        assert_eq!(record.id, RecordId(1));
        assert_eq!(record.kind, RecordKind::Cname);
        assert_eq!(record.target, "alias.local");
    }

    #[test]
    fn test_register_a_request() {
        let mut mock = MockResponder::new();
        mock.expect_register_record()
            .withf(|req| {
                req.rrtype == RecordType::A
                    && req.rdata.as_ref() == [192, 168, 1, 5]
                    && req.flags == RecordFlags::Unique
                    && req.ttl == 60
            })
            .times(1)
            .returning(|_| Ok(RecordId(3)));

        let record = registrar(mock).register_a("svc", "192.168.1.5", true).unwrap();
        assert_eq!(record.id, RecordId(3));
        assert!(record.unique);
    }

    #[test]
    fn test_malformed_address_is_not_submitted() {
        let mut mock = MockResponder::new();
        mock.expect_register_record().never();

        let err = registrar(mock).register_a("svc", "192.168.1", false).unwrap_err();
        assert!(matches!(err, BonjourError::Configuration(_)));
    }

    #[test]
    fn test_overlong_label_is_not_submitted() {
        let mut mock = MockResponder::new();
        mock.expect_register_record().never();

        let target = format!("{}.local", "x".repeat(300));
        let err = registrar(mock).register_cname("svc", &target, false).unwrap_err();
        assert!(matches!(err, BonjourError::Encoding { .. }));
    }

    #[test]
    fn test_rejection_becomes_registration_error() {
        let mut mock = MockResponder::new();
        mock.expect_register_record()
            .returning(|_| Err(ResponderError::NameConflict));

        let err = registrar(mock).register_cname("svc", "alias.local", true).unwrap_err();
        match err {
            BonjourError::Registration { name, kind, source } => {
                assert_eq!(name, "svc");
                assert_eq!(kind, RecordKind::Cname);
                assert_eq!(source, ResponderError::NameConflict);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_register_all_stops_at_first_failure() {
        let mut mock = MockResponder::new();
        let mut seq = mockall::Sequence::new();
        mock.expect_register_record()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(RecordId(1)));
        mock.expect_register_record()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(ResponderError::BadParam));

        let specs = vec![
            RecordSpec::cname("one", "web01.local", false),
            RecordSpec::cname("two", "web01.local", false),
            RecordSpec::cname("three", "web01.local", false),
        ];
        assert!(registrar(mock).register_all(&specs).is_err());
    }
}
