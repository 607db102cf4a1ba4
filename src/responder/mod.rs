//! Client API of a multicast-DNS responder
//!
//! The [`Responder`] trait is the fixed set of operations the registrar and the
//! event pump need from a responder connection. The crate ships one
//! implementation, [`multicast::MulticastResponder`], behind the `multicast`
//! feature; hosts with a system daemon can provide their own.

use bytes::Bytes;
use std::fmt;

use crate::{error::ResponderError, types::RecordKind};

#[cfg(feature = "multicast")]
pub mod multicast;

/// Time-to-live advertised for every registered record, in seconds
pub const RECORD_TTL: u32 = 60;

/// Ownership semantics of a record on the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordFlags {
    /// Several hosts may answer for the same name
    Shared,
    /// This host claims the name; others answering it are in conflict
    Unique,
}

impl RecordFlags {
    /// Flags for a `unique` configuration value
    pub fn from_unique(unique: bool) -> Self {
        if unique { Self::Unique } else { Self::Shared }
    }

    /// DNS-SD flag bits (`kDNSServiceFlagsShared` / `kDNSServiceFlagsUnique`)
    pub fn bits(&self) -> u32 {
        match self {
            Self::Shared => 0x10,
            Self::Unique => 0x20,
        }
    }
}

/// Record types this crate registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// IPv4 address
    A,
    /// Canonical name
    Cname,
}

impl RecordType {
    /// Numeric RR type
    pub fn value(&self) -> u16 {
        match self {
            Self::A => 1,
            Self::Cname => 5,
        }
    }
}

impl From<RecordKind> for RecordType {
    fn from(kind: RecordKind) -> Self {
        match kind {
            RecordKind::A => Self::A,
            RecordKind::Cname => Self::Cname,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::Cname => write!(f, "CNAME"),
        }
    }
}

/// Record classes this crate registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordClass {
    /// Internet
    In,
}

impl RecordClass {
    /// Numeric RR class
    pub fn value(&self) -> u16 {
        match self {
            Self::In => 1,
        }
    }
}

/// Handle of a record accepted by a responder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A record registration request, as submitted through the client API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRequest {
    /// Ownership flags
    pub flags: RecordFlags,
    /// Interface to register on; 0 means all interfaces
    pub interface_index: u32,
    /// Owner name
    pub fullname: String,
    /// Record type
    pub rrtype: RecordType,
    /// Record class
    pub rrclass: RecordClass,
    /// Record data in wire format
    pub rdata: Bytes,
    /// Advertised time-to-live in seconds
    pub ttl: u32,
}

impl RecordRequest {
    /// Shared IN-class request with the default TTL on all interfaces
    pub fn new<S: Into<String>>(fullname: S, rrtype: RecordType, rdata: Bytes) -> Self {
        Self {
            flags: RecordFlags::Shared,
            interface_index: 0,
            fullname: fullname.into(),
            rrtype,
            rrclass: RecordClass::In,
            rdata,
            ttl: RECORD_TTL,
        }
    }

    /// Set ownership flags
    pub fn with_flags(mut self, flags: RecordFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the advertised TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Restrict the record to one interface
    pub fn with_interface_index(mut self, index: u32) -> Self {
        self.interface_index = index;
        self
    }
}

/// Operations consumed from a responder connection.
///
/// Registration happens on a single thread before the event pump starts;
/// afterwards the pump is the only caller of [`Responder::process_result`].
#[cfg_attr(test, mockall::automock)]
pub trait Responder: Send + Sync {
    /// Submit a record. Completion is fire-and-forget: only rejections at
    /// submission time are reported.
    fn register_record(&self, request: RecordRequest) -> Result<RecordId, ResponderError>;

    /// Block until one asynchronous result is available and process it
    fn process_result(&self) -> Result<(), ResponderError>;

    /// Close the connection's underlying descriptor, e.g. in a forked worker
    fn close_descriptor(&self) -> Result<(), ResponderError>;

    /// Make a blocked [`Responder::process_result`] return
    fn wake(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = RecordRequest::new("svc", RecordType::A, Bytes::from_static(&[10, 0, 0, 1]));
        assert_eq!(request.ttl, RECORD_TTL);
        assert_eq!(request.flags, RecordFlags::Shared);
        assert_eq!(request.rrclass.value(), 1);
        assert_eq!(request.interface_index, 0);

        let request = request.with_flags(RecordFlags::Unique).with_ttl(120);
        assert_eq!(request.flags.bits(), 0x20);
        assert_eq!(request.ttl, 120);
    }

    #[test]
    fn test_record_type_values() {
        assert_eq!(RecordType::from(RecordKind::A).value(), 1);
        assert_eq!(RecordType::from(RecordKind::Cname).value(), 5);
        assert_eq!(RecordFlags::from_unique(false), RecordFlags::Shared);
    }
}
