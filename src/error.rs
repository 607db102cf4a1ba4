//! Error types for the bonjour-records library

use std::io;

use crate::types::RecordKind;

/// Errors reported by a responder through the client API.
///
/// Each variant carries the numeric code the DNS-SD client API uses for the
/// same condition, so log lines stay comparable with other Bonjour tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ResponderError {
    /// Unclassified failure inside the responder
    #[error("unknown responder error")]
    Unknown,
    /// The responder could not allocate resources for the request
    #[error("responder is out of memory")]
    NoMemory,
    /// The request was malformed
    #[error("bad parameter")]
    BadParam,
    /// A record with the same name and type is already owned exclusively
    #[error("name conflict")]
    NameConflict,
    /// The request referred to a record the responder does not know
    #[error("invalid record reference")]
    Invalid,
    /// The operation is not supported by this responder
    #[error("unsupported operation")]
    Unsupported,
    /// The responder is not running or the connection is gone
    #[error("responder is not running")]
    ServiceNotRunning,
}

impl ResponderError {
    /// Numeric error code as used by the DNS-SD client API
    pub fn code(&self) -> i32 {
        match self {
            Self::Unknown => -65537,
            Self::NoMemory => -65539,
            Self::BadParam => -65540,
            Self::NameConflict => -65548,
            Self::Invalid => -65549,
            Self::Unsupported => -65544,
            Self::ServiceNotRunning => -65563,
        }
    }

    /// Whether the connection can still produce events after this error
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::ServiceNotRunning)
    }

    /// Severity of an error drained from a running connection
    pub fn severity(&self) -> ErrorSeverity {
        if self.is_disconnected() {
            ErrorSeverity::Fatal
        } else {
            ErrorSeverity::Error
        }
    }
}

/// The primary error type for the bonjour-records crate
#[derive(Debug, thiserror::Error)]
pub enum BonjourError {
    /// A name could not be converted to DNS wire format
    #[error("unable to generate dns name for {name}: {reason}")]
    Encoding {
        /// The name being encoded
        name: String,
        /// Why encoding failed
        reason: String,
    },
    /// The responder could not be reached
    #[error("unable to initialize DNS resolution, error code: {}", .source.code())]
    Connection {
        /// Error reported while opening the connection
        #[source]
        source: ResponderError,
    },
    /// The responder rejected a record
    #[error("unable to register {kind} for {name}, error code: {}", .source.code())]
    Registration {
        /// Owner name of the rejected record
        name: String,
        /// Record type of the rejected record
        kind: RecordKind,
        /// Error reported by the responder
        #[source]
        source: ResponderError,
    },
    /// Malformed configuration entry
    #[error("configuration error: {0}")]
    Configuration(String),
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Startup cannot continue, or the connection is gone for good
    Fatal,
    /// Logged, the process keeps running
    Error,
}

/// Common result type for library operations
pub type Result<T> = std::result::Result<T, BonjourError>;

impl BonjourError {
    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new encoding error
    pub fn encoding<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        Self::Encoding {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a new registration error
    pub fn registration<S: Into<String>>(name: S, kind: RecordKind, source: ResponderError) -> Self {
        Self::Registration {
            name: name.into(),
            kind,
            source,
        }
    }

    /// Numeric responder error code, when the error came from the responder
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Connection { source } | Self::Registration { source, .. } => Some(source.code()),
            _ => None,
        }
    }

    /// Get error severity
    ///
    /// Every one of these comes out of startup, and nothing that goes wrong
    /// there leaves a half-registered process running.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Encoding { .. }
            | Self::Connection { .. }
            | Self::Registration { .. }
            | Self::Configuration(_)
            | Self::Io(_) => ErrorSeverity::Fatal,
        }
    }
}

impl From<ResponderError> for BonjourError {
    fn from(source: ResponderError) -> Self {
        Self::Connection { source }
    }
}
