//! # Bonjour Records
//!
//! Makes a server process discoverable under `.local` names by registering
//! CNAME and A records with a multicast-DNS responder, then keeps a background
//! thread draining the responder connection for the rest of the process
//! lifetime.
//!
//! ## Configuration entries
//!
//! Each entry of the repeatable `bonjour-register` option is either
//!
//! - a bare name: `myhost` registers a shared CNAME `myhost -> <hostname>.local`
//! - a `key=value` list with the keys `name`, `cname`, `ip` (or `a`) and `unique`:
//!   - `name=svc,cname=alias.local` registers `svc CNAME alias.local`
//!   - `name=svc,ip=192.168.1.5,unique=1` registers an exclusive `svc A 192.168.1.5`
//!   - `name=svc` registers `svc CNAME <hostname>.local`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "multicast")]
//! # fn main() {
//! use bonjour_records::{BonjourConfig, BonjourPlugin};
//!
//! let config = BonjourConfig::new()
//!     .with_record("myhost")
//!     .with_record("name=api,ip=192.168.1.5,unique=1");
//!
//! let mut plugin = BonjourPlugin::new(config);
//! if let Err(e) = plugin.post_init() {
//!     eprintln!("{e}");
//!     std::process::exit(1);
//! }
//! // ... serve ...
//! # }
//! # #[cfg(not(feature = "multicast"))]
//! # fn main() {}
//! ```
//!
//! ## Lower-level API
//!
//! ```rust,no_run
//! use bonjour_records::{config::ResponderConfig, registrar::Registrar, pump::EventPump};
//! use std::sync::Arc;
//!
//! # #[cfg(feature = "multicast")]
//! # fn main() -> bonjour_records::Result<()> {
//! let registrar = Registrar::open_multicast(&ResponderConfig::default())?;
//! registrar.register_cname("myhost", "web01.local", false)?;
//! registrar.register_a("api", "192.168.1.5", true)?;
//!
//! let pump = EventPump::spawn(Arc::clone(registrar.responder()))?;
//! # pump.shutdown();
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "multicast"))]
//! # fn main() {}
//! ```
//!
//! Other responders plug in through the [`responder::Responder`] trait.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod encoding;
pub mod error;
pub mod lifecycle;
pub mod pump;
pub mod registrar;
pub mod responder;
pub mod types;

// Re-export main types for convenience
pub use config::{BonjourConfig, ResponderConfig};
pub use encoding::{encode_name, EncodedName};
pub use error::{BonjourError, ResponderError, Result};
pub use lifecycle::{BonjourPlugin, LifecycleState};
pub use registrar::{RegisteredRecord, Registrar};
pub use types::{default_target, RecordKind, RecordSpec};

#[cfg(feature = "multicast")]
pub use responder::multicast::MulticastResponder;
