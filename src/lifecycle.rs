//! Host lifecycle integration
//!
//! [`BonjourPlugin`] is the context object a host process drives through two
//! hooks. `post_init` runs once after the host finished its own initialization:
//! it resolves the configured entries, opens the single responder connection,
//! registers every record and starts the event pump. Later calls (configuration
//! reloads) leave the connection alone. `post_fork` runs in forked workers,
//! which do not take part in the discovery connection and close their
//! inherited descriptor.

use std::{fmt, sync::Arc};

use tracing::{debug, error, info, warn};

use crate::{
    config::BonjourConfig,
    error::{ResponderError, Result},
    pump::{EventPump, PumpHandle},
    registrar::{RegisteredRecord, Registrar},
    responder::Responder,
};

#[cfg(feature = "multicast")]
use crate::responder::multicast::MulticastResponder;

/// Opens the responder connection from the host configuration
pub type Opener<R> =
    Box<dyn FnOnce(&BonjourConfig) -> std::result::Result<R, ResponderError> + Send>;

/// Startup progress of a [`BonjourPlugin`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Nothing has happened yet
    Unconfigured,
    /// The responder connection is open
    ConnectionOpen,
    /// Registering the configured records
    Registering {
        /// Records accepted so far
        registered: usize,
        /// Records configured
        total: usize,
    },
    /// All records registered, the event pump is running
    Pumping,
    /// Startup failed; the host is expected to exit
    Aborted,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unconfigured => write!(f, "unconfigured"),
            Self::ConnectionOpen => write!(f, "connection open"),
            Self::Registering { registered, total } => {
                write!(f, "registering ({registered}/{total})")
            }
            Self::Pumping => write!(f, "pumping"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Record registration bound to a host process lifecycle
pub struct BonjourPlugin<R: Responder> {
    config: BonjourConfig,
    opener: Option<Opener<R>>,
    state: LifecycleState,
    responder: Option<Arc<R>>,
    registered: Vec<RegisteredRecord>,
    pump: Option<PumpHandle<R>>,
}

#[cfg(feature = "multicast")]
impl BonjourPlugin<MulticastResponder> {
    /// Plugin registering through the built-in multicast responder
    pub fn new(config: BonjourConfig) -> Self {
        Self::with_opener(config, |config| MulticastResponder::open(config.responder()))
    }
}

impl<R: Responder + 'static> BonjourPlugin<R> {
    /// Plugin registering through whatever `opener` connects to
    pub fn with_opener<F>(config: BonjourConfig, opener: F) -> Self
    where
        F: FnOnce(&BonjourConfig) -> std::result::Result<R, ResponderError> + Send + 'static,
    {
        Self {
            config,
            opener: Some(Box::new(opener)),
            state: LifecycleState::Unconfigured,
            responder: None,
            registered: Vec::new(),
            pump: None,
        }
    }

    /// Current startup state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Records registered at startup
    pub fn registered(&self) -> &[RegisteredRecord] {
        &self.registered
    }

    /// The open connection, if any
    pub fn responder(&self) -> Option<&Arc<R>> {
        self.responder.as_ref()
    }

    /// The running event pump, if any
    pub fn pump(&self) -> Option<&PumpHandle<R>> {
        self.pump.as_ref()
    }

    /// Hook run once the host finished initializing.
    ///
    /// Every error is fatal: it is logged, the plugin moves to
    /// [`LifecycleState::Aborted`], and the host is expected to exit.
    pub fn post_init(&mut self) -> Result<()> {
        if !self.config.has_records() {
            debug!("[bonjour] no records configured");
            return Ok(());
        }

        match self.state {
            LifecycleState::Unconfigured => {}
            LifecycleState::Aborted => {
                warn!("[bonjour] startup already failed, not retrying");
                return Ok(());
            }
            state => {
                debug!("[bonjour] already {}, keeping the responder connection", state);
                return Ok(());
            }
        }

        self.start().inspect_err(|e| {
            self.state = LifecycleState::Aborted;
            error!("[bonjour] startup aborted: {}", e);
        })
    }

    /// Hook run in every forked worker
    pub fn post_fork(&self) {
        if let Some(responder) = &self.responder {
            if let Err(e) = responder.close_descriptor() {
                warn!("[bonjour] unable to close responder descriptor, error code: {}", e.code());
            }
        }
    }

    /// Stop the event pump and wait for it to exit
    pub fn shutdown(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.shutdown();
            info!("[bonjour] event pump shut down");
        }
    }

    fn start(&mut self) -> Result<()> {
        self.config.validate()?;
        let self_name = self.config.self_name()?;
        let specs = self.config.record_specs(&self_name)?;

        let Some(opener) = self.opener.take() else {
            return Err(ResponderError::Invalid.into());
        };
        let config = &self.config;
        let registrar = Registrar::open(|| opener(config))?;
        self.responder = Some(Arc::clone(registrar.responder()));
        self.state = LifecycleState::ConnectionOpen;

        let total = specs.len();
        for (registered, spec) in specs.iter().enumerate() {
            self.state = LifecycleState::Registering { registered, total };
            let record = registrar.register(spec)?;
            self.registered.push(record);
        }

        self.pump = Some(EventPump::spawn(Arc::clone(registrar.responder()))?);
        self.state = LifecycleState::Pumping;
        info!("[bonjour] {} records registered as {}", total, self_name);
        Ok(())
    }
}
