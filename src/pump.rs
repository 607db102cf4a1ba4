//! Background thread draining a responder connection

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use tracing::{debug, error, warn};

use crate::{
    error::{ErrorSeverity, Result},
    responder::Responder,
};

/// Name of the pump thread
pub const PUMP_THREAD_NAME: &str = "bonjour-pump";

/// Counters kept by a running pump
#[derive(Debug, Default)]
pub struct PumpStats {
    processed: AtomicU64,
    failed: AtomicU64,
}

impl PumpStats {
    /// Results drained successfully
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Results whose processing reported an error
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Drains asynchronous results from a responder connection until shut down
pub struct EventPump<R> {
    responder: Arc<R>,
    shutdown: Arc<AtomicBool>,
    stats: Arc<PumpStats>,
}

impl<R: Responder + 'static> EventPump<R> {
    /// Start the pump on its own thread
    pub fn spawn(responder: Arc<R>) -> Result<PumpHandle<R>> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(PumpStats::default());
        let pump = EventPump {
            responder: Arc::clone(&responder),
            shutdown: Arc::clone(&shutdown),
            stats: Arc::clone(&stats),
        };

        let thread = thread::Builder::new()
            .name(PUMP_THREAD_NAME.to_string())
            .spawn(move || pump.run())?;
        debug!("[bonjour] event pump started");

        Ok(PumpHandle {
            responder,
            shutdown,
            stats,
            thread: Some(thread),
        })
    }

    fn run(self) {
        while !self.shutdown.load(Ordering::Acquire) {
            match self.responder.process_result() {
                Ok(()) => {
                    self.stats.processed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) if e.severity() == ErrorSeverity::Fatal => {
                    warn!("[bonjour] connection closed ({}), stopping event pump", e.code());
                    break;
                }
                Err(e) => {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    error!("[bonjour] error {} while processing result", e.code());
                }
            }
        }
        debug!("[bonjour] event pump stopped");
    }
}

/// Handle to a running pump.
///
/// Dropping the handle leaves the thread running for the rest of the process.
pub struct PumpHandle<R: Responder> {
    responder: Arc<R>,
    shutdown: Arc<AtomicBool>,
    stats: Arc<PumpStats>,
    thread: Option<JoinHandle<()>>,
}

impl<R: Responder> PumpHandle<R> {
    /// Counters of the running pump
    pub fn stats(&self) -> &PumpStats {
        &self.stats
    }

    /// Whether the pump thread is still looping
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the pump and wait for its thread to exit
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::Release);
        self.responder.wake();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("[bonjour] event pump panicked");
            }
        }
    }
}
