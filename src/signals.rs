//! Interruption flag shared with signal handlers
//!
//! The pipeline checks [`Running::running`] between packets and at the end of each source, so an
//! interrupted run stops at a record boundary and the output stays a valid pcap stream.

use signal_hook::SigId;
use std::io;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Termination flag, cleared by [`Running::terminate`] or by a registered signal
///
/// Clones share the same flag.
#[derive(Clone, Debug)]
pub struct Running(Arc<AtomicBool>);

impl Running {
    pub fn new() -> Running {
        Running(Arc::new(AtomicBool::new(false)))
    }

    pub fn register_signal(&mut self, signal: libc::c_int) -> io::Result<SigId> {
        signal_hook::flag::register(signal, self.0.clone())
    }

    /// Register SIGINT and SIGTERM
    ///
    /// The first signal asks for an orderly stop. A second one, for ex. while blocked reading an
    /// idle stdin, exits the process right away with status 128 + signal number.
    pub fn register_term_signals(&mut self) -> io::Result<()> {
        for signal in [libc::SIGINT, libc::SIGTERM] {
            // must be registered before the flag itself, so it only fires once the flag is set
            let status = 128 + signal;
            signal_hook::flag::register_conditional_shutdown(signal, status, self.0.clone())?;
            self.register_signal(signal)?;
        }
        Ok(())
    }

    pub fn running(&self) -> bool {
        !self.0.load(Ordering::Relaxed)
    }

    pub fn terminate(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

impl Default for Running {
    fn default() -> Self {
        Running::new()
    }
}
