//! SIGTERM/SIGINT handling for the watch loop.
//!
//! Uses `signal-hook` flag registration. The loop polls the flag between
//! probes and during its sleep, so a stop request is honored within one
//! sleep slice rather than one full poll interval.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use signal_hook::consts::{SIGINT, SIGTERM};

/// Granularity of `sleep_unless_stopped`.
const SLEEP_SLICE: Duration = Duration::from_millis(250);

/// Shared stop flag set by signals or programmatically.
#[derive(Clone)]
pub struct SignalHandler {
    shutdown_flag: Arc<AtomicBool>,
}

impl SignalHandler {
    /// Create a handler and register SIGTERM/SIGINT. Registration failures are
    /// reported on stderr and leave the handler usable.
    pub fn new() -> Self {
        let handler = Self::detached();
        for (signal, name) in [(SIGTERM, "SIGTERM"), (SIGINT, "SIGINT")] {
            if let Err(e) = signal_hook::flag::register(signal, Arc::clone(&handler.shutdown_flag))
            {
                eprintln!("[OSG-SIGNAL] failed to register {name}: {e}");
            }
        }
        handler
    }

    /// A handler with no OS signals attached.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            shutdown_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn should_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::Relaxed)
    }

    pub fn request_shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
    }

    /// Sleep for `duration`, waking early on a stop request.
    /// Returns `true` if the sleep was cut short.
    pub fn sleep_unless_stopped(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.should_shutdown() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}
