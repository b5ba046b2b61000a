//! Advisory PID lock for the watch loop.
//!
//! The marker holds the owner's PID. A marker naming a dead process (or
//! garbage) is stale and gets taken over, so a killed watcher never needs
//! explicit teardown. The check-then-write window is racy by design.

#![allow(missing_docs)]

use crate::core::errors::Result;
use crate::platform::pal::Platform;
use crate::state::marker::MarkerStore;

/// Result of trying to take the lock.
pub enum LockOutcome {
    Acquired(PidLock),
    /// Another live process holds the lock.
    Held { pid: u32 },
}

/// A held lock. Releasing is best effort and only clears our own PID.
pub struct PidLock {
    store: Box<dyn MarkerStore>,
    pid: u32,
}

impl PidLock {
    /// Try to take the lock for `own_pid`.
    pub fn acquire(
        store: Box<dyn MarkerStore>,
        platform: &dyn Platform,
        own_pid: u32,
    ) -> Result<LockOutcome> {
        if let Some(holder) = read_pid(store.as_ref())?
            && holder != own_pid
            && platform.process_alive(holder)
        {
            return Ok(LockOutcome::Held { pid: holder });
        }
        store.write(&own_pid.to_string())?;
        Ok(LockOutcome::Acquired(Self {
            store,
            pid: own_pid,
        }))
    }

    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Clear the marker if it still names us.
    pub fn release(self) -> Result<()> {
        if read_pid(self.store.as_ref())? == Some(self.pid) {
            self.store.clear()?;
        }
        Ok(())
    }
}

fn read_pid(store: &dyn MarkerStore) -> Result<Option<u32>> {
    Ok(store.read()?.and_then(|raw| raw.parse::<u32>().ok()))
}
