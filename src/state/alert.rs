//! Alert deduplication: one notification per distinct usage level in the alert band.
//!
//! Persisted state is a single integer, the last alerted percent (0 = idle).
//! Comparison is percent-exact, not band-exact: 86 -> 87 re-alerts, a steady
//! 86 does not. A reading that eases within the band (87 -> 86) updates the
//! stored level without notifying, so the next rise alerts again. Any reading
//! below the warn threshold, or an unknown reading, resets the state to 0.

#![allow(missing_docs)]

use serde::Serialize;

use crate::core::errors::Result;
use crate::monitor::severity::{SeverityLevel, Thresholds};
use crate::state::marker::MarkerStore;

/// Persisted alert record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AlertState {
    pub last_alerted_pct: u8,
}

impl AlertState {
    #[must_use]
    pub const fn is_idle(self) -> bool {
        self.last_alerted_pct == 0
    }
}

/// Outcome of feeding one reading to the deduplicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDecision {
    /// A new, higher level: emit exactly one notification.
    Notify { percent: u8, severity: SeverityLevel },
    /// Same level as the last alert.
    Suppressed { percent: u8 },
    /// Lower level, still at or above warn: recorded, not announced.
    Eased { from: u8, to: u8 },
    /// Dropped below warn (or unknown) while alerted; state reset to 0.
    Reset { previous: u8 },
    /// Below warn and already idle.
    Idle,
}

impl AlertDecision {
    #[must_use]
    pub const fn should_notify(&self) -> bool {
        matches!(self, Self::Notify { .. })
    }
}

/// Reads and writes `AlertState` through an injected marker store.
pub struct AlertDeduplicator {
    store: Box<dyn MarkerStore>,
    thresholds: Thresholds,
}

impl AlertDeduplicator {
    #[must_use]
    pub fn new(store: Box<dyn MarkerStore>, thresholds: Thresholds) -> Self {
        Self { store, thresholds }
    }

    /// Load the persisted state. Missing or garbled markers read as idle.
    pub fn state(&self) -> Result<AlertState> {
        let raw = self.store.read()?;
        let last_alerted_pct = match raw.as_deref() {
            None | Some("") => 0,
            Some(text) => text.parse::<u8>().unwrap_or_else(|_| {
                eprintln!(
                    "[OSG-WATCH] ignoring unreadable alert state {text:?} in {}",
                    self.store.describe()
                );
                0
            }),
        };
        Ok(AlertState { last_alerted_pct })
    }

    /// Advance the state machine by one reading.
    pub fn observe(&self, percent: Option<u8>) -> Result<AlertDecision> {
        let state = self.state()?;
        let last = state.last_alerted_pct;

        let current = match percent {
            Some(pct) if self.thresholds.is_alerting(Some(pct)) => pct,
            _ => {
                if state.is_idle() {
                    return Ok(AlertDecision::Idle);
                }
                self.store.write("0")?;
                return Ok(AlertDecision::Reset { previous: last });
            }
        };

        if current == last {
            return Ok(AlertDecision::Suppressed { percent: current });
        }

        self.store.write(&current.to_string())?;
        if current > last {
            Ok(AlertDecision::Notify {
                percent: current,
                severity: self.thresholds.classify(Some(current)),
            })
        } else {
            Ok(AlertDecision::Eased {
                from: last,
                to: current,
            })
        }
    }
}
