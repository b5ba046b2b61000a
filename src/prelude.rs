//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use overlay_space_guard::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{OsgError, Result};

// Platform
pub use crate::platform::pal::{FsStats, Platform, ProbeBackend, detect_platform};

// Monitor
pub use crate::monitor::report::StatusReport;
pub use crate::monitor::severity::{SeverityLevel, Thresholds};
pub use crate::monitor::usage::{UsageProbe, UsageSnapshot};

// State
pub use crate::state::alert::{AlertDecision, AlertDeduplicator};
pub use crate::state::lock::{LockOutcome, PidLock};
pub use crate::state::marker::{FileMarker, MarkerStore};

// Actions
pub use crate::cleanup::engine::{CacheTarget, CleanupEngine, CleanupReport};
pub use crate::dispatch::Dispatcher;
pub use crate::relocation::engine::{RelocationEngine, RelocationEntry, RelocationReport};

// Watch
#[cfg(feature = "daemon")]
pub use crate::daemon::watch::{TickOutcome, WatchExit, WatchLoop};

// UI
pub use crate::ui::dialog::{AlertResponse, Dialog, DialogPreference, select_dialog};
pub use crate::ui::menu::{MenuHandler, run_menu};
