//! Command dispatch: status, clean and move wired to config, platform and logs.
//!
//! Shared by the CLI subcommands, the interactive menu, and the watch loop's
//! "Open manager" action, so each path performs the same privilege checks and
//! writes the same activity records.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::cleanup::engine::{CleanupEngine, CleanupReport};
use crate::core::config::Config;
use crate::core::errors::{OsgError, Result};
use crate::daemon::notifications::{NotificationEvent, NotificationManager};
use crate::logger::jsonl::{ActivityLog, EventType, JsonlConfig, LogEntry, Severity};
use crate::monitor::report::StatusReport;
use crate::monitor::usage::UsageProbe;
use crate::platform::pal::{Platform, detect_platform};
use crate::relocation::engine::{RelocationEngine, RelocationReport};
use crate::ui::menu::MenuHandler;

/// Result of `clean`, with a fresh status reading when the probe works.
#[derive(Debug)]
pub struct CleanOutcome {
    pub report: CleanupReport,
    pub status: Option<StatusReport>,
}

/// Result of `move`, with a fresh status reading when the probe works.
#[derive(Debug)]
pub struct RelocateOutcome {
    pub report: RelocationReport,
    pub status: Option<StatusReport>,
}

#[derive(Clone)]
pub struct Dispatcher {
    config: Config,
    platform: Arc<dyn Platform>,
    log: ActivityLog,
    notifications: Arc<NotificationManager>,
}

impl Dispatcher {
    /// Dispatcher with logging and notifications off.
    #[must_use]
    pub fn new(config: Config, platform: Arc<dyn Platform>) -> Self {
        Self {
            config,
            platform,
            log: ActivityLog::disabled(),
            notifications: Arc::new(NotificationManager::disabled()),
        }
    }

    /// Production wiring: detected platform, JSONL log and configured channels.
    pub fn from_config(config: Config) -> Result<Self> {
        let platform = detect_platform(config.probe.backend)?;
        let log = ActivityLog::open(JsonlConfig::at(&config.paths.jsonl_log));
        let notifications = Arc::new(NotificationManager::from_config(&config.notifications));
        Ok(Self {
            config,
            platform,
            log,
            notifications,
        })
    }

    #[must_use]
    pub fn with_activity_log(mut self, log: ActivityLog) -> Self {
        self.log = log;
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn platform(&self) -> Arc<dyn Platform> {
        Arc::clone(&self.platform)
    }

    #[must_use]
    pub fn activity_log(&self) -> ActivityLog {
        self.log.clone()
    }

    #[must_use]
    pub fn notifications(&self) -> Arc<NotificationManager> {
        Arc::clone(&self.notifications)
    }

    #[must_use]
    pub fn probe(&self) -> UsageProbe {
        UsageProbe::new(self.platform(), &self.config.watch.mount_point)
    }

    pub fn status(&self) -> Result<StatusReport> {
        let snapshot = self.probe().probe()?;
        Ok(StatusReport::new(snapshot, self.config.thresholds))
    }

    pub fn clean(&self) -> Result<CleanOutcome> {
        self.require_elevated("clean")?;
        let engine = CleanupEngine::from_config(&self.config.cleanup)?;
        let started = Instant::now();
        let report = engine.clean();

        for failure in &report.failures {
            eprintln!(
                "[OSG-CLEAN] could not remove {}: {}",
                failure.path.display(),
                failure.error
            );
        }
        let mut entry = LogEntry::new(EventType::CleanupRun, Severity::Info);
        entry.ok = Some(report.failures.is_empty());
        entry.bytes = Some(report.bytes_freed);
        entry.duration_ms = Some(u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX));
        entry.details = Some(report.summary());
        self.log.record(&entry);
        self.notifications.notify(&NotificationEvent::CleanupCompleted {
            entries_removed: report.entries_removed + report.logs_deleted,
            bytes_freed: report.bytes_freed,
        });

        Ok(CleanOutcome {
            report,
            status: self.status_after("clean"),
        })
    }

    /// Relocate the configured sources to `destination` (or the configured root).
    pub fn relocate(&self, destination: Option<&Path>) -> Result<RelocateOutcome> {
        self.require_elevated("move")?;
        let root = destination.map_or_else(
            || self.config.relocation.destination_root.clone(),
            Path::to_path_buf,
        );
        let engine = RelocationEngine::new().with_activity_log(self.log.clone());
        let report = engine.relocate(&self.config.relocation.sources, &root)?;

        if !report.records.is_empty() {
            self.notifications.notify(&NotificationEvent::RelocationCompleted {
                moved: report.records.len(),
                destination_root: report.destination_root.to_string_lossy().into_owned(),
            });
        }
        Ok(RelocateOutcome {
            report,
            status: self.status_after("move"),
        })
    }

    fn require_elevated(&self, operation: &'static str) -> Result<()> {
        if self.platform.is_elevated() {
            Ok(())
        } else {
            Err(OsgError::PrivilegeRequired { operation })
        }
    }

    fn status_after(&self, operation: &str) -> Option<StatusReport> {
        match self.status() {
            Ok(report) => Some(report),
            Err(err) => {
                eprintln!("[OSG-STATUS] usage unavailable after {operation}: {err}");
                None
            }
        }
    }
}

fn with_status(summary: String, status: Option<&StatusReport>) -> String {
    match status {
        Some(report) => format!("{summary}\n\n{}", report.render_human()),
        None => summary,
    }
}

impl MenuHandler for Dispatcher {
    fn headline(&self) -> String {
        self.status().map_or_else(
            |err| format!("Usage unavailable: {err}"),
            |report| report.status_line(),
        )
    }

    fn status(&self) -> Result<String> {
        Dispatcher::status(self).map(|report| report.render_human())
    }

    fn clean(&self) -> Result<String> {
        let outcome = Dispatcher::clean(self)?;
        Ok(with_status(outcome.report.summary(), outcome.status.as_ref()))
    }

    fn relocate(&self, destination_root: &Path) -> Result<String> {
        let outcome = Dispatcher::relocate(self, Some(destination_root))?;
        Ok(with_status(outcome.report.summary(), outcome.status.as_ref()))
    }

    fn default_destination(&self) -> PathBuf {
        self.config.relocation.destination_root.clone()
    }

    fn relocation_sources(&self) -> Vec<String> {
        self.config
            .relocation
            .sources
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }
}
