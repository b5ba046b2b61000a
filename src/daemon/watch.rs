//! Watch loop: poll usage on a fixed interval and alert once per new level.
//!
//! ```text
//!   acquire PID lock ──held by live pid──▶ WatchExit::AlreadyRunning
//!        │
//!        ▼
//!   ┌─▶ probe ─▶ AlertDeduplicator ─▶ (Notify) alert dialog ─▶ (Open manager) menu
//!   │                                                 │
//!   └──────── sleep(poll interval) ◀──────────────────┘
//! ```
//!
//! A failed probe, a failed state write, or a missing dialog backend is
//! logged and the loop carries on. Only a stop signal ends it.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::config::Config;
use crate::core::errors::{OsgError, Result};
use crate::daemon::notifications::{NotificationEvent, NotificationManager};
use crate::daemon::signals::SignalHandler;
use crate::logger::jsonl::{ActivityLog, EventType, LogEntry, Severity};
use crate::monitor::report::StatusReport;
use crate::monitor::severity::{SeverityLevel, Thresholds};
use crate::monitor::usage::{UsageProbe, UsageSnapshot};
use crate::platform::pal::Platform;
use crate::state::alert::{AlertDecision, AlertDeduplicator};
use crate::state::lock::{LockOutcome, PidLock};
use crate::state::marker::{FileMarker, MarkerStore};
use crate::ui::dialog::{AlertResponse, Dialog};
use crate::ui::menu::{MenuHandler, run_menu};

/// What one poll did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A new level; the user was alerted. `response` is `None` when no dialog could be shown.
    Alerted {
        percent: u8,
        severity: SeverityLevel,
        response: Option<AlertResponse>,
    },
    Suppressed { percent: u8 },
    Eased { from: u8, to: u8 },
    Reset { previous: u8 },
    Idle,
    /// Probe worked but gave no usable percent.
    Unknown,
    /// Probe or state storage failed; carries the error code.
    Failed { code: &'static str },
}

/// Why `run` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchExit {
    /// Another live watcher holds the lock; nothing was touched.
    AlreadyRunning { pid: u32 },
    /// Stopped by signal (or `max_ticks` in tests).
    Stopped { ticks: u64 },
}

pub struct WatchLoop {
    probe: UsageProbe,
    thresholds: Thresholds,
    dedup: AlertDeduplicator,
    lock_store: Option<Box<dyn MarkerStore>>,
    platform: Arc<dyn Platform>,
    dialog: Box<dyn Dialog>,
    manager: Option<Box<dyn MenuHandler>>,
    notifications: Arc<NotificationManager>,
    log: ActivityLog,
    signals: SignalHandler,
    interval: Duration,
    notify_timeout: Duration,
    own_pid: u32,
    max_ticks: Option<u64>,
    config_hash: Option<String>,
}

impl WatchLoop {
    /// Loop with defaults: 60s interval, 30s alert timeout, no logging, no
    /// notification channels, no manager action, and no OS signal hooks.
    #[must_use]
    pub fn new(
        probe: UsageProbe,
        thresholds: Thresholds,
        alert_store: Box<dyn MarkerStore>,
        lock_store: Box<dyn MarkerStore>,
        platform: Arc<dyn Platform>,
        dialog: Box<dyn Dialog>,
    ) -> Self {
        Self {
            probe,
            thresholds,
            dedup: AlertDeduplicator::new(alert_store, thresholds),
            lock_store: Some(lock_store),
            platform,
            dialog,
            manager: None,
            notifications: Arc::new(NotificationManager::disabled()),
            log: ActivityLog::disabled(),
            signals: SignalHandler::detached(),
            interval: Duration::from_secs(60),
            notify_timeout: Duration::from_secs(30),
            own_pid: std::process::id(),
            max_ticks: None,
            config_hash: None,
        }
    }

    /// Production wiring from config: file markers, configured timings.
    #[must_use]
    pub fn from_config(config: &Config, platform: Arc<dyn Platform>, dialog: Box<dyn Dialog>) -> Self {
        let mut watch = Self::new(
            UsageProbe::new(Arc::clone(&platform), &config.watch.mount_point),
            config.thresholds,
            Box::new(FileMarker::new(&config.paths.alert_state_file)),
            Box::new(FileMarker::new(&config.paths.lock_file)),
            platform,
            dialog,
        )
        .with_interval(Duration::from_secs(config.watch.poll_interval_secs))
        .with_notify_timeout(Duration::from_secs(config.watch.notify_timeout_secs));
        watch.config_hash = config.stable_hash().ok();
        watch
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_manager(mut self, manager: Box<dyn MenuHandler>) -> Self {
        self.manager = Some(manager);
        self
    }

    #[must_use]
    pub fn with_notifications(mut self, notifications: Arc<NotificationManager>) -> Self {
        self.notifications = notifications;
        self
    }

    #[must_use]
    pub fn with_activity_log(mut self, log: ActivityLog) -> Self {
        self.log = log;
        self
    }

    #[must_use]
    pub fn with_signals(mut self, signals: SignalHandler) -> Self {
        self.signals = signals;
        self
    }

    #[must_use]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.own_pid = pid;
        self
    }

    /// Stop after this many polls instead of waiting for a signal.
    #[must_use]
    pub fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = Some(ticks);
        self
    }

    /// Take the lock, then poll until stopped.
    ///
    /// When another live watcher holds the lock this returns at once without
    /// reading or writing the alert state.
    pub fn run(mut self) -> Result<WatchExit> {
        let store = self.lock_store.take().ok_or_else(|| OsgError::Runtime {
            details: "watch loop was already started".to_string(),
        })?;
        let lock = match PidLock::acquire(store, self.platform.as_ref(), self.own_pid)? {
            LockOutcome::Held { pid } => {
                eprintln!("[OSG-WATCH] another watcher (pid {pid}) is running; exiting");
                self.log.record(
                    &LogEntry::new(EventType::WatchBusy, Severity::Info)
                        .with_details(format!("lock held by pid {pid}")),
                );
                return Ok(WatchExit::AlreadyRunning { pid });
            }
            LockOutcome::Acquired(lock) => lock,
        };
        self.run_locked(lock)
    }

    fn run_locked(mut self, lock: PidLock) -> Result<WatchExit> {
        let started = Instant::now();
        let mount = self.probe.mount_point().to_string_lossy().into_owned();
        let mut start_entry = LogEntry::new(EventType::WatchStart, Severity::Info)
            .with_details(self.start_details(lock.pid()));
        start_entry.mount_point = Some(mount.clone());
        self.log.record(&start_entry);
        self.notifications.notify(&NotificationEvent::WatchStarted {
            version: env!("CARGO_PKG_VERSION").to_string(),
            mount,
        });

        let mut ticks = 0u64;
        let reason = loop {
            if self.signals.should_shutdown() {
                break "signal";
            }
            self.tick();
            ticks += 1;
            if self.max_ticks.is_some_and(|max| ticks >= max) {
                break "tick limit";
            }
            if self.signals.sleep_unless_stopped(self.interval) {
                break "signal";
            }
        };

        if let Err(err) = lock.release() {
            eprintln!("[OSG-WATCH] could not release lock: {err}");
        }
        let uptime_secs = started.elapsed().as_secs();
        self.log.record(
            &LogEntry::new(EventType::WatchStop, Severity::Info)
                .with_details(format!("{reason} after {ticks} poll(s)")),
        );
        self.notifications.notify(&NotificationEvent::WatchStopped {
            reason: reason.to_string(),
            uptime_secs,
        });
        Ok(WatchExit::Stopped { ticks })
    }

    fn start_details(&self, pid: u32) -> String {
        let mut details = format!(
            "pid {pid} polling every {}s, dialog {}",
            self.interval.as_secs(),
            self.dialog.kind()
        );
        if let Some(hash) = &self.config_hash {
            details.push_str(&format!(", config {hash}"));
        }
        details
    }

    /// One poll: probe, advance the alert state, alert if due.
    pub fn tick(&mut self) -> TickOutcome {
        let snapshot = match self.probe.probe() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                eprintln!("[OSG-WATCH] probe failed: {err}");
                self.log.record(&LogEntry::failure(EventType::ProbeFailed, &err));
                return TickOutcome::Failed { code: err.code() };
            }
        };

        if snapshot.percent_used.is_none() {
            eprintln!(
                "[OSG-WATCH] usage of {} is unknown this poll",
                snapshot.mount_point.display()
            );
            let mut entry = LogEntry::new(EventType::ProbeUnknown, Severity::Warning);
            entry.mount_point = Some(snapshot.mount_point.to_string_lossy().into_owned());
            self.log.record(&entry);
        }

        let decision = match self.dedup.observe(snapshot.percent_used) {
            Ok(decision) => decision,
            Err(err) => {
                eprintln!("[OSG-WATCH] alert state unavailable: {err}");
                self.log.record(&LogEntry::failure(EventType::Error, &err));
                self.notifications.notify(&NotificationEvent::Error {
                    code: err.code().to_string(),
                    message: err.to_string(),
                });
                return TickOutcome::Failed { code: err.code() };
            }
        };

        match decision {
            AlertDecision::Notify { percent, severity } => {
                let response = self.alert(&snapshot, percent, severity);
                TickOutcome::Alerted {
                    percent,
                    severity,
                    response,
                }
            }
            AlertDecision::Suppressed { percent } => TickOutcome::Suppressed { percent },
            AlertDecision::Eased { from, to } => TickOutcome::Eased { from, to },
            AlertDecision::Reset { previous } => {
                let mount = snapshot.mount_point.to_string_lossy().into_owned();
                let mut entry = LogEntry::new(EventType::UsageReset, Severity::Info);
                entry.percent = snapshot.percent_used;
                entry.mount_point = Some(mount.clone());
                entry.details = Some(format!("previously alerted at {previous}%"));
                self.log.record(&entry);
                self.notifications.notify(&NotificationEvent::UsageReset {
                    mount,
                    percent: snapshot.percent_used,
                });
                TickOutcome::Reset { previous }
            }
            AlertDecision::Idle if snapshot.percent_used.is_none() => TickOutcome::Unknown,
            AlertDecision::Idle => TickOutcome::Idle,
        }
    }

    fn alert(
        &self,
        snapshot: &UsageSnapshot,
        percent: u8,
        severity: SeverityLevel,
    ) -> Option<AlertResponse> {
        let mount = snapshot.mount_point.to_string_lossy().into_owned();
        let mut entry = LogEntry::new(
            EventType::UsageAlert,
            if severity == SeverityLevel::Critical {
                Severity::Critical
            } else {
                Severity::Warning
            },
        );
        entry.percent = Some(percent);
        entry.level = Some(severity.label().to_string());
        entry.mount_point = Some(mount.clone());
        self.log.record(&entry);
        let event = NotificationEvent::UsageAlert {
            mount,
            percent,
            severity,
        };
        self.notifications.notify(&event);

        let report = StatusReport::new(snapshot.clone(), self.thresholds);
        let text = format!("{}\n{}", report.status_line(), report.advice());
        let response = match self.dialog.alert("Overlay disk space", &text, self.notify_timeout) {
            Ok(response) => response,
            Err(err) => {
                // Text fallback: the alert must still reach someone.
                eprintln!("[OSG-WATCH] WARNING: {} ({err})", event.summary());
                return None;
            }
        };

        if response == AlertResponse::OpenManager {
            if let Some(manager) = &self.manager {
                if let Err(err) = run_menu(self.dialog.as_ref(), manager.as_ref()) {
                    eprintln!("[OSG-WATCH] manager closed with error: {err}");
                }
            }
        }
        Some(response)
    }
}
