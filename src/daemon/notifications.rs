//! Multi-channel notification records: desktop, file, and journal channels.
//!
//! These are the passive record of what the watcher saw. The interactive
//! alert (the timed dialog with an "Open manager" action) lives in
//! `ui::dialog`. Each channel is fire-and-forget; failures never reach the
//! watch loop.

#![allow(missing_docs)]

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

use serde::{Deserialize, Serialize};

use crate::monitor::report::format_bytes;
use crate::monitor::severity::SeverityLevel;

// ──────────────────── notification level ────────────────────

/// Severity used for per-channel filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Warning,
    Critical,
}

impl NotificationLevel {
    #[must_use]
    pub const fn from_severity(level: SeverityLevel) -> Self {
        match level {
            SeverityLevel::Critical => Self::Critical,
            SeverityLevel::Warning => Self::Warning,
            SeverityLevel::Ok | SeverityLevel::Unknown => Self::Info,
        }
    }
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

// ──────────────────── notification events ────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    UsageAlert {
        mount: String,
        percent: u8,
        severity: SeverityLevel,
    },
    UsageReset {
        mount: String,
        percent: Option<u8>,
    },
    CleanupCompleted {
        entries_removed: usize,
        bytes_freed: u64,
    },
    RelocationCompleted {
        moved: usize,
        destination_root: String,
    },
    WatchStarted {
        version: String,
        mount: String,
    },
    WatchStopped {
        reason: String,
        uptime_secs: u64,
    },
    Error {
        code: String,
        message: String,
    },
}

impl NotificationEvent {
    #[must_use]
    pub fn level(&self) -> NotificationLevel {
        match self {
            Self::UsageAlert { severity, .. } => NotificationLevel::from_severity(*severity),
            Self::Error { .. } => NotificationLevel::Warning,
            Self::UsageReset { .. }
            | Self::CleanupCompleted { .. }
            | Self::RelocationCompleted { .. }
            | Self::WatchStarted { .. }
            | Self::WatchStopped { .. } => NotificationLevel::Info,
        }
    }

    /// Short human-readable summary line.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::UsageAlert {
                mount,
                percent,
                severity,
            } => format!("{severity}: overlay {mount} is {percent}% full"),
            Self::UsageReset { mount, percent } => match percent {
                Some(pct) => format!("Overlay {mount} back to {pct}% used"),
                None => format!("Overlay {mount} usage unknown; alert state cleared"),
            },
            Self::CleanupCompleted {
                entries_removed,
                bytes_freed,
            } => format!(
                "Cleanup removed {entries_removed} item(s), ~{} reclaimed",
                format_bytes(*bytes_freed)
            ),
            Self::RelocationCompleted {
                moved,
                destination_root,
            } => format!("Moved {moved} folder(s) to {destination_root}"),
            Self::WatchStarted { version, mount } => {
                format!("osg v{version} watching {mount}")
            }
            Self::WatchStopped {
                reason,
                uptime_secs,
            } => {
                let hours = uptime_secs / 3600;
                let minutes = (uptime_secs % 3600) / 60;
                format!("osg watch stopped ({reason}) after {hours}h {minutes}m")
            }
            Self::Error { code, message } => format!("[{code}] {message}"),
        }
    }
}

// ──────────────────── configuration ────────────────────

/// The `[notifications]` config section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NotificationConfig {
    /// Master switch for all channels.
    pub enabled: bool,
    /// Which channel names to activate.
    pub channels: Vec<String>,
    pub desktop: DesktopConfig,
    pub file: FileConfig,
    pub journal: JournalConfig,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channels: vec!["journal".to_string(), "file".to_string()],
            desktop: DesktopConfig::default(),
            file: FileConfig::default(),
            journal: JournalConfig::default(),
        }
    }
}

/// notify-send settings. Off by default; the alert dialog already pops up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DesktopConfig {
    pub enabled: bool,
    pub min_level: NotificationLevel,
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_level: NotificationLevel::Critical,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FileConfig {
    pub path: PathBuf,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("~/.local/share/osg/notifications.jsonl"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct JournalConfig {
    pub min_level: NotificationLevel,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            min_level: NotificationLevel::Warning,
        }
    }
}

// ──────────────────── JSONL record ────────────────────

#[derive(Debug, Serialize)]
struct NotificationRecord {
    ts: String,
    level: NotificationLevel,
    summary: String,
    #[serde(flatten)]
    event: NotificationEvent,
}

// ──────────────────── notification channels ────────────────────

trait Channel: Send + Sync {
    fn name(&self) -> &'static str;
    fn send(&self, event: &NotificationEvent);
}

// ──── Desktop (notify-send) ────

struct DesktopChannel {
    min_level: NotificationLevel,
}

impl Channel for DesktopChannel {
    fn name(&self) -> &'static str {
        "desktop"
    }

    fn send(&self, event: &NotificationEvent) {
        if event.level() < self.min_level {
            return;
        }
        let urgency = match event.level() {
            NotificationLevel::Critical => "critical",
            NotificationLevel::Warning => "normal",
            NotificationLevel::Info => "low",
        };
        let _ = Command::new("notify-send")
            .arg("--urgency")
            .arg(urgency)
            .arg("--app-name=osg")
            .arg("Overlay Space Guard")
            .arg(event.summary())
            .spawn();
    }
}

// ──── File (append-only JSONL) ────

struct FileChannel {
    path: PathBuf,
}

impl Channel for FileChannel {
    fn name(&self) -> &'static str {
        "file"
    }

    fn send(&self, event: &NotificationEvent) {
        let record = NotificationRecord {
            ts: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            level: event.level(),
            summary: event.summary(),
            event: event.clone(),
        };
        let Ok(json) = serde_json::to_string(&record) else {
            return;
        };

        if let Some(parent) = self.path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let file = {
            let mut opts = OpenOptions::new();
            opts.create(true).append(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt as _;
                opts.mode(0o600);
            }
            opts.open(&self.path)
        };
        match file {
            Ok(mut f) => {
                let _ = writeln!(f, "{json}");
            }
            Err(err) => eprintln!(
                "[OSG-NOTIFY] cannot append to {}: {err}",
                self.path.display()
            ),
        }
    }
}

// ──── Journal (stderr, captured by systemd or the terminal) ────

struct JournalChannel {
    min_level: NotificationLevel,
}

impl Channel for JournalChannel {
    fn name(&self) -> &'static str {
        "journal"
    }

    fn send(&self, event: &NotificationEvent) {
        if event.level() < self.min_level {
            return;
        }
        let priority = match event.level() {
            NotificationLevel::Critical => "CRIT",
            NotificationLevel::Warning => "WARNING",
            NotificationLevel::Info => "INFO",
        };
        eprintln!("[OSG-NOTIFY] [{priority}] {}", event.summary());
    }
}

// ──────────────────── notification manager ────────────────────

/// Dispatches events to every enabled channel.
pub struct NotificationManager {
    channels: Vec<Box<dyn Channel>>,
    enabled: bool,
}

impl NotificationManager {
    #[must_use]
    pub fn from_config(config: &NotificationConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }

        let mut channels: Vec<Box<dyn Channel>> = Vec::new();
        for channel_name in &config.channels {
            match channel_name.as_str() {
                "desktop" if config.desktop.enabled => {
                    channels.push(Box::new(DesktopChannel {
                        min_level: config.desktop.min_level,
                    }));
                }
                "file" => channels.push(Box::new(FileChannel {
                    path: config.file.path.clone(),
                })),
                "journal" => channels.push(Box::new(JournalChannel {
                    min_level: config.journal.min_level,
                })),
                other => {
                    eprintln!("[OSG-NOTIFY] skipping unknown or disabled channel {other:?}");
                }
            }
        }

        Self {
            channels,
            enabled: true,
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self {
            channels: Vec::new(),
            enabled: false,
        }
    }

    pub fn notify(&self, event: &NotificationEvent) {
        if !self.enabled {
            return;
        }
        for channel in &self.channels {
            channel.send(event);
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }
}

// ──────────────────── tests ────────────────────
