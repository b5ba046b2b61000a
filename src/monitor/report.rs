//! Status report rendering shared by the CLI, the menu, and alert dialogs.

#![allow(missing_docs)]
#![allow(clippy::cast_precision_loss)]

use serde_json::{Value, json};

use crate::monitor::severity::{SeverityLevel, Thresholds};
use crate::monitor::usage::UsageSnapshot;

/// A classified snapshot, ready to print.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub snapshot: UsageSnapshot,
    pub severity: SeverityLevel,
    pub thresholds: Thresholds,
}

impl StatusReport {
    #[must_use]
    pub fn new(snapshot: UsageSnapshot, thresholds: Thresholds) -> Self {
        let severity = thresholds.classify(snapshot.percent_used);
        Self {
            snapshot,
            severity,
            thresholds,
        }
    }

    /// df-style usage table (header + one row).
    #[must_use]
    pub fn render_table(&self) -> String {
        let s = &self.snapshot;
        format!(
            "{:<16} {:>10} {:>10} {:>10} {:>7}  {}\n{:<16} {:>10} {:>10} {:>10} {:>7}  {}\n",
            "Filesystem",
            "Size",
            "Used",
            "Avail",
            "Use%",
            "Mounted on",
            s.filesystem,
            format_bytes(s.total_bytes),
            format_bytes(s.used_bytes),
            format_bytes(s.available_bytes),
            s.percent_label(),
            s.mount_point.display(),
        )
    }

    /// One-line tier summary, e.g. `Status: WARNING (86% used; warn at 85%, critical at 95%)`.
    #[must_use]
    pub fn status_line(&self) -> String {
        format!(
            "Status: {} ({} used; warn at {}%, critical at {}%)",
            self.severity,
            self.snapshot.percent_label(),
            self.thresholds.warn_pct,
            self.thresholds.critical_pct,
        )
    }

    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self.severity {
            SeverityLevel::Ok => "Overlay has enough free space.",
            SeverityLevel::Warning => {
                "Overlay is filling up. Clean caches or move large folders off the overlay."
            }
            SeverityLevel::Critical => {
                "Overlay is almost full. Applications may fail to save data; free space now."
            }
            SeverityLevel::Unknown => "Overlay usage could not be determined.",
        }
    }

    /// Full plain-text report.
    #[must_use]
    pub fn render_human(&self) -> String {
        format!(
            "{}\n{}\n{}\n",
            self.render_table(),
            self.status_line(),
            self.advice()
        )
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        let s = &self.snapshot;
        json!({
            "filesystem": s.filesystem,
            "mount_point": s.mount_point.to_string_lossy(),
            "total_bytes": s.total_bytes,
            "used_bytes": s.used_bytes,
            "available_bytes": s.available_bytes,
            "percent_used": s.percent_used,
            "severity": self.severity,
            "thresholds": {
                "warn_pct": self.thresholds.warn_pct,
                "critical_pct": self.thresholds.critical_pct,
            },
        })
    }
}

/// Human-readable byte count with binary units.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    const GIB: u64 = 1024 * MIB;
    const TIB: u64 = 1024 * GIB;

    if bytes >= TIB {
        format!("{:.1} TB", bytes as f64 / TIB as f64)
    } else if bytes >= GIB {
        format!("{:.1} GB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}
