//! Usage probe: one fresh filesystem snapshot per call, with "unknown" kept explicit.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::core::errors::Result;
use crate::platform::pal::{FsStats, Platform};

/// Point-in-time usage of the watched mount.
///
/// `percent_used` is `None` when the probe produced no valid percentage; it is
/// never defaulted to 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub filesystem: String,
    pub mount_point: PathBuf,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub available_bytes: u64,
    pub percent_used: Option<u8>,
}

impl UsageSnapshot {
    #[must_use]
    pub fn from_stats(stats: FsStats) -> Self {
        Self {
            filesystem: stats.filesystem,
            mount_point: stats.mount_point,
            total_bytes: stats.total_bytes,
            used_bytes: stats.used_bytes,
            available_bytes: stats.available_bytes,
            percent_used: stats.percent_used,
        }
    }

    /// Percent as display text: `"86%"` or `"unknown"`.
    #[must_use]
    pub fn percent_label(&self) -> String {
        self.percent_used
            .map_or_else(|| "unknown".to_string(), |pct| format!("{pct}%"))
    }
}

/// Probes one mount point through the platform layer.
#[derive(Clone)]
pub struct UsageProbe {
    platform: Arc<dyn Platform>,
    mount_point: PathBuf,
}

impl UsageProbe {
    #[must_use]
    pub fn new(platform: Arc<dyn Platform>, mount_point: impl Into<PathBuf>) -> Self {
        Self {
            platform,
            mount_point: mount_point.into(),
        }
    }

    #[must_use]
    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    /// Take a fresh snapshot. `Err` means the probe itself is unavailable.
    pub fn probe(&self) -> Result<UsageSnapshot> {
        self.platform
            .fs_stats(&self.mount_point)
            .map(UsageSnapshot::from_stats)
    }
}
