//! Cleanup engine: empties configured cache/trash directories and tames log files.
//!
//! Only configured paths are touched. Symlinks below a target are removed as
//! links, never followed. Per-path failures are recorded in the report and the
//! remaining steps still run; `clean()` itself cannot fail.

#![allow(missing_docs)]

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::config::CleanupConfig;
use crate::core::errors::{OsgError, Result};

/// What to remove for a cache target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetMode {
    /// Remove everything inside, keep the directory.
    #[default]
    Contents,
    /// Remove the directory itself; its owner recreates it.
    Directory,
}

/// One configured cache/trash location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheTarget {
    pub path: PathBuf,
    #[serde(default)]
    pub mode: TargetMode,
}

impl CacheTarget {
    #[must_use]
    pub fn contents(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: TargetMode::Contents,
        }
    }

    #[must_use]
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: TargetMode::Directory,
        }
    }
}

/// Log handling rules.
#[derive(Debug, Clone)]
pub struct LogPolicy {
    pub dirs: Vec<PathBuf>,
    /// Live logs larger than this are truncated in place.
    pub truncate_above_bytes: u64,
    /// File names matching any pattern are rotated/stale and deleted.
    pub stale_patterns: Vec<Regex>,
    /// File names matching any pattern are never truncated or deleted.
    pub keep_patterns: Vec<Regex>,
}

impl LogPolicy {
    fn is_stale(&self, path: &Path) -> bool {
        matches_any(&self.stale_patterns, path)
    }

    fn is_kept(&self, path: &Path) -> bool {
        matches_any(&self.keep_patterns, path)
    }
}

fn matches_any(patterns: &[Regex], path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    patterns.iter().any(|re| re.is_match(name))
}

/// A single removal that did not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Summary of one `clean()` pass.
#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    pub targets_cleaned: usize,
    pub targets_missing: usize,
    pub entries_removed: usize,
    pub logs_truncated: usize,
    pub logs_deleted: usize,
    /// Best-effort estimate from sizes observed before removal.
    pub bytes_freed: u64,
    pub failures: Vec<CleanupFailure>,
    pub duration: Duration,
}

impl CleanupReport {
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Cleaned {} location(s): {} item(s) removed, {} log(s) truncated, {} stale log(s) deleted, ~{} reclaimed.",
            self.targets_cleaned,
            self.entries_removed,
            self.logs_truncated,
            self.logs_deleted,
            crate::monitor::report::format_bytes(self.bytes_freed),
        );
        if !self.failures.is_empty() {
            out.push_str(&format!(" {} path(s) could not be removed.", self.failures.len()));
        }
        out
    }

    fn fail(&mut self, path: &Path, error: &std::io::Error) {
        self.failures.push(CleanupFailure {
            path: path.to_path_buf(),
            error: error.to_string(),
        });
    }
}

/// Runs the configured cleanup steps in declared order.
#[derive(Debug, Clone)]
pub struct CleanupEngine {
    targets: Vec<CacheTarget>,
    logs: LogPolicy,
}

impl CleanupEngine {
    #[must_use]
    pub fn new(targets: Vec<CacheTarget>, logs: LogPolicy) -> Self {
        Self { targets, logs }
    }

    pub fn from_config(config: &CleanupConfig) -> Result<Self> {
        let compile_all = |key: &str, raw: &[String]| {
            raw.iter()
                .map(|pattern| compile_pattern(key, pattern))
                .collect::<Result<Vec<_>>>()
        };
        Ok(Self::new(
            config.targets.clone(),
            LogPolicy {
                dirs: config.log_dirs.clone(),
                truncate_above_bytes: config.log_truncate_bytes,
                stale_patterns: compile_all("stale_log_patterns", &config.stale_log_patterns)?,
                keep_patterns: compile_all("keep_log_patterns", &config.keep_log_patterns)?,
            },
        ))
    }

    pub fn clean(&self) -> CleanupReport {
        let start = Instant::now();
        let mut report = CleanupReport::default();

        for target in &self.targets {
            self.clean_target(target, &mut report);
        }
        for dir in &self.logs.dirs {
            self.clean_log_dir(dir, &mut report);
        }

        report.duration = start.elapsed();
        report
    }

    fn clean_target(&self, target: &CacheTarget, report: &mut CleanupReport) {
        let meta = match fs::symlink_metadata(&target.path) {
            Ok(meta) => meta,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                report.targets_missing += 1;
                return;
            }
            Err(err) => {
                report.fail(&target.path, &err);
                return;
            }
        };

        match target.mode {
            TargetMode::Directory => {
                let size = tree_size(&target.path);
                let removed = if meta.is_dir() {
                    fs::remove_dir_all(&target.path)
                } else {
                    fs::remove_file(&target.path)
                };
                match removed {
                    Ok(()) => {
                        report.entries_removed += 1;
                        report.bytes_freed += size;
                        report.targets_cleaned += 1;
                    }
                    Err(err) if err.kind() == ErrorKind::NotFound => report.targets_missing += 1,
                    Err(err) => report.fail(&target.path, &err),
                }
            }
            TargetMode::Contents => {
                let entries = match fs::read_dir(&target.path) {
                    Ok(entries) => entries,
                    Err(err) => {
                        report.fail(&target.path, &err);
                        return;
                    }
                };
                for entry in entries {
                    match entry {
                        Ok(entry) => remove_entry(&entry.path(), report),
                        Err(err) => report.fail(&target.path, &err),
                    }
                }
                report.targets_cleaned += 1;
            }
        }
    }

    fn clean_log_dir(&self, dir: &Path, report: &mut CleanupReport) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                report.targets_missing += 1;
                return;
            }
            Err(err) => {
                report.fail(dir, &err);
                return;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    report.fail(dir, &err);
                    continue;
                }
            };
            let path = entry.path();
            let Ok(meta) = fs::symlink_metadata(&path) else {
                continue;
            };
            if meta.is_dir() {
                self.clean_log_dir(&path, report);
            } else if meta.is_file() && !self.logs.is_kept(&path) {
                self.handle_log_file(&path, meta.len(), report);
            }
        }
    }

    fn handle_log_file(&self, path: &Path, size: u64, report: &mut CleanupReport) {
        if self.logs.is_stale(path) {
            match fs::remove_file(path) {
                Ok(()) => {
                    report.logs_deleted += 1;
                    report.bytes_freed += size;
                }
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => report.fail(path, &err),
            }
        } else if size > self.logs.truncate_above_bytes {
            // set_len keeps the inode, so writers holding the file open keep working.
            match OpenOptions::new().write(true).open(path).and_then(|f| f.set_len(0)) {
                Ok(()) => {
                    report.logs_truncated += 1;
                    report.bytes_freed += size;
                }
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => report.fail(path, &err),
            }
        }
    }
}

/// Compile a log name pattern from `cleanup.<key>`, mapping errors to config errors.
pub fn compile_pattern(key: &str, raw: &str) -> Result<Regex> {
    Regex::new(raw).map_err(|error| OsgError::InvalidConfig {
        details: format!("cleanup.{key} entry {raw:?}: {error}"),
    })
}

fn remove_entry(path: &Path, report: &mut CleanupReport) {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return;
    };
    let size = tree_size(path);
    let removed = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match removed {
        Ok(()) => {
            report.entries_removed += 1;
            report.bytes_freed += size;
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => report.fail(path, &err),
    }
}

/// Apparent size of a tree without following symlinks.
fn tree_size(path: &Path) -> u64 {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return 0;
    };
    if !meta.is_dir() {
        return meta.len();
    }
    let Ok(entries) = fs::read_dir(path) else {
        return 0;
    };
    entries
        .filter_map(std::result::Result::ok)
        .map(|entry| tree_size(&entry.path()))
        .sum()
}
