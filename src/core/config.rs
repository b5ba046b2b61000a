//! Configuration system: TOML file + `OSG_*` env overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cleanup::engine::{CacheTarget, compile_pattern};
use crate::core::errors::{OsgError, Result};
use crate::core::paths::{expand_home, invoking_user_home};
use crate::daemon::notifications::NotificationConfig;
use crate::monitor::severity::Thresholds;
use crate::platform::pal::ProbeBackend;
use crate::relocation::engine::RelocationEntry;
use crate::ui::dialog::DialogPreference;

/// Full OSG configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub thresholds: Thresholds,
    pub watch: WatchConfig,
    pub probe: ProbeConfig,
    pub cleanup: CleanupConfig,
    pub relocation: RelocationConfig,
    pub paths: PathsConfig,
    pub ui: UiConfig,
    pub notifications: NotificationConfig,
}

/// Watch loop knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WatchConfig {
    /// Mount point of the overlay to watch.
    pub mount_point: PathBuf,
    pub poll_interval_secs: u64,
    /// How long the alert dialog stays up before timing out.
    pub notify_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ProbeConfig {
    pub backend: ProbeBackend,
}

/// What `clean` touches. Targets run in declared order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CleanupConfig {
    pub targets: Vec<CacheTarget>,
    pub log_dirs: Vec<PathBuf>,
    /// Live logs above this size are truncated in place.
    pub log_truncate_bytes: u64,
    /// Regexes matched against log file names; matches are deleted.
    pub stale_log_patterns: Vec<String>,
    /// Regexes for log files that are never truncated or deleted, such as
    /// journald's mmapped journals.
    pub keep_log_patterns: Vec<String>,
}

/// What `move` relocates and where to by default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RelocationConfig {
    pub destination_root: PathBuf,
    pub sources: Vec<RelocationEntry>,
}

/// Filesystem paths used by osg itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    /// Holds the watcher's PID.
    pub lock_file: PathBuf,
    /// Holds the last alerted percent (0 when idle).
    pub alert_state_file: PathBuf,
    pub jsonl_log: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct UiConfig {
    pub dialog: DialogPreference,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            mount_point: PathBuf::from("/"),
            poll_interval_secs: 60,
            notify_timeout_secs: 30,
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            targets: vec![
                CacheTarget::contents("~/.cache"),
                CacheTarget::contents("~/.local/share/Trash/files"),
                CacheTarget::contents("~/.local/share/Trash/info"),
                CacheTarget::directory("~/.thumbnails"),
                CacheTarget::contents("/var/cache/apt/archives"),
                CacheTarget::contents("/var/crash"),
            ],
            log_dirs: vec![PathBuf::from("/var/log")],
            log_truncate_bytes: 10 * 1024 * 1024,
            stale_log_patterns: vec![
                r"\.\d+$".to_string(),
                r"\.(gz|xz|bz2|zst)$".to_string(),
                r"\.old$".to_string(),
                r"-\d{8}$".to_string(),
            ],
            keep_log_patterns: vec![
                r"\.journal~?$".to_string(),
                r"^(wtmp|btmp|lastlog)$".to_string(),
            ],
        }
    }
}

impl Default for RelocationConfig {
    fn default() -> Self {
        let source = |dir: &str| RelocationEntry::new(format!("~/{dir}"), dir);
        Self {
            destination_root: PathBuf::from("/mnt/data/osg-relocated"),
            sources: vec![
                source("Downloads"),
                source("Documents"),
                source("Pictures"),
                source("Music"),
                source("Videos"),
            ],
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let data = PathBuf::from("~/.local/share/osg");
        Self {
            config_file: PathBuf::from("~/.config/osg/config.toml"),
            lock_file: data.join("watch.pid"),
            alert_state_file: data.join("alert-state"),
            jsonl_log: data.join("activity.jsonl"),
        }
    }
}

/// Top-level directories a cleanup target may never be.
const PROTECTED_ROOTS: &[&str] = &[
    "/", "/bin", "/boot", "/dev", "/etc", "/home", "/lib", "/proc", "/root", "/sbin", "/sys",
    "/usr", "/var",
];

impl Config {
    /// Default configuration path for the invoking user.
    #[must_use]
    pub fn default_path() -> PathBuf {
        expand_home(&PathsConfig::default().config_file, &invoking_user_home())
    }

    /// Load config from the default or an explicit path, then apply env overrides.
    ///
    /// A missing file at the default path yields defaults; a missing explicit
    /// file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let home = invoking_user_home();
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| OsgError::io(&path_buf, source))?;
            toml::from_str::<Self>(&raw)?
        } else if path.is_some() {
            return Err(OsgError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.expand_user_paths(&home);
        cfg.validate()?;
        cfg.reject_home_as_target(&home)?;
        Ok(cfg)
    }

    /// Deterministic FNV-1a hash of the effective config, for logs.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("OSG_WARN_PCT") {
            self.thresholds.warn_pct = parse_env("OSG_WARN_PCT", &raw)?;
        }
        if let Some(raw) = lookup("OSG_CRITICAL_PCT") {
            self.thresholds.critical_pct = parse_env("OSG_CRITICAL_PCT", &raw)?;
        }
        if let Some(raw) = lookup("OSG_MOUNT_POINT") {
            self.watch.mount_point = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("OSG_POLL_INTERVAL_SECS") {
            self.watch.poll_interval_secs = parse_env("OSG_POLL_INTERVAL_SECS", &raw)?;
        }
        if let Some(raw) = lookup("OSG_PROBE_BACKEND") {
            self.probe.backend = raw.parse().map_err(|details: String| OsgError::ConfigParse {
                context: "env",
                details: format!("OSG_PROBE_BACKEND={raw:?}: {details}"),
            })?;
        }
        if let Some(raw) = lookup("OSG_DESTINATION_ROOT") {
            self.relocation.destination_root = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("OSG_DIALOG") {
            self.ui.dialog = raw.parse().map_err(|details: String| OsgError::ConfigParse {
                context: "env",
                details: format!("OSG_DIALOG={raw:?}: {details}"),
            })?;
        }
        Ok(())
    }

    /// Expand `~` against `home` and strip trailing slashes.
    fn expand_user_paths(&mut self, home: &Path) {
        let fix = |path: &mut PathBuf| *path = strip_trailing_slash(&expand_home(path, home));

        fix(&mut self.watch.mount_point);
        for target in &mut self.cleanup.targets {
            fix(&mut target.path);
        }
        for dir in &mut self.cleanup.log_dirs {
            fix(dir);
        }
        fix(&mut self.relocation.destination_root);
        for source in &mut self.relocation.sources {
            fix(&mut source.path);
        }
        fix(&mut self.paths.config_file);
        fix(&mut self.paths.lock_file);
        fix(&mut self.paths.alert_state_file);
        fix(&mut self.paths.jsonl_log);
        fix(&mut self.notifications.file.path);
    }

    fn validate(&self) -> Result<()> {
        let Thresholds {
            warn_pct,
            critical_pct,
        } = self.thresholds;
        if !(warn_pct > 0 && warn_pct < critical_pct && critical_pct <= 100) {
            return Err(invalid(format!(
                "thresholds must satisfy 0 < warn_pct < critical_pct <= 100, got warn={warn_pct} critical={critical_pct}"
            )));
        }

        if self.watch.poll_interval_secs == 0 {
            return Err(invalid("watch.poll_interval_secs must be >= 1"));
        }
        if self.watch.notify_timeout_secs == 0 {
            return Err(invalid("watch.notify_timeout_secs must be >= 1"));
        }
        require_absolute("watch.mount_point", &self.watch.mount_point)?;

        if self.cleanup.log_truncate_bytes == 0 {
            return Err(invalid("cleanup.log_truncate_bytes must be > 0"));
        }
        for pattern in &self.cleanup.stale_log_patterns {
            compile_pattern("stale_log_patterns", pattern)?;
        }
        for pattern in &self.cleanup.keep_log_patterns {
            compile_pattern("keep_log_patterns", pattern)?;
        }
        for target in &self.cleanup.targets {
            require_absolute("cleanup.targets", &target.path)?;
            if PROTECTED_ROOTS.iter().any(|root| target.path == Path::new(root)) {
                return Err(invalid(format!(
                    "cleanup target {} is a protected system directory",
                    target.path.display()
                )));
            }
        }
        for dir in &self.cleanup.log_dirs {
            require_absolute("cleanup.log_dirs", dir)?;
        }

        require_absolute("relocation.destination_root", &self.relocation.destination_root)?;
        for source in &self.relocation.sources {
            require_absolute("relocation.sources", &source.path)?;
            if source.name.trim().is_empty() {
                return Err(invalid(format!(
                    "relocation source {} needs a non-empty name",
                    source.path.display()
                )));
            }
        }

        Ok(())
    }

    fn reject_home_as_target(&self, home: &Path) -> Result<()> {
        let home = strip_trailing_slash(home);
        match self.cleanup.targets.iter().find(|t| t.path == home) {
            Some(target) => Err(invalid(format!(
                "cleanup target {} is the user's home directory",
                target.path.display()
            ))),
            None => Ok(()),
        }
    }
}

fn invalid(details: impl Into<String>) -> OsgError {
    OsgError::InvalidConfig {
        details: details.into(),
    }
}

fn require_absolute(field: &str, path: &Path) -> Result<()> {
    if path.is_absolute() {
        Ok(())
    } else {
        Err(invalid(format!(
            "{field}: {} must be an absolute path or start with ~/",
            path.display()
        )))
    }
}

fn strip_trailing_slash(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_suffix('/') {
        Some(stripped) if s.len() > 1 => PathBuf::from(stripped),
        _ => path.to_path_buf(),
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|error| OsgError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}
