//! PAL trait and platform implementations (Linux statvfs/df, in-memory mock).

#![allow(missing_docs)]

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::core::errors::{OsgError, Result};

/// Filesystem statistics for a mount point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FsStats {
    /// Mount source (device or overlay name), as `df` would show it.
    pub filesystem: String,
    pub fs_type: String,
    pub mount_point: PathBuf,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub available_bytes: u64,
    /// `None` when the backend could not produce a valid percentage.
    pub percent_used: Option<u8>,
}

/// Mount-point metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MountPoint {
    pub path: PathBuf,
    pub device: String,
    pub fs_type: String,
}

/// How `LinuxPlatform` obtains filesystem statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeBackend {
    /// `statvfs(3)` via nix.
    #[default]
    Statvfs,
    /// `df -B1 --output=source,size,used,avail,pcent`.
    Df,
}

impl std::str::FromStr for ProbeBackend {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "statvfs" => Ok(Self::Statvfs),
            "df" => Ok(Self::Df),
            other => Err(format!("unknown probe backend {other:?} (expected statvfs or df)")),
        }
    }
}

/// OS abstraction used by the probe, the watch lock, and privileged commands.
pub trait Platform: Send + Sync {
    fn fs_stats(&self, path: &Path) -> Result<FsStats>;
    /// Whether the current process has administrative privileges.
    fn is_elevated(&self) -> bool;
    /// Whether a process with this PID currently exists.
    fn process_alive(&self, pid: u32) -> bool;
}

/// Linux platform implementation using `/proc/self/mounts` + statvfs or df.
#[derive(Debug)]
pub struct LinuxPlatform {
    backend: ProbeBackend,
    mounts_cache: RwLock<Option<(Vec<MountPoint>, Instant)>>,
    cache_ttl: Duration,
}

impl Default for LinuxPlatform {
    fn default() -> Self {
        Self::new(ProbeBackend::default())
    }
}

impl LinuxPlatform {
    #[must_use]
    pub fn new(backend: ProbeBackend) -> Self {
        Self {
            backend,
            mounts_cache: RwLock::new(None),
            cache_ttl: Duration::from_secs(5),
        }
    }

    fn mount_points(&self) -> Result<Vec<MountPoint>> {
        {
            let cache = self.mounts_cache.read();
            if let Some((mounts, collected_at)) = &*cache
                && collected_at.elapsed() < self.cache_ttl
            {
                return Ok(mounts.clone());
            }
        }

        let raw = fs::read_to_string("/proc/self/mounts")
            .map_err(|source| OsgError::io("/proc/self/mounts", source))?;
        let mounts = parse_proc_mounts(&raw);

        *self.mounts_cache.write() = Some((mounts.clone(), Instant::now()));
        Ok(mounts)
    }

    fn statvfs_stats(&self, path: &Path) -> Result<FsStats> {
        let mounts = self.mount_points()?;
        let mount = find_mount(path, &mounts).ok_or_else(|| OsgError::FsStats {
            path: path.to_path_buf(),
            details: "could not map path to mount point".to_string(),
        })?;
        let stat = nix::sys::statvfs::statvfs(path).map_err(|error| OsgError::FsStats {
            path: path.to_path_buf(),
            details: error.to_string(),
        })?;
        let fragment = stat.fragment_size();
        let total_bytes = stat.blocks().saturating_mul(fragment);
        let free_bytes = stat.blocks_free().saturating_mul(fragment);
        let available_bytes = stat.blocks_available().saturating_mul(fragment);
        let used_bytes = total_bytes.saturating_sub(free_bytes);
        Ok(FsStats {
            filesystem: mount.device.clone(),
            fs_type: mount.fs_type.clone(),
            mount_point: mount.path.clone(),
            total_bytes,
            used_bytes,
            available_bytes,
            percent_used: derive_percent(used_bytes, available_bytes),
        })
    }

    fn df_stats(&self, path: &Path) -> Result<FsStats> {
        let output = Command::new("df")
            .arg("-B1")
            .arg("--output=source,size,used,avail,pcent")
            .arg(path)
            .output()
            .map_err(|error| OsgError::FsStats {
                path: path.to_path_buf(),
                details: format!("failed to run df: {error}"),
            })?;
        if !output.status.success() {
            return Err(OsgError::FsStats {
                path: path.to_path_buf(),
                details: format!(
                    "df exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        let mut stats = parse_df_output(&String::from_utf8_lossy(&output.stdout), path)?;
        if let Ok(mounts) = self.mount_points()
            && let Some(mount) = find_mount(path, &mounts)
        {
            stats.fs_type.clone_from(&mount.fs_type);
            stats.mount_point.clone_from(&mount.path);
        }
        Ok(stats)
    }
}

impl Platform for LinuxPlatform {
    fn fs_stats(&self, path: &Path) -> Result<FsStats> {
        match self.backend {
            ProbeBackend::Statvfs => self.statvfs_stats(path),
            ProbeBackend::Df => self.df_stats(path),
        }
    }

    fn is_elevated(&self) -> bool {
        nix::unistd::geteuid().is_root()
    }

    fn process_alive(&self, pid: u32) -> bool {
        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        if raw <= 0 {
            return false;
        }
        match nix::sys::signal::kill(nix::unistd::Pid::from_raw(raw), None) {
            Ok(()) | Err(nix::errno::Errno::EPERM) => true,
            Err(_) => false,
        }
    }
}

/// In-memory mock implementation for deterministic tests.
///
/// Stats can be swapped between calls so watch-loop tests can feed a sequence
/// of usage readings.
#[derive(Debug, Default)]
pub struct MockPlatform {
    stats_by_mount: RwLock<HashMap<PathBuf, FsStats>>,
    unavailable: RwLock<Option<String>>,
    alive_pids: RwLock<HashSet<u32>>,
    elevated: bool,
}

impl MockPlatform {
    #[must_use]
    pub fn new(stats: Vec<FsStats>, elevated: bool) -> Self {
        let stats_by_mount = stats
            .into_iter()
            .map(|s| (s.mount_point.clone(), s))
            .collect();
        Self {
            stats_by_mount: RwLock::new(stats_by_mount),
            unavailable: RwLock::new(None),
            alive_pids: RwLock::new(HashSet::new()),
            elevated,
        }
    }

    /// Replace the stats reported for `stats.mount_point`.
    pub fn set_stats(&self, stats: FsStats) {
        *self.unavailable.write() = None;
        self.stats_by_mount
            .write()
            .insert(stats.mount_point.clone(), stats);
    }

    /// Make every subsequent `fs_stats` call fail until `set_stats` is called.
    pub fn set_unavailable(&self, details: &str) {
        *self.unavailable.write() = Some(details.to_string());
    }

    pub fn mark_alive(&self, pid: u32) {
        self.alive_pids.write().insert(pid);
    }

    pub fn mark_dead(&self, pid: u32) {
        self.alive_pids.write().remove(&pid);
    }
}

impl Platform for MockPlatform {
    fn fs_stats(&self, path: &Path) -> Result<FsStats> {
        if let Some(details) = self.unavailable.read().clone() {
            return Err(OsgError::FsStats {
                path: path.to_path_buf(),
                details,
            });
        }
        let stats = self.stats_by_mount.read();
        stats
            .iter()
            .filter(|(mount, _)| path.starts_with(mount))
            .max_by_key(|(mount, _)| mount.as_os_str().len())
            .map(|(_, s)| s.clone())
            .ok_or_else(|| OsgError::FsStats {
                path: path.to_path_buf(),
                details: "mock stats not found".to_string(),
            })
    }

    fn is_elevated(&self) -> bool {
        self.elevated
    }

    fn process_alive(&self, pid: u32) -> bool {
        self.alive_pids.read().contains(&pid)
    }
}

/// Detect active platform implementation.
pub fn detect_platform(backend: ProbeBackend) -> Result<Arc<dyn Platform>> {
    #[cfg(target_os = "linux")]
    {
        Ok(Arc::new(LinuxPlatform::new(backend)))
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = backend;
        Err(OsgError::UnsupportedPlatform {
            details: "only Linux is currently implemented".to_string(),
        })
    }
}

/// Percent used the way `df` rounds it: `ceil(used * 100 / (used + avail))`.
///
/// Reserved blocks are excluded from the denominator, so a full filesystem
/// reads 100 even when root still has headroom.
#[must_use]
pub fn derive_percent(used_bytes: u64, available_bytes: u64) -> Option<u8> {
    let denom = u128::from(used_bytes) + u128::from(available_bytes);
    if denom == 0 {
        return None;
    }
    let pct = (u128::from(used_bytes) * 100).div_ceil(denom);
    u8::try_from(pct).ok().filter(|p| *p <= 100)
}

/// Validate a `df`-style percent field ("86%", "86", " 7% ").
///
/// Anything that is not a plain integer in `0..=100` is `None`.
#[must_use]
pub fn parse_percent(raw: &str) -> Option<u8> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_suffix('%').unwrap_or(trimmed);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u8>().ok().filter(|p| *p <= 100)
}

/// Parse `df -B1 --output=source,size,used,avail,pcent` output.
pub fn parse_df_output(raw: &str, path: &Path) -> Result<FsStats> {
    let line = raw
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .last()
        .ok_or_else(|| OsgError::FsStats {
            path: path.to_path_buf(),
            details: "df produced no data row".to_string(),
        })?;
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 4 {
        return Err(OsgError::FsStats {
            path: path.to_path_buf(),
            details: format!("unexpected df row: {line:?}"),
        });
    }
    let number = |idx: usize, name: &str| {
        fields[idx]
            .parse::<u64>()
            .map_err(|error| OsgError::FsStats {
                path: path.to_path_buf(),
                details: format!("invalid df {name} field {:?}: {error}", fields[idx]),
            })
    };
    Ok(FsStats {
        filesystem: fields[0].to_string(),
        fs_type: String::new(),
        mount_point: path.to_path_buf(),
        total_bytes: number(1, "size")?,
        used_bytes: number(2, "used")?,
        available_bytes: number(3, "avail")?,
        percent_used: fields.get(4).and_then(|raw| parse_percent(raw)),
    })
}

fn parse_proc_mounts(raw: &str) -> Vec<MountPoint> {
    let mut mounts = Vec::new();
    for line in raw.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            eprintln!("[OSG-PROBE] skipping malformed /proc/self/mounts line: {line}");
            continue;
        }
        mounts.push(MountPoint {
            path: unescape_mount_path(fields[1]),
            device: fields[0].to_string(),
            fs_type: fields[2].to_string(),
        });
    }
    mounts
}

fn find_mount<'a>(path: &Path, mounts: &'a [MountPoint]) -> Option<&'a MountPoint> {
    // max_by_key keeps the last maximum, so a later entry at the same path
    // (overlay over rootfs) wins.
    mounts
        .iter()
        .filter(|mount| path.starts_with(&mount.path))
        .max_by_key(|mount| mount.path.as_os_str().len())
}

/// Decode octal escape sequences (`\NNN`) used by the Linux kernel.
fn unescape_mount_path(raw: &str) -> PathBuf {
    let mut bytes = Vec::with_capacity(raw.len());
    let raw_bytes = raw.as_bytes();
    let mut i = 0;
    while i < raw_bytes.len() {
        if raw_bytes[i] == b'\\' && i + 3 < raw_bytes.len() {
            let a = raw_bytes[i + 1];
            let b = raw_bytes[i + 2];
            let c = raw_bytes[i + 3];
            if (b'0'..=b'7').contains(&a)
                && (b'0'..=b'7').contains(&b)
                && (b'0'..=b'7').contains(&c)
            {
                bytes.push((a - b'0') * 64 + (b - b'0') * 8 + (c - b'0'));
                i += 4;
                continue;
            }
        }
        bytes.push(raw_bytes[i]);
        i += 1;
    }

    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStringExt;
        PathBuf::from(std::ffi::OsString::from_vec(bytes))
    }
    #[cfg(not(unix))]
    {
        PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mount_table() {
        let sample = "/dev/sda1 / ext4 rw,relatime 0 0\n\
                      tmpfs /tmp tmpfs rw,nosuid,nodev 0 0\n";
        let mounts = parse_proc_mounts(sample);
        assert_eq!(mounts.len(), 2);
        assert!(mounts.iter().any(|m| m.path == Path::new("/tmp")));
        assert!(mounts.iter().any(|m| m.fs_type == "ext4"));
    }

    #[test]
    fn later_overlay_mount_shadows_rootfs() {
        let sample = "rootfs / rootfs rw 0 0\n\
                      overlay / overlay rw,lowerdir=/ro,upperdir=/rw 0 0\n";
        let mounts = parse_proc_mounts(sample);
        let mount = find_mount(Path::new("/home/live"), &mounts).expect("mount");
        assert_eq!(mount.device, "overlay");
        assert_eq!(mount.fs_type, "overlay");
    }

    #[test]
    fn find_mount_prefers_longest_prefix() {
        let mounts = parse_proc_mounts("/dev/sda1 / ext4 rw 0 0\ntmpfs /tmp tmpfs rw 0 0\n");
        let mount = find_mount(Path::new("/tmp/work"), &mounts).expect("mount expected");
        assert_eq!(mount.path, Path::new("/tmp"));
    }

    #[test]
    fn unescapes_octal_sequences() {
        assert_eq!(unescape_mount_path("/mnt/my\\040dir"), Path::new("/mnt/my dir"));
        assert_eq!(unescape_mount_path("/mnt/simple"), Path::new("/mnt/simple"));
        assert_eq!(unescape_mount_path("/mnt/a\\04"), Path::new("/mnt/a\\04"));
    }

    #[test]
    fn derive_percent_rounds_up_like_df() {
        assert_eq!(derive_percent(86_000, 14_000), Some(86));
        assert_eq!(derive_percent(86_001, 13_999), Some(87));
        assert_eq!(derive_percent(0, 100), Some(0));
        assert_eq!(derive_percent(100, 0), Some(100));
        assert_eq!(derive_percent(0, 0), None);
        assert_eq!(derive_percent(u64::MAX, u64::MAX), Some(50));
    }

    #[test]
    fn parse_percent_accepts_only_plain_integers() {
        assert_eq!(parse_percent("86%"), Some(86));
        assert_eq!(parse_percent(" 7% "), Some(7));
        assert_eq!(parse_percent("100"), Some(100));
        assert_eq!(parse_percent("-"), None);
        assert_eq!(parse_percent(""), None);
        assert_eq!(parse_percent("%"), None);
        assert_eq!(parse_percent("-5%"), None);
        assert_eq!(parse_percent("8.5%"), None);
        assert_eq!(parse_percent("101%"), None);
        assert_eq!(parse_percent("999999%"), None);
    }

    #[test]
    fn parses_df_output() {
        let raw = "Filesystem          1B-blocks         Used   Available Use%\n\
                   overlay           104857600000  90177536000 14680064000  86%\n";
        let stats = parse_df_output(raw, Path::new("/")).expect("df should parse");
        assert_eq!(stats.filesystem, "overlay");
        assert_eq!(stats.total_bytes, 104_857_600_000);
        assert_eq!(stats.used_bytes, 90_177_536_000);
        assert_eq!(stats.available_bytes, 14_680_064_000);
        assert_eq!(stats.percent_used, Some(86));
    }

    #[test]
    fn df_dash_percent_is_unknown_not_zero() {
        let raw = "Filesystem 1B-blocks Used Available Use%\n\
                   proc 0 0 0 -\n";
        let stats = parse_df_output(raw, Path::new("/proc")).expect("row parses");
        assert_eq!(stats.percent_used, None);
    }

    #[test]
    fn df_without_data_row_is_probe_failure() {
        let err = parse_df_output("Filesystem 1B-blocks Used Available Use%\n", Path::new("/"))
            .expect_err("header only");
        assert_eq!(err.code(), "OSG-2001");
    }

    #[test]
    fn probe_backend_parses_from_str() {
        assert_eq!("DF".parse::<ProbeBackend>(), Ok(ProbeBackend::Df));
        assert_eq!("statvfs".parse::<ProbeBackend>(), Ok(ProbeBackend::Statvfs));
        assert!("stat".parse::<ProbeBackend>().is_err());
    }

    #[test]
    fn mock_platform_reports_liveness_and_outages() {
        let platform = MockPlatform::new(Vec::new(), false);
        assert!(!platform.process_alive(42));
        platform.mark_alive(42);
        assert!(platform.process_alive(42));
        platform.mark_dead(42);
        assert!(!platform.process_alive(42));

        platform.set_unavailable("stat tool missing");
        let err = platform.fs_stats(Path::new("/")).expect_err("unavailable");
        assert!(err.to_string().contains("stat tool missing"));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn linux_platform_sees_own_process() {
        let platform = LinuxPlatform::default();
        assert!(platform.process_alive(std::process::id()));
        assert!(!platform.process_alive(0));
    }
}
