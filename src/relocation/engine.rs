//! Relocation: move large directories off the overlay and leave a symlink behind.
//!
//! Sources are processed in declared order. For each one:
//!
//! 1. missing source: skipped
//! 2. source already a symlink: skipped (already relocated)
//! 3. destination is `root/<basename>`, suffixed with a timestamp on collision
//! 4. move (rename, or copy through a staging dir when crossing filesystems)
//! 5. symlink `source -> destination`
//!
//! A failed move or link aborts the whole run; sources after it are not
//! touched. Nothing is rolled back.

#![allow(missing_docs)]

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use serde::{Deserialize, Serialize};

use crate::core::errors::{OsgError, Result};
use crate::core::paths::resolve_absolute_path;
use crate::logger::jsonl::{ActivityLog, EventType, LogEntry, Severity};

/// One configured source directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocationEntry {
    pub path: PathBuf,
    /// Label shown to the user, e.g. "Downloads".
    pub name: String,
}

impl RelocationEntry {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
        }
    }
}

/// A completed move. `source` is now a symlink to `destination`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelocationRecord {
    pub name: String,
    pub source: PathBuf,
    pub destination: PathBuf,
    /// The tree was copied across filesystems rather than renamed.
    pub cross_device: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Missing,
    AlreadyLinked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSource {
    pub name: String,
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Outcome of a successful `relocate()` call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RelocationReport {
    pub destination_root: PathBuf,
    pub records: Vec<RelocationRecord>,
    pub skipped: Vec<SkippedSource>,
}

impl RelocationReport {
    #[must_use]
    pub fn summary(&self) -> String {
        if self.records.is_empty() {
            return format!(
                "Nothing to move ({} source(s) missing or already relocated).",
                self.skipped.len()
            );
        }
        let mut out = String::new();
        for record in &self.records {
            out.push_str(&format!(
                "Moved {} -> {}\n",
                record.source.display(),
                record.destination.display()
            ));
        }
        out.push_str(&format!(
            "{} moved, {} skipped.",
            self.records.len(),
            self.skipped.len()
        ));
        out
    }
}

/// Produces the collision suffix. Injected so tests get stable names.
pub type SuffixClock = Box<dyn Fn() -> String + Send + Sync>;

/// Creates the `source -> destination` symlink after a move.
type LinkStep = fn(&Path, &Path) -> Result<()>;

pub struct RelocationEngine {
    suffix_clock: SuffixClock,
    link: LinkStep,
    log: ActivityLog,
}

impl Default for RelocationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RelocationEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            suffix_clock: Box::new(|| chrono::Local::now().format("%Y%m%d-%H%M%S").to_string()),
            link: link_back,
            log: ActivityLog::disabled(),
        }
    }

    #[must_use]
    pub fn with_suffix_clock(mut self, clock: SuffixClock) -> Self {
        self.suffix_clock = clock;
        self
    }

    #[must_use]
    pub fn with_activity_log(mut self, log: ActivityLog) -> Self {
        self.log = log;
        self
    }

    #[cfg(test)]
    fn with_link_step(mut self, link: LinkStep) -> Self {
        self.link = link;
        self
    }

    pub fn relocate(
        &self,
        sources: &[RelocationEntry],
        destination_root: &Path,
    ) -> Result<RelocationReport> {
        let result = self.relocate_inner(sources, destination_root);
        if let Err(error) = &result {
            self.log.record(&LogEntry::failure(EventType::RelocationFailed, error));
        }
        result
    }

    fn relocate_inner(
        &self,
        sources: &[RelocationEntry],
        destination_root: &Path,
    ) -> Result<RelocationReport> {
        let root = resolve_absolute_path(destination_root);
        veto_nested_destination(sources, &root)?;
        prepare_destination_root(&root)?;
        let root = resolve_absolute_path(&root);

        let mut report = RelocationReport {
            destination_root: root.clone(),
            ..RelocationReport::default()
        };

        for entry in sources {
            let meta = match fs::symlink_metadata(&entry.path) {
                Ok(meta) => meta,
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    self.skip(&mut report, entry, SkipReason::Missing);
                    continue;
                }
                Err(err) => return Err(OsgError::io(&entry.path, err)),
            };
            if meta.file_type().is_symlink() {
                self.skip(&mut report, entry, SkipReason::AlreadyLinked);
                continue;
            }

            let destination = self.destination_for(&entry.path, &entry.name, &root);
            let cross_device = move_tree(&entry.path, &destination)?;
            (self.link)(&entry.path, &destination)?;

            let mut log_entry = LogEntry::new(EventType::RelocationMove, Severity::Info)
                .with_path(&entry.path);
            log_entry.destination = Some(destination.to_string_lossy().into_owned());
            log_entry.ok = Some(true);
            if cross_device {
                log_entry.details = Some("copied across filesystems".to_string());
            }
            self.log.record(&log_entry);

            report.records.push(RelocationRecord {
                name: entry.name.clone(),
                source: entry.path.clone(),
                destination,
                cross_device,
            });
        }

        Ok(report)
    }

    fn skip(&self, report: &mut RelocationReport, entry: &RelocationEntry, reason: SkipReason) {
        let details = match reason {
            SkipReason::Missing => "source does not exist",
            SkipReason::AlreadyLinked => "source is already a symlink",
        };
        self.log.record(
            &LogEntry::new(EventType::RelocationSkip, Severity::Info)
                .with_path(&entry.path)
                .with_details(details),
        );
        report.skipped.push(SkippedSource {
            name: entry.name.clone(),
            path: entry.path.clone(),
            reason,
        });
    }

    /// `root/<basename>`, or a suffixed sibling when that name is taken.
    fn destination_for(&self, source: &Path, label: &str, root: &Path) -> PathBuf {
        let base = source
            .file_name()
            .map_or_else(|| label.to_string(), |n| n.to_string_lossy().into_owned());
        let plain = root.join(&base);
        if !exists_no_follow(&plain) {
            return plain;
        }

        let stamped = format!("{base}-{}", (self.suffix_clock)());
        let candidate = root.join(&stamped);
        if !exists_no_follow(&candidate) {
            return candidate;
        }
        (2u32..)
            .map(|n| root.join(format!("{stamped}-{n}")))
            .find(|path| !exists_no_follow(path))
            .unwrap_or(candidate)
    }
}

fn prepare_destination_root(root: &Path) -> Result<()> {
    match fs::metadata(root) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(OsgError::DestinationUnusable {
            path: root.to_path_buf(),
            details: "exists but is not a directory".to_string(),
        }),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            fs::create_dir_all(root).map_err(|err| OsgError::DestinationUnusable {
                path: root.to_path_buf(),
                details: format!("cannot create: {err}"),
            })
        }
        Err(err) => Err(OsgError::DestinationUnusable {
            path: root.to_path_buf(),
            details: err.to_string(),
        }),
    }
}

/// A destination inside a source would move the source into itself.
///
/// Checked both as written and with symlinks resolved, so a root reached
/// through a link into a source is caught too.
fn veto_nested_destination(sources: &[RelocationEntry], root: &Path) -> Result<()> {
    let real_root = resolve_existing_prefix(root);
    for entry in sources {
        let Ok(meta) = fs::symlink_metadata(&entry.path) else {
            continue;
        };
        if meta.file_type().is_symlink() {
            continue;
        }
        let source = resolve_absolute_path(&entry.path);
        let real_source = fs::canonicalize(&entry.path).unwrap_or_else(|_| source.clone());
        if root.starts_with(&source) || real_root.starts_with(&real_source) {
            return Err(OsgError::SafetyVeto {
                path: entry.path.clone(),
                reason: format!(
                    "destination {} is inside the source directory",
                    root.display()
                ),
            });
        }
    }
    Ok(())
}

/// `path` with its deepest existing ancestor canonicalized and the
/// not-yet-created tail appended.
fn resolve_existing_prefix(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut tail = Vec::new();
    loop {
        if let Ok(real) = fs::canonicalize(existing) {
            return tail.iter().rev().fold(real, |acc, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

fn exists_no_follow(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Move `source` to `destination`. Returns whether a cross-device copy was needed.
fn move_tree(source: &Path, destination: &Path) -> Result<bool> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(false),
        Err(err) if is_cross_device(&err) => {
            copy_then_replace(source, destination)?;
            Ok(true)
        }
        Err(err) => Err(move_failed(source, destination, err.to_string())),
    }
}

#[cfg(unix)]
fn is_cross_device(err: &std::io::Error) -> bool {
    err.raw_os_error() == Some(libc::EXDEV)
}

#[cfg(not(unix))]
fn is_cross_device(_err: &std::io::Error) -> bool {
    false
}

/// Copy into a hidden staging dir next to `destination`, rename it into
/// place, then remove the source. A failed copy leaves the source untouched.
fn copy_then_replace(source: &Path, destination: &Path) -> Result<()> {
    let staging = staging_path(destination);
    if exists_no_follow(&staging) {
        let _ = fs::remove_dir_all(&staging);
    }

    if let Err(err) = copy_tree(source, &staging) {
        let _ = fs::remove_dir_all(&staging);
        let _ = fs::remove_file(&staging);
        return Err(move_failed(source, destination, format!("copy failed: {err}")));
    }
    if let Err(err) = fs::rename(&staging, destination) {
        let _ = fs::remove_dir_all(&staging);
        return Err(move_failed(source, destination, format!("finalize failed: {err}")));
    }

    let removed = if fs::symlink_metadata(source).is_ok_and(|m| m.is_dir()) {
        fs::remove_dir_all(source)
    } else {
        fs::remove_file(source)
    };
    removed.map_err(|err| {
        move_failed(
            source,
            destination,
            format!("copied, but removing the original failed: {err}"),
        )
    })
}

fn staging_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    destination.with_file_name(format!(".osg-staging-{name}-{}", std::process::id()))
}

/// Recursive copy that recreates symlinks instead of following them.
///
/// Owner, group, mode and timestamps follow each entry across, as `mv`
/// keeps them between filesystems.
fn copy_tree(source: &Path, target: &Path) -> std::io::Result<()> {
    let meta = fs::symlink_metadata(source)?;
    let file_type = meta.file_type();

    if file_type.is_symlink() {
        let link = fs::read_link(source)?;
        make_symlink(&link, target)?;
    } else if file_type.is_dir() {
        fs::create_dir(target)?;
        for entry in fs::read_dir(source)? {
            let entry = entry?;
            copy_tree(&entry.path(), &target.join(entry.file_name()))?;
        }
    } else if file_type.is_file() {
        fs::copy(source, target)?;
    } else {
        return Err(std::io::Error::new(
            ErrorKind::Unsupported,
            format!("cannot copy special file {}", source.display()),
        ));
    }
    copy_metadata(&meta, target)
}

fn copy_metadata(meta: &fs::Metadata, target: &Path) -> std::io::Result<()> {
    copy_owner(meta, target)?;
    // chown drops setuid/setgid, so the mode goes on afterwards.
    if !meta.file_type().is_symlink() {
        fs::set_permissions(target, meta.permissions())?;
    }
    filetime::set_symlink_file_times(
        target,
        FileTime::from_last_access_time(meta),
        FileTime::from_last_modification_time(meta),
    )
}

/// Only root can hand files to another owner; for anyone else the copy
/// keeps the caller's ownership.
#[cfg(unix)]
fn copy_owner(meta: &fs::Metadata, target: &Path) -> std::io::Result<()> {
    use nix::errno::Errno;
    use nix::fcntl::AtFlags;
    use nix::unistd::{Gid, Uid, fchownat};
    use std::os::unix::fs::MetadataExt;

    match fchownat(
        None,
        target,
        Some(Uid::from_raw(meta.uid())),
        Some(Gid::from_raw(meta.gid())),
        AtFlags::AT_SYMLINK_NOFOLLOW,
    ) {
        Ok(()) | Err(Errno::EPERM) => Ok(()),
        Err(errno) => Err(errno.into()),
    }
}

#[cfg(not(unix))]
fn copy_owner(_meta: &fs::Metadata, _target: &Path) -> std::io::Result<()> {
    Ok(())
}

fn link_back(source: &Path, destination: &Path) -> Result<()> {
    make_symlink(destination, source).map_err(|err| OsgError::LinkFailed {
        source_path: source.to_path_buf(),
        destination: destination.to_path_buf(),
        details: err.to_string(),
    })
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn make_symlink(_target: &Path, _link: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        ErrorKind::Unsupported,
        "symlinks are only supported on unix",
    ))
}

fn move_failed(source: &Path, destination: &Path, details: String) -> OsgError {
    OsgError::MoveFailed {
        source_path: source.to_path_buf(),
        destination: destination.to_path_buf(),
        details,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use nix::fcntl::AtFlags;
    use nix::sys::stat::Mode;
    use nix::unistd::{Gid, Uid, fchownat};
    use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};

    fn engine() -> RelocationEngine {
        RelocationEngine::new().with_suffix_clock(Box::new(|| "20260101-120000".to_string()))
    }

    fn make_source(root: &Path, name: &str) -> PathBuf {
        let dir = root.join("home").join(name);
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("nested").join("file.txt"), name).unwrap();
        dir
    }

    #[test]
    fn moves_and_links_each_source() {
        let tmp = tempfile::tempdir().unwrap();
        let downloads = make_source(tmp.path(), "Downloads");
        let dest = tmp.path().join("data").join("relocated");

        let report = engine()
            .relocate(&[RelocationEntry::new(&downloads, "Downloads")], &dest)
            .unwrap();

        assert_eq!(report.records.len(), 1);
        let record = &report.records[0];
        assert_eq!(record.destination, resolve_absolute_path(&dest).join("Downloads"));
        assert!(fs::symlink_metadata(&downloads).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&downloads).unwrap(), record.destination);
        assert_eq!(
            fs::read_to_string(downloads.join("nested").join("file.txt")).unwrap(),
            "Downloads"
        );
    }

    #[test]
    fn second_run_is_a_no_op() {
        let tmp = tempfile::tempdir().unwrap();
        let music = make_source(tmp.path(), "Music");
        let dest = tmp.path().join("dest");
        let sources = [RelocationEntry::new(&music, "Music")];

        engine().relocate(&sources, &dest).unwrap();
        let second = engine().relocate(&sources, &dest).unwrap();

        assert!(second.records.is_empty());
        assert_eq!(second.skipped[0].reason, SkipReason::AlreadyLinked);
        assert_eq!(fs::read_dir(&dest).unwrap().count(), 1);
    }

    #[test]
    fn collision_gets_timestamp_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let docs = make_source(tmp.path(), "Documents");
        let dest = tmp.path().join("dest");
        let sources = [RelocationEntry::new(&docs, "Documents")];

        engine().relocate(&sources, &dest).unwrap();
        fs::remove_file(&docs).unwrap();
        make_source(tmp.path(), "Documents");
        let report = engine().relocate(&sources, &dest).unwrap();

        let root = resolve_absolute_path(&dest);
        assert_eq!(
            report.records[0].destination,
            root.join("Documents-20260101-120000")
        );
        assert!(root.join("Documents").join("nested").join("file.txt").exists());
    }

    #[test]
    fn repeated_collision_adds_counter() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("dest");
        fs::create_dir_all(dest.join("Videos")).unwrap();
        fs::create_dir_all(dest.join("Videos-20260101-120000")).unwrap();
        let videos = make_source(tmp.path(), "Videos");

        let report = engine()
            .relocate(&[RelocationEntry::new(&videos, "Videos")], &dest)
            .unwrap();
        assert_eq!(
            report.records[0].destination,
            resolve_absolute_path(&dest).join("Videos-20260101-120000-2")
        );
    }

    #[test]
    fn missing_source_is_skipped_without_error() {
        let tmp = tempfile::tempdir().unwrap();
        let report = engine()
            .relocate(
                &[RelocationEntry::new(tmp.path().join("nope"), "Pictures")],
                &tmp.path().join("dest"),
            )
            .unwrap();
        assert!(report.records.is_empty());
        assert_eq!(report.skipped[0].reason, SkipReason::Missing);
    }

    #[test]
    fn destination_root_that_is_a_file_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let src = make_source(tmp.path(), "Downloads");
        let dest = tmp.path().join("dest");
        fs::write(&dest, "not a dir").unwrap();

        let err = engine()
            .relocate(&[RelocationEntry::new(&src, "Downloads")], &dest)
            .expect_err("file root must fail");
        assert_eq!(err.code(), "OSG-4001");
        assert!(src.is_dir());
    }

    #[test]
    fn destination_inside_source_is_vetoed() {
        let tmp = tempfile::tempdir().unwrap();
        let src = make_source(tmp.path(), "Downloads");
        let err = engine()
            .relocate(
                &[RelocationEntry::new(&src, "Downloads")],
                &src.join("inside"),
            )
            .expect_err("nested destination must be vetoed");
        assert_eq!(err.code(), "OSG-2003");
        assert!(!fs::symlink_metadata(&src).unwrap().file_type().is_symlink());
    }

    #[test]
    fn failed_move_stops_later_sources() {
        let tmp = tempfile::tempdir().unwrap();
        let first = make_source(tmp.path(), "Music");
        let dest = tmp.path().join("dest");
        fs::create_dir_all(&dest).unwrap();
        let second = make_source(tmp.path(), "Videos");
        // Occupy every candidate name for Music with a path whose parent is a file,
        // forcing rename to fail with ENOTDIR.
        let engine = RelocationEngine::new().with_suffix_clock(Box::new(|| "x/y".to_string()));
        fs::write(dest.join("Music"), "occupied").unwrap();
        fs::write(dest.join("Music-x"), "file blocks the nested suffix").unwrap();

        let err = engine
            .relocate(
                &[
                    RelocationEntry::new(&first, "Music"),
                    RelocationEntry::new(&second, "Videos"),
                ],
                &dest,
            )
            .expect_err("move must fail");
        assert_eq!(err.code(), "OSG-4002");
        assert!(err.to_string().contains("Music"));
        assert!(second.is_dir());
        assert!(!fs::symlink_metadata(&second).unwrap().file_type().is_symlink());
    }

    #[test]
    fn cross_device_copy_preserves_tree_and_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let src = make_source(tmp.path(), "Pictures");
        std::os::unix::fs::symlink("nested/file.txt", src.join("shortcut")).unwrap();
        fs::set_permissions(src.join("nested"), fs::Permissions::from_mode(0o750)).unwrap();
        let dest = tmp.path().join("dest");
        fs::create_dir_all(&dest).unwrap();
        let target = dest.join("Pictures");

        copy_then_replace(&src, &target).unwrap();

        assert!(!src.exists());
        assert_eq!(
            fs::read_to_string(target.join("nested").join("file.txt")).unwrap(),
            "Pictures"
        );
        assert_eq!(
            fs::read_link(target.join("shortcut")).unwrap(),
            PathBuf::from("nested/file.txt")
        );
        let mode = fs::metadata(target.join("nested")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o750);
        assert_eq!(fs::read_dir(&dest).unwrap().count(), 1);
    }

    #[test]
    fn cross_device_copy_keeps_owner_and_timestamps() {
        let tmp = tempfile::tempdir().unwrap();
        let src = make_source(tmp.path(), "Documents");
        let nested = src.join("nested");
        let file = nested.join("file.txt");
        std::os::unix::fs::symlink("nested/file.txt", src.join("shortcut")).unwrap();
        let file_mtime = FileTime::from_unix_time(1_600_000_000, 0);
        let dir_mtime = FileTime::from_unix_time(1_500_000_000, 0);
        filetime::set_file_mtime(&file, file_mtime).unwrap();
        filetime::set_file_mtime(&nested, dir_mtime).unwrap();

        let as_root = nix::unistd::geteuid().is_root();
        if as_root {
            for path in [&src, &nested, &file, &src.join("shortcut")] {
                fchownat(
                    None,
                    path.as_path(),
                    Some(Uid::from_raw(1000)),
                    Some(Gid::from_raw(1000)),
                    AtFlags::AT_SYMLINK_NOFOLLOW,
                )
                .unwrap();
            }
        }
        let dest = tmp.path().join("dest");
        fs::create_dir_all(&dest).unwrap();
        let target = dest.join("Documents");

        copy_then_replace(&src, &target).unwrap();

        let copied_file = fs::metadata(target.join("nested").join("file.txt")).unwrap();
        let copied_dir = fs::metadata(target.join("nested")).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&copied_file), file_mtime);
        assert_eq!(FileTime::from_last_modification_time(&copied_dir), dir_mtime);

        let expected_uid = if as_root { 1000 } else { nix::unistd::geteuid().as_raw() };
        let copied_link = fs::symlink_metadata(target.join("shortcut")).unwrap();
        for meta in [&copied_file, &copied_dir, &copied_link] {
            assert_eq!(meta.uid(), expected_uid);
        }
        assert_eq!(fs::metadata(&target).unwrap().uid(), expected_uid);
        if as_root {
            assert_eq!(copied_file.gid(), 1000);
        }
    }

    #[test]
    fn failed_copy_keeps_source_and_removes_staging() {
        let tmp = tempfile::tempdir().unwrap();
        let src = make_source(tmp.path(), "Downloads");
        let pipe = src.join("pipe");
        nix::unistd::mkfifo(pipe.as_path(), Mode::S_IRUSR | Mode::S_IWUSR).unwrap();
        let dest = tmp.path().join("dest");
        fs::create_dir_all(&dest).unwrap();

        let err = copy_then_replace(&src, &dest.join("Downloads")).expect_err("fifo cannot be copied");

        assert_eq!(err.code(), "OSG-4002");
        assert_eq!(
            fs::read_to_string(src.join("nested").join("file.txt")).unwrap(),
            "Downloads"
        );
        assert!(fs::symlink_metadata(&pipe).unwrap().file_type().is_fifo());
        assert_eq!(fs::read_dir(&dest).unwrap().count(), 0);
    }

    /// Stands in for an application that recreates its folder between the
    /// move and the link.
    fn recreate_then_link(source: &Path, destination: &Path) -> Result<()> {
        fs::create_dir(source).unwrap();
        link_back(source, destination)
    }

    #[test]
    fn link_failure_after_move_stops_later_sources() {
        let tmp = tempfile::tempdir().unwrap();
        let music = make_source(tmp.path(), "Music");
        let videos = make_source(tmp.path(), "Videos");
        let dest = tmp.path().join("dest");

        let err = engine()
            .with_link_step(recreate_then_link)
            .relocate(
                &[
                    RelocationEntry::new(&music, "Music"),
                    RelocationEntry::new(&videos, "Videos"),
                ],
                &dest,
            )
            .expect_err("link must fail");

        let moved = resolve_absolute_path(&dest).join("Music");
        assert_eq!(err.code(), "OSG-4003");
        let msg = err.to_string();
        assert!(msg.contains(&music.display().to_string()), "{msg}");
        assert!(msg.contains(&moved.display().to_string()), "{msg}");
        assert_eq!(
            fs::read_to_string(moved.join("nested").join("file.txt")).unwrap(),
            "Music"
        );
        assert!(!fs::symlink_metadata(&videos).unwrap().file_type().is_symlink());
        assert!(videos.join("nested").join("file.txt").is_file());
        assert!(!moved.with_file_name("Videos").exists());
    }

    #[test]
    fn destination_reached_through_symlink_into_source_is_vetoed() {
        let tmp = tempfile::tempdir().unwrap();
        let src = make_source(tmp.path(), "Downloads");
        let alias = tmp.path().join("alias");
        std::os::unix::fs::symlink(&src, &alias).unwrap();

        let err = engine()
            .relocate(
                &[RelocationEntry::new(&src, "Downloads")],
                &alias.join("inside"),
            )
            .expect_err("destination inside the source must be vetoed");

        assert_eq!(err.code(), "OSG-2003");
        assert!(!src.join("inside").exists());
        assert!(!fs::symlink_metadata(&src).unwrap().file_type().is_symlink());
    }

    #[test]
    fn link_failure_reports_manual_restore_command() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("occupied");
        fs::write(&src, "still here").unwrap();
        let err = link_back(&src, &tmp.path().join("dest")).expect_err("link over a file");
        assert_eq!(err.code(), "OSG-4003");
        assert!(err.to_string().contains("ln -s"));
    }

    #[test]
    fn summary_lists_moves() {
        let report = RelocationReport {
            destination_root: PathBuf::from("/mnt/data"),
            records: vec![RelocationRecord {
                name: "Music".to_string(),
                source: PathBuf::from("/home/u/Music"),
                destination: PathBuf::from("/mnt/data/Music"),
                cross_device: false,
            }],
            skipped: Vec::new(),
        };
        assert!(report.summary().contains("Moved /home/u/Music -> /mnt/data/Music"));
    }
}
