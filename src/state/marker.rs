//! Single-value plain-text markers (lock PID, last alert level) with swappable storage.

#![allow(missing_docs)]

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::errors::{OsgError, Result};

/// Storage for one small text value, overwritten wholesale on every write.
pub trait MarkerStore: Send + Sync {
    /// Current value, trimmed. `None` when the marker does not exist.
    fn read(&self) -> Result<Option<String>>;
    fn write(&self, value: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
    /// Where the marker lives, for messages.
    fn describe(&self) -> String;
}

/// Marker backed by a file. Writes go through a sibling temp file + rename.
#[derive(Debug, Clone)]
pub struct FileMarker {
    path: PathBuf,
}

impl FileMarker {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(format!(".{}.tmp", std::process::id()));
        self.path.with_file_name(name)
    }
}

impl MarkerStore for FileMarker {
    fn read(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw.trim().to_string())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(OsgError::io(&self.path, err)),
        }
    }

    fn write(&self, value: &str) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| OsgError::io(parent, source))?;
        }
        let tmp = self.temp_path();
        fs::write(&tmp, format!("{value}\n")).map_err(|source| OsgError::io(&tmp, source))?;
        fs::rename(&tmp, &self.path).map_err(|source| {
            let _ = fs::remove_file(&tmp);
            OsgError::io(&self.path, source)
        })
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(OsgError::io(&self.path, err)),
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory marker. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryMarker {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryMarker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_value(value: &str) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(value.to_string()))),
        }
    }

    /// Raw slot contents, for assertions.
    #[must_use]
    pub fn peek(&self) -> Option<String> {
        self.slot.lock().clone()
    }
}

impl MarkerStore for MemoryMarker {
    fn read(&self) -> Result<Option<String>> {
        Ok(self.slot.lock().as_deref().map(|v| v.trim().to_string()))
    }

    fn write(&self, value: &str) -> Result<()> {
        *self.slot.lock() = Some(value.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot.lock() = None;
        Ok(())
    }

    fn describe(&self) -> String {
        "<memory>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_marker_roundtrips_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let marker = FileMarker::new(dir.path().join("nested").join("alert-state"));
        assert_eq!(marker.read().unwrap(), None);

        marker.write("86").unwrap();
        marker.write("87").unwrap();
        assert_eq!(marker.read().unwrap().as_deref(), Some("87"));
        assert_eq!(fs::read_to_string(marker.path()).unwrap(), "87\n");

        marker.clear().unwrap();
        assert_eq!(marker.read().unwrap(), None);
        marker.clear().expect("clearing a missing marker is fine");
    }

    #[test]
    fn file_marker_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let marker = FileMarker::new(dir.path().join("watch.pid"));
        marker.write("1234").unwrap();
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("watch.pid")]);
    }

    #[test]
    fn memory_marker_clones_share_state() {
        let marker = MemoryMarker::new();
        let view = marker.clone();
        marker.write(" 42 ").unwrap();
        assert_eq!(view.read().unwrap().as_deref(), Some("42"));
        assert_eq!(view.peek().as_deref(), Some(" 42 "));
    }
}
