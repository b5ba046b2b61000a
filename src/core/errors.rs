//! OSG-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, OsgError>;

/// Top-level error type for Overlay Space Guard.
#[derive(Debug, Error)]
pub enum OsgError {
    #[error("[OSG-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[OSG-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[OSG-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[OSG-1101] unsupported platform: {details}")]
    UnsupportedPlatform { details: String },

    #[error("[OSG-2001] filesystem stats unavailable for {path}: {details}")]
    FsStats { path: PathBuf, details: String },

    #[error("[OSG-2003] safety veto for {path}: {reason}")]
    SafetyVeto { path: PathBuf, reason: String },

    #[error("[OSG-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[OSG-3001] {operation} requires administrative privileges (run as root)")]
    PrivilegeRequired { operation: &'static str },

    #[error("[OSG-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[OSG-4001] destination {path} is unusable: {details}")]
    DestinationUnusable { path: PathBuf, details: String },

    #[error("[OSG-4002] failed to move {source_path} to {destination}: {details}")]
    MoveFailed {
        source_path: PathBuf,
        destination: PathBuf,
        details: String,
    },

    #[error(
        "[OSG-4003] moved {source_path} to {destination} but could not link it back: {details}; \
         restore manually with: ln -s {destination} {source_path}"
    )]
    LinkFailed {
        source_path: PathBuf,
        destination: PathBuf,
        details: String,
    },

    #[error("[OSG-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl OsgError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "OSG-1001",
            Self::MissingConfig { .. } => "OSG-1002",
            Self::ConfigParse { .. } => "OSG-1003",
            Self::UnsupportedPlatform { .. } => "OSG-1101",
            Self::FsStats { .. } => "OSG-2001",
            Self::SafetyVeto { .. } => "OSG-2003",
            Self::Serialization { .. } => "OSG-2101",
            Self::PrivilegeRequired { .. } => "OSG-3001",
            Self::Io { .. } => "OSG-3002",
            Self::DestinationUnusable { .. } => "OSG-4001",
            Self::MoveFailed { .. } => "OSG-4002",
            Self::LinkFailed { .. } => "OSG-4003",
            Self::Runtime { .. } => "OSG-3900",
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for OsgError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for OsgError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
