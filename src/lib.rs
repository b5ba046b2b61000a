#![forbid(unsafe_code)]

//! Overlay Space Guard (osg): keeps a small root overlay filesystem from
//! filling up on live-boot and container-style systems.
//!
//! Three tools against a full disk:
//! 1. **Watch** polls usage and alerts once per new level, never nags
//! 2. **Clean** empties caches and trash, trims oversized or stale logs
//! 3. **Move** relocates big user folders to a roomier disk behind symlinks
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use overlay_space_guard::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use overlay_space_guard::core::config::Config;
//! use overlay_space_guard::relocation::engine::{RelocationEngine, RelocationEntry};
//! ```

pub mod prelude;

pub mod cleanup;
pub mod core;
pub mod daemon;
pub mod dispatch;
pub mod logger;
pub mod monitor;
pub mod platform;
pub mod relocation;
pub mod state;
pub mod ui;
