//! Cache, trash and log cleanup.

pub mod engine;
