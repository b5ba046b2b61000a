//! Relocation of large user directories behind symlinks.

pub mod engine;
