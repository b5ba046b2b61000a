//! Platform abstraction layer.

pub mod pal;
