//! Daemon subsystem: the watch loop, signal handling, and multi-channel
//! notifications.

pub mod notifications;
#[cfg(feature = "daemon")]
pub mod signals;
#[cfg(feature = "daemon")]
pub mod watch;
