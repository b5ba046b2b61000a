//! Persisted watch state: the PID lock and the last-alerted level.

pub mod alert;
pub mod lock;
pub mod marker;
