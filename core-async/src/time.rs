//! Time primitives.

pub use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
pub use tokio::time::{interval, sleep, timeout, Interval, Sleep, Timeout};

/// Error returned when [`timeout`] elapses.
pub use tokio::time::error::Elapsed;
