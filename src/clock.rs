//! Device wall clock
//!
//! The engine asks the VFS for the current time as a fractional Julian day,
//! and the VFS seeds its randomness from the same clock.

use chrono::Utc;

/// Julian day of the Unix epoch (1970-01-01T00:00:00Z)
pub const UNIX_EPOCH_JULIAN_DAY: f64 = 2440587.5;

/// Unix epoch in Julian-day milliseconds
pub const UNIX_EPOCH_JULIAN_MS: i64 = 210_866_760_000_000;

const SECONDS_PER_DAY: f64 = 86400.0;

/// Source of wall-clock seconds since the Unix epoch
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> i64;
}

/// Host/RTC clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Clock frozen at a given instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_secs(&self) -> i64 {
        self.0
    }
}

/// Unix seconds to a fractional Julian day
pub fn julian_day(unix_secs: i64) -> f64 {
    unix_secs as f64 / SECONDS_PER_DAY + UNIX_EPOCH_JULIAN_DAY
}

/// Unix seconds to Julian-day milliseconds
pub fn julian_ms(unix_secs: i64) -> i64 {
    unix_secs * 1000 + UNIX_EPOCH_JULIAN_MS
}
