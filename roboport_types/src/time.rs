//! Record timestamps
//!
//! Every record carries a [`Time`] so consumers can judge freshness
//! independently of delivery order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wall-clock timestamp, seconds + nanoseconds since the Unix epoch.
///
/// Field order is part of the wire format: `sec` then `nsec`, both u32.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Time {
    pub sec: u32,
    pub nsec: u32,
}

impl Time {
    pub const ZERO: Time = Time { sec: 0, nsec: 0 };

    pub const fn new(sec: u32, nsec: u32) -> Self {
        Self { sec, nsec }
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        let since = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self::from_duration(since)
    }

    /// Build from a duration since the epoch (seconds saturate at u32::MAX)
    pub fn from_duration(d: Duration) -> Self {
        Self {
            sec: u32::try_from(d.as_secs()).unwrap_or(u32::MAX),
            nsec: d.subsec_nanos(),
        }
    }

    pub fn from_nanos(nanos: u64) -> Self {
        Self::from_duration(Duration::from_nanos(nanos))
    }

    pub fn as_duration(&self) -> Duration {
        Duration::new(self.sec as u64, self.nsec)
    }

    pub fn as_nanos(&self) -> u64 {
        self.sec as u64 * 1_000_000_000 + self.nsec as u64
    }

    pub fn is_zero(&self) -> bool {
        self.sec == 0 && self.nsec == 0
    }

    /// Age of this timestamp relative to `now`; zero if it lies in the future
    pub fn age_at(&self, now: Time) -> Duration {
        now.as_duration().saturating_sub(self.as_duration())
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nsec)
    }
}

impl From<SystemTime> for Time {
    fn from(t: SystemTime) -> Self {
        Self::from_duration(t.duration_since(UNIX_EPOCH).unwrap_or_default())
    }
}
