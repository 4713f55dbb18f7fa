use std::{ops::Deref, time::Duration};

use crate::ThrottleError;

/// A validated window length in whole milliseconds.
///
/// One millisecond is the finest granularity the throttle resolves, so the
/// window must be at least 1 ms long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowLengthMs(u64);

impl Deref for WindowLengthMs {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u64> for WindowLengthMs {
    type Error = ThrottleError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value < 1 {
            return Err(ThrottleError::InvalidWindowLength(
                "Window length must be at least 1ms".to_string(),
            ));
        }

        Ok(Self(value))
    }
}

impl TryFrom<Duration> for WindowLengthMs {
    type Error = ThrottleError;

    /// Sub-millisecond parts of `value` are truncated.
    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        let millis = u64::try_from(value.as_millis()).map_err(|_| {
            ThrottleError::InvalidWindowLength(format!(
                "Window length must not exceed {} ms",
                u64::MAX
            ))
        })?;

        Self::try_from(millis)
    }
}

impl From<WindowLengthMs> for Duration {
    fn from(value: WindowLengthMs) -> Self {
        Duration::from_millis(value.0)
    }
}

/// How concurrent callers of one throttle are synchronized.
///
/// Both strategies run the same admission algorithm and give the same answers
/// for sequential callers. They differ in how contention is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConcurrencyStrategy {
    /// A single mutex serializes every admission check.
    Locked,
    /// Period-tagged atomic counters updated with compare-and-swap.
    #[default]
    LockFree,
}

/// Point-in-time view of a throttle's counters.
///
/// `counters[i]` is the weight admitted in the most recent period with parity
/// `i`, provided that period is `last_period` or the one before it. Older data
/// reads as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThrottleSnapshot {
    /// Largest period index observed so far.
    pub last_period: u64,
    /// Accumulated weight of the even and odd period slots.
    pub counters: [u64; 2],
}

impl ThrottleSnapshot {
    /// Sum of both slots.
    pub fn total(&self) -> u64 {
        self.counters[0] + self.counters[1]
    }
}
