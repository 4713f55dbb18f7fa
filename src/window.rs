//! The two-period sliding window estimate, free of any synchronization.
//!
//! Time is cut into periods of one window length. The load inside the sliding
//! window ending "now" is estimated as the exact count of the current period
//! plus the previous period's count scaled by the share of the previous period
//! the sliding window still overlaps. Both strategies in [`crate::strategy`]
//! evaluate exactly this estimate; they only differ in how state is shared.

use crate::ThrottleSnapshot;

/// Where a clock reading falls on the period grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PeriodPosition {
    /// `now / window`.
    pub period: u64,
    /// `now % window`, always `< window`.
    pub offset_ms: u64,
}

impl PeriodPosition {
    /// Recomputed from the absolute reading on every call, so no error
    /// accumulates between calls.
    pub fn locate(now_ms: u64, window_ms: u64) -> Self {
        Self {
            period: now_ms / window_ms,
            offset_ms: now_ms % window_ms,
        }
    }

    pub fn start_of(period: u64) -> Self {
        Self {
            period,
            offset_ms: 0,
        }
    }

    pub fn current_slot(&self) -> usize {
        (self.period % 2) as usize
    }

    pub fn previous_slot(&self) -> usize {
        1 - self.current_slot()
    }

    /// `floor(previous * (window - offset) / window)`: the share of the
    /// previous period's weight the sliding window still overlaps, 1.0 right
    /// at the start of a period and approaching 0.0 at its end.
    ///
    /// Evaluated in integers so the floor is exact.
    pub fn prorate(&self, previous: u64, window_ms: u64) -> u64 {
        let remaining = u128::from(window_ms - self.offset_ms);
        (u128::from(previous) * remaining / u128::from(window_ms)) as u64
    }

    fn clamp_to(self, last_period: u64) -> Self {
        if self.period >= last_period {
            self
        } else {
            Self::start_of(last_period)
        }
    }

    /// Evaluate a fresh reading against the largest period seen so far.
    ///
    /// A reading from an older period means the clock went backwards. It is
    /// evaluated as the very start of `last_period`, where the previous period
    /// still counts in full, and never resets anything.
    pub fn resolve(self, last_period: u64) -> Self {
        if self.period < last_period {
            self.log_regression(last_period);
        }

        self.clamp_to(last_period)
    }

    /// Same as [`PeriodPosition::resolve`] for a reading taken outside any
    /// lock.
    ///
    /// Such a reading can trail `last_period` by one period simply because
    /// another caller crossed the boundary first, so only readings further
    /// behind are reported as a clock regression.
    pub fn resolve_unsynchronized(self, last_period: u64) -> Self {
        if self.lags_behind(last_period) {
            self.log_regression(last_period);
        }

        self.clamp_to(last_period)
    }

    /// Whether the reading is older than `last_period - 1`.
    pub fn lags_behind(&self, last_period: u64) -> bool {
        self.period.saturating_add(1) < last_period
    }

    fn log_regression(&self, last_period: u64) {
        tracing::debug!(
            observed_period = self.period,
            last_period,
            "throttle.clock_regression, evaluating at start of last observed period"
        );
    }
}

/// Counters and period bookkeeping for one throttle.
///
/// Mutated only by its owner; the locked strategy keeps it behind a mutex.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct WindowState {
    pub counters: [u64; 2],
    pub last_period: u64,
}

impl WindowState {
    /// Reset slots the reading has moved past and return the position to
    /// evaluate at.
    pub fn roll_over(&mut self, observed: PeriodPosition) -> PeriodPosition {
        let position = observed.resolve(self.last_period);

        if position.period > self.last_period {
            let idle_periods = position.period - self.last_period;

            self.counters[position.current_slot()] = 0;
            if idle_periods > 1 {
                self.counters[position.previous_slot()] = 0;
            }
            self.last_period = position.period;

            tracing::trace!(period = position.period, idle_periods, "throttle.roll_over");
        }

        position
    }

    pub fn estimated_load(&self, position: PeriodPosition, window_ms: u64) -> u64 {
        self.counters[position.current_slot()]
            + position.prorate(self.counters[position.previous_slot()], window_ms)
    }

    /// One full admission decision. Rejections leave the counters untouched;
    /// zero-weight calls are always admitted but still roll periods over.
    pub fn admit(
        &mut self,
        observed: PeriodPosition,
        window_ms: u64,
        limit: u32,
        weight: u32,
    ) -> bool {
        let position = self.roll_over(observed);

        if weight == 0 {
            return true;
        }

        let load = self.estimated_load(position, window_ms);
        if load + u64::from(weight) > u64::from(limit) {
            return false;
        }

        self.counters[position.current_slot()] += u64::from(weight);
        true
    }

    /// Load the next call would be evaluated against, without mutating.
    pub fn peek_load(&self, observed: PeriodPosition, window_ms: u64) -> u64 {
        let position = observed.resolve(self.last_period);

        let (current, previous) = match position.period.saturating_sub(self.last_period) {
            0 => (
                self.counters[position.current_slot()],
                self.counters[position.previous_slot()],
            ),
            // The slot about to become current is reset; the old current
            // becomes previous.
            1 => (0, self.counters[position.previous_slot()]),
            _ => (0, 0),
        };

        current + position.prorate(previous, window_ms)
    }

    pub fn snapshot(&self) -> ThrottleSnapshot {
        ThrottleSnapshot {
            last_period: self.last_period,
            counters: self.counters,
        }
    }
}
