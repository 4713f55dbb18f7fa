//! Top-level entrypoint that wires a concurrency strategy to a clock.
//!
//! [`Throttle`] is what embedders hold. It owns one strategy implementation,
//! chosen once through [`ThrottleOptions::strategy`], and forwards every call
//! to it.

use std::time::Duration;

use crate::{
    Clock, ConcurrencyStrategy, SystemClock, ThrottleError, ThrottleSnapshot, WindowLengthMs,
    strategy::{LockFreeThrottle, LockedThrottle},
};

/// Admission decisions over a sliding window.
///
/// Implemented by [`Throttle`] and by each concurrency strategy, so code that
/// only needs a decision can stay generic over how it is made.
pub trait AdmissionControl: Send + Sync {
    /// Admit an operation of `weight` if the estimated load of the sliding
    /// window leaves room for it, and record it. A rejection records nothing.
    ///
    /// A zero weight is always admitted.
    fn allow_n(&self, weight: u32) -> bool;

    /// Same as `allow_n(1)`.
    fn allow(&self) -> bool {
        self.allow_n(1)
    }

    /// Load an operation would be measured against right now, without
    /// recording anything.
    fn estimated_load(&self) -> u64;

    /// Current counters, see [`ThrottleSnapshot`].
    fn snapshot(&self) -> ThrottleSnapshot;
}

/// Configuration for [`Throttle`].
#[derive(Clone, Debug)]
pub struct ThrottleOptions {
    /// Length of the sliding window, and of each internal period.
    pub window_length: WindowLengthMs,
    /// Most weight admitted within any window length. Zero rejects every
    /// operation with a positive weight.
    pub limit: u32,
    /// How concurrent callers are synchronized.
    pub strategy: ConcurrencyStrategy,
}

enum Engine<C> {
    Locked(LockedThrottle<C>),
    LockFree(LockFreeThrottle<C>),
}

/// Sliding-window throttle.
///
/// Admits at most [`limit`](ThrottleOptions::limit) units of weight per
/// window length, with the window sliding continuously. The load of the
/// window is estimated from two fixed-period counters: the exact count of the
/// current period plus the previous period's count prorated by how much of it
/// the window still covers.
///
/// # Semantics & limitations
///
/// **Approximate:** arrivals within the previous period are assumed to be
/// spread evenly when prorating, so the estimate can differ from an exact
/// sliding log.
///
/// **Constant memory:** two counters and a period index, whatever the rate.
///
/// **Granularity:** 1 ms. With a 1 ms window the previous period always counts
/// in full.
///
/// **Clock regression:** if the clock reads a period older than one already
/// seen, the call is evaluated at the start of the newest period seen, the
/// most conservative point, and nothing is reset.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use sliding_throttle::Throttle;
///
/// let throttle = Throttle::new(Duration::from_secs(60), 3).unwrap();
///
/// assert!(throttle.allow());
/// assert!(throttle.allow_n(2));
/// assert!(!throttle.allow());
/// ```
pub struct Throttle<C: Clock = SystemClock> {
    options: ThrottleOptions,
    engine: Engine<C>,
}

impl Throttle<SystemClock> {
    /// Create a throttle on the system clock with the default strategy.
    ///
    /// Fails if `window_length` is shorter than 1 ms.
    pub fn new(window_length: Duration, limit: u32) -> Result<Self, ThrottleError> {
        Ok(Self::with_options(ThrottleOptions {
            window_length: WindowLengthMs::try_from(window_length)?,
            limit,
            strategy: ConcurrencyStrategy::default(),
        }))
    }

    /// Create a throttle on the system clock.
    pub fn with_options(options: ThrottleOptions) -> Self {
        Self::with_clock(options, SystemClock)
    }
}

impl<C: Clock> Throttle<C> {
    /// Create a throttle reading time from `clock`.
    pub fn with_clock(options: ThrottleOptions, clock: C) -> Self {
        tracing::debug!(
            window_ms = *options.window_length,
            limit = options.limit,
            strategy = ?options.strategy,
            "throttle.created"
        );

        let engine = match options.strategy {
            ConcurrencyStrategy::Locked => Engine::Locked(LockedThrottle::new(
                options.window_length,
                options.limit,
                clock,
            )),
            ConcurrencyStrategy::LockFree => Engine::LockFree(LockFreeThrottle::new(
                options.window_length,
                options.limit,
                clock,
            )),
        };

        Self { options, engine }
    } // end constructor

    fn engine(&self) -> &dyn AdmissionControl {
        match &self.engine {
            Engine::Locked(engine) => engine,
            Engine::LockFree(engine) => engine,
        }
    }

    /// Admit a unit-weight operation. See [`Throttle::allow_n`].
    pub fn allow(&self) -> bool {
        self.allow_n(1)
    }

    /// Admit an operation of `weight` if it fits, and record it.
    ///
    /// Returns `false`, recording nothing, when the estimated load plus
    /// `weight` would exceed the limit. Never blocks beyond the internal
    /// critical section and never fails.
    pub fn allow_n(&self, weight: u32) -> bool {
        self.engine().allow_n(weight)
    }

    /// Load an operation would be measured against right now.
    ///
    /// Read-only: useful to check headroom before expensive work, but the
    /// answer can be stale by the time [`Throttle::allow_n`] is called.
    pub fn estimated_load(&self) -> u64 {
        self.engine().estimated_load()
    }

    /// Current counters.
    pub fn snapshot(&self) -> ThrottleSnapshot {
        self.engine().snapshot()
    }

    /// Configured window length.
    pub fn window_length(&self) -> WindowLengthMs {
        self.options.window_length
    }

    /// Configured limit.
    pub fn limit(&self) -> u32 {
        self.options.limit
    }

    /// Configured concurrency strategy.
    pub fn strategy(&self) -> ConcurrencyStrategy {
        self.options.strategy
    }
} // end of impl

impl<C: Clock> AdmissionControl for Throttle<C> {
    fn allow_n(&self, weight: u32) -> bool {
        Throttle::allow_n(self, weight)
    }

    fn estimated_load(&self) -> u64 {
        Throttle::estimated_load(self)
    }

    fn snapshot(&self) -> ThrottleSnapshot {
        Throttle::snapshot(self)
    }
}
