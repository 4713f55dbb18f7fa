use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{
    AdmissionControl, Clock, ThrottleSnapshot, WindowLengthMs,
    window::{PeriodPosition, WindowState},
};

/// Sliding-window throttle guarded by a single mutex.
///
/// The clock is read inside the critical section, so the order in which
/// callers take the lock is also the order of their readings.
pub(crate) struct LockedThrottle<C> {
    window_length: WindowLengthMs,
    limit: u32,
    clock: C,
    state: Mutex<WindowState>,
}

impl<C: Clock> LockedThrottle<C> {
    pub(crate) fn new(window_length: WindowLengthMs, limit: u32, clock: C) -> Self {
        Self {
            window_length,
            limit,
            clock,
            state: Mutex::new(WindowState::default()),
        }
    } // end constructor

    // Every mutation of `WindowState` completes before the guard drops, so a
    // poisoned lock still holds a consistent state.
    fn lock(&self) -> MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn observe(&self) -> PeriodPosition {
        PeriodPosition::locate(self.clock.now_millis(), *self.window_length)
    }
} // end of impl

impl<C: Clock> AdmissionControl for LockedThrottle<C> {
    fn allow_n(&self, weight: u32) -> bool {
        let mut state = self.lock();
        let observed = self.observe();

        state.admit(observed, *self.window_length, self.limit, weight)
    }

    fn estimated_load(&self) -> u64 {
        let state = self.lock();
        let observed = self.observe();

        state.peek_load(observed, *self.window_length)
    }

    fn snapshot(&self) -> ThrottleSnapshot {
        self.lock().snapshot()
    }
}
