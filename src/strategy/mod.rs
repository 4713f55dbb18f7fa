//! Concurrency strategies for sharing one throttle between threads.
//!
//! Both strategies evaluate the same estimate (see [`crate::window`]):
//!
//! - [`LockedThrottle`]: the whole decision runs under one [`Mutex`](std::sync::Mutex).
//!   Obviously correct; callers serialize.
//! - [`LockFreeThrottle`]: period-tagged atomic counters and compare-and-swap.
//!   Callers only retry when they collide on the same slot.
//!
//! The [`Throttle`](crate::Throttle) facade picks one according to
//! [`ConcurrencyStrategy`](crate::ConcurrencyStrategy).

mod locked_throttle;
pub(crate) use locked_throttle::*;

mod lock_free_throttle;
pub(crate) use lock_free_throttle::*;
