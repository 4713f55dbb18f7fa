use std::sync::atomic::{AtomicU64, Ordering};

use crate::{AdmissionControl, Clock, ThrottleSnapshot, WindowLengthMs, window::PeriodPosition};

/// One slot word: the low 32 bits of the period the count belongs to, and the
/// count itself.
///
/// A count is only meaningful for the period carried in its tag, so a slot
/// left over from an older period reads as empty without anyone resetting it.
/// Moving a slot to a new period and recording the first weight in it is a
/// single compare-and-swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TaggedCount {
    tag: u32,
    count: u32,
}

fn tag_of(period: u64) -> u32 {
    period as u32
}

impl TaggedCount {
    fn unpack(word: u64) -> Self {
        Self {
            tag: (word >> 32) as u32,
            count: word as u32,
        }
    }

    fn pack(self) -> u64 {
        (u64::from(self.tag) << 32) | u64::from(self.count)
    }

    fn count_for(self, period: u64) -> u64 {
        if self.tag == tag_of(period) {
            u64::from(self.count)
        } else {
            0
        }
    }

    /// Whether the slot holds weight recorded for a period after `period`.
    ///
    /// Writers never store a zero count, so an empty slot is never ahead.
    fn is_ahead_of(self, period: u64) -> bool {
        self.count > 0 && (self.tag.wrapping_sub(tag_of(period)) as i32) > 0
    }
}

/// Sliding-window throttle built on atomics.
///
/// # Synchronization
///
/// - `last_period` only moves forward, via `fetch_max`, and is advanced
///   *before* a caller touches any slot. A slot can therefore never carry a
///   period beyond `last_period`.
/// - A caller admits by swapping the current slot from the exact word it read
///   to `(period, count + weight)`. A concurrent increment or roll-over of the
///   same slot makes the swap fail and the caller re-evaluates, so increments
///   are never lost and the current slot never exceeds the limit.
/// - The previous slot is read without a swap. A caller still finishing an
///   increment for the previous period can make that read slightly stale,
///   which may over-admit a little right after a period boundary.
///
/// Tags repeat every 2^32 periods: a slot left untouched for that long (about
/// 49 days with a 1 ms window) could be mistaken for a fresh one.
pub(crate) struct LockFreeThrottle<C> {
    window_length: WindowLengthMs,
    limit: u32,
    clock: C,
    counters: [AtomicU64; 2],
    last_period: AtomicU64,
}

impl<C: Clock> LockFreeThrottle<C> {
    pub(crate) fn new(window_length: WindowLengthMs, limit: u32, clock: C) -> Self {
        Self {
            window_length,
            limit,
            clock,
            counters: [AtomicU64::new(0), AtomicU64::new(0)],
            last_period: AtomicU64::new(0),
        }
    } // end constructor

    fn observe(&self) -> PeriodPosition {
        PeriodPosition::locate(self.clock.now_millis(), *self.window_length)
    }

    fn slots(&self, position: PeriodPosition) -> (u64, u64) {
        (
            self.counters[position.current_slot()].load(Ordering::Acquire),
            self.counters[position.previous_slot()].load(Ordering::Acquire),
        )
    }
} // end of impl

impl<C: Clock> AdmissionControl for LockFreeThrottle<C> {
    fn allow_n(&self, weight: u32) -> bool {
        let window_ms = *self.window_length;
        let mut observed = self.observe();

        loop {
            let last = self.last_period.fetch_max(observed.period, Ordering::AcqRel);
            let position = observed.resolve_unsynchronized(last);

            if position.period > last {
                tracing::trace!(
                    period = position.period,
                    idle_periods = position.period - last,
                    "throttle.roll_over"
                );
            }

            let previous_period = position.period.wrapping_sub(1);
            let (current_word, previous_word) = self.slots(position);
            let current_slot = TaggedCount::unpack(current_word);
            let previous_slot = TaggedCount::unpack(previous_word);

            // Another caller has already moved past our reading. If
            // `last_period` agrees, take a fresh reading; otherwise the tag is
            // an ancient wrapped-around one and simply stale.
            if (current_slot.is_ahead_of(position.period)
                || previous_slot.is_ahead_of(previous_period))
                && self.last_period.load(Ordering::Acquire) > position.period
            {
                observed = self.observe();
                continue;
            }

            if weight == 0 {
                return true;
            }

            let current = current_slot.count_for(position.period);
            let previous = previous_slot.count_for(previous_period);
            let load = current + position.prorate(previous, window_ms);

            if load + u64::from(weight) > u64::from(self.limit) {
                return false;
            }

            // `current + weight <= limit <= u32::MAX`
            let next = TaggedCount {
                tag: tag_of(position.period),
                count: (current + u64::from(weight)) as u32,
            };

            if self.counters[position.current_slot()]
                .compare_exchange_weak(
                    current_word,
                    next.pack(),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                return true;
            }
        }
    } // end method allow_n

    fn estimated_load(&self) -> u64 {
        let last = self.last_period.load(Ordering::Acquire);
        let position = self.observe().resolve_unsynchronized(last);

        let (current_word, previous_word) = self.slots(position);
        let current = TaggedCount::unpack(current_word).count_for(position.period);
        let previous =
            TaggedCount::unpack(previous_word).count_for(position.period.wrapping_sub(1));

        current + position.prorate(previous, *self.window_length)
    } // end method estimated_load

    fn snapshot(&self) -> ThrottleSnapshot {
        let last_period = self.last_period.load(Ordering::Acquire);

        let mut counters = [0; 2];
        for (slot, counter) in counters.iter_mut().enumerate() {
            let period = if slot as u64 == last_period % 2 {
                last_period
            } else if last_period == 0 {
                continue;
            } else {
                last_period - 1
            };

            *counter = TaggedCount::unpack(self.counters[slot].load(Ordering::Acquire))
                .count_for(period);
        }

        ThrottleSnapshot {
            last_period,
            counters,
        }
    } // end method snapshot
}
