use crate::window::{PeriodPosition, WindowState};

#[test]
fn locate_splits_reading_into_period_and_offset() {
    let position = PeriodPosition::locate(1_234, 100);
    assert_eq!(position.period, 12);
    assert_eq!(position.offset_ms, 34);
    assert_eq!(position.current_slot(), 0);
    assert_eq!(position.previous_slot(), 1);

    let position = PeriodPosition::locate(1_300, 100);
    assert_eq!(position.period, 13);
    assert_eq!(position.offset_ms, 0);
    assert_eq!(position.current_slot(), 1);
    assert_eq!(position.previous_slot(), 0);
}

#[test]
fn proration_decreases_linearly_through_the_period() {
    assert_eq!(PeriodPosition::locate(1_000, 100).prorate(100, 100), 100);
    assert_eq!(PeriodPosition::locate(1_025, 100).prorate(100, 100), 75);
    assert_eq!(PeriodPosition::locate(1_050, 100).prorate(100, 100), 50);
    assert_eq!(PeriodPosition::locate(1_099, 100).prorate(100, 100), 1);
    assert_eq!(PeriodPosition::locate(1_099, 100).prorate(99, 100), 0);
}

#[test]
fn proration_floor_is_exact() {
    // 90 * 7 / 10 = 63 exactly; 90.0 * 0.7 lands just below it.
    assert_eq!(PeriodPosition::locate(10_013, 10).prorate(90, 10), 63);
    assert_eq!(PeriodPosition::locate(10_013, 10).prorate(91, 10), 63);
    // No intermediate overflow for huge counts.
    assert_eq!(
        PeriodPosition::locate(10_013, 10).prorate(u64::MAX, 10),
        u64::MAX / 10 * 7 + 3
    );
}

#[test]
fn unsynchronized_resolve_tolerates_one_period_of_lag() {
    let observed = PeriodPosition::locate(1_050, 100);

    assert!(!observed.lags_behind(10));
    assert!(!observed.lags_behind(11));
    assert!(observed.lags_behind(12));

    assert_eq!(observed.resolve_unsynchronized(10), observed);
    assert_eq!(observed.resolve_unsynchronized(11), PeriodPosition::start_of(11));
    assert_eq!(observed.resolve_unsynchronized(12), PeriodPosition::start_of(12));
}

#[test]
fn resolve_clamps_older_readings_to_start_of_last_period() {
    let observed = PeriodPosition::locate(1_050, 100);

    assert_eq!(observed.resolve(10), observed);
    assert_eq!(observed.resolve(3), observed);
    assert_eq!(observed.resolve(11), PeriodPosition::start_of(11));
}

#[test]
fn roll_over_into_next_period_resets_current_slot_only() {
    let mut state = WindowState {
        counters: [7, 3],
        last_period: 10,
    };

    let position = state.roll_over(PeriodPosition::locate(1_120, 100));
    assert_eq!(position.period, 11);
    assert_eq!(state.counters, [7, 0]);
    assert_eq!(state.last_period, 11);
}

#[test]
fn roll_over_after_idle_periods_resets_both_slots() {
    let mut state = WindowState {
        counters: [7, 3],
        last_period: 10,
    };

    state.roll_over(PeriodPosition::locate(1_200, 100));
    assert_eq!(state.counters, [0, 0]);
    assert_eq!(state.last_period, 12);
}

#[test]
fn roll_over_within_period_or_backwards_keeps_state() {
    let mut state = WindowState {
        counters: [7, 3],
        last_period: 10,
    };

    state.roll_over(PeriodPosition::locate(1_099, 100));
    assert_eq!(state.counters, [7, 3]);

    let position = state.roll_over(PeriodPosition::locate(150, 100));
    assert_eq!(position, PeriodPosition::start_of(10));
    assert_eq!(state.counters, [7, 3]);
    assert_eq!(state.last_period, 10);
}

#[test]
fn admit_counts_current_plus_prorated_previous() {
    let mut state = WindowState {
        counters: [2, 8],
        last_period: 10,
    };

    // 1_075: period 10, a quarter of period 9 still covered -> 2 + 2 = 4.
    let observed = PeriodPosition::locate(1_075, 100);
    assert_eq!(state.estimated_load(observed, 100), 4);

    assert!(state.admit(observed, 100, 10, 6));
    assert_eq!(state.counters, [8, 8]);

    assert!(!state.admit(observed, 100, 10, 1));
    assert_eq!(state.counters, [8, 8]);
}

#[test]
fn peek_load_matches_what_admit_would_see() {
    let state = WindowState {
        counters: [6, 4],
        last_period: 11,
    };

    for now_ms in [1_100, 1_150, 1_199, 1_200, 1_260, 1_300, 5_000, 10] {
        let observed = PeriodPosition::locate(now_ms, 100);

        let mut rolled = state.clone();
        let position = rolled.roll_over(observed);

        assert_eq!(
            state.peek_load(observed, 100),
            rolled.estimated_load(position, 100),
            "now_ms={now_ms}"
        );
    }
}
