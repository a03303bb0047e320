//! State transition rules for incoming signal and range events.
//!
//! All functions here are pure with respect to the clock: callers pass the
//! mutation wall-clock in so the rules stay deterministic under test. The
//! engine never expires records on its own; any time-based hiding is a
//! viewer concern.

use super::{ChannelKey, Family, Polarity, RangeRecord, RangeWindow, SignalRecord, SymbolState};

/// Outcome of applying a signal event to one symbol's state.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The channel was written; callers persist and broadcast.
    Updated { key: ChannelKey, record: SignalRecord },
    /// A gating STOP arrived with no active GO; state is untouched.
    Ignored,
}

/// Merge one signal event into `state`.
///
/// Repeats of the family's last-active channel increment `repeat_count` and
/// carry `first_seen_at` forward; any other arrival resets the count to 1,
/// restarts the run clock and deactivates the sibling channel (its record
/// keeps its price and time, only `active` flips).
pub fn apply(
    state: &mut SymbolState,
    family: Family,
    polarity: Polarity,
    price: f64,
    time: &str,
    now_ms: i64,
) -> Transition {
    let key = ChannelKey::new(family, polarity);

    // A STOP on a gating channel only lands on top of an existing GO.
    if family.is_gating() && polarity == Polarity::Sell {
        let has_go = state
            .channel(key)
            .is_some_and(|r| r.polarity == Some(Polarity::Buy));
        if !has_go {
            return Transition::Ignored;
        }
    }

    let is_repeat = state.last_active.get(&family) == Some(&key);
    let (repeat_count, first_seen_at) = if is_repeat {
        let prior = state.channel(key);
        (
            prior.map_or(0, |r| r.repeat_count) + 1,
            prior.map_or(now_ms, |r| r.first_seen_at),
        )
    } else {
        if let Some(sibling) = key.sibling() {
            if let Some(record) = state.channels.get_mut(&sibling) {
                record.active = false;
            }
        }
        (1, now_ms)
    };

    let record = SignalRecord {
        price,
        time: time.to_string(),
        first_seen_at,
        observed_at: now_ms,
        repeat_count,
        active: true,
        polarity: family.is_gating().then_some(polarity),
    };
    state.channels.insert(key, record.clone());
    state.last_active.insert(family, key);

    Transition::Updated { key, record }
}

/// Store one range window's high/low. Overwrites unconditionally; range
/// slots have no counters and no last-active involvement.
pub fn apply_range(
    state: &mut SymbolState,
    window: RangeWindow,
    high: f64,
    low: f64,
    time: &str,
    now_ms: i64,
) -> RangeRecord {
    let record = RangeRecord {
        high,
        low,
        time: time.to_string(),
        observed_at: now_ms,
    };
    state.ranges.insert(window, record.clone());
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    fn updated(transition: Transition) -> SignalRecord {
        match transition {
            Transition::Updated { record, .. } => record,
            Transition::Ignored => panic!("expected Updated, got Ignored"),
        }
    }

    #[test]
    fn first_signal_starts_a_run() {
        let mut state = SymbolState::default();
        let record = updated(apply(&mut state, Family::Call1, Polarity::Buy, 100.0, "t1", 1_000));

        assert_eq!(record.repeat_count, 1);
        assert_eq!(record.first_seen_at, 1_000);
        assert_eq!(record.observed_at, 1_000);
        assert!(record.active);
        assert_eq!(record.polarity, None);
        let key = ChannelKey::new(Family::Call1, Polarity::Buy);
        assert_eq!(state.last_active.get(&Family::Call1), Some(&key));
    }

    #[test]
    fn repeats_increment_count_and_keep_first_seen() {
        let mut state = SymbolState::default();
        apply(&mut state, Family::Call1, Polarity::Buy, 100.0, "t1", 1_000);
        let second = updated(apply(&mut state, Family::Call1, Polarity::Buy, 101.0, "t2", 2_000));
        let third = updated(apply(&mut state, Family::Call1, Polarity::Buy, 102.0, "t3", 3_000));

        assert_eq!(second.repeat_count, 2);
        assert_eq!(third.repeat_count, 3);
        assert_eq!(second.price, 101.0);
        // The run clock points at the first event for the whole run.
        assert_eq!(second.first_seen_at, 1_000);
        assert_eq!(third.first_seen_at, 1_000);
        assert_eq!(third.observed_at, 3_000);
    }

    #[test]
    fn polarity_flip_resets_count_and_deactivates_sibling() {
        let mut state = SymbolState::default();
        apply(&mut state, Family::Call1, Polarity::Buy, 100.0, "t1", 1_000);
        let sell = updated(apply(&mut state, Family::Call1, Polarity::Sell, 99.0, "t2", 2_000));

        assert_eq!(sell.repeat_count, 1);
        assert_eq!(sell.first_seen_at, 2_000);
        assert!(sell.active);

        let buy = state
            .channel(ChannelKey::new(Family::Call1, Polarity::Buy))
            .unwrap();
        assert!(!buy.active);
        // Deactivation never rewrites the sibling's payload.
        assert_eq!(buy.price, 100.0);
        assert_eq!(buy.time, "t1");
        assert_eq!(buy.repeat_count, 1);
    }

    #[test]
    fn families_track_runs_independently() {
        let mut state = SymbolState::default();
        apply(&mut state, Family::Call1, Polarity::Buy, 100.0, "t1", 1_000);
        apply(&mut state, Family::Call2, Polarity::Sell, 50.0, "t2", 2_000);
        let call1_again = updated(apply(&mut state, Family::Call1, Polarity::Buy, 101.0, "t3", 3_000));

        // call2 activity does not break the call1 run.
        assert_eq!(call1_again.repeat_count, 2);
        assert_eq!(call1_again.first_seen_at, 1_000);

        let call2_sell = state
            .channel(ChannelKey::new(Family::Call2, Polarity::Sell))
            .unwrap();
        assert!(call2_sell.active);
    }

    #[test]
    fn hourly_and_page2_variants_are_separate_families() {
        let mut state = SymbolState::default();
        apply(&mut state, Family::Call1, Polarity::Buy, 100.0, "t1", 1_000);
        let hourly = updated(apply(&mut state, Family::Call1Hourly, Polarity::Buy, 100.5, "t2", 2_000));

        assert_eq!(hourly.repeat_count, 1);
        assert!(state
            .channel(ChannelKey::new(Family::Call1, Polarity::Buy))
            .unwrap()
            .active);
    }

    #[test]
    fn gating_stop_without_go_is_a_strict_noop() {
        let mut state = SymbolState::default();
        let before = state.clone();

        let transition = apply(&mut state, Family::Call3, Polarity::Sell, 10.0, "t1", 1_000);

        assert_eq!(transition, Transition::Ignored);
        assert_eq!(state, before);
        assert!(state
            .channel(ChannelKey::new(Family::Call3, Polarity::Sell))
            .is_none());
    }

    #[test]
    fn gating_go_then_stop_records_both_sequentially() {
        let mut state = SymbolState::default();
        let go = updated(apply(&mut state, Family::Call3, Polarity::Buy, 10.0, "t1", 1_000));
        assert_eq!(go.polarity, Some(Polarity::Buy));

        let stop = updated(apply(&mut state, Family::Call3, Polarity::Sell, 9.0, "t2", 2_000));
        assert_eq!(stop.polarity, Some(Polarity::Sell));
        assert!(stop.active);
        // Same key, so the STOP continues the run rather than resetting it.
        assert_eq!(stop.repeat_count, 2);
        assert_eq!(stop.first_seen_at, 1_000);

        let current = state
            .channel(ChannelKey::new(Family::Call3, Polarity::Buy))
            .unwrap();
        assert_eq!(current.polarity, Some(Polarity::Sell));
    }

    #[test]
    fn stop_after_stop_is_ignored_again() {
        let mut state = SymbolState::default();
        apply(&mut state, Family::Call3, Polarity::Buy, 10.0, "t1", 1_000);
        apply(&mut state, Family::Call3, Polarity::Sell, 9.0, "t2", 2_000);
        let before = state.clone();

        // The standing record is now a STOP, so another STOP has no GO to land on.
        let transition = apply(&mut state, Family::Call3, Polarity::Sell, 8.0, "t3", 3_000);
        assert_eq!(transition, Transition::Ignored);
        assert_eq!(state, before);
    }

    #[test]
    fn returning_to_a_channel_after_a_flip_starts_a_new_run() {
        let mut state = SymbolState::default();
        apply(&mut state, Family::Call2, Polarity::Buy, 100.0, "t1", 1_000);
        apply(&mut state, Family::Call2, Polarity::Sell, 99.0, "t2", 2_000);
        let back = updated(apply(&mut state, Family::Call2, Polarity::Buy, 101.0, "t3", 3_000));

        assert_eq!(back.repeat_count, 1);
        assert_eq!(back.first_seen_at, 3_000);
        assert!(!state
            .channel(ChannelKey::new(Family::Call2, Polarity::Sell))
            .unwrap()
            .active);
    }

    #[test]
    fn range_events_overwrite_without_counters() {
        let mut state = SymbolState::default();
        apply_range(&mut state, RangeWindow::Orb15m, 110.0, 90.0, "t1", 1_000);
        let second = apply_range(&mut state, RangeWindow::Orb15m, 112.0, 91.0, "t2", 2_000);

        assert_eq!(second.high, 112.0);
        assert_eq!(second.observed_at, 2_000);
        assert_eq!(state.ranges.len(), 1);
        assert_eq!(state.ranges.get(&RangeWindow::Orb15m), Some(&second));
        // Range traffic never touches signal channels or run tracking.
        assert!(state.channels.is_empty());
        assert!(state.last_active.is_empty());
    }
}
