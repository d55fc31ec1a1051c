use rustc_hash::FxHashMap;
use std::hash::Hash;

/// A span of whole pixels.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Bar {
    pub start: i64,
    pub end: i64,
}

/// Maps back-to-back category intervals given in (fractional) pixels onto
/// whole pixels.
///
/// Each category carries the fraction of a pixel it has not been given yet
/// into its next interval, so many short intervals still add up to the
/// right width. The gaps between intervals are tracked as a category of
/// their own (`None`). When a gap is long enough to be drawn, it first
/// hands some of its width to categories that are owed part of a pixel, so
/// a short interval followed by a gap does not vanish. Width handed out
/// that way is an advance: it is paid back from the category's next real
/// time, and only categories that are owed more than they were advanced
/// can receive any. A category's painted width therefore never differs
/// from its real width by a whole pixel.
#[derive(Debug)]
pub struct Dithering<G> {
    groups: FxHashMap<Option<G>, GroupState>,
    position: f64,
    last_reported_position: i64,
}

#[derive(Copy, Clone, Default, Debug)]
struct GroupState {
    /// Width not yet painted, including any advance.
    error: f64,
    /// Width painted ahead of real time, still to be paid back.
    advance: f64,
}

impl GroupState {
    /// Real width minus painted width.
    fn owed(&self) -> f64 {
        self.error - self.advance
    }
}

/// A category owed less than this gets no gap width.
const MIN_OWED: f64 = 1e-6;

impl<G> Default for Dithering<G>
where
    G: Eq + Hash + Clone,
{
    fn default() -> Dithering<G> {
        Dithering::new()
    }
}

impl<G> Dithering<G>
where
    G: Eq + Hash + Clone,
{
    pub fn new() -> Dithering<G> {
        Dithering {
            groups: FxHashMap::default(),
            position: 0.0,
            last_reported_position: 0,
        }
    }

    /// Accounts for the gap up to `start` and then for `group` being active
    /// from `start` to `end`. Returns the pixels to paint for `group`, if it
    /// has accumulated at least one.
    pub fn append_interval(&mut self, group: G, start: f64, end: f64) -> Option<Bar> {
        self.inner_append(None, start);
        self.inner_append(Some(group), end)
    }

    fn inner_append(&mut self, group: Option<G>, position: f64) -> Option<Bar> {
        if position < self.position {
            return None;
        }

        let mut state = self.groups.get(&group).copied().unwrap_or_default();
        let mut elapsed = position - self.position;

        let repaid = elapsed.min(state.advance);
        state.advance -= repaid;
        elapsed -= repaid;

        let mut result = None;
        let mut length = state.error + elapsed;

        if length >= 1.0 {
            if group.is_none() {
                length -= self.distribute_extra_amount(length - 1.0);
            }
            let new_reported_position = self.last_reported_position + length.floor() as i64;
            result = Some(Bar {
                start: self.last_reported_position,
                end: new_reported_position,
            });
            self.last_reported_position = new_reported_position;
            length = length.fract();
        }

        state.error = length;
        self.groups.insert(group, state);
        self.position = position;
        result
    }

    /// Moves up to `amount` of gap width to the categories that are still
    /// owed width, never raising a category's carried error above one pixel.
    /// Returns how much was moved.
    fn distribute_extra_amount(&mut self, amount: f64) -> f64 {
        let can_consume: f64 = self
            .groups
            .iter()
            .filter(|(group, state)| group.is_some() && state.owed() > MIN_OWED)
            .map(|(_, state)| 1.0 - state.error)
            .sum();

        let to_distribute = amount.min(can_consume);
        if to_distribute <= 0.0 {
            return 0.0;
        }

        let ratio = to_distribute / can_consume;
        for (group, state) in self.groups.iter_mut() {
            if group.is_some() && state.owed() > MIN_OWED {
                let share = (1.0 - state.error) * ratio;
                state.error += share;
                state.advance += share;
            }
        }
        to_distribute
    }

    /// Real width of `group` minus the width painted for it so far. Negative
    /// while the group is painted ahead.
    pub fn carried_error(&self, group: &G) -> f64 {
        self.groups
            .get(&Some(group.clone()))
            .map_or(0.0, GroupState::owed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn whole_pixels_pass_through() {
        let mut d = Dithering::new();
        assert_eq!(d.append_interval("a", 0.0, 3.0), Some(Bar { start: 0, end: 3 }));
        assert_eq!(d.append_interval("b", 3.0, 5.0), Some(Bar { start: 3, end: 5 }));
    }

    #[test]
    fn sub_pixel_intervals_accumulate() {
        let mut d = Dithering::new();
        assert_eq!(d.append_interval("a", 0.0, 0.4), None);
        assert_eq!(d.append_interval("a", 0.4, 0.8), None);
        assert_eq!(d.append_interval("a", 0.8, 1.2), Some(Bar { start: 0, end: 1 }));
        assert!((d.carried_error(&"a") - 0.2).abs() < 1e-9);
    }

    #[test]
    fn backwards_positions_are_ignored() {
        let mut d = Dithering::new();
        d.append_interval("a", 0.0, 5.0);
        assert_eq!(d.append_interval("b", 2.0, 4.0), None);
        assert_eq!(d.append_interval("b", 5.0, 7.0), Some(Bar { start: 5, end: 7 }));
    }

    #[test]
    fn short_gaps_are_carried() {
        let mut d = Dithering::new();
        assert_eq!(d.append_interval("a", 0.0, 2.0), Some(Bar { start: 0, end: 2 }));
        // Half a pixel of gap is not drawn yet.
        assert_eq!(d.append_interval("a", 2.5, 4.5), Some(Bar { start: 2, end: 4 }));
        // The second half pixel of gap completes it.
        assert_eq!(d.append_interval("a", 5.0, 6.0), Some(Bar { start: 5, end: 6 }));
    }

    #[test]
    fn gap_gives_width_to_short_interval() {
        let mut d = Dithering::new();
        // 0.75 of "a" is owed when a long gap follows.
        assert_eq!(d.append_interval("a", 0.0, 0.75), None);
        // The gap hands 0.25 to "a", so "a" gets a pixel as soon as it shows
        // up again instead of being rounded away.
        assert_eq!(d.append_interval("a", 5.0, 5.0), Some(Bar { start: 4, end: 5 }));
        assert!((d.carried_error(&"a") + 0.25).abs() < 1e-9);
        // The advance is paid back before "a" accumulates again.
        assert_eq!(d.append_interval("a", 5.0, 5.25), None);
        assert!(d.carried_error(&"a").abs() < 1e-9);
        assert_eq!(d.groups[&Some("a")].error, 0.0);
    }

    #[test]
    fn stealing_is_capped() {
        let mut d = Dithering::new();
        d.append_interval("a", 0.0, 0.5);
        d.append_interval("b", 0.5, 0.75);
        // A 1.25 pixel gap can give away at most 0.25.
        d.append_interval("c", 2.0, 2.0);
        let a = d.groups[&Some("a")];
        let b = d.groups[&Some("b")];
        assert!(a.error > 0.5 && a.error < 1.0);
        assert!(b.error > 0.25 && b.error < 1.0);
        assert!((a.advance + b.advance - 0.25).abs() < 1e-9);
        // What they were given is not owed to them.
        assert!((d.carried_error(&"a") - 0.5).abs() < 1e-9);
        assert!((d.carried_error(&"b") - 0.25).abs() < 1e-9);
    }

    #[test]
    fn repeated_short_intervals_between_gaps() {
        let mut d = Dithering::new();
        let mut painted = 0;
        for i in 0..10 {
            let start = i as f64 * 2.0;
            if let Some(bar) = d.append_interval("a", start, start + 0.01) {
                painted += bar.end - bar.start;
            }
        }
        // At most the first interval is topped up to a pixel. The following
        // ones pay that back instead of borrowing again.
        assert!(painted <= 1);
        let real = 10.0 * 0.01;
        assert!(painted as f64 - real < 1.0);
        assert!((real - painted as f64 - d.carried_error(&"a")).abs() < 1e-6);
    }

    #[test]
    fn error_stays_below_one_pixel() {
        // Contiguous intervals of irregular widths, cycling through three
        // categories.
        let groups = ["a", "b", "c"];
        let widths = [0.3, 1.7, 0.05, 2.45, 0.9, 0.12, 3.3, 0.61, 0.01, 1.0, 0.77, 0.49];

        let mut d = Dithering::new();
        let mut real = FxHashMap::<&str, f64>::default();
        let mut painted = FxHashMap::<&str, i64>::default();
        let mut position = 0.0;

        for (i, width) in widths.iter().cycle().take(200).enumerate() {
            let group = groups[i % groups.len()];
            let end = position + width;
            if let Some(bar) = d.append_interval(group, position, end) {
                assert!(bar.end > bar.start);
                *painted.entry(group).or_default() += bar.end - bar.start;
            }
            *real.entry(group).or_default() += width;
            position = end;

            for group in groups {
                let real = real.get(group).copied().unwrap_or(0.0);
                let painted = painted.get(group).copied().unwrap_or(0) as f64;
                let difference = real - painted;
                assert!(difference.abs() < 1.0, "{}: {} vs {}", group, real, painted);
                assert!((difference - d.carried_error(&group)).abs() < 1e-6);
            }
        }
    }

    /// Checks that painted and real width of every group differ by less
    /// than a pixel, after every interval.
    fn check_error_bound(intervals: &[(usize, f64, f64)]) {
        let groups = ["a", "b", "c", "d"];
        let mut d = Dithering::new();
        let mut real = FxHashMap::<&str, f64>::default();
        let mut painted = FxHashMap::<&str, i64>::default();
        let mut position = 0.0;

        for &(group, gap, width) in intervals {
            let group = groups[group % groups.len()];
            let start = position + gap;
            let end = start + width;
            if let Some(bar) = d.append_interval(group, start, end) {
                assert!(bar.end >= bar.start);
                *painted.entry(group).or_default() += bar.end - bar.start;
            }
            *real.entry(group).or_default() += width;
            position = end;

            for group in groups {
                let real = real.get(group).copied().unwrap_or(0.0);
                let painted = painted.get(group).copied().unwrap_or(0) as f64;
                let difference = real - painted;
                assert!(difference.abs() < 1.0, "{}: {} vs {}", group, real, painted);
                assert!((difference - d.carried_error(&group)).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn gaps_and_short_intervals() {
        let mut intervals = Vec::new();
        for i in 0..300 {
            let gap = [0.0, 1.99, 0.3, 4.5, 0.0, 0.98][i % 6];
            let width = [0.01, 0.4, 0.05, 1.3, 0.002, 0.75, 2.6][i % 7];
            intervals.push((i % 3, gap, width));
        }
        check_error_bound(&intervals);
    }

    proptest! {
        #[test]
        fn error_bound_holds_with_gaps(
            intervals in proptest::collection::vec(
                (0..4usize, prop_oneof![Just(0.0), 0.0..3.0f64], 0.0..2.5f64),
                1..200,
            )
        ) {
            check_error_bound(&intervals);
        }
    }
}
