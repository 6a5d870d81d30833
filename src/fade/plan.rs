// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Splitting a long fade into native hub fades.
//!
//! A single `#OUTPUT` command can fade for at most `cap` seconds. A longer
//! fade of `d` seconds becomes `ceil(d / cap)` consecutive commands: all but
//! the last run for `cap` seconds, the last for the remainder. Each command
//! targets the level the overall fade should have reached at the end of
//! that command:
//!
//! ```text
//! level(t) = round(start + (target - start) * t / d)
//! ```
//!
//! For 100% to 0% over 9000 s with a 7200 s cap this gives `20% over 7200 s`
//! followed by `0% over 1800 s`.

use serde::{Deserialize, Serialize};

use crate::types::{Brightness, FadeDuration};

/// One native fade command of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FadeStep {
    /// Level the command fades to.
    pub level: Brightness,
    /// Native fade time of the command.
    pub fade: FadeDuration,
    /// Seconds of the overall fade elapsed when this step ends.
    pub ends_at: u32,
}

/// The native commands that make up one requested fade.
///
/// Steps are computed on demand, so a plan costs the same whatever its
/// length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FadePlan {
    start: Brightness,
    target: Brightness,
    duration: FadeDuration,
    cap: FadeDuration,
}

impl FadePlan {
    /// Plans a fade from `start` to `target` over `duration`, with no
    /// single step longer than `cap`.
    ///
    /// A zero duration yields one immediate step. A zero cap is treated as
    /// one second.
    ///
    /// # Examples
    ///
    /// ```
    /// use lipfade::fade::FadePlan;
    /// use lipfade::types::{Brightness, FadeDuration};
    ///
    /// let plan = FadePlan::new(
    ///     Brightness::FULL,
    ///     Brightness::OFF,
    ///     FadeDuration::from_seconds(9000),
    ///     FadeDuration::from_seconds(7200),
    /// );
    ///
    /// let steps: Vec<_> = plan.steps().map(|s| (s.level.value(), s.fade.seconds())).collect();
    /// assert_eq!(steps, vec![(20, 7200), (0, 1800)]);
    /// ```
    #[must_use]
    pub fn new(
        start: Brightness,
        target: Brightness,
        duration: FadeDuration,
        cap: FadeDuration,
    ) -> Self {
        Self {
            start,
            target,
            duration,
            cap: FadeDuration::from_seconds(cap.seconds().max(1)),
        }
    }

    /// Returns how many native commands a fade of `duration` needs.
    #[must_use]
    pub fn step_count(duration: FadeDuration, cap: FadeDuration) -> u32 {
        duration.seconds().div_ceil(cap.seconds().max(1)).max(1)
    }

    /// Returns how many native commands this plan issues.
    #[must_use]
    pub fn step_total(&self) -> u32 {
        Self::step_count(self.duration, self.cap)
    }

    /// Returns the step at `index`, or `None` past the last step.
    #[must_use]
    pub fn step(&self, index: u32) -> Option<FadeStep> {
        let count = self.step_total();
        if index >= count {
            return None;
        }
        let total = self.duration.seconds();
        if total == 0 {
            return Some(FadeStep {
                level: self.target,
                fade: FadeDuration::IMMEDIATE,
                ends_at: 0,
            });
        }

        let cap = self.cap.seconds();
        let begins_at = index * cap;
        let last = index + 1 == count;
        let ends_at = if last { total } else { (index + 1) * cap };
        let level = if last {
            self.target
        } else {
            interpolate(
                self.start,
                self.target,
                u64::from(ends_at),
                u64::from(total),
            )
        };
        Some(FadeStep {
            level,
            fade: FadeDuration::from_seconds(ends_at - begins_at),
            ends_at,
        })
    }

    /// Returns the level the zone is at when the step at `index` begins.
    #[must_use]
    pub fn level_before(&self, index: u32) -> Brightness {
        index
            .checked_sub(1)
            .and_then(|previous| self.step(previous))
            .map_or(self.start, |step| step.level)
    }

    /// Returns the native commands in order.
    pub fn steps(&self) -> impl Iterator<Item = FadeStep> + '_ {
        (0..self.step_total()).filter_map(|index| self.step(index))
    }

    /// Returns the start level.
    #[must_use]
    pub fn start(&self) -> Brightness {
        self.start
    }

    /// Returns the target level.
    #[must_use]
    pub fn target(&self) -> Brightness {
        self.target
    }

    /// Returns the requested duration.
    #[must_use]
    pub fn duration(&self) -> FadeDuration {
        self.duration
    }

    /// Returns `true` if the plan is a single immediate step.
    #[must_use]
    pub fn is_snap(&self) -> bool {
        self.duration.is_immediate()
    }
}

/// Level reached after `elapsed` of `total` units, rounded half away from
/// zero and clamped to the range between `start` and `target`.
///
/// A zero `total` is already at the target.
pub(crate) fn interpolate(
    start: Brightness,
    target: Brightness,
    elapsed: u64,
    total: u64,
) -> Brightness {
    if total == 0 {
        return target;
    }
    let from = i128::from(start.value());
    let to = i128::from(target.value());
    let total = i128::from(total);
    let scaled = (to - from) * i128::from(elapsed);
    let offset = (2 * scaled + scaled.signum() * total) / (2 * total);
    let level = (from + offset).clamp(from.min(to), from.max(to));
    Brightness::clamped(u8::try_from(level).unwrap_or(u8::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pct(v: u8) -> Brightness {
        Brightness::new(v).unwrap()
    }

    fn secs(s: u32) -> FadeDuration {
        FadeDuration::from_seconds(s)
    }

    const CAP: FadeDuration = FadeDuration::from_seconds(7200);

    #[test]
    fn zero_duration_is_one_snap() {
        let plan = FadePlan::new(pct(30), pct(80), FadeDuration::IMMEDIATE, CAP);
        assert!(plan.is_snap());
        assert_eq!(
            plan.steps().collect::<Vec<_>>(),
            vec![FadeStep {
                level: pct(80),
                fade: FadeDuration::IMMEDIATE,
                ends_at: 0,
            }]
        );
    }

    #[test]
    fn duration_within_cap_is_one_step() {
        let plan = FadePlan::new(pct(0), pct(100), secs(5400), CAP);
        assert_eq!(plan.step_total(), 1);
        let step = plan.step(0).unwrap();
        assert_eq!(step.fade, secs(5400));
        assert_eq!(step.level, pct(100));
        assert_eq!(plan.step(1), None);
    }

    #[test]
    fn duration_equal_to_cap_is_one_step() {
        let plan = FadePlan::new(pct(0), pct(100), CAP, CAP);
        assert_eq!(plan.step_total(), 1);
        assert_eq!(FadePlan::step_count(CAP, CAP), 1);
    }

    #[test]
    fn long_fade_splits_at_cap() {
        let plan = FadePlan::new(pct(100), pct(0), secs(9000), CAP);
        let steps: Vec<(u8, u32)> = plan
            .steps()
            .map(|s| (s.level.value(), s.fade.seconds()))
            .collect();
        assert_eq!(steps, vec![(20, 7200), (0, 1800)]);
        assert_eq!(plan.level_before(0), pct(100));
        assert_eq!(plan.level_before(1), pct(20));
    }

    #[test]
    fn step_count_and_sum_match_duration() {
        for total in [1, 59, 7199, 7200, 7201, 14_400, 14_401, 30_000, 86_400] {
            let plan = FadePlan::new(pct(10), pct(90), secs(total), CAP);
            let steps: Vec<FadeStep> = plan.steps().collect();
            let count = u32::try_from(steps.len()).unwrap();
            assert_eq!(count, total.div_ceil(7200), "count for {total}");
            assert_eq!(count, plan.step_total());
            let sum: u32 = steps.iter().map(|s| s.fade.seconds()).sum();
            assert_eq!(sum, total, "sum for {total}");
            assert!(steps.iter().all(|s| s.fade <= CAP));
            assert_eq!(steps.last().unwrap().ends_at, total);
        }
    }

    #[test]
    fn levels_are_monotonic_and_bounded() {
        let cap = secs(60);
        for (start, target) in [(0, 100), (100, 0), (37, 38), (90, 10), (50, 50)] {
            let plan = FadePlan::new(pct(start), pct(target), secs(3599), cap);
            let levels: Vec<u8> = plan.steps().map(|s| s.level.value()).collect();
            let (lo, hi) = (start.min(target), start.max(target));
            assert!(levels.iter().all(|l| (lo..=hi).contains(l)));
            if start <= target {
                assert!(levels.windows(2).all(|w| w[0] <= w[1]));
            } else {
                assert!(levels.windows(2).all(|w| w[0] >= w[1]));
            }
            assert_eq!(*levels.last().unwrap(), target);
        }
    }

    #[test]
    fn huge_plan_is_computed_on_demand() {
        let plan = FadePlan::new(pct(0), pct(100), secs(u32::MAX), secs(1));
        assert_eq!(plan.step_total(), u32::MAX);

        let last = plan.step(u32::MAX - 1).unwrap();
        assert_eq!(last.level, pct(100));
        assert_eq!(last.fade, secs(1));
        assert_eq!(last.ends_at, u32::MAX);
        assert_eq!(plan.step(u32::MAX / 2).unwrap().level, pct(50));
        assert_eq!(plan.steps().take(3).count(), 3);
    }

    #[test]
    fn interpolation_rounds_to_nearest() {
        // 1/3 of the way from 0 to 100 is 33.3
        assert_eq!(interpolate(pct(0), pct(100), 1, 3), pct(33));
        // 2/3 is 66.7
        assert_eq!(interpolate(pct(0), pct(100), 2, 3), pct(67));
        // halfway from 0 to 1 rounds away from the start
        assert_eq!(interpolate(pct(0), pct(1), 1, 2), pct(1));
        assert_eq!(interpolate(pct(1), pct(0), 1, 2), pct(0));
        assert_eq!(interpolate(pct(20), pct(70), 0, 0), pct(70));
    }

    #[test]
    fn zero_cap_is_treated_as_one_second() {
        let plan = FadePlan::new(pct(0), pct(3), secs(3), FadeDuration::IMMEDIATE);
        assert_eq!(plan.step_total(), 3);
    }
}
