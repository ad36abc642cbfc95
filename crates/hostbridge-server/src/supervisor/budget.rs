//! Rolling restart allowance.

use std::time::{Duration, Instant};

/// Counts restarts against a fixed-length window.
///
/// The window opens when the budget is created and is only rolled forward
/// when a caller observes that it has elapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartBudget {
    max: u32,
    window: Duration,
    window_started: Instant,
    used: u32,
}

impl RestartBudget {
    /// Opens a budget of `max` restarts per `window` starting at `now`.
    #[must_use]
    pub const fn new(max: u32, window: Duration, now: Instant) -> Self {
        Self {
            max,
            window,
            window_started: now,
            used: 0,
        }
    }

    fn expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.window_started) >= self.window
    }

    /// Starts a new window when the current one has elapsed.
    pub fn refresh(&mut self, now: Instant) {
        if self.expired(now) {
            self.window_started = now;
            self.used = 0;
        }
    }

    /// Records a restart when allowance remains.
    pub fn try_consume(&mut self, now: Instant) -> bool {
        self.refresh(now);
        if self.used >= self.max {
            return false;
        }
        self.used += 1;
        true
    }

    /// Restarts counted in the current window.
    #[must_use]
    pub fn used(&self, now: Instant) -> u32 {
        if self.expired(now) { 0 } else { self.used }
    }

    /// Restarts still allowed in the current window.
    #[must_use]
    pub fn remaining(&self, now: Instant) -> u32 {
        self.max.saturating_sub(self.used(now))
    }

    /// Time until the window rolls over.
    #[must_use]
    pub fn resets_in(&self, now: Instant) -> Duration {
        self.window
            .saturating_sub(now.saturating_duration_since(self.window_started))
    }

    /// Restarts allowed per window.
    #[must_use]
    pub const fn max(&self) -> u32 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const HOUR: Duration = Duration::from_secs(3_600);

    #[test]
    fn allows_up_to_max_within_window() {
        let start = Instant::now();
        let mut budget = RestartBudget::new(3, HOUR, start);
        let granted = (0..5)
            .filter(|minute| budget.try_consume(start + Duration::from_secs(minute * 60)))
            .count();
        assert_eq!(granted, 3);
        assert_eq!(budget.remaining(start + Duration::from_secs(600)), 0);
    }

    #[rstest]
    #[case::before_boundary(3_599, 0)]
    #[case::at_boundary(3_600, 2)]
    #[case::long_after(9_000, 2)]
    fn window_resets_lazily(#[case] later_secs: u64, #[case] expected_remaining: u32) {
        let start = Instant::now();
        let mut budget = RestartBudget::new(2, HOUR, start);
        assert!(budget.try_consume(start));
        assert!(budget.try_consume(start));
        let later = start + Duration::from_secs(later_secs);
        assert_eq!(budget.remaining(later), expected_remaining);
    }

    #[test]
    fn reports_time_until_reset() {
        let start = Instant::now();
        let budget = RestartBudget::new(1, HOUR, start);
        let resets_in = budget.resets_in(start + Duration::from_secs(600));
        assert_eq!(resets_in, Duration::from_secs(3_000));
    }
}
