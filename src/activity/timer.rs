//! Activity timers
//!
//! A node's timing is OK only when every timer it carries, and every timer
//! carried by its ancestors, reports due for the current month.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::core::calendar::SimDate;

pub trait ActivityTimer: Debug {
    fn is_due(&self, today: SimDate) -> bool;
}

/// Due in every month from `start_month` to `end_month` inclusive
///
/// A start later than the end wraps over the new year (11..=2 is Nov to Feb).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthRangeTimer {
    pub start_month: u32,
    pub end_month: u32,
}

impl MonthRangeTimer {
    pub fn new(start_month: u32, end_month: u32) -> Self {
        Self {
            start_month: start_month.clamp(1, 12),
            end_month: end_month.clamp(1, 12),
        }
    }
}

impl ActivityTimer for MonthRangeTimer {
    fn is_due(&self, today: SimDate) -> bool {
        let month = today.month;
        if self.start_month <= self.end_month {
            month >= self.start_month && month <= self.end_month
        } else {
            month >= self.start_month || month <= self.end_month
        }
    }
}

/// Due every `interval_months` months counted from `start`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalTimer {
    pub start: SimDate,
    pub interval_months: u32,
}

impl IntervalTimer {
    pub fn new(start: SimDate, interval_months: u32) -> Self {
        Self {
            start,
            interval_months: interval_months.max(1),
        }
    }
}

impl ActivityTimer for IntervalTimer {
    fn is_due(&self, today: SimDate) -> bool {
        let elapsed = today.months_since(&self.start);
        elapsed >= 0 && elapsed % self.interval_months as i64 == 0
    }
}

/// Due only when all nested timers are due
#[derive(Debug, Default)]
pub struct TimerGroup {
    timers: Vec<Box<dyn ActivityTimer>>,
}

impl TimerGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timer(mut self, timer: impl ActivityTimer + 'static) -> Self {
        self.timers.push(Box::new(timer));
        self
    }
}

impl ActivityTimer for TimerGroup {
    fn is_due(&self, today: SimDate) -> bool {
        self.timers.iter().all(|t| t.is_due(today))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_range_wraps_new_year() {
        let summer = MonthRangeTimer::new(11, 2);
        assert!(summer.is_due(SimDate::new(2000, 12)));
        assert!(summer.is_due(SimDate::new(2001, 1)));
        assert!(summer.is_due(SimDate::new(2001, 2)));
        assert!(!summer.is_due(SimDate::new(2001, 3)));
        assert!(!summer.is_due(SimDate::new(2001, 10)));
    }

    #[test]
    fn test_month_range_within_year() {
        let autumn = MonthRangeTimer::new(3, 5);
        assert!(autumn.is_due(SimDate::new(2000, 4)));
        assert!(!autumn.is_due(SimDate::new(2000, 6)));
    }

    #[test]
    fn test_interval() {
        let quarterly = IntervalTimer::new(SimDate::new(2000, 2), 3);
        assert!(!quarterly.is_due(SimDate::new(2000, 1)));
        assert!(quarterly.is_due(SimDate::new(2000, 2)));
        assert!(!quarterly.is_due(SimDate::new(2000, 3)));
        assert!(quarterly.is_due(SimDate::new(2000, 5)));
        assert!(quarterly.is_due(SimDate::new(2001, 2)));
    }

    #[test]
    fn test_group_needs_every_timer() {
        let group = TimerGroup::new()
            .with_timer(MonthRangeTimer::new(1, 6))
            .with_timer(IntervalTimer::new(SimDate::new(2000, 1), 2));
        assert!(group.is_due(SimDate::new(2000, 3)));
        assert!(!group.is_due(SimDate::new(2000, 4)));
        assert!(!group.is_due(SimDate::new(2000, 7)));
    }
}
