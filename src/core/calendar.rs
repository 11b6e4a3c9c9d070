//! Calendar system for monthly time steps
//!
//! Activity timers check the current month to decide whether an activity
//! is due this step.

use serde::{Deserialize, Serialize};

use crate::core::types::Step;

/// A calendar month inside the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimDate {
    pub year: i32,
    /// 1 = January .. 12 = December
    pub month: u32,
}

impl SimDate {
    pub fn new(year: i32, month: u32) -> Self {
        Self {
            year,
            month: month.clamp(1, 12),
        }
    }

    /// Months elapsed since `other` (negative if `other` is later)
    pub fn months_since(&self, other: &SimDate) -> i64 {
        (self.year as i64 - other.year as i64) * 12 + (self.month as i64 - other.month as i64)
    }

    pub fn next_month(&self) -> Self {
        if self.month == 12 {
            Self::new(self.year + 1, 1)
        } else {
            Self::new(self.year, self.month + 1)
        }
    }
}

/// Calendar tracks simulation time in whole months
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calendar {
    step: Step,
    start: SimDate,
    today: SimDate,
}

impl Calendar {
    pub fn new(start: SimDate) -> Self {
        Self {
            step: 0,
            start,
            today: start,
        }
    }

    pub fn advance(&mut self) {
        self.step += 1;
        self.today = self.today.next_month();
    }

    pub fn current_step(&self) -> Step {
        self.step
    }

    pub fn today(&self) -> SimDate {
        self.today
    }

    pub fn start(&self) -> SimDate {
        self.start
    }
}

impl Default for Calendar {
    fn default() -> Self {
        Self::new(SimDate::new(2000, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calendar_advances_months() {
        let mut calendar = Calendar::new(SimDate::new(2020, 11));
        calendar.advance();
        assert_eq!(calendar.today(), SimDate::new(2020, 12));
        calendar.advance();
        assert_eq!(calendar.today(), SimDate::new(2021, 1));
        assert_eq!(calendar.current_step(), 2);
        assert_eq!(calendar.start(), SimDate::new(2020, 11));
    }

    #[test]
    fn test_months_since() {
        let a = SimDate::new(2021, 3);
        let b = SimDate::new(2020, 11);
        assert_eq!(a.months_since(&b), 4);
        assert_eq!(b.months_since(&a), -4);
    }

    #[test]
    fn test_month_clamped() {
        assert_eq!(SimDate::new(2000, 0).month, 1);
        assert_eq!(SimDate::new(2000, 13).month, 12);
    }
}
