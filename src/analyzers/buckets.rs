//! Fixed boundary rules for categorical time splits.

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOfDay {
    Night,
    Morning,
    Afternoon,
    Evening,
}

impl TimeOfDay {
    /// `[0,6)` night, `[6,12)` morning, `[12,18)` afternoon, `[18,24)` evening.
    pub fn of(ts: NaiveDateTime) -> Self {
        match ts.hour() {
            0..6 => TimeOfDay::Night,
            6..12 => TimeOfDay::Morning,
            12..18 => TimeOfDay::Afternoon,
            _ => TimeOfDay::Evening,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayKind {
    Weekday,
    Weekend,
}

impl DayKind {
    pub fn of(ts: NaiveDateTime) -> Self {
        match ts.weekday() {
            Weekday::Sat | Weekday::Sun => DayKind::Weekend,
            _ => DayKind::Weekday,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        // 2024-01-01 is a Monday.
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_boundary_hours_start_their_bucket() {
        assert_eq!(TimeOfDay::of(at(1, 0)), TimeOfDay::Night);
        assert_eq!(TimeOfDay::of(at(1, 5)), TimeOfDay::Night);
        assert_eq!(TimeOfDay::of(at(1, 6)), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::of(at(1, 12)), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::of(at(1, 17)), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::of(at(1, 18)), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::of(at(1, 23)), TimeOfDay::Evening);
    }

    #[test]
    fn test_weekend_is_saturday_and_sunday() {
        assert_eq!(DayKind::of(at(1, 9)), DayKind::Weekday);
        assert_eq!(DayKind::of(at(5, 9)), DayKind::Weekday);
        assert_eq!(DayKind::of(at(6, 9)), DayKind::Weekend);
        assert_eq!(DayKind::of(at(7, 9)), DayKind::Weekend);
    }
}
