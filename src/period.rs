// Calendar periods used to slice the commute log

use chrono::{Datelike, Duration, Months, NaiveDate};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Today,
    /// Monday through Sunday
    Week,
    Month,
    Year,
}

impl Period {
    /// First and last day of the period containing `today`, both inclusive
    pub fn bounds(self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            Period::Today => (today, today),
            Period::Week => {
                let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
                (monday, monday + Duration::days(6))
            }
            Period::Month => {
                let first = today - Duration::days(i64::from(today.day0()));
                (first, first + Months::new(1) - Duration::days(1))
            }
            Period::Year => {
                let first = today - Duration::days(i64::from(today.ordinal0()));
                (first, first + Months::new(12) - Duration::days(1))
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Today => "today",
            Period::Week => "week",
            Period::Month => "month",
            Period::Year => "year",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" | "day" => Ok(Period::Today),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            "year" => Ok(Period::Year),
            other => Err(format!("unknown period: {} (expected today, week, month or year)", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_today() {
        assert_eq!(Period::Today.bounds(day(2025, 1, 15)), (day(2025, 1, 15), day(2025, 1, 15)));
    }

    #[test]
    fn test_week_is_monday_to_sunday() {
        // Wednesday
        assert_eq!(Period::Week.bounds(day(2025, 1, 15)), (day(2025, 1, 13), day(2025, 1, 19)));
        // Sunday stays in the week that started on the previous Monday
        assert_eq!(Period::Week.bounds(day(2025, 1, 19)), (day(2025, 1, 13), day(2025, 1, 19)));
        // Monday
        assert_eq!(Period::Week.bounds(day(2025, 1, 13)), (day(2025, 1, 13), day(2025, 1, 19)));
    }

    #[test]
    fn test_week_crossing_year() {
        assert_eq!(Period::Week.bounds(day(2025, 1, 1)), (day(2024, 12, 30), day(2025, 1, 5)));
    }

    #[test]
    fn test_month() {
        assert_eq!(Period::Month.bounds(day(2025, 1, 15)), (day(2025, 1, 1), day(2025, 1, 31)));
        assert_eq!(Period::Month.bounds(day(2024, 2, 10)), (day(2024, 2, 1), day(2024, 2, 29)));
        assert_eq!(Period::Month.bounds(day(2025, 12, 31)), (day(2025, 12, 1), day(2025, 12, 31)));
    }

    #[test]
    fn test_year() {
        assert_eq!(Period::Year.bounds(day(2025, 6, 30)), (day(2025, 1, 1), day(2025, 12, 31)));
    }

    #[test]
    fn test_parse() {
        assert_eq!("Week".parse::<Period>().unwrap(), Period::Week);
        assert_eq!("day".parse::<Period>().unwrap(), Period::Today);
        assert!("fortnight".parse::<Period>().is_err());
    }
}
