use chrono::{DateTime, Days, NaiveDate, TimeDelta, Utc};

/// Returns the `count` calendar days ending with `last` (inclusive), newest first.
pub fn days_ending_at(last: NaiveDate, count: u32) -> impl Iterator<Item = NaiveDate> {
    (0..u64::from(count)).map_while(move |offset| last.checked_sub_days(Days::new(offset)))
}

/// Seconds between two instants as a float. Negative when `to` precedes `from`.
pub fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta: TimeDelta = to - from;
    delta.num_milliseconds() as f64 / 1000.
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{days_ending_at, seconds_between};

    #[test]
    fn test_days_ending_at_crosses_month() {
        let last = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let days = days_ending_at(last, 3)
            .map(|day| day.to_string())
            .collect::<Vec<_>>();
        assert_eq!(days, vec!["2024-03-02", "2024-03-01", "2024-02-29"]);
    }

    #[test]
    fn test_days_ending_at_zero() {
        let last = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        assert_eq!(days_ending_at(last, 0).count(), 0);
    }

    #[test]
    fn test_seconds_between_sign() {
        let a = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let b = Utc.timestamp_opt(1_700_000_010, 500_000_000).unwrap();
        assert_eq!(seconds_between(a, b), 10.5);
        assert_eq!(seconds_between(b, a), -10.5);
    }
}
