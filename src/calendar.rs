//! C2: business-day calendar arithmetic. Saturday and Sunday are the
//! only non-business days this crate knows about — holiday calendars
//! are a loader concern, out of scope (spec §1 non-goals).

use chrono::{Datelike, Duration, NaiveDate, Weekday};

fn is_business_day(d: NaiveDate) -> bool {
    !matches!(d.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Advance (`n > 0`) or retreat (`n < 0`) `d` by `|n|` business days.
pub fn shift_business_days(d: NaiveDate, n: i32) -> NaiveDate {
    let step = if n >= 0 { 1 } else { -1 };
    let mut remaining = n.abs();
    let mut cur = d;
    while remaining > 0 {
        cur += Duration::days(step as i64);
        if is_business_day(cur) {
            remaining -= 1;
        }
    }
    cur
}

/// Signed count of business days from `a` to `b` (positive if `b` is
/// later). Used to populate `Edge.ddiff`.
pub fn business_days_between(a: NaiveDate, b: NaiveDate) -> i32 {
    if a == b {
        return 0;
    }
    let (from, to, sign) = if b > a { (a, b, 1) } else { (b, a, -1) };
    let mut count = 0;
    let mut cur = from;
    while cur < to {
        cur += Duration::days(1);
        if is_business_day(cur) {
            count += 1;
        }
    }
    count * sign
}

/// Inclusive `[from, to]` calendar-day range, used by the aggregator to
/// build the dense daily spine (spec §4.7/§6).
pub fn date_range(from: NaiveDate, to: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    let days = if to >= from { (to - from).num_days() } else { -1 };
    (0..=days).map(move |i| from + Duration::days(i))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn shift_skips_weekend() {
        // Friday 2025-08-08 + 1 business day -> Monday 2025-08-11
        assert_eq!(shift_business_days(d(2025, 8, 8), 1), d(2025, 8, 11));
        // Monday 2025-08-11 - 1 business day -> Friday 2025-08-08
        assert_eq!(shift_business_days(d(2025, 8, 11), -1), d(2025, 8, 8));
    }

    #[test]
    fn shift_zero_is_identity() {
        assert_eq!(shift_business_days(d(2025, 8, 8), 0), d(2025, 8, 8));
    }

    #[test]
    fn business_days_between_matches_shift() {
        let a = d(2025, 8, 8);
        let b = shift_business_days(a, 3);
        assert_eq!(business_days_between(a, b), 3);
        assert_eq!(business_days_between(b, a), -3);
        assert_eq!(business_days_between(a, a), 0);
    }

    #[test]
    fn date_range_is_inclusive() {
        let days: Vec<_> = date_range(d(2025, 8, 8), d(2025, 8, 10)).collect();
        assert_eq!(days, vec![d(2025, 8, 8), d(2025, 8, 9), d(2025, 8, 10)]);
    }

    #[test]
    fn date_range_single_day() {
        let days: Vec<_> = date_range(d(2025, 8, 8), d(2025, 8, 8)).collect();
        assert_eq!(days, vec![d(2025, 8, 8)]);
    }
}
