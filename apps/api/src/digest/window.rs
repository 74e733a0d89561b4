use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

/// Subscribers live in Asia/Seoul; "today" for a dispatch is their calendar day.
const SERVICE_UTC_OFFSET_SECS: i32 = 9 * 3600;

/// The range of `created_at` days a weekly digest covers: the Tuesday a week
/// before the dispatch date through the Monday just before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigestWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DigestWindow {
    pub fn for_dispatch_on(today: NaiveDate) -> Self {
        let since_monday = i64::from(today.weekday().num_days_from_monday());
        let since_tuesday = (since_monday - 1).rem_euclid(7);
        Self {
            start: today - Duration::days(since_tuesday + 7),
            end: today - Duration::days(since_monday),
        }
    }

    /// Half-open UTC timestamp bounds: `[start 00:00, end + 1 day 00:00)`.
    pub fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (midnight_utc(self.start), midnight_utc(self.end + Duration::days(1)))
    }
}

/// The next Tuesday strictly after `today`, shown on the dashboard.
pub fn next_digest_date(today: NaiveDate) -> NaiveDate {
    let since_monday = i64::from(today.weekday().num_days_from_monday());
    let mut ahead = 1 - since_monday;
    if ahead <= 0 {
        ahead += 7;
    }
    today + Duration::days(ahead)
}

/// Calendar date at the service's local offset. The weekly job fires at
/// Monday 23:00 UTC, which is already Tuesday here.
pub fn service_date(now: DateTime<Utc>) -> NaiveDate {
    match FixedOffset::east_opt(SERVICE_UTC_OFFSET_SECS) {
        Some(offset) => now.with_timezone(&offset).date_naive(),
        None => now.date_naive(),
    }
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_service_date_is_seoul_day() {
        let monday_late_utc = Utc.with_ymd_and_hms(2024, 6, 10, 23, 0, 0).unwrap();
        assert_eq!(service_date(monday_late_utc), date(2024, 6, 11));
        let monday_noon_utc = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        assert_eq!(service_date(monday_noon_utc), date(2024, 6, 10));
    }

    #[test]
    fn test_window_on_tuesday_covers_previous_week() {
        // 2024-06-11 is a Tuesday
        let window = DigestWindow::for_dispatch_on(date(2024, 6, 11));
        assert_eq!(window.start, date(2024, 6, 4));
        assert_eq!(window.end, date(2024, 6, 10));
    }

    #[test]
    fn test_window_on_monday() {
        let window = DigestWindow::for_dispatch_on(date(2024, 6, 10));
        assert_eq!(window.start, date(2024, 5, 28));
        assert_eq!(window.end, date(2024, 6, 10));
    }

    #[test]
    fn test_bounds_are_half_open_days() {
        let window = DigestWindow::for_dispatch_on(date(2024, 6, 11));
        let (from, to) = window.bounds();
        assert_eq!(from.to_rfc3339(), "2024-06-04T00:00:00+00:00");
        assert_eq!(to.to_rfc3339(), "2024-06-11T00:00:00+00:00");
    }

    #[test]
    fn test_next_digest_date() {
        assert_eq!(next_digest_date(date(2024, 6, 10)), date(2024, 6, 11));
        // on a Tuesday the next digest is a week away
        assert_eq!(next_digest_date(date(2024, 6, 11)), date(2024, 6, 18));
        assert_eq!(next_digest_date(date(2024, 6, 16)), date(2024, 6, 18));
    }
}
