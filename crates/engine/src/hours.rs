//! US equity market-hours guard.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::America::New_York;

/// Regular session: Mon-Fri 09:30-16:00 Eastern. Holidays are not
/// modeled; a closed exchange just yields an empty cycle.
#[must_use]
pub fn is_market_open(now: DateTime<Utc>) -> bool {
    let et = now.with_timezone(&New_York);
    if matches!(et.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }

    let minute_of_day = et.hour() * 60 + et.minute();
    (9 * 60 + 30..16 * 60).contains(&minute_of_day)
}

/// Status line for the read-only surface.
#[derive(Debug, Clone)]
pub struct MarketStatus {
    pub is_open: bool,
    pub current_time_et: String,
    pub weekday: String,
    pub status: &'static str,
}

#[must_use]
pub fn market_status(now: DateTime<Utc>) -> MarketStatus {
    let et = now.with_timezone(&New_York);
    let is_open = is_market_open(now);
    MarketStatus {
        is_open,
        current_time_et: et.format("%Y-%m-%d %H:%M:%S ET").to_string(),
        weekday: et.format("%A").to_string(),
        status: if is_open { "OPEN" } else { "CLOSED" },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn weekday_session_is_open() {
        // Wed 2026-08-26 14:00 UTC = 10:00 EDT.
        let now = Utc.with_ymd_and_hms(2026, 8, 26, 14, 0, 0).unwrap();
        assert!(is_market_open(now));
    }

    #[test]
    fn after_close_and_before_open_are_closed() {
        // 20:30 UTC = 16:30 EDT, after the bell.
        let late = Utc.with_ymd_and_hms(2026, 8, 26, 20, 30, 0).unwrap();
        assert!(!is_market_open(late));

        // 13:00 UTC = 09:00 EDT, before the open.
        let early = Utc.with_ymd_and_hms(2026, 8, 26, 13, 0, 0).unwrap();
        assert!(!is_market_open(early));
    }

    #[test]
    fn weekends_are_closed() {
        // Sat 2026-08-29, mid-session time of day.
        let now = Utc.with_ymd_and_hms(2026, 8, 29, 14, 0, 0).unwrap();
        assert!(!is_market_open(now));
        assert_eq!(market_status(now).status, "CLOSED");
    }

    #[test]
    fn status_reports_eastern_time() {
        let now = Utc.with_ymd_and_hms(2026, 8, 26, 14, 0, 0).unwrap();
        let status = market_status(now);
        assert!(status.is_open);
        assert_eq!(status.weekday, "Wednesday");
        assert!(status.current_time_et.contains("10:00:00 ET"));
    }
}
