//! Time utilities for notification timestamps (`DD/MM/YYYY[ HH:MM:SS]`).

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

pub const DATE_FORMAT: &str = "%d/%m/%Y";
pub const CLOCK_FORMAT: &str = "%H:%M:%S";

/// Parse a notification timestamp like "16/01/2026 22:31:15" or a bare
/// "16/01/2026" (midnight). Returns `None` unless the date is calendar-valid.
pub fn parse_occurred_at(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    match s.split_once(char::is_whitespace) {
        Some((date, clock)) => {
            let date = NaiveDate::parse_from_str(date, DATE_FORMAT).ok()?;
            let clock = NaiveTime::parse_from_str(clock.trim(), CLOCK_FORMAT).ok()?;
            Some(date.and_time(clock))
        }
        None => NaiveDate::parse_from_str(s, DATE_FORMAT)
            .ok()
            .map(|d| d.and_time(NaiveTime::MIN)),
    }
}

/// Convert "2:30" + "PM" into "14:30:00". Without a meridiem the clock is
/// taken as already 24-hour. Seconds are always `00`.
pub fn clock_to_24h(clock: &str, meridiem: Option<&str>) -> Option<String> {
    let (h, m) = clock.trim().split_once(':')?;
    let mut hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;

    match meridiem.map(|p| p.trim().to_ascii_uppercase()).as_deref() {
        Some("PM") if hour != 12 => hour += 12,
        Some("AM") if hour == 12 => hour = 0,
        _ => {}
    }

    NaiveTime::from_hms_opt(hour, minute, 0).map(|t| t.format(CLOCK_FORMAT).to_string())
}

/// Left-pad the day of a `D/MM/YYYY` date so every stored date is `DD/MM/YYYY`.
pub fn pad_day(date: &str) -> String {
    match date.split_once('/') {
        Some((day, rest)) if day.len() == 1 => format!("0{day}/{rest}"),
        _ => date.to_string(),
    }
}

/// Monthly partition key ("MM/YYYY").
pub fn partition_key(date: NaiveDate) -> String {
    date.format("%m/%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_full_timestamp() {
        let dt = parse_occurred_at("16/01/2026 22:31:15").unwrap();
        assert_eq!(dt.day(), 16);
        assert_eq!(dt.month(), 1);
        assert_eq!(dt.year(), 2026);
        assert_eq!(dt.hour(), 22);
        assert_eq!(dt.second(), 15);
    }

    #[test]
    fn test_parse_date_only_is_midnight() {
        let dt = parse_occurred_at("25/12/2025").unwrap();
        assert_eq!(dt.hour(), 0);
        assert_eq!(dt.month(), 12);
    }

    #[test]
    fn test_rejects_impossible_dates() {
        assert!(parse_occurred_at("31/02/2026").is_none());
        assert!(parse_occurred_at("2026-01-16").is_none());
        assert!(parse_occurred_at("16/01/2026 25:00:00").is_none());
        assert!(parse_occurred_at("").is_none());
    }

    #[test]
    fn test_clock_to_24h() {
        assert_eq!(clock_to_24h("2:30", Some("PM")).as_deref(), Some("14:30:00"));
        assert_eq!(clock_to_24h("12:05", Some("pm")).as_deref(), Some("12:05:00"));
        assert_eq!(clock_to_24h("12:05", Some("AM")).as_deref(), Some("00:05:00"));
        assert_eq!(clock_to_24h("9:15", Some("AM")).as_deref(), Some("09:15:00"));
        assert_eq!(clock_to_24h("18:40", None).as_deref(), Some("18:40:00"));
        assert_eq!(clock_to_24h("13:00", Some("PM")), None);
    }

    #[test]
    fn test_pad_day_and_partition() {
        assert_eq!(pad_day("5/03/2026"), "05/03/2026");
        assert_eq!(pad_day("15/03/2026"), "15/03/2026");
        let d = NaiveDate::from_ymd_opt(2025, 12, 25).unwrap();
        assert_eq!(partition_key(d), "12/2025");
    }
}
