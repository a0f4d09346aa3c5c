//! Wall-clock sleep timer: pause playback at a chosen time of day.

use chrono::{DateTime, Days, NaiveTime, TimeDelta, TimeZone};

/// Parse the `HH:MM` value of a time input.
pub fn parse_clock(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

pub fn format_clock<Tz: TimeZone>(at: &DateTime<Tz>) -> String {
    at.naive_local().format("%H:%M").to_string()
}

/// The next moment the wall clock shows `at`: today, or tomorrow when that
/// moment is not in the future.
pub fn next_occurrence<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> Option<DateTime<Tz>> {
    let tz = now.timezone();
    let today = now.date_naive();
    let candidate = tz
        .from_local_datetime(&today.and_time(at))
        .earliest()
        .filter(|target| target > now);
    if candidate.is_some() {
        return candidate;
    }
    let tomorrow = today.checked_add_days(Days::new(1))?;
    tz.from_local_datetime(&tomorrow.and_time(at)).earliest()
}

/// `HH:MM:SS`, clamped at zero.
pub fn format_remaining(remaining: TimeDelta) -> String {
    let secs = remaining.num_seconds().max(0);
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn deadline_later_today() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 21, 15, 30).unwrap();
        let target = next_occurrence(&now, at(23, 0)).unwrap();
        assert_eq!(target, Utc.with_ymd_and_hms(2024, 3, 10, 23, 0, 0).unwrap());
    }

    #[test]
    fn deadline_rolls_to_tomorrow_when_passed() {
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 23, 30, 0).unwrap();
        let target = next_occurrence(&now, at(7, 0)).unwrap();
        assert_eq!(target, Utc.with_ymd_and_hms(2025, 1, 1, 7, 0, 0).unwrap());

        // Exactly now is not in the future either.
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap();
        let target = next_occurrence(&now, at(7, 0)).unwrap();
        assert_eq!(target, Utc.with_ymd_and_hms(2024, 5, 2, 7, 0, 0).unwrap());
    }

    #[test]
    fn deadline_uses_local_wall_clock() {
        let tz = FixedOffset::east_opt(7 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2024, 6, 1, 22, 0, 0).unwrap();
        let target = next_occurrence(&now, at(22, 30)).unwrap();
        assert_eq!(format_clock(&target), "22:30");
        assert_eq!(format_remaining(target - now), "00:30:00");
    }

    #[test]
    fn remaining_formats_and_clamps() {
        assert_eq!(format_remaining(TimeDelta::seconds(3_725)), "01:02:05");
        assert_eq!(format_remaining(TimeDelta::seconds(-5)), "00:00:00");
    }

    #[test]
    fn clock_input_parsing() {
        assert_eq!(parse_clock("07:05"), Some(at(7, 5)));
        assert_eq!(parse_clock(" 23:59 "), Some(at(23, 59)));
        assert_eq!(parse_clock("25:00"), None);
        assert_eq!(parse_clock(""), None);
    }
}
