//! Clinic schedule rules: business slots, date/slot parsing, availability.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{CoreError, Result};

/// Bookable half-hour slots. Lunch (13:00-14:00) is excluded.
pub const BUSINESS_SLOTS: [&str; 14] = [
    "09:00", "09:30", "10:00", "10:30", "11:00", "11:30", "12:00", "12:30", "14:00", "14:30",
    "15:00", "15:30", "16:00", "16:30",
];

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| CoreError::invalid_date(value))
}

/// Parses an `HH:MM` slot time.
pub fn parse_slot(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|_| CoreError::invalid_slot(value))
}

/// Combines a date string and a slot string into an appointment time.
pub fn slot_datetime(date_str: &str, time_slot: &str) -> Result<NaiveDateTime> {
    Ok(parse_date(date_str)?.and_time(parse_slot(time_slot)?))
}

/// Returns the business slots on `date` that are not in `booked` and,
/// when `date` is the same day as `now`, not already in the past.
pub fn available_slots(
    date: NaiveDate,
    booked: &[NaiveTime],
    now: NaiveDateTime,
) -> Vec<&'static str> {
    BUSINESS_SLOTS
        .iter()
        .copied()
        .filter(|slot| {
            let Ok(time) = parse_slot(slot) else {
                return false;
            };
            if booked.contains(&time) {
                return false;
            }
            !(date == now.date() && date.and_time(time) < now)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: &str, time: &str) -> NaiveDateTime {
        slot_datetime(date, time).unwrap()
    }

    #[test]
    fn all_slots_free_on_future_day() {
        let date = parse_date("2099-03-02").unwrap();
        let slots = available_slots(date, &[], at("2026-01-01", "08:00"));
        assert_eq!(slots.len(), BUSINESS_SLOTS.len());
    }

    #[test]
    fn booked_slots_are_excluded() {
        let date = parse_date("2099-03-02").unwrap();
        let booked = vec![parse_slot("09:00").unwrap(), parse_slot("14:30").unwrap()];
        let slots = available_slots(date, &booked, at("2026-01-01", "08:00"));
        assert!(!slots.contains(&"09:00"));
        assert!(!slots.contains(&"14:30"));
        assert_eq!(slots.first(), Some(&"09:30"));
        assert_eq!(slots.len(), BUSINESS_SLOTS.len() - 2);
    }

    #[test]
    fn past_slots_are_excluded_only_today() {
        let today = parse_date("2026-05-10").unwrap();
        let now = at("2026-05-10", "11:15");
        let slots = available_slots(today, &[], now);
        assert_eq!(slots.first(), Some(&"11:30"));

        let tomorrow = parse_date("2026-05-11").unwrap();
        assert_eq!(available_slots(tomorrow, &[], now).len(), BUSINESS_SLOTS.len());
    }

    #[test]
    fn parse_errors_are_validation_errors() {
        assert!(matches!(parse_date("10-05-2026"), Err(CoreError::InvalidDate(_))));
        assert!(matches!(parse_slot("9am"), Err(CoreError::InvalidSlot(_))));
        assert!(slot_datetime("2026-05-10", "25:00").is_err());
    }
}
