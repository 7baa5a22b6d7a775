//! Event countdowns for the scrolling second line.
//!
//! Each call to [`EventTable::next_event_string`] describes one event, e.g.
//! `"67 days till Christmas"`, and moves on to the next, wrapping at the end.

use crate::clock::WallTime;
use crate::error::ConfigError;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Hour of day an event is counted down to.
const EVENT_HOUR: u32 = 12;

/// A named day of the year.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CalendarEvent {
    pub name: String,
    /// 1-12
    pub month: u32,
    /// 1-31
    pub day: u32,
}

impl CalendarEvent {
    pub fn new(name: impl Into<String>, month: u32, day: u32) -> Self {
        Self {
            name: name.into(),
            month,
            day,
        }
    }

    /// Reject month/day pairs that no year can hold (Feb 30, Apr 31, ...).
    ///
    /// Feb 29 is accepted; it only exists in leap years.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 2024 is a leap year, so every real month/day pair is valid in it.
        if NaiveDate::from_ymd_opt(2024, self.month, self.day).is_none() {
            return Err(ConfigError::Invalid(format!(
                "event {:?} has impossible date {}/{}",
                self.name, self.month, self.day
            )));
        }
        Ok(())
    }

    /// The event's canonical moment (noon) in `year`, if that year has the date.
    fn moment_in(&self, year: i32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(year, self.month, self.day)?.and_hms_opt(EVENT_HOUR, 0, 0)
    }
}

/// Default events the clock counts down to.
pub fn default_events() -> Vec<CalendarEvent> {
    vec![
        CalendarEvent::new("Christmas", 12, 25),
        CalendarEvent::new("Halloween", 10, 31),
        CalendarEvent::new("Jim's birthday", 5, 29),
        CalendarEvent::new("Independence Day", 7, 4),
    ]
}

/// Which year an event is counted towards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YearPolicy {
    /// Always this calendar year. An event earlier in the year has already
    /// passed, so it reads "Today is ..." until New Year.
    CurrentYear,
    /// This year if the date hasn't gone by yet, otherwise the next year
    /// that has the date. The event day itself still reads "Today is ...".
    #[default]
    NextOccurrence,
}

impl YearPolicy {
    /// The moment to count down to, as seen from `now`.
    fn target(self, event: &CalendarEvent, now: &WallTime) -> Option<NaiveDateTime> {
        match self {
            YearPolicy::CurrentYear => event.moment_in(now.year),
            YearPolicy::NextOccurrence => {
                let passed = (event.month, event.day) < (now.month, now.day);
                let first = if passed { now.year + 1 } else { now.year };
                // Feb 29 can be up to eight years away (e.g. 2096 -> 2104).
                (first..=first + 8).find_map(|year| event.moment_in(year))
            }
        }
    }
}

/// The "N days till " / "Today is " prefix for an event.
///
/// Seconds are counted from `now` to noon on the event day; anything at or
/// past that moment is "today". A started day counts as a whole one, so one
/// day and one second out reads "2 days".
pub fn days_remaining_phrase(event: &CalendarEvent, now: &WallTime, policy: YearPolicy) -> String {
    let (Some(target), Some(now)) = (policy.target(event, now), now.to_naive()) else {
        return "Today is ".to_string();
    };

    let remaining = (target - now).num_seconds();
    if remaining <= 0 {
        return "Today is ".to_string();
    }

    let days = (remaining + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY;
    if days == 1 {
        format!("{days} day till ")
    } else {
        format!("{days} days till ")
    }
}

/// Ordered events plus the cursor that walks through them.
#[derive(Clone, Debug)]
pub struct EventTable {
    events: Vec<CalendarEvent>,
    index: usize,
    policy: YearPolicy,
}

impl EventTable {
    pub fn new(events: Vec<CalendarEvent>, policy: YearPolicy) -> Result<Self, ConfigError> {
        if events.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one calendar event is required".to_string(),
            ));
        }
        for event in &events {
            event.validate()?;
        }
        Ok(Self {
            events,
            index: 0,
            policy,
        })
    }

    /// Describe the event under the cursor, then advance (wrapping).
    pub fn next_event_string(&mut self, now: &WallTime) -> String {
        let event = &self.events[self.index];
        let text = format!(
            "{}{}",
            days_remaining_phrase(event, now, self.policy),
            event.name
        );

        self.index = (self.index + 1) % self.events.len();
        text
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn events(&self) -> &[CalendarEvent] {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn at(year: i32, month: u32, day: u32, h: u32, m: u32, s: u32) -> WallTime {
        let dt = NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap();
        WallTime::from_datetime(&dt)
    }

    fn christmas() -> CalendarEvent {
        CalendarEvent::new("Christmas", 12, 25)
    }

    #[rstest]
    #[case::at_the_moment(at(2026, 12, 25, 12, 0, 0), "Today is ")]
    #[case::later_that_day(at(2026, 12, 25, 18, 0, 0), "Today is ")]
    #[case::exactly_one_day(at(2026, 12, 24, 12, 0, 0), "1 day till ")]
    #[case::one_day_one_second(at(2026, 12, 24, 11, 59, 59), "2 days till ")]
    #[case::just_under_a_day(at(2026, 12, 24, 12, 0, 1), "1 day till ")]
    #[case::one_second(at(2026, 12, 25, 11, 59, 59), "1 day till ")]
    #[case::months_out(at(2026, 10, 19, 12, 0, 0), "67 days till ")]
    fn phrase_for_christmas(#[case] now: WallTime, #[case] expected: &str) {
        assert_eq!(
            days_remaining_phrase(&christmas(), &now, YearPolicy::NextOccurrence),
            expected
        );
    }

    #[test]
    fn current_year_policy_keeps_past_events_on_today() {
        let now = at(2026, 10, 19, 9, 0, 0);
        let birthday = CalendarEvent::new("Jim's birthday", 5, 29);
        assert_eq!(
            days_remaining_phrase(&birthday, &now, YearPolicy::CurrentYear),
            "Today is "
        );
    }

    #[test]
    fn next_occurrence_rolls_past_events_into_next_year() {
        let now = at(2026, 10, 19, 12, 0, 0);
        let birthday = CalendarEvent::new("Jim's birthday", 5, 29);
        // 2026-10-19 -> 2027-05-29 is 222 days.
        assert_eq!(
            days_remaining_phrase(&birthday, &now, YearPolicy::NextOccurrence),
            "222 days till "
        );
    }

    #[test]
    fn leap_day_waits_for_a_leap_year() {
        let now = at(2026, 3, 1, 12, 0, 0);
        let leap = CalendarEvent::new("Leap day", 2, 29);
        // 2026-03-01 -> 2028-02-29 is 730 days.
        assert_eq!(
            days_remaining_phrase(&leap, &now, YearPolicy::NextOccurrence),
            "730 days till "
        );
    }

    #[test]
    fn next_event_string_joins_phrase_and_name() {
        let mut table = EventTable::new(vec![christmas()], YearPolicy::NextOccurrence).unwrap();
        let now = at(2026, 12, 24, 11, 59, 59);
        assert_eq!(table.next_event_string(&now), "2 days till Christmas");
    }

    #[test]
    fn cursor_cycles_back_after_every_event() {
        let mut table = EventTable::new(default_events(), YearPolicy::NextOccurrence).unwrap();
        let now = at(2026, 10, 19, 8, 0, 0);
        let count = table.events().len();

        let first = table.next_event_string(&now);
        for _ in 1..count {
            table.next_event_string(&now);
        }

        assert_eq!(table.index(), 0);
        assert_eq!(table.next_event_string(&now), first);
    }

    #[test]
    fn cursor_stays_in_bounds() {
        let mut table = EventTable::new(default_events(), YearPolicy::CurrentYear).unwrap();
        let now = at(2026, 1, 1, 0, 0, 0);
        for _ in 0..25 {
            table.next_event_string(&now);
            assert!(table.index() < table.events().len());
        }
    }

    #[test]
    fn empty_table_is_rejected() {
        assert!(EventTable::new(Vec::new(), YearPolicy::NextOccurrence).is_err());
    }

    #[rstest]
    #[case(2, 30)]
    #[case(4, 31)]
    #[case(13, 1)]
    #[case(0, 10)]
    fn impossible_dates_are_rejected(#[case] month: u32, #[case] day: u32) {
        assert!(CalendarEvent::new("Nope", month, day).validate().is_err());
    }

    #[test]
    fn leap_day_is_a_valid_event() {
        assert!(CalendarEvent::new("Leap day", 2, 29).validate().is_ok());
    }
}
