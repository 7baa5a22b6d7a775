//! Wall-clock snapshots, the clock source, and hourly network time sync.
//!
//! The control loop reads two kinds of time every tick:
//! - `WallTime`, the calendar fields the display shows
//! - a monotonic `Instant`, used only for interval bookkeeping
//!
//! Keeping them apart means a clock sync can jump the wall time without
//! confusing the weather refresh timer.

use crate::error::TimeSyncError;
use chrono::{
    DateTime, Datelike, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeDelta, Timelike, Utc,
    Weekday,
};
use serde::Deserialize;
use std::time::{Duration, Instant};

// ── WallTime ─────────────────────────────────────────────────────────

/// Calendar fields for one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WallTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub weekday: Weekday,
}

impl WallTime {
    /// Capture the fields of any chrono date-time.
    ///
    /// # Rust concept: trait bounds
    /// `Datelike + Timelike` accepts `NaiveDateTime`, `DateTime<Local>` and
    /// `DateTime<FixedOffset>` alike without three separate constructors.
    pub fn from_datetime<T: Datelike + Timelike>(dt: &T) -> Self {
        Self {
            year: dt.year(),
            month: dt.month(),
            day: dt.day(),
            hour: dt.hour(),
            minute: dt.minute(),
            second: dt.second(),
            weekday: dt.weekday(),
        }
    }

    /// Back to a naive local date-time for date arithmetic.
    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)?.and_hms_opt(
            self.hour,
            self.minute,
            self.second,
        )
    }
}

// ── Clock source ─────────────────────────────────────────────────────

/// Where the control loop gets its notion of "now".
pub trait ClockSource {
    fn now(&self) -> WallTime;
    fn monotonic(&self) -> Instant;

    /// Adopt a reference time from a network sync. Fixed clocks ignore it.
    fn adjust_to(&mut self, _reference: DateTime<FixedOffset>) {}
}

/// The host clock, corrected by the last successful network sync.
///
/// Until the first sync it simply reports the OS local time.
#[derive(Debug)]
pub struct SystemClock {
    skew: TimeDelta,
    utc_offset: Option<FixedOffset>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            skew: TimeDelta::zero(),
            utc_offset: None,
        }
    }

    pub fn skew(&self) -> TimeDelta {
        self.skew
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for SystemClock {
    fn now(&self) -> WallTime {
        let corrected = Utc::now() + self.skew;
        match self.utc_offset {
            Some(offset) => WallTime::from_datetime(&corrected.with_timezone(&offset)),
            None => WallTime::from_datetime(&corrected.with_timezone(&Local)),
        }
    }

    fn monotonic(&self) -> Instant {
        Instant::now()
    }

    /// Remember how far the host clock is off and which UTC offset the
    /// reference was expressed in.
    fn adjust_to(&mut self, reference: DateTime<FixedOffset>) {
        self.skew = reference.with_timezone(&Utc) - Utc::now();
        self.utc_offset = Some(*reference.offset());
    }
}

// ── Time sync ────────────────────────────────────────────────────────

/// A network source of the current time.
pub trait TimeSync {
    fn fetch_time(&mut self) -> Result<DateTime<FixedOffset>, TimeSyncError>;
}

#[derive(Deserialize)]
struct WorldTimeResponse {
    datetime: String,
}

/// Blocking client for worldtimeapi.org.
///
/// With a timezone (e.g. `America/New_York`) it asks for that zone; without
/// one the service geolocates the caller's IP.
pub struct WorldTimeClient {
    client: reqwest::blocking::Client,
    url: String,
}

impl WorldTimeClient {
    pub fn new(timezone: Option<&str>, timeout: Duration) -> Result<Self, TimeSyncError> {
        let url = match timezone {
            Some(tz) => format!("http://worldtimeapi.org/api/timezone/{tz}"),
            None => "http://worldtimeapi.org/api/ip".to_string(),
        };
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client, url })
    }

    /// Decode a worldtimeapi response body.
    pub fn parse(body: &str) -> Result<DateTime<FixedOffset>, TimeSyncError> {
        let response: WorldTimeResponse = serde_json::from_str(body)?;
        DateTime::parse_from_rfc3339(&response.datetime).map_err(|source| {
            TimeSyncError::Timestamp {
                value: response.datetime.clone(),
                source,
            }
        })
    }
}

impl TimeSync for WorldTimeClient {
    fn fetch_time(&mut self) -> Result<DateTime<FixedOffset>, TimeSyncError> {
        let body = self
            .client
            .get(&self.url)
            .send()?
            .error_for_status()?
            .text()?;
        Self::parse(&body)
    }
}

/// Hourly, fire-and-forget clock synchronization.
///
/// The attempt time is recorded whether or not the sync worked, so a failure
/// waits for the next boundary instead of retrying every tick.
#[derive(Debug)]
pub struct ClockSync {
    interval: Duration,
    last_attempt: Option<Instant>,
    last_success: Option<Instant>,
}

impl ClockSync {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_attempt: None,
            last_success: None,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_attempt {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.interval,
        }
    }

    /// Sync `clock` from `source` if an hour has passed. Returns true when a
    /// sync was attempted.
    pub fn poll<C, S>(&mut self, now: Instant, clock: &mut C, source: &mut S) -> bool
    where
        C: ClockSource + ?Sized,
        S: TimeSync + ?Sized,
    {
        if !self.is_due(now) {
            return false;
        }
        self.last_attempt = Some(now);

        match source.fetch_time() {
            Ok(reference) => {
                clock.adjust_to(reference);
                self.last_success = Some(now);
                tracing::info!("Clock synchronized to {}", reference);
            }
            Err(e) => {
                tracing::warn!("Clock sync failed, retrying next hour: {}", e);
            }
        }
        true
    }

    pub fn last_success(&self) -> Option<Instant> {
        self.last_success
    }
}

// ── Tests ────────────────────────────────────────────────────────────
