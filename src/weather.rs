//! Weather snapshot, refresh policy, and the OpenWeatherMap client.
//!
//! The cache is polled from the control loop every tick. It fetches at most
//! once per refresh interval; a failed fetch keeps whatever we had before,
//! since stale weather beats no weather.
//!
//! The fetch itself is a plain blocking HTTP call made on the control loop
//! thread. While it runs, the display does not update, so the client's
//! request timeout is the upper bound on how long the clock can freeze.

use crate::error::FetchError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

// ── Snapshot ─────────────────────────────────────────────────────────

/// Latest known weather. Replaced as a whole, never edited in place.
///
/// Either field may be missing if the provider left it out of the payload;
/// the scheduler renders a placeholder for a missing field.
#[derive(Clone, Debug, PartialEq)]
pub struct WeatherSnapshot {
    pub temperature: Option<f64>,
    pub condition: Option<String>,
    pub fetched_at: Instant,
}

/// Unit system requested from the provider; decides the temperature suffix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Imperial,
    Metric,
    Standard,
}

impl Units {
    pub fn as_query(self) -> &'static str {
        match self {
            Units::Imperial => "imperial",
            Units::Metric => "metric",
            Units::Standard => "standard",
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Units::Imperial => "°F",
            Units::Metric => "°C",
            Units::Standard => "K",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_query())
    }
}

impl FromStr for Units {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "imperial" => Ok(Units::Imperial),
            "metric" => Ok(Units::Metric),
            "standard" => Ok(Units::Standard),
            other => Err(format!(
                "unknown units {other:?} (expected imperial, metric or standard)"
            )),
        }
    }
}

// ── Fetcher ──────────────────────────────────────────────────────────

/// Anything that can produce a fresh weather snapshot.
///
/// # Rust concept: traits at the seams
/// The cache only needs "give me weather or an error", so tests can hand it
/// a fake instead of a real HTTP client.
pub trait WeatherFetcher {
    fn fetch_weather(&mut self, now: Instant) -> Result<WeatherSnapshot, FetchError>;
}

#[derive(Deserialize)]
struct OwmResponse {
    #[serde(default)]
    main: Option<OwmMain>,
    #[serde(default)]
    weather: Vec<OwmCondition>,
}

#[derive(Deserialize)]
struct OwmMain {
    #[serde(default)]
    temp: Option<f64>,
}

#[derive(Deserialize)]
struct OwmCondition {
    #[serde(default)]
    main: Option<String>,
}

const CURRENT_WEATHER_URL: &str = "http://api.openweathermap.org/data/2.5/weather";

/// Blocking client for the OpenWeatherMap "current weather" endpoint.
pub struct OpenWeatherClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    location: String,
    units: Units,
    token: String,
}

impl OpenWeatherClient {
    pub fn new(
        location: &str,
        token: &str,
        units: Units,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        Self::with_endpoint(CURRENT_WEATHER_URL, location, token, units, timeout)
    }

    /// Same as `new`, against another server speaking the same API.
    pub fn with_endpoint(
        endpoint: &str,
        location: &str,
        token: &str,
        units: Units,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            location: location.to_string(),
            units,
            token: token.to_string(),
        })
    }

    /// Decode a response body into a snapshot.
    ///
    /// Only broken JSON is an error. Missing `main.temp` or `weather[0].main`
    /// just leaves that field empty.
    pub fn parse(body: &str, fetched_at: Instant) -> Result<WeatherSnapshot, FetchError> {
        let response: OwmResponse = serde_json::from_str(body)?;
        Ok(WeatherSnapshot {
            temperature: response.main.and_then(|m| m.temp),
            condition: response.weather.into_iter().next().and_then(|w| w.main),
            fetched_at,
        })
    }
}

impl WeatherFetcher for OpenWeatherClient {
    fn fetch_weather(&mut self, now: Instant) -> Result<WeatherSnapshot, FetchError> {
        let body = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", self.location.as_str()),
                ("units", self.units.as_query()),
                ("appid", self.token.as_str()),
            ])
            .send()?
            .error_for_status()?
            .text()?;
        Self::parse(&body, now)
    }
}

// ── Cache ────────────────────────────────────────────────────────────

/// Holds the last good snapshot and decides when to ask for a new one.
#[derive(Debug)]
pub struct WeatherCache {
    refresh_interval: Duration,
    failure_backoff: Duration,
    last_fetch: Option<Instant>,
    last_failure: Option<Instant>,
    snapshot: Option<WeatherSnapshot>,
}

impl WeatherCache {
    pub fn new(refresh_interval: Duration, failure_backoff: Duration) -> Self {
        Self {
            refresh_interval,
            failure_backoff,
            last_fetch: None,
            last_failure: None,
            snapshot: None,
        }
    }

    /// True when there is no successful fetch yet or the last one is older
    /// than the refresh interval, and we are not backing off from a failure.
    ///
    /// A backoff of zero retries on every tick after a failure, so the only
    /// rule left is "fetch when the last success is more than the interval
    /// ago".
    pub fn is_due(&self, now: Instant) -> bool {
        let expired = match self.last_fetch {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.refresh_interval,
        };
        let backing_off = self
            .last_failure
            .is_some_and(|failed| now.saturating_duration_since(failed) < self.failure_backoff);

        expired && !backing_off
    }

    /// Fetch if due. Returns true when a fetch was attempted.
    ///
    /// On failure the snapshot and `last_fetch` stay exactly as they were;
    /// the error is logged and goes no further.
    pub fn refresh<F: WeatherFetcher + ?Sized>(&mut self, now: Instant, fetcher: &mut F) -> bool {
        if !self.is_due(now) {
            return false;
        }

        match fetcher.fetch_weather(now) {
            Ok(snapshot) => {
                tracing::info!(
                    "Weather updated: temperature={:?} condition={:?}",
                    snapshot.temperature,
                    snapshot.condition
                );
                self.snapshot = Some(snapshot);
                self.last_fetch = Some(now);
                self.last_failure = None;
            }
            Err(e) => {
                tracing::warn!("Weather fetch failed, keeping previous data: {}", e);
                self.last_failure = Some(now);
            }
        }
        true
    }

    pub fn snapshot(&self) -> Option<&WeatherSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn last_fetch(&self) -> Option<Instant> {
        self.last_fetch
    }
}

// ── Tests ────────────────────────────────────────────────────────────
