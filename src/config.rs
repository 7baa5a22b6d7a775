//! Startup configuration, read from an optional JSON file.
//!
//! Every field has a default, so an empty object (or no file at all) gives a
//! working clock. Command-line flags in `main` override the weather units.
//!
//! ```json
//! {
//!   "bands": [{"segment": "clock", "seconds": 20}, {"segment": "date", "seconds": 10}],
//!   "palette": ["#000000", "#660000", "#006600"],
//!   "events": [{"name": "Christmas", "month": 12, "day": 25}],
//!   "brightness": 60
//! }
//! ```

use crate::calendar::{CalendarEvent, EventTable, YearPolicy, default_events};
use crate::error::ConfigError;
use crate::fonts::FontNames;
use crate::scheduler::BandTable;
use crate::weather::Units;
use crate::{Color, Palette};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// All tunables of the clock.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClockConfig {
    /// Top-line band table. Must add up to a divisor of 60 seconds.
    pub bands: BandTable,
    /// Blink the clock separator on odd seconds.
    pub blink: bool,
    /// `#RRGGBB` strings; the first entry is the background.
    pub palette: Vec<String>,
    pub events: Vec<CalendarEvent>,
    pub year_policy: YearPolicy,
    pub fonts: FontNames,
    pub units: Units,
    pub weather_refresh_secs: u64,
    /// Wait after a failed weather fetch before trying again.
    pub weather_backoff_secs: u64,
    pub http_timeout_secs: u64,
    pub time_sync_secs: u64,
    pub tick_millis: u64,
    /// Button hold-off after a press.
    pub debounce_millis: u64,
    /// Starting palette indices for the top and bottom lines.
    pub primary_color: usize,
    pub secondary_color: usize,
    /// 0-100
    pub brightness: u8,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            bands: BandTable::default(),
            blink: false,
            palette: Palette::default()
                .colors()
                .iter()
                .map(|c| c.to_hex())
                .collect(),
            events: default_events(),
            year_policy: YearPolicy::default(),
            fonts: FontNames::default(),
            units: Units::default(),
            weather_refresh_secs: 600,
            weather_backoff_secs: 30,
            http_timeout_secs: 10,
            time_sync_secs: 3600,
            tick_millis: 30,
            debounce_millis: 500,
            primary_color: 1,
            secondary_color: 2,
            brightness: 100,
        }
    }
}

impl ClockConfig {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path)?;
        Self::from_json(&source)
    }

    pub fn from_json(source: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Check everything serde cannot: colors parse, the palette has a text
    /// color, events exist and have real dates, intervals are non-zero.
    ///
    /// The band table validates itself while deserializing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let palette = self.palette()?;

        if self.events.is_empty() {
            return Err(ConfigError::Invalid("events list is empty".to_string()));
        }
        for event in &self.events {
            event.validate()?;
        }

        for (name, value) in [
            ("tick_millis", self.tick_millis),
            ("weather_refresh_secs", self.weather_refresh_secs),
            ("time_sync_secs", self.time_sync_secs),
            ("http_timeout_secs", self.http_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be positive")));
            }
        }

        if self.brightness > 100 {
            return Err(ConfigError::Invalid(format!(
                "brightness {} is above 100",
                self.brightness
            )));
        }

        for (name, index) in [
            ("primary_color", self.primary_color),
            ("secondary_color", self.secondary_color),
        ] {
            if index == 0 || index > palette.max_index() {
                return Err(ConfigError::Invalid(format!(
                    "{name} {index} is outside the palette (1..={})",
                    palette.max_index()
                )));
            }
        }
        Ok(())
    }

    pub fn palette(&self) -> Result<Palette, ConfigError> {
        let colors = self
            .palette
            .iter()
            .map(|s| s.parse::<Color>())
            .collect::<Result<Vec<_>, _>>()?;
        Palette::new(colors)
    }

    pub fn event_table(&self) -> Result<EventTable, ConfigError> {
        EventTable::new(self.events.clone(), self.year_policy)
    }

    pub fn weather_refresh(&self) -> Duration {
        Duration::from_secs(self.weather_refresh_secs)
    }

    pub fn weather_backoff(&self) -> Duration {
        Duration::from_secs(self.weather_backoff_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn time_sync_interval(&self) -> Duration {
        Duration::from_secs(self.time_sync_secs)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::SegmentKind;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::TempDir;

    #[test]
    fn empty_object_gives_defaults() {
        let config = ClockConfig::from_json("{}").unwrap();
        assert_eq!(config, ClockConfig::default());
        assert_eq!(config.palette().unwrap(), Palette::default());
        assert_eq!(config.tick(), Duration::from_millis(30));
        assert_eq!(config.weather_refresh(), Duration::from_secs(600));
    }

    #[test]
    fn default_config_is_valid() {
        assert!(ClockConfig::default().validate().is_ok());
    }

    #[test]
    fn load_reads_a_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("clock.json");
        std::fs::write(
            &path,
            r##"{
                "bands": [{"segment": "clock", "seconds": 10}, {"segment": "condition", "seconds": 5}],
                "blink": true,
                "palette": ["#000000", "#ff0000", "0x00ff00"],
                "events": [{"name": "Launch", "month": 3, "day": 14}],
                "year_policy": "current_year",
                "units": "metric",
                "brightness": 40
            }"##,
        )
        .unwrap();

        let config = ClockConfig::load(&path).unwrap();
        assert!(config.blink);
        assert_eq!(config.bands.cycle_seconds(), 15);
        assert_eq!(config.bands.segment_at(12), SegmentKind::Condition);
        assert_eq!(config.palette().unwrap().max_index(), 2);
        assert_eq!(config.year_policy, YearPolicy::CurrentYear);
        assert_eq!(config.units, Units::Metric);
        assert_eq!(config.brightness, 40);
        assert_eq!(config.event_table().unwrap().events().len(), 1);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = ClockConfig::load(&tmp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[rstest]
    #[case::bad_json(r#"{"blink": "#)]
    #[case::unknown_field(r#"{"blinky": true}"#)]
    #[case::band_cycle(r#"{"bands": [{"segment": "clock", "seconds": 7}]}"#)]
    #[case::one_color(r##"{"palette": ["#000000"]}"##)]
    #[case::bad_color(r##"{"palette": ["#000000", "red"]}"##)]
    #[case::no_events(r#"{"events": []}"#)]
    #[case::impossible_date(r#"{"events": [{"name": "x", "month": 2, "day": 30}]}"#)]
    #[case::zero_tick(r#"{"tick_millis": 0}"#)]
    #[case::too_bright(r#"{"brightness": 101}"#)]
    #[case::background_color(r#"{"primary_color": 0}"#)]
    #[case::color_past_palette(r#"{"secondary_color": 8}"#)]
    fn invalid_configs_are_rejected(#[case] json: &str) {
        assert!(ClockConfig::from_json(json).is_err());
    }

    #[test]
    fn example_config_is_valid() {
        let config = ClockConfig::from_json(include_str!("../clock.example.json")).unwrap();
        assert_eq!(config.bands, BandTable::classic());
        assert_eq!(config.brightness, 80);
    }

    #[test]
    fn leap_day_event_is_allowed() {
        let config =
            ClockConfig::from_json(r#"{"events": [{"name": "Leap", "month": 2, "day": 29}]}"#);
        assert!(config.is_ok());
    }
}
