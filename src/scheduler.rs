//! Decides what the top line shows, second by second.
//!
//! The minute is cut into bands. Each band belongs to one segment type
//! (clock face, weekday, date, temperature, weather condition), and the
//! second-of-minute picks the band. The rest is formatting.
//!
//! ```text
//!  default table, 5 x 12s
//!  0          12         24         36         48         60
//!  |  12:34   |   Mon    |  Oct 19  |   71°F   |  Clouds  |
//! ```

use crate::PanelConfig;
use crate::clock::WallTime;
use crate::error::ConfigError;
use crate::surface::{FontSize, TextLabel, TextMeasure};
use crate::weather::{Units, WeatherSnapshot};
use chrono::Weekday;
use serde::{Deserialize, Serialize};

/// Shown when weather is unknown.
pub const PLACEHOLDER: &str = "??";

/// Conditions longer than this switch to the medium font.
const LONG_CONDITION_CHARS: usize = 6;

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

// ── Bands ────────────────────────────────────────────────────────────

/// The kinds of content the top line can show.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Clock,
    Weekday,
    Date,
    Temperature,
    Condition,
}

/// One contiguous slice of the band cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Band {
    pub segment: SegmentKind,
    pub seconds: u32,
}

impl Band {
    pub const fn new(segment: SegmentKind, seconds: u32) -> Self {
        Self { segment, seconds }
    }
}

/// Ordered bands, repeated back to back through each minute.
///
/// The cycle length must divide 60, so every minute starts at the first band
/// and every second of the minute lands in exactly one band.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Band>", into = "Vec<Band>")]
pub struct BandTable {
    bands: Vec<Band>,
    cycle: u32,
}

impl BandTable {
    pub fn new(bands: Vec<Band>) -> Result<Self, ConfigError> {
        if let Some(empty) = bands.iter().find(|b| b.seconds == 0) {
            return Err(ConfigError::Invalid(format!(
                "band {:?} has zero width",
                empty.segment
            )));
        }
        let cycle: u32 = bands.iter().map(|b| b.seconds).sum();
        if cycle == 0 || 60 % cycle != 0 {
            return Err(ConfigError::Invalid(format!(
                "band widths add up to {cycle}s, which does not divide a minute"
            )));
        }
        Ok(Self { bands, cycle })
    }

    /// Five equal 12-second bands: clock, weekday, date, temperature, condition.
    pub fn five_band() -> Self {
        Self {
            bands: vec![
                Band::new(SegmentKind::Clock, 12),
                Band::new(SegmentKind::Weekday, 12),
                Band::new(SegmentKind::Date, 12),
                Band::new(SegmentKind::Temperature, 12),
                Band::new(SegmentKind::Condition, 12),
            ],
            cycle: 60,
        }
    }

    /// Four equal 15-second bands, no weather condition.
    pub fn four_band() -> Self {
        Self {
            bands: vec![
                Band::new(SegmentKind::Clock, 15),
                Band::new(SegmentKind::Weekday, 15),
                Band::new(SegmentKind::Date, 15),
                Band::new(SegmentKind::Temperature, 15),
            ],
            cycle: 60,
        }
    }

    /// A 30-second cycle that favours the clock face: 12s clock, then
    /// 3s weekday and 5s each for date, temperature and condition.
    pub fn classic() -> Self {
        Self {
            bands: vec![
                Band::new(SegmentKind::Clock, 12),
                Band::new(SegmentKind::Weekday, 3),
                Band::new(SegmentKind::Date, 5),
                Band::new(SegmentKind::Temperature, 5),
                Band::new(SegmentKind::Condition, 5),
            ],
            cycle: 30,
        }
    }

    pub fn cycle_seconds(&self) -> u32 {
        self.cycle
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    /// Band index for a second-of-minute. Seconds past 59 (leap seconds)
    /// wrap like any other.
    pub fn band_index(&self, second: u32) -> usize {
        let mut offset = second % self.cycle;
        for (i, band) in self.bands.iter().enumerate() {
            if offset < band.seconds {
                return i;
            }
            offset -= band.seconds;
        }
        // Unreachable: offset < cycle == sum of widths.
        self.bands.len() - 1
    }

    pub fn segment_at(&self, second: u32) -> SegmentKind {
        self.bands[self.band_index(second)].segment
    }
}

impl Default for BandTable {
    fn default() -> Self {
        Self::five_band()
    }
}

impl TryFrom<Vec<Band>> for BandTable {
    type Error = ConfigError;

    fn try_from(bands: Vec<Band>) -> Result<Self, Self::Error> {
        Self::new(bands)
    }
}

impl From<BandTable> for Vec<Band> {
    fn from(table: BandTable) -> Self {
        table.bands
    }
}

// ── Segments ─────────────────────────────────────────────────────────

/// What one line is showing this tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisplaySegment {
    Clock { text: String, color_idx: usize },
    Weekday(String),
    Date(String),
    Temperature(String),
    Condition(String),
    EventScroll { text: String, x_offset: i32 },
}

impl DisplaySegment {
    pub fn text(&self) -> &str {
        match self {
            DisplaySegment::Clock { text, .. }
            | DisplaySegment::EventScroll { text, .. }
            | DisplaySegment::Weekday(text)
            | DisplaySegment::Date(text)
            | DisplaySegment::Temperature(text)
            | DisplaySegment::Condition(text) => text,
        }
    }

    /// Font for this segment. Long weather conditions and the scrolling
    /// line use the medium font; everything else is large.
    pub fn font(&self) -> FontSize {
        match self {
            DisplaySegment::Condition(text)
                if text.chars().count() > LONG_CONDITION_CHARS =>
            {
                FontSize::Medium
            }
            DisplaySegment::EventScroll { .. } => FontSize::Medium,
            _ => FontSize::Large,
        }
    }

    pub fn kind(&self) -> Option<SegmentKind> {
        match self {
            DisplaySegment::Clock { .. } => Some(SegmentKind::Clock),
            DisplaySegment::Weekday(_) => Some(SegmentKind::Weekday),
            DisplaySegment::Date(_) => Some(SegmentKind::Date),
            DisplaySegment::Temperature(_) => Some(SegmentKind::Temperature),
            DisplaySegment::Condition(_) => Some(SegmentKind::Condition),
            DisplaySegment::EventScroll { .. } => None,
        }
    }
}

// ── Formatting ───────────────────────────────────────────────────────

/// 24-hour to 12-hour clock: 0 -> 12, 13..=23 -> 1..=11.
pub fn display_hour(hour24: u32) -> u32 {
    match hour24 {
        0 => 12,
        h if h > 12 => h - 12,
        h => h,
    }
}

/// `h:mm`, with the colon blinking off on odd seconds when `blink` is set.
pub fn clock_text(now: &WallTime, blink: bool) -> String {
    let separator = if blink && now.second % 2 == 1 { ' ' } else { ':' };
    format!("{}{}{:02}", display_hour(now.hour), separator, now.minute)
}

pub fn weekday_text(weekday: Weekday) -> String {
    WEEKDAYS[weekday.num_days_from_monday() as usize].to_string()
}

pub fn date_text(now: &WallTime) -> String {
    let month = MONTHS
        .get(now.month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or(PLACEHOLDER);
    format!("{} {}", month, now.day)
}

/// Whole degrees (truncated) plus the unit suffix, or `??` plus the suffix.
pub fn temperature_text(weather: Option<&WeatherSnapshot>, units: Units) -> String {
    match weather.and_then(|w| w.temperature).filter(|t| t.is_finite()) {
        Some(t) => format!("{}{}", t.trunc() as i64, units.suffix()),
        None => format!("{}{}", PLACEHOLDER, units.suffix()),
    }
}

/// Provider condition name, shortened where the panel needs it.
pub fn condition_text(weather: Option<&WeatherSnapshot>) -> String {
    match weather.and_then(|w| w.condition.as_deref()) {
        Some("Thunderstorm") => "T-Storm".to_string(),
        Some(c) if !c.trim().is_empty() => c.trim().to_string(),
        _ => PLACEHOLDER.to_string(),
    }
}

// ── Scheduler ────────────────────────────────────────────────────────

/// Band table plus the formatting options for the top line.
#[derive(Clone, Debug)]
pub struct Scheduler {
    bands: BandTable,
    blink: bool,
    units: Units,
}

impl Scheduler {
    pub fn new(bands: BandTable, blink: bool, units: Units) -> Self {
        Self {
            bands,
            blink,
            units,
        }
    }

    pub fn bands(&self) -> &BandTable {
        &self.bands
    }

    /// The segment for `now`. Pure: the same inputs give the same segment.
    pub fn render(
        &self,
        now: &WallTime,
        weather: Option<&WeatherSnapshot>,
        color_idx: usize,
    ) -> DisplaySegment {
        match self.bands.segment_at(now.second) {
            SegmentKind::Clock => DisplaySegment::Clock {
                text: clock_text(now, self.blink),
                color_idx,
            },
            SegmentKind::Weekday => DisplaySegment::Weekday(weekday_text(now.weekday)),
            SegmentKind::Date => DisplaySegment::Date(date_text(now)),
            SegmentKind::Temperature => {
                DisplaySegment::Temperature(temperature_text(weather, self.units))
            }
            SegmentKind::Condition => DisplaySegment::Condition(condition_text(weather)),
        }
    }

    /// Put `segment` on the top-line label. Only the text and font trigger
    /// re-centering; the color is applied every time.
    pub fn apply(
        segment: &DisplaySegment,
        label: &mut TextLabel,
        color_idx: usize,
        measure: &dyn TextMeasure,
        panel: PanelConfig,
    ) -> bool {
        label.color_idx = color_idx;
        label.y = panel.primary_y();
        label.set_centered(segment.text(), segment.font(), measure, panel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::FontSet;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::time::Instant;

    fn at(h: u32, m: u32, s: u32) -> WallTime {
        let dt = NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap();
        WallTime::from_datetime(&dt)
    }

    fn snapshot(temperature: Option<f64>, condition: Option<&str>) -> WeatherSnapshot {
        WeatherSnapshot {
            temperature,
            condition: condition.map(str::to_string),
            fetched_at: Instant::now(),
        }
    }

    fn scheduler() -> Scheduler {
        Scheduler::new(BandTable::default(), false, Units::Imperial)
    }

    // ── Band table ─────────────────────────────────────────────────

    #[rstest]
    #[case::five(BandTable::five_band())]
    #[case::four(BandTable::four_band())]
    #[case::classic(BandTable::classic())]
    fn every_second_maps_to_exactly_one_band(#[case] table: BandTable) {
        let mut counts = vec![0u32; table.bands().len()];
        for s in 0..60 {
            let index = table.band_index(s);
            assert!(index < table.bands().len());
            counts[index] += 1;

            // Exactly one band's [start, end) range contains the offset.
            let offset = s % table.cycle_seconds();
            let mut start = 0;
            let containing: Vec<usize> = table
                .bands()
                .iter()
                .enumerate()
                .filter_map(|(i, b)| {
                    let hit = offset >= start && offset < start + b.seconds;
                    start += b.seconds;
                    hit.then_some(i)
                })
                .collect();
            assert_eq!(containing, vec![index]);
        }
        let repeats = 60 / table.cycle_seconds();
        for (band, count) in table.bands().iter().zip(counts) {
            assert_eq!(count, band.seconds * repeats);
        }
    }

    #[rstest]
    #[case(0, SegmentKind::Clock)]
    #[case(11, SegmentKind::Clock)]
    #[case(12, SegmentKind::Weekday)]
    #[case(24, SegmentKind::Date)]
    #[case(36, SegmentKind::Temperature)]
    #[case(48, SegmentKind::Condition)]
    #[case(59, SegmentKind::Condition)]
    fn default_bands_follow_the_configured_order(#[case] second: u32, #[case] kind: SegmentKind) {
        assert_eq!(BandTable::default().segment_at(second), kind);
    }

    #[rstest]
    #[case(0, SegmentKind::Clock)]
    #[case(12, SegmentKind::Weekday)]
    #[case(15, SegmentKind::Date)]
    #[case(20, SegmentKind::Temperature)]
    #[case(25, SegmentKind::Condition)]
    #[case(30, SegmentKind::Clock)]
    #[case(44, SegmentKind::Weekday)]
    fn classic_table_repeats_every_thirty_seconds(#[case] second: u32, #[case] kind: SegmentKind) {
        assert_eq!(BandTable::classic().segment_at(second), kind);
    }

    #[rstest]
    #[case::does_not_divide(vec![Band::new(SegmentKind::Clock, 7)])]
    #[case::too_long(vec![Band::new(SegmentKind::Clock, 40), Band::new(SegmentKind::Date, 40)])]
    #[case::zero_width(vec![Band::new(SegmentKind::Clock, 60), Band::new(SegmentKind::Date, 0)])]
    #[case::empty(vec![])]
    fn invalid_band_tables_are_rejected(#[case] bands: Vec<Band>) {
        assert!(BandTable::new(bands).is_err());
    }

    #[test]
    fn band_table_parses_from_json_list() {
        let json = r#"[{"segment": "clock", "seconds": 20}, {"segment": "temperature", "seconds": 10}]"#;
        let table: BandTable = serde_json::from_str(json).unwrap();
        assert_eq!(table.cycle_seconds(), 30);
        assert_eq!(table.segment_at(25), SegmentKind::Temperature);

        let bad = r#"[{"segment": "clock", "seconds": 25}]"#;
        assert!(serde_json::from_str::<BandTable>(bad).is_err());
    }

    // ── Formatting ─────────────────────────────────────────────────

    #[rstest]
    #[case(0, 12)]
    #[case(1, 1)]
    #[case(11, 11)]
    #[case(12, 12)]
    #[case(13, 1)]
    #[case(23, 11)]
    fn twelve_hour_display(#[case] hour: u32, #[case] expected: u32) {
        assert_eq!(display_hour(hour), expected);
    }

    #[test]
    fn clock_text_pads_minutes() {
        assert_eq!(clock_text(&at(0, 5, 0), false), "12:05");
        assert_eq!(clock_text(&at(13, 30, 0), false), "1:30");
    }

    #[rstest]
    #[case(4, true, "9:41")]
    #[case(5, true, "9 41")]
    #[case(5, false, "9:41")]
    fn blinking_separator_follows_second_parity(
        #[case] second: u32,
        #[case] blink: bool,
        #[case] expected: &str,
    ) {
        assert_eq!(clock_text(&at(9, 41, second), blink), expected);
    }

    #[test]
    fn weekday_and_date_text() {
        let now = at(8, 0, 0);
        assert_eq!(weekday_text(now.weekday), "Mon");
        assert_eq!(date_text(&now), "Oct 19");
    }

    #[rstest]
    #[case(Some(71.6), Units::Imperial, "71°F")]
    #[case(Some(-3.7), Units::Metric, "-3°C")]
    #[case(Some(280.2), Units::Standard, "280K")]
    #[case(None, Units::Imperial, "??°F")]
    #[case(Some(f64::NAN), Units::Imperial, "??°F")]
    fn temperature_formatting(
        #[case] temperature: Option<f64>,
        #[case] units: Units,
        #[case] expected: &str,
    ) {
        let weather = snapshot(temperature, Some("Clear"));
        assert_eq!(temperature_text(Some(&weather), units), expected);
    }

    #[test]
    fn temperature_without_any_weather_is_placeholder() {
        assert_eq!(temperature_text(None, Units::Imperial), "??°F");
    }

    #[rstest]
    #[case(Some("Clouds"), "Clouds")]
    #[case(Some("Thunderstorm"), "T-Storm")]
    #[case(Some(""), "??")]
    #[case(None, "??")]
    fn condition_formatting(#[case] condition: Option<&str>, #[case] expected: &str) {
        let weather = snapshot(Some(50.0), condition);
        assert_eq!(condition_text(Some(&weather)), expected);
    }

    // ── Render ─────────────────────────────────────────────────────

    #[test]
    fn render_picks_segment_by_second() {
        let weather = snapshot(Some(64.0), Some("Rain"));
        let s = scheduler();

        assert_eq!(
            s.render(&at(14, 7, 3), Some(&weather), 2),
            DisplaySegment::Clock {
                text: "2:07".to_string(),
                color_idx: 2
            }
        );
        assert_eq!(
            s.render(&at(14, 7, 13), Some(&weather), 2),
            DisplaySegment::Weekday("Mon".to_string())
        );
        assert_eq!(
            s.render(&at(14, 7, 30), Some(&weather), 2),
            DisplaySegment::Date("Oct 19".to_string())
        );
        assert_eq!(
            s.render(&at(14, 7, 40), Some(&weather), 2),
            DisplaySegment::Temperature("64°F".to_string())
        );
        assert_eq!(
            s.render(&at(14, 7, 50), Some(&weather), 2),
            DisplaySegment::Condition("Rain".to_string())
        );
    }

    #[test]
    fn render_without_weather_uses_placeholders() {
        let s = scheduler();
        assert_eq!(s.render(&at(1, 0, 40), None, 1).text(), "??°F");
        assert_eq!(s.render(&at(1, 0, 50), None, 1).text(), "??");
    }

    #[rstest]
    #[case(DisplaySegment::Condition("Clouds".to_string()), FontSize::Large)]
    #[case(DisplaySegment::Condition("Drizzle".to_string()), FontSize::Medium)]
    #[case(DisplaySegment::Date("Oct 19".to_string()), FontSize::Large)]
    #[case(DisplaySegment::EventScroll { text: "x".to_string(), x_offset: 0 }, FontSize::Medium)]
    fn long_conditions_use_the_medium_font(#[case] segment: DisplaySegment, #[case] font: FontSize) {
        assert_eq!(segment.font(), font);
    }

    #[test]
    fn apply_centers_and_colors_the_label() {
        let panel = PanelConfig::default();
        let mut label = TextLabel::new(FontSize::Large, 0, 1);
        let segment = DisplaySegment::Date("Oct 19".to_string());

        assert!(Scheduler::apply(&segment, &mut label, 4, &FontSet::fixed(), panel));
        assert_eq!(label.text, "Oct 19");
        assert_eq!(label.color_idx, 4);
        assert_eq!(label.y, 8);
        // 6 chars x 7px = 42px: floor(32 - 21) = 11
        assert_eq!(label.x, 11);

        // Same text again: nothing to re-center, color still follows.
        assert!(!Scheduler::apply(&segment, &mut label, 5, &FontSet::fixed(), panel));
        assert_eq!(label.color_idx, 5);
    }
}
