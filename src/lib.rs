//! Shared types for the matrix clock and its HTTP status server.
//!
//! This module provides the pieces every other module leans on:
//! - Panel configuration
//! - The color and palette types
//! - Matrix initialization with our hardware defaults
//! - Signal handling for clean shutdown
//!
//! The clock itself is split into small, testable modules: the scheduler
//! decides what the top line shows, the scroll engine drives the bottom
//! line, and `app` ties them together in the control loop.

pub mod app;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod error;
pub mod fonts;
pub mod input;
#[cfg(feature = "hardware")]
pub mod render;
pub mod scheduler;
pub mod scroll;
pub mod server;
pub mod surface;
pub mod weather;

use crate::error::ConfigError;
#[cfg(feature = "hardware")]
use rpi_led_matrix::{LedMatrix, LedMatrixOptions, LedRuntimeOptions};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// ── Panel configuration ────────────────────────────────────────────

/// Configuration for the LED panel dimensions.
///
/// # Rust concept: derive macros
/// `Clone, Copy` make this cheaply copyable (it's just two u32s).
/// `Debug` gives us `{:?}` formatting. `PartialEq, Eq` let us compare.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PanelConfig {
    pub rows: u32,
    pub cols: u32,
}

impl PanelConfig {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self { rows, cols }
    }

    pub fn width(&self) -> i32 {
        self.cols as i32
    }

    pub fn height(&self) -> i32 {
        self.rows as i32
    }

    /// Vertical position of the primary (clock) line.
    pub fn primary_y(&self) -> i32 {
        self.height() / 4
    }

    /// Vertical position of the scrolling event line.
    pub fn secondary_y(&self) -> i32 {
        self.height() / 4 * 3
    }

    /// Left edge that centers a label of `text_width` pixels.
    ///
    /// This is `floor(width / 2 - text_width / 2)`; text wider than the panel
    /// gets a negative x and is clipped on both sides.
    pub fn centered_x(&self, text_width: i32) -> i32 {
        (self.width() - text_width).div_euclid(2)
    }
}

impl Default for PanelConfig {
    /// A 64x32 panel, the size the clock layout is designed for.
    fn default() -> Self {
        Self { rows: 32, cols: 64 }
    }
}

// ── Color ──────────────────────────────────────────────────────────

/// Our own color type, decoupled from the hardware crate.
///
/// This lets us test color logic without needing `rpi-led-matrix`.
/// At the hardware boundary, we convert via `Into<LedColor>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build a color from a packed `0xRRGGBB` value.
    pub const fn from_rgb24(value: u32) -> Self {
        Self::new((value >> 16) as u8, (value >> 8) as u8, value as u8)
    }

    /// Apply brightness scaling (0-100) to this color.
    pub fn apply_brightness(self, brightness: u8) -> Self {
        if brightness >= 100 {
            return self;
        }
        Self {
            r: ((self.r as u16 * brightness as u16) / 100) as u8,
            g: ((self.g as u16 * brightness as u16) / 100) as u8,
            b: ((self.b as u16 * brightness as u16) / 100) as u8,
        }
    }

    /// Format as `#rrggbb`, the same form the config file accepts.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Parse `#RRGGBB` or `0xRRGGBB`.
///
/// # Rust concept: FromStr
/// Implementing `FromStr` gives us `"#660000".parse::<Color>()` for free.
impl FromStr for Color {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix('#')
            .or_else(|| trimmed.strip_prefix("0x"))
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| ConfigError::Color(s.to_string()))?;

        if digits.len() != 6 {
            return Err(ConfigError::Color(s.to_string()));
        }

        u32::from_str_radix(digits, 16)
            .map(Color::from_rgb24)
            .map_err(|_| ConfigError::Color(s.to_string()))
    }
}

/// Convert our Color to the hardware crate's LedColor at the boundary.
#[cfg(feature = "hardware")]
impl From<Color> for rpi_led_matrix::LedColor {
    fn from(c: Color) -> Self {
        rpi_led_matrix::LedColor {
            red: c.r,
            green: c.g,
            blue: c.b,
        }
    }
}

// ── Palette ────────────────────────────────────────────────────────

/// Ordered set of colors shared by both text lines.
///
/// Index 0 is the background and is never selectable by the buttons, so a
/// usable palette has at least two entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Color>,
}

impl Palette {
    pub fn new(colors: Vec<Color>) -> Result<Self, ConfigError> {
        if colors.len() < 2 {
            return Err(ConfigError::Invalid(format!(
                "palette needs a background and at least one text color, got {} entries",
                colors.len()
            )));
        }
        Ok(Self { colors })
    }

    /// Highest selectable index.
    pub fn max_index(&self) -> usize {
        self.colors.len() - 1
    }

    pub fn background(&self) -> Color {
        self.colors[0]
    }

    /// Color at `index`, falling back to the background when out of range.
    pub fn get(&self, index: usize) -> Color {
        self.colors.get(index).copied().unwrap_or(self.colors[0])
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }
}

impl Default for Palette {
    /// Black background followed by the seven dim text colors the clock ships with:
    /// red, orange, yellow, green, blue, violet, white.
    fn default() -> Self {
        Self {
            colors: [
                0x000000, 0x660000, 0x882200, 0x666600, 0x006600, 0x000066, 0x663666, 0x444444,
            ]
            .into_iter()
            .map(Color::from_rgb24)
            .collect(),
        }
    }
}

// ── Matrix initialization ──────────────────────────────────────────

/// Create a matrix configured for our hardware:
/// Raspberry Pi + Adafruit RGB Matrix Bonnet + configurable panel size.
///
/// # Rust concept: Result and the ? operator
/// This function returns `Result` because matrix initialization can fail
/// (e.g., if not running as root, or if GPIO is unavailable).
#[cfg(feature = "hardware")]
pub fn create_matrix(panel: PanelConfig) -> Result<LedMatrix, Box<dyn std::error::Error>> {
    let mut options = LedMatrixOptions::new();
    options.set_rows(panel.rows);
    options.set_cols(panel.cols);
    options.set_hardware_mapping("adafruit-hat");

    // Text only needs a few bits of color depth; fewer bits means a faster refresh.
    options.set_pwm_bits(7)?;
    options.set_pwm_lsb_nanoseconds(130);

    let mut rt_options = LedRuntimeOptions::new();
    rt_options.set_gpio_slowdown(2);

    let matrix = LedMatrix::new(Some(options), Some(rt_options))?;

    Ok(matrix)
}

/// Set up a Ctrl+C handler that sets `running` to false.
///
/// # Rust concept: Arc and AtomicBool
/// The flag is shared between the control loop, the HTTP server's shutdown
/// future and the signal handler. `AtomicBool` is a thread-safe boolean, so no
/// mutex is needed for a single bool.
pub fn setup_signal_handler() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        tracing::warn!("Could not install Ctrl-C handler: {}", e);
    }

    running
}

/// Check if the control loop should keep running.
pub fn is_running(running: &AtomicBool) -> bool {
    running.load(Ordering::SeqCst)
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    // ── PanelConfig tests ──────────────────────────────────────────

    #[test]
    fn panel_config_default_is_64x32() {
        let panel = PanelConfig::default();
        assert_eq!(panel.rows, 32);
        assert_eq!(panel.cols, 64);
    }

    #[test]
    fn line_positions_are_quarter_and_three_quarters() {
        let panel = PanelConfig::default();
        assert_eq!(panel.primary_y(), 8);
        assert_eq!(panel.secondary_y(), 24);
    }

    #[rstest]
    #[case(64, 28, 18)]
    #[case(64, 29, 17)] // floor(32 - 14.5)
    #[case(64, 64, 0)]
    #[case(64, 70, -3)]
    #[case(64, 71, -4)] // floor(-3.5)
    fn test_centered_x(#[case] cols: u32, #[case] text_width: i32, #[case] expected: i32) {
        assert_eq!(PanelConfig::new(32, cols).centered_x(text_width), expected);
    }

    // ── Color tests ────────────────────────────────────────────────

    #[rstest]
    #[case("#660000", Color::new(0x66, 0, 0))]
    #[case("0x882200", Color::new(0x88, 0x22, 0))]
    #[case("#663666", Color::new(0x66, 0x36, 0x66))]
    #[case(" #444444 ", Color::new(0x44, 0x44, 0x44))]
    fn parse_hex_colors(#[case] input: &str, #[case] expected: Color) {
        assert_eq!(input.parse::<Color>().unwrap(), expected);
    }

    #[rstest]
    #[case("660000")]
    #[case("#66000")]
    #[case("#gg0000")]
    #[case("")]
    fn reject_bad_hex_colors(#[case] input: &str) {
        assert!(input.parse::<Color>().is_err());
    }

    #[test]
    fn hex_formatting_matches_parsing() {
        let c = Color::from_rgb24(0x882200);
        assert_eq!(c.to_hex(), "#882200");
    }

    #[test]
    fn apply_brightness_100_is_identity() {
        let c = Color::new(100, 200, 50);
        assert_eq!(c.apply_brightness(100), c);
    }

    #[test]
    fn apply_brightness_0_is_black() {
        let c = Color::new(255, 255, 255);
        assert_eq!(c.apply_brightness(0), Color::BLACK);
    }

    #[test]
    fn apply_brightness_50_halves() {
        let c = Color::new(200, 100, 50);
        assert_eq!(c.apply_brightness(50), Color::new(100, 50, 25));
    }

    // ── Palette tests ──────────────────────────────────────────────

    #[test]
    fn default_palette_has_black_background_and_seven_colors() {
        let palette = Palette::default();
        assert_eq!(palette.background(), Color::BLACK);
        assert_eq!(palette.max_index(), 7);
        assert_eq!(palette.get(1), Color::new(0x66, 0, 0));
    }

    #[test]
    fn palette_out_of_range_falls_back_to_background() {
        let palette = Palette::default();
        assert_eq!(palette.get(42), Color::BLACK);
    }

    #[test]
    fn palette_rejects_background_only() {
        assert!(Palette::new(vec![Color::BLACK]).is_err());
    }
}
