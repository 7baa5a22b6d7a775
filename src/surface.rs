//! Text labels and the display surface they are drawn on.
//!
//! The clock shows two independent lines of text. Each is a `TextLabel` with
//! its own text, font, position and palette index. The control loop edits
//! the labels and hands both to a `DisplaySurface` once per tick.

use crate::{Palette, PanelConfig};

/// The fixed set of fonts a label can use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FontSize {
    Large,
    Medium,
}

/// Bounding box of rendered text, relative to the label origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextBounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Knows how big a string is in a given font.
pub trait TextMeasure {
    fn measure(&self, font: FontSize, text: &str) -> TextBounds;
}

/// One line of text on the panel.
///
/// `x` is the left edge, `y` the vertical middle of the text.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, utoipa::ToSchema)]
pub struct TextLabel {
    pub text: String,
    pub font: FontSize,
    pub x: i32,
    pub y: i32,
    pub color_idx: usize,
}

impl TextLabel {
    pub fn new(font: FontSize, y: i32, color_idx: usize) -> Self {
        Self {
            text: String::new(),
            font,
            x: 0,
            y,
            color_idx,
        }
    }

    /// Replace text and font, re-centering horizontally if either changed.
    /// Returns true when something changed.
    pub fn set_centered(
        &mut self,
        text: &str,
        font: FontSize,
        measure: &dyn TextMeasure,
        panel: PanelConfig,
    ) -> bool {
        if self.text == text && self.font == font {
            return false;
        }
        self.text.clear();
        self.text.push_str(text);
        self.font = font;
        self.x = panel.centered_x(measure.measure(font, text).width);
        true
    }
}

/// Everything needed to draw one frame.
pub struct Frame<'a> {
    pub palette: &'a Palette,
    /// 0-100
    pub brightness: u8,
    pub primary: &'a TextLabel,
    pub secondary: &'a TextLabel,
}

/// Where frames end up.
///
/// # Rust concept: supertraits
/// `DisplaySurface: TextMeasure` means every surface can also measure text,
/// so layout and drawing always agree on font metrics.
pub trait DisplaySurface: TextMeasure {
    fn present(&mut self, frame: &Frame<'_>);
}

/// Headless surface: logs each line whenever its text changes.
///
/// Used when the binary is built without the `hardware` feature, so the clock
/// logic can run on a desktop.
pub struct LogSurface<M: TextMeasure> {
    measure: M,
    last_primary: String,
    last_secondary: String,
}

impl<M: TextMeasure> LogSurface<M> {
    pub fn new(measure: M) -> Self {
        Self {
            measure,
            last_primary: String::new(),
            last_secondary: String::new(),
        }
    }
}

impl<M: TextMeasure> TextMeasure for LogSurface<M> {
    fn measure(&self, font: FontSize, text: &str) -> TextBounds {
        self.measure.measure(font, text)
    }
}

impl<M: TextMeasure> DisplaySurface for LogSurface<M> {
    fn present(&mut self, frame: &Frame<'_>) {
        if frame.primary.text != self.last_primary {
            tracing::info!(
                "[top] {:?} color {} at x={}",
                frame.primary.text,
                frame.palette.get(frame.primary.color_idx).to_hex(),
                frame.primary.x
            );
            self.last_primary.clone_from(&frame.primary.text);
        }
        if frame.secondary.text != self.last_secondary {
            tracing::info!(
                "[bottom] {:?} color {}",
                frame.secondary.text,
                frame.palette.get(frame.secondary.color_idx).to_hex()
            );
            self.last_secondary.clone_from(&frame.secondary.text);
        }
    }
}
