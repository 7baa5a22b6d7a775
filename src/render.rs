//! LED matrix surface: draws the two text lines with `rpi-led-matrix`.
//!
//! The `rpi-led-matrix` C library is not thread-safe, so the surface is
//! created on the control loop thread and never leaves it.
//!
//! ## Rust concepts
//! - `Option::take()` to move the canvas out and back in around `swap()`
//! - `From`/`Into` at the hardware boundary (`Color` -> `LedColor`)

use crate::fonts::{FontNames, FontSet, font_path};
use crate::surface::{DisplaySurface, FontSize, Frame, TextBounds, TextLabel, TextMeasure};
use crate::{Color, PanelConfig, create_matrix};
use rpi_led_matrix::{LedCanvas, LedColor, LedFont, LedMatrix};
use std::path::Path;

pub struct LedMatrixSurface {
    matrix: LedMatrix,
    /// `None` only while a frame is being swapped in.
    canvas: Option<LedCanvas>,
    large: LedFont,
    medium: LedFont,
    metrics: FontSet,
}

impl LedMatrixSurface {
    /// Initialize the panel and load both BDF fonts.
    ///
    /// Fails if the matrix cannot be opened (not root, no GPIO) or a font
    /// file is missing; the panel cannot draw text without them.
    pub fn new(
        panel: PanelConfig,
        fonts_dir: &Path,
        names: &FontNames,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let load = |size: FontSize| {
            let path = font_path(fonts_dir, names.name(size));
            LedFont::new(&path)
                .map_err(|e| format!("Failed to load font {}: {}", path.display(), e))
        };
        let large = load(FontSize::Large)?;
        let medium = load(FontSize::Medium)?;
        let metrics = FontSet::load(fonts_dir, names);

        let matrix = create_matrix(panel)?;
        let canvas = Some(matrix.offscreen_canvas());
        tracing::info!("LED matrix ready ({}x{})", panel.cols, panel.rows);

        Ok(Self {
            matrix,
            canvas,
            large,
            medium,
            metrics,
        })
    }

    fn font(&self, size: FontSize) -> &LedFont {
        match size {
            FontSize::Large => &self.large,
            FontSize::Medium => &self.medium,
        }
    }

    /// Labels are positioned by their vertical middle; `draw_text` wants a
    /// baseline.
    fn baseline(&self, label: &TextLabel) -> i32 {
        let metrics = self.metrics.metrics(label.font);
        label.y + (metrics.ascent - metrics.descent) / 2
    }
}

impl TextMeasure for LedMatrixSurface {
    fn measure(&self, font: FontSize, text: &str) -> TextBounds {
        self.metrics.measure(font, text)
    }
}

impl DisplaySurface for LedMatrixSurface {
    fn present(&mut self, frame: &Frame<'_>) {
        let Some(mut canvas) = self.canvas.take() else {
            return;
        };

        let background = frame.palette.background().apply_brightness(frame.brightness);
        if background == Color::BLACK {
            canvas.clear();
        } else {
            canvas.fill(&background.into());
        }

        for label in [frame.primary, frame.secondary] {
            if label.text.is_empty() {
                continue;
            }
            let color: LedColor = frame
                .palette
                .get(label.color_idx)
                .apply_brightness(frame.brightness)
                .into();
            canvas.draw_text(
                self.font(label.font),
                &label.text,
                label.x,
                self.baseline(label),
                &color,
                0,
                false,
            );
        }

        self.canvas = Some(self.matrix.swap(canvas));
    }
}
