//! BDF font discovery and text metrics.
//!
//! The panel draws text with `rpi-led-matrix`, which reads BDF fonts, but it
//! cannot tell us how wide a string will be before drawing it. Centering the
//! clock and knowing when the event line has scrolled off both need that
//! width, so we read the glyph advances straight from the BDF file.
//!
//! ## Rust concepts
//! - `fs::read_dir()` for directory traversal
//! - `HashMap` for glyph lookup
//! - `str::split_whitespace` for line-oriented parsing

use crate::error::FontError;
use crate::surface::{FontSize, TextBounds, TextMeasure};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Glyph used by `rpi-led-matrix` when a character is missing from the font.
const REPLACEMENT_CHARACTER: u32 = 0xFFFD;

// ── Font discovery ───────────────────────────────────────────────────

/// Scan the fonts directory for available BDF fonts.
pub fn list_fonts(fonts_dir: &Path) -> Vec<String> {
    let mut fonts = Vec::new();

    let read_dir = match fs::read_dir(fonts_dir) {
        Ok(rd) => rd,
        Err(_) => return fonts,
    };

    for entry in read_dir.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let is_bdf = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "bdf");

        if is_bdf {
            // Return just the font name without .bdf extension
            if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
                fonts.push(name.to_string());
            }
        }
    }

    fonts.sort();
    fonts
}

/// Path of a named font inside the fonts directory.
pub fn font_path(fonts_dir: &Path, name: &str) -> PathBuf {
    fonts_dir.join(format!("{name}.bdf"))
}

// ── Metrics ──────────────────────────────────────────────────────────

/// Per-glyph horizontal advance plus the vertical extent of a font.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FontMetrics {
    advances: HashMap<u32, i32>,
    /// Advance for characters with no glyph of their own.
    fallback_advance: i32,
    pub ascent: i32,
    pub descent: i32,
}

impl FontMetrics {
    /// Every character is `cell_width` wide. Used when no BDF file is
    /// available (headless runs, tests).
    pub fn fixed(cell_width: i32, ascent: i32, descent: i32) -> Self {
        Self {
            advances: HashMap::new(),
            fallback_advance: cell_width,
            ascent,
            descent,
        }
    }

    pub fn load(path: &Path) -> Result<Self, FontError> {
        let source = fs::read_to_string(path).map_err(|source| FontError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&source, &path.display().to_string())
    }

    /// Parse the parts of a BDF file that affect layout.
    ///
    /// Only `FONTBOUNDINGBOX`, `FONT_ASCENT`, `FONT_DESCENT`, `ENCODING` and
    /// `DWIDTH` are read; bitmaps are left to the renderer.
    pub fn parse(source: &str, name: &str) -> Result<Self, FontError> {
        let mut bbox: Option<(i32, i32, i32)> = None; // width, height, y offset
        let mut ascent = None;
        let mut descent = None;
        let mut advances = HashMap::new();
        let mut encoding: Option<u32> = None;

        for line in source.lines() {
            let mut parts = line.split_whitespace();
            let Some(keyword) = parts.next() else {
                continue;
            };
            let mut number = || parts.next().and_then(|p| p.parse::<i64>().ok());

            match keyword {
                "FONTBOUNDINGBOX" => {
                    if let (Some(w), Some(h), Some(_x), Some(y)) =
                        (number(), number(), number(), number())
                    {
                        bbox = Some((w as i32, h as i32, y as i32));
                    }
                }
                "FONT_ASCENT" => ascent = number().map(|v| v as i32),
                "FONT_DESCENT" => descent = number().map(|v| v as i32),
                "STARTCHAR" => encoding = None,
                // A negative encoding means "not in the standard encoding".
                "ENCODING" => encoding = number().and_then(|v| u32::try_from(v).ok()),
                "DWIDTH" => {
                    if let (Some(code), Some(dx)) = (encoding, number()) {
                        advances.insert(code, dx as i32);
                    }
                }
                _ => {}
            }
        }

        let (_, height, y_offset) =
            bbox.ok_or_else(|| FontError::MissingBoundingBox(name.to_string()))?;
        let descent = descent.unwrap_or(-y_offset);
        let ascent = ascent.unwrap_or(height - descent);
        let fallback_advance = advances.get(&REPLACEMENT_CHARACTER).copied().unwrap_or(0);

        Ok(Self {
            advances,
            fallback_advance,
            ascent,
            descent,
        })
    }

    pub fn glyph_count(&self) -> usize {
        self.advances.len()
    }

    pub fn advance(&self, c: char) -> i32 {
        self.advances
            .get(&(c as u32))
            .copied()
            .unwrap_or(self.fallback_advance)
    }

    pub fn text_width(&self, text: &str) -> i32 {
        text.chars().map(|c| self.advance(c)).sum()
    }

    pub fn height(&self) -> i32 {
        self.ascent + self.descent
    }
}

// ── Font set ─────────────────────────────────────────────────────────

/// BDF font names for the two label sizes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontNames {
    pub large: String,
    pub medium: String,
}

impl Default for FontNames {
    fn default() -> Self {
        Self {
            large: "7x14B".to_string(),
            medium: "6x12".to_string(),
        }
    }
}

impl FontNames {
    pub fn name(&self, size: FontSize) -> &str {
        match size {
            FontSize::Large => &self.large,
            FontSize::Medium => &self.medium,
        }
    }
}

/// Metrics for both label sizes.
#[derive(Clone, Debug)]
pub struct FontSet {
    large: FontMetrics,
    medium: FontMetrics,
}

impl FontSet {
    pub fn new(large: FontMetrics, medium: FontMetrics) -> Self {
        Self { large, medium }
    }

    /// Fixed-cell metrics roughly matching the default fonts.
    pub fn fixed() -> Self {
        Self {
            large: FontMetrics::fixed(7, 11, 3),
            medium: FontMetrics::fixed(6, 10, 2),
        }
    }

    /// Load both fonts from `fonts_dir`, keeping the fixed metrics for any
    /// font that is missing or unreadable.
    pub fn load(fonts_dir: &Path, names: &FontNames) -> Self {
        let fallback = Self::fixed();
        let load_one = |size: FontSize, fallback: FontMetrics| {
            let path = font_path(fonts_dir, names.name(size));
            match FontMetrics::load(&path) {
                Ok(metrics) => {
                    tracing::info!(
                        "Loaded {:?} font {} ({} glyphs)",
                        size,
                        path.display(),
                        metrics.glyph_count()
                    );
                    metrics
                }
                Err(e) => {
                    tracing::warn!("{}; using fixed-width metrics", e);
                    fallback
                }
            }
        };

        Self {
            large: load_one(FontSize::Large, fallback.large),
            medium: load_one(FontSize::Medium, fallback.medium),
        }
    }

    pub fn metrics(&self, size: FontSize) -> &FontMetrics {
        match size {
            FontSize::Large => &self.large,
            FontSize::Medium => &self.medium,
        }
    }
}

impl TextMeasure for FontSet {
    fn measure(&self, font: FontSize, text: &str) -> TextBounds {
        let metrics = self.metrics(font);
        TextBounds {
            x: 0,
            y: -metrics.ascent,
            width: metrics.text_width(text),
            height: metrics.height(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const TINY_BDF: &str = "\
STARTFONT 2.1
FONT -misc-tiny
SIZE 8 75 75
FONTBOUNDINGBOX 5 8 0 -1
STARTPROPERTIES 2
FONT_ASCENT 7
FONT_DESCENT 1
ENDPROPERTIES
CHARS 3
STARTCHAR one
ENCODING 49
SWIDTH 500 0
DWIDTH 5 0
BBX 5 8 0 -1
BITMAP
20
60
20
20
20
20
70
00
ENDCHAR
STARTCHAR colon
ENCODING 58
DWIDTH 3 0
BBX 3 8 0 -1
BITMAP
00
ENDCHAR
STARTCHAR unnamed
ENCODING -1
DWIDTH 9 0
ENDCHAR
ENDFONT
";

    fn create_file(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"fake").unwrap();
    }

    #[test]
    fn list_fonts_finds_bdf_files() {
        let tmp = TempDir::new().unwrap();
        create_file(tmp.path(), "7x14B.bdf");
        create_file(tmp.path(), "6x12.bdf");
        create_file(tmp.path(), "readme.txt"); // should be excluded

        let fonts = list_fonts(tmp.path());
        assert_eq!(fonts, vec!["6x12", "7x14B"]);
    }

    #[test]
    fn list_fonts_returns_empty_when_no_dir() {
        let tmp = TempDir::new().unwrap();
        let fonts = list_fonts(&tmp.path().join("missing"));
        assert!(fonts.is_empty());
    }

    #[test]
    fn parse_reads_advances_and_extent() {
        let metrics = FontMetrics::parse(TINY_BDF, "tiny").unwrap();
        assert_eq!(metrics.glyph_count(), 2);
        assert_eq!(metrics.advance('1'), 5);
        assert_eq!(metrics.advance(':'), 3);
        assert_eq!(metrics.ascent, 7);
        assert_eq!(metrics.descent, 1);
    }

    #[test]
    fn missing_glyphs_have_no_width_without_replacement() {
        let metrics = FontMetrics::parse(TINY_BDF, "tiny").unwrap();
        assert_eq!(metrics.text_width("1:1x"), 13);
    }

    #[test]
    fn replacement_glyph_covers_missing_characters() {
        let source = TINY_BDF.replace("ENCODING -1", "ENCODING 65533");
        let metrics = FontMetrics::parse(&source, "tiny").unwrap();
        assert_eq!(metrics.text_width("1x"), 14);
    }

    #[test]
    fn extent_falls_back_to_bounding_box() {
        let source = TINY_BDF
            .lines()
            .filter(|l| !l.starts_with("FONT_ASCENT") && !l.starts_with("FONT_DESCENT"))
            .collect::<Vec<_>>()
            .join("\n");
        let metrics = FontMetrics::parse(&source, "tiny").unwrap();
        assert_eq!((metrics.ascent, metrics.descent), (7, 1));
    }

    #[test]
    fn parse_requires_bounding_box() {
        let err = FontMetrics::parse("STARTFONT 2.1\nENDFONT\n", "empty").unwrap_err();
        assert!(matches!(err, FontError::MissingBoundingBox(_)));
    }

    #[test]
    fn fixed_metrics_are_monospace() {
        let metrics = FontMetrics::fixed(6, 10, 2);
        assert_eq!(metrics.text_width("12:00"), 30);
        assert_eq!(metrics.height(), 12);
    }

    #[test]
    fn font_set_loads_from_directory() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("tiny.bdf"), TINY_BDF).unwrap();
        let names = FontNames {
            large: "tiny".to_string(),
            medium: "absent".to_string(),
        };

        let fonts = FontSet::load(tmp.path(), &names);
        assert_eq!(fonts.measure(FontSize::Large, "11").width, 10);
        // The missing medium font keeps the fixed 6px cells.
        assert_eq!(fonts.measure(FontSize::Medium, "11").width, 12);
    }
}
