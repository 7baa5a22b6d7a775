//! Right-to-left scrolling of the event line.
//!
//! The line enters at the right edge, moves one pixel per tick, and once it
//! has completely left the panel the next event string takes its place.

use crate::PanelConfig;
use crate::calendar::EventTable;
use crate::clock::WallTime;
use crate::scheduler::DisplaySegment;
use crate::surface::{FontSize, TextLabel, TextMeasure};

/// Pixels moved per tick.
pub const SCROLL_STEP: i32 = 1;

pub struct ScrollEngine {
    panel: PanelConfig,
    font: FontSize,
    text: String,
    width: i32,
    x: i32,
}

impl ScrollEngine {
    /// Starts empty, so the first tick loads the first event.
    pub fn new(panel: PanelConfig, font: FontSize) -> Self {
        Self {
            panel,
            font,
            text: String::new(),
            width: 0,
            x: panel.width(),
        }
    }

    /// Advance one tick. Returns true when a new event string was loaded.
    pub fn tick(
        &mut self,
        events: &mut EventTable,
        now: &WallTime,
        measure: &dyn TextMeasure,
    ) -> bool {
        if self.text.is_empty() {
            self.reset(events, now, measure);
            return true;
        }

        self.x -= SCROLL_STEP;
        if self.x + self.width <= 0 {
            self.reset(events, now, measure);
            return true;
        }
        false
    }

    /// Start over at the right edge with the next event.
    fn reset(&mut self, events: &mut EventTable, now: &WallTime, measure: &dyn TextMeasure) {
        self.text.clear();
        self.x = self.panel.width();
        self.text = events.next_event_string(now);
        self.width = measure.measure(self.font, &self.text).width;
        tracing::debug!("Scrolling {:?} ({}px)", self.text, self.width);
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn text_width(&self) -> i32 {
        self.width
    }

    pub fn segment(&self) -> DisplaySegment {
        DisplaySegment::EventScroll {
            text: self.text.clone(),
            x_offset: self.x,
        }
    }

    /// Copy position and text onto the bottom-line label.
    pub fn apply(&self, label: &mut TextLabel, color_idx: usize) {
        if label.text != self.text {
            label.text.clone_from(&self.text);
        }
        label.font = self.font;
        label.x = self.x;
        label.y = self.panel.secondary_y();
        label.color_idx = color_idx;
    }
}
