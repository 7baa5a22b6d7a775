//! The control loop: one thread that owns every piece of clock state.
//!
//! Each tick it handles button presses, syncs the clock when an hour has
//! gone by, refreshes the weather when it is stale, works out both lines,
//! and hands them to the display. The HTTP server never touches this state
//! directly; it sends `ControlCommand`s in and reads `ClockStatus` out.
//!
//! ## Rust concepts
//! - Generics over traits (`ClockApp<C: ClockSource, D: DisplaySurface>`)
//! - `Box<dyn Trait>` for optional collaborators
//! - `std::sync::mpsc` with `try_recv()` for non-blocking command reads
//! - Disjoint field borrows: one field borrowed mutably while others are read

use crate::calendar::EventTable;
use crate::clock::{ClockSource, ClockSync, TimeSync, WallTime};
use crate::config::ClockConfig;
use crate::error::ConfigError;
use crate::input::{Button, ButtonId, ButtonPoller, ColorSelection, NoButton};
use crate::scheduler::{Scheduler, SegmentKind};
use crate::scroll::ScrollEngine;
use crate::surface::{DisplaySurface, FontSize, Frame, TextLabel};
use crate::weather::{WeatherCache, WeatherFetcher};
use crate::{Palette, PanelConfig, is_running};
use serde::Serialize;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

// ── Commands ─────────────────────────────────────────────────────────

/// Requests from the HTTP server to the control loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlCommand {
    /// Same effect as pushing the physical button.
    Press(ButtonId),
    /// Display brightness, 0-100. Larger values are clamped.
    SetBrightness(u8),
}

// ── Status ───────────────────────────────────────────────────────────

/// Snapshot of the clock published after every tick.
///
/// Rust concept: Arc<Mutex<T>>
/// The control loop replaces this value once per tick; HTTP handlers lock
/// it just long enough to clone it.
#[derive(Clone, Debug, PartialEq, Serialize, utoipa::ToSchema)]
pub struct ClockStatus {
    /// What the top line is showing, if anything has been drawn yet
    pub segment: Option<SegmentKind>,
    pub primary: TextLabel,
    pub secondary: TextLabel,
    pub colors: ColorSelection,
    /// Palette as `#rrggbb`, index 0 is the background
    pub palette: Vec<String>,
    pub temperature: Option<f64>,
    pub condition: Option<String>,
    /// Seconds since the last successful weather fetch
    pub weather_age_secs: Option<u64>,
    /// Seconds since the last successful clock sync
    pub clock_sync_age_secs: Option<u64>,
    /// Current brightness (0-100)
    pub brightness: u8,
    /// Server version
    pub version: String,
}

impl ClockStatus {
    pub fn new() -> Self {
        Self::from_config(&ClockConfig::default())
    }

    /// What the status reads before the first tick: the configured colors,
    /// palette and brightness, with nothing drawn yet.
    pub fn from_config(config: &ClockConfig) -> Self {
        let palette: Vec<String> = match config.palette() {
            Ok(palette) => palette.colors().iter().map(|c| c.to_hex()).collect(),
            Err(_) => config.palette.clone(),
        };
        let colors = ColorSelection::new(
            config.primary_color,
            config.secondary_color,
            palette.len().saturating_sub(1),
        );

        Self {
            segment: None,
            primary: TextLabel::new(FontSize::Large, 0, colors.primary),
            secondary: TextLabel::new(FontSize::Medium, 0, colors.secondary),
            colors,
            palette,
            temperature: None,
            condition: None,
            weather_age_secs: None,
            clock_sync_age_secs: None,
            brightness: config.brightness.min(100),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Default for ClockStatus {
    fn default() -> Self {
        Self::new()
    }
}

// ── App ──────────────────────────────────────────────────────────────

/// Everything the clock knows, owned by the control loop thread.
pub struct ClockApp<C: ClockSource, D: DisplaySurface> {
    panel: PanelConfig,
    clock: C,
    surface: D,
    clock_sync: ClockSync,
    time_source: Option<Box<dyn TimeSync>>,
    weather: WeatherCache,
    weather_source: Option<Box<dyn WeatherFetcher>>,
    scheduler: Scheduler,
    events: EventTable,
    scroll: ScrollEngine,
    colors: ColorSelection,
    poller: ButtonPoller,
    up: Box<dyn Button>,
    down: Box<dyn Button>,
    palette: Palette,
    brightness: u8,
    primary: TextLabel,
    secondary: TextLabel,
    segment: Option<SegmentKind>,
}

impl<C: ClockSource, D: DisplaySurface> ClockApp<C, D> {
    /// Build the app from a validated config. Weather, time sync and the
    /// physical buttons are off until attached with the `with_*` methods.
    pub fn new(
        config: &ClockConfig,
        panel: PanelConfig,
        clock: C,
        surface: D,
    ) -> Result<Self, ConfigError> {
        let palette = config.palette()?;
        let events = config.event_table()?;
        let colors = ColorSelection::new(
            config.primary_color,
            config.secondary_color,
            palette.max_index(),
        );

        Ok(Self {
            panel,
            clock,
            surface,
            clock_sync: ClockSync::new(config.time_sync_interval()),
            time_source: None,
            weather: WeatherCache::new(config.weather_refresh(), config.weather_backoff()),
            weather_source: None,
            scheduler: Scheduler::new(config.bands.clone(), config.blink, config.units),
            events,
            scroll: ScrollEngine::new(panel, FontSize::Medium),
            poller: ButtonPoller::new(config.debounce()),
            up: Box::new(NoButton),
            down: Box::new(NoButton),
            primary: TextLabel::new(FontSize::Large, panel.primary_y(), colors.primary),
            secondary: TextLabel::new(FontSize::Medium, panel.secondary_y(), colors.secondary),
            colors,
            palette,
            brightness: config.brightness.min(100),
            segment: None,
        })
    }

    pub fn with_weather(mut self, source: Box<dyn WeatherFetcher>) -> Self {
        self.weather_source = Some(source);
        self
    }

    pub fn with_time_sync(mut self, source: Box<dyn TimeSync>) -> Self {
        self.time_source = Some(source);
        self
    }

    pub fn with_buttons(mut self, up: Box<dyn Button>, down: Box<dyn Button>) -> Self {
        self.up = up;
        self.down = down;
        self
    }

    pub fn handle_command(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::Press(button) => {
                let now = self.clock.monotonic();
                if !self.poller.virtual_press(now, button, &mut self.colors) {
                    tracing::debug!("Ignoring {:?} press during hold-off", button);
                }
            }
            ControlCommand::SetBrightness(value) => {
                self.brightness = value.min(100);
                tracing::info!("Brightness set to {}", self.brightness);
            }
        }
    }

    /// One pass of the control loop, minus the sleep.
    pub fn tick(&mut self) {
        let now = self.clock.monotonic();

        self.poller
            .poll(now, self.up.as_mut(), self.down.as_mut(), &mut self.colors);

        if let Some(source) = self.time_source.as_mut() {
            self.clock_sync.poll(now, &mut self.clock, source.as_mut());
        }
        if let Some(source) = self.weather_source.as_mut() {
            self.weather.refresh(now, source.as_mut());
        }

        let wall = self.clock.now();
        self.update_primary(&wall);
        self.scroll.tick(&mut self.events, &wall, &self.surface);
        self.scroll.apply(&mut self.secondary, self.colors.secondary);

        let frame = Frame {
            palette: &self.palette,
            brightness: self.brightness,
            primary: &self.primary,
            secondary: &self.secondary,
        };
        self.surface.present(&frame);
    }

    fn update_primary(&mut self, wall: &WallTime) {
        let segment = self
            .scheduler
            .render(wall, self.weather.snapshot(), self.colors.primary);
        let kind = segment.kind();
        if kind != self.segment {
            tracing::debug!("Top line now shows {:?}", kind);
            self.segment = kind;
        }
        Scheduler::apply(
            &segment,
            &mut self.primary,
            self.colors.primary,
            &self.surface,
            self.panel,
        );
    }

    pub fn status(&self) -> ClockStatus {
        let now = self.clock.monotonic();
        let age = |at: Option<Instant>| at.map(|t| now.saturating_duration_since(t).as_secs());
        let snapshot = self.weather.snapshot();

        ClockStatus {
            segment: self.segment,
            primary: self.primary.clone(),
            secondary: self.secondary.clone(),
            colors: self.colors,
            palette: self.palette.colors().iter().map(|c| c.to_hex()).collect(),
            temperature: snapshot.and_then(|w| w.temperature),
            condition: snapshot.and_then(|w| w.condition.clone()),
            weather_age_secs: age(self.weather.last_fetch()),
            clock_sync_age_secs: age(self.clock_sync.last_success()),
            brightness: self.brightness,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn colors(&self) -> ColorSelection {
        self.colors
    }

    pub fn primary(&self) -> &TextLabel {
        &self.primary
    }

    pub fn secondary(&self) -> &TextLabel {
        &self.secondary
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn surface(&self) -> &D {
        &self.surface
    }
}

// ── Loop ─────────────────────────────────────────────────────────────

/// Run the clock until `running` goes false.
///
/// Commands are drained with `try_recv()` so the display keeps moving
/// whether or not the HTTP server has anything to say. A closed channel just
/// means no more commands; the clock carries on without the server.
pub fn run_loop<C: ClockSource, D: DisplaySurface>(
    mut app: ClockApp<C, D>,
    rx: Receiver<ControlCommand>,
    status: Arc<Mutex<ClockStatus>>,
    running: Arc<AtomicBool>,
    tick: Duration,
) {
    tracing::info!("Control loop started, ticking every {:?}", tick);
    let mut commands_open = true;

    while is_running(&running) {
        while commands_open {
            match rx.try_recv() {
                Ok(command) => app.handle_command(command),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::debug!("Command channel closed");
                    commands_open = false;
                }
            }
        }

        app.tick();
        *status.lock().unwrap_or_else(PoisonError::into_inner) = app.status();

        thread::sleep(tick);
    }

    tracing::info!("Control loop stopped");
}

// ── Tests ────────────────────────────────────────────────────────────
