//! Matrix clock
//!
//! Shows time, weekday, date and weather on the top line of an RGB LED
//! panel, and scrolls event countdowns along the bottom. Two buttons cycle
//! the line colors. A small HTTP API reports status and offers the same
//! buttons over the network.
//!
//! ## Architecture
//! - **Control thread** (std::thread): owns the clock state and the panel
//! - **HTTP server** (tokio/axum): reads status, sends commands via channel
//!
//! ## Rust concepts
//! - `#[tokio::main]` on a helper, so only the server runs inside tokio
//! - `std::thread::Builder` for a named control thread
//! - `std::sync::mpsc` channel between async and sync worlds
//! - `Arc<Mutex<T>>` for shared status
//!
//! ## Usage
//! ```sh
//! sudo OPENWEATHER_TOKEN=... ./target/release/matrix-clock-rs \
//!     --weather-location "Boston,US" --config clock.json --port 8080
//! ```

use clap::Parser;
use matrix_clock_rs::app::{ClockApp, ClockStatus, ControlCommand, run_loop};
use matrix_clock_rs::clock::{ClockSource, SystemClock, WorldTimeClient};
use matrix_clock_rs::config::ClockConfig;
use matrix_clock_rs::server::{self, AppState};
use matrix_clock_rs::surface::DisplaySurface;
use matrix_clock_rs::weather::{OpenWeatherClient, Units};
use matrix_clock_rs::{PanelConfig, is_running, setup_signal_handler};
use std::error::Error;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "hardware")]
type Surface = matrix_clock_rs::render::LedMatrixSurface;
#[cfg(not(feature = "hardware"))]
type Surface = matrix_clock_rs::surface::LogSurface<matrix_clock_rs::fonts::FontSet>;

/// RGB LED matrix clock
#[derive(Parser)]
#[command(name = "matrix-clock-rs")]
#[command(about = "Time, date, weather and event countdown clock for RGB LED matrix panels")]
#[command(version)]
struct Args {
    /// JSON config file (bands, palette, events, intervals)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Don't start the HTTP server
    #[arg(long)]
    no_server: bool,

    /// Path to BDF font directory
    #[arg(long, default_value = "fonts/bdf")]
    fonts_dir: PathBuf,

    /// Number of rows on the LED panel
    #[arg(long, default_value = "32")]
    rows: u32,

    /// Number of columns on the LED panel
    #[arg(long, default_value = "64")]
    cols: u32,

    /// OpenWeatherMap location, e.g. "Boston,US"
    #[arg(long, env = "OPENWEATHER_LOC")]
    weather_location: Option<String>,

    /// OpenWeatherMap API token
    #[arg(long, env = "OPENWEATHER_TOKEN", hide_env_values = true)]
    weather_token: Option<String>,

    /// Temperature units: imperial, metric or standard (overrides the config file)
    #[arg(long)]
    units: Option<Units>,

    /// IANA timezone for clock sync, e.g. "America/New_York". Without it the
    /// time service locates us by IP.
    #[arg(long)]
    timezone: Option<String>,

    /// Don't sync the clock over the network
    #[arg(long)]
    no_time_sync: bool,

    /// BCM pin of the button that cycles the top line color
    #[arg(long, default_value = "25")]
    button_up_pin: u8,

    /// BCM pin of the button that cycles the bottom line color
    #[arg(long, default_value = "19")]
    button_down_pin: u8,
}

/// Everything the control thread needs to build the app on its own side.
struct Setup {
    config: ClockConfig,
    panel: PanelConfig,
    fonts_dir: PathBuf,
    weather: Option<(String, String)>,
    timezone: Option<String>,
    time_sync: bool,
    #[cfg_attr(not(feature = "hardware"), allow(dead_code))]
    button_pins: (u8, u8),
}

fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false) // Disable ANSI color codes for systemd/journald
        .compact()
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ClockConfig::load(path)?,
        None => ClockConfig::default(),
    };
    if let Some(units) = args.units {
        config.units = units;
    }

    let weather = match (args.weather_location, args.weather_token) {
        (Some(location), Some(token)) => Some((location, token)),
        (None, None) => None,
        _ => return Err("--weather-location and --weather-token must be given together".into()),
    };

    let panel = PanelConfig::new(args.rows, args.cols);
    let fonts_dir = args.fonts_dir.canonicalize().unwrap_or_else(|_| {
        tracing::warn!("Could not canonicalize fonts dir, using as-is");
        args.fonts_dir.clone()
    });

    tracing::info!("Matrix clock v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Panel: {}x{}", panel.cols, panel.rows);
    tracing::info!("Fonts dir: {}", fonts_dir.display());
    tracing::info!(
        "Bands: {}s cycle, {} events, {} colors, units {}",
        config.bands.cycle_seconds(),
        config.events.len(),
        config.palette.len() - 1,
        config.units
    );
    match &weather {
        Some((location, _)) => tracing::info!("Weather for {}", location),
        None => tracing::warn!("No weather location/token; temperature and condition show ??"),
    }

    let running = setup_signal_handler();
    let tick = config.tick();

    // Create the channel for sending commands to the control thread.
    let (tx, rx) = mpsc::channel();

    // Shared status: control thread writes, HTTP handlers read.
    let status = Arc::new(Mutex::new(ClockStatus::from_config(&config)));

    let setup = Setup {
        config,
        panel,
        fonts_dir: fonts_dir.clone(),
        weather,
        timezone: args.timezone,
        time_sync: !args.no_time_sync,
        button_pins: (args.button_up_pin, args.button_down_pin),
    };

    // The panel and the blocking HTTP clients are created on the control
    // thread: the matrix handle cannot move between threads, and blocking
    // clients must not be built inside the tokio runtime.
    let control = {
        let status = status.clone();
        let running = running.clone();
        thread::Builder::new()
            .name("control".to_string())
            .spawn(move || run_control(|| build_app(setup), rx, status, running, tick))?
    };

    let served = if args.no_server {
        Ok(())
    } else {
        let state = AppState {
            command_tx: tx,
            status,
            fonts_dir,
        };
        let result = serve(args.port, state, running.clone());
        // However the server ended (Ctrl-C or a bind failure), the clock stops too.
        running.store(false, Ordering::SeqCst);
        result
    };

    let started = control
        .join()
        .map_err(|_| "control thread panicked".to_string())?;
    served?;
    started?;

    tracing::info!("Shut down cleanly");
    Ok(())
}

/// Body of the control thread. Whether the app fails to build or the loop
/// ends, `running` is cleared so the server shuts down too.
///
/// `Box<dyn Error>` is not `Send`, so a startup failure leaves the thread
/// as a String.
fn run_control<C: ClockSource, D: DisplaySurface>(
    build: impl FnOnce() -> Result<ClockApp<C, D>, Box<dyn Error>>,
    rx: Receiver<ControlCommand>,
    status: Arc<Mutex<ClockStatus>>,
    running: Arc<AtomicBool>,
    tick: Duration,
) -> Result<(), String> {
    let started = match build() {
        Ok(app) => {
            run_loop(app, rx, status, running.clone(), tick);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Failed to start the clock: {}", e);
            Err(format!("failed to start the clock: {e}"))
        }
    };
    running.store(false, Ordering::SeqCst);
    started
}

/// Assemble the app with whichever collaborators this run has.
fn build_app(setup: Setup) -> Result<ClockApp<SystemClock, Surface>, Box<dyn Error>> {
    let surface = create_surface(&setup)?;
    let mut app = ClockApp::new(&setup.config, setup.panel, SystemClock::new(), surface)?;
    let timeout = setup.config.http_timeout();

    if let Some((location, token)) = &setup.weather {
        let client = OpenWeatherClient::new(location, token, setup.config.units, timeout)?;
        app = app.with_weather(Box::new(client));
    }

    if setup.time_sync {
        let client = WorldTimeClient::new(setup.timezone.as_deref(), timeout)?;
        app = app.with_time_sync(Box::new(client));
    }

    Ok(attach_buttons(app, &setup))
}

#[cfg(feature = "hardware")]
fn create_surface(setup: &Setup) -> Result<Surface, Box<dyn Error>> {
    Surface::new(setup.panel, &setup.fonts_dir, &setup.config.fonts)
}

#[cfg(not(feature = "hardware"))]
fn create_surface(setup: &Setup) -> Result<Surface, Box<dyn Error>> {
    tracing::info!("Built without the hardware feature; logging frames instead");
    let fonts = matrix_clock_rs::fonts::FontSet::load(&setup.fonts_dir, &setup.config.fonts);
    Ok(Surface::new(fonts))
}

#[cfg(feature = "hardware")]
fn attach_buttons(
    app: ClockApp<SystemClock, Surface>,
    setup: &Setup,
) -> ClockApp<SystemClock, Surface> {
    use matrix_clock_rs::input::GpioButton;

    let (up_pin, down_pin) = setup.button_pins;
    let buttons = rppal::gpio::Gpio::new().and_then(|gpio| {
        Ok((
            GpioButton::new(&gpio, up_pin)?,
            GpioButton::new(&gpio, down_pin)?,
        ))
    });

    match buttons {
        Ok((up, down)) => {
            tracing::info!("Buttons on GPIO {} (up) and {} (down)", up_pin, down_pin);
            app.with_buttons(Box::new(up), Box::new(down))
        }
        Err(e) => {
            tracing::warn!("Buttons unavailable, use the HTTP API instead: {}", e);
            app
        }
    }
}

#[cfg(not(feature = "hardware"))]
fn attach_buttons(
    app: ClockApp<SystemClock, Surface>,
    _setup: &Setup,
) -> ClockApp<SystemClock, Surface> {
    app
}

/// Run the HTTP server until `running` goes false.
#[tokio::main(flavor = "current_thread")]
async fn serve(
    port: u16,
    state: AppState,
    running: Arc<AtomicBool>,
) -> Result<(), Box<dyn Error>> {
    let app = server::create_router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("API Documentation: http://localhost:{}/docs", port);
    tracing::info!("Try: curl http://localhost:{}/api/v1/status", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_stop(running))
        .await?;
    Ok(())
}

async fn wait_for_stop(running: Arc<AtomicBool>) {
    while is_running(&running) {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

// ── Tests ────────────────────────────────────────────────────────────
