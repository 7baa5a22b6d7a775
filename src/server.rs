//! HTTP status server: axum router and request handlers.
//!
//! The server runs on the tokio async runtime while the control loop runs
//! on a plain `std::thread`. Communication is via `std::sync::mpsc` in one
//! direction and a shared `ClockStatus` in the other.
//!
//! ## Rust concepts
//! - `async fn` and `.await` for non-blocking I/O
//! - axum extractors: `State`, `Path`, `Json`
//! - `Arc` for sharing state across async tasks
//! - Serde `Deserialize` for parsing JSON request bodies
//! - `tower-http` middleware for CORS and request tracing

use crate::app::{ClockStatus, ControlCommand};
use crate::fonts;
use crate::input::{ButtonId, ColorSelection};
use crate::scheduler::SegmentKind;
use crate::surface::{FontSize, TextLabel};
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// ── App State ────────────────────────────────────────────────────────

/// Shared application state, passed to every handler via axum's `State` extractor.
///
/// Rust concept: CLONE for Arc
/// axum clones the state for each request handler, so everything inside
/// must be cheap to clone. `Sender` and `Arc` both are.
#[derive(Clone)]
pub struct AppState {
    /// Channel to send commands to the control loop
    pub command_tx: Sender<ControlCommand>,
    /// Shared clock status (control loop writes, handlers read)
    pub status: Arc<Mutex<ClockStatus>>,
    /// Directory holding the BDF fonts
    pub fonts_dir: PathBuf,
}

// ── OpenAPI Documentation ────────────────────────────────────────────

#[derive(OpenApi)]
#[openapi(
    paths(get_status, get_fonts, post_button, post_brightness),
    components(schemas(
        ClockStatus,
        TextLabel,
        ColorSelection,
        SegmentKind,
        FontSize,
        ButtonId,
        BrightnessRequest,
    )),
    tags(
        (name = "clock", description = "Clock control endpoints"),
        (name = "system", description = "System status endpoints"),
    ),
    info(
        title = "Matrix Clock API",
        version = env!("CARGO_PKG_VERSION"),
        description = "HTTP API for the RGB LED matrix clock"
    )
)]
pub struct ApiDoc;

// ── Request types ────────────────────────────────────────────────────

#[derive(Deserialize, utoipa::ToSchema)]
pub struct BrightnessRequest {
    /// Brightness level (0-100)
    #[schema(example = 75, minimum = 0, maximum = 100)]
    value: u8,
}

// ── Router ───────────────────────────────────────────────────────────

/// Build the axum router with all API endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(
            SwaggerUi::new("/docs")
                .url("/api-docs/openapi.json", ApiDoc::openapi())
                .config(utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"]).validator_url("none")),
        )
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/fonts", get(get_fonts))
        .route("/api/v1/buttons/{button}", post(post_button))
        .route("/api/v1/brightness", post(post_brightness))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Handlers ─────────────────────────────────────────────────────────

/// GET /api/v1/status: what the clock is showing right now
#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "system",
    responses(
        (status = 200, description = "Current clock status", body = ClockStatus)
    )
)]
async fn get_status(State(state): State<AppState>) -> Json<ClockStatus> {
    let status = state
        .status
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    Json(status)
}

/// GET /api/v1/fonts: list available BDF fonts
#[utoipa::path(
    get,
    path = "/api/v1/fonts",
    tag = "system",
    responses(
        (status = 200, description = "List of available font names", body = Vec<String>)
    )
)]
async fn get_fonts(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(fonts::list_fonts(&state.fonts_dir))
}

/// POST /api/v1/buttons/{button}: press a button without touching the hardware
#[utoipa::path(
    post,
    path = "/api/v1/buttons/{button}",
    tag = "clock",
    params(
        ("button" = ButtonId, Path, description = "`up` cycles the top line color, `down` the bottom line")
    ),
    responses(
        (status = 202, description = "Press queued; ignored if within the button hold-off"),
        (status = 400, description = "Unknown button")
    )
)]
async fn post_button(
    State(state): State<AppState>,
    Path(button): Path<ButtonId>,
) -> Result<StatusCode, (StatusCode, String)> {
    send(&state, ControlCommand::Press(button))?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/v1/brightness: set display brightness (0-100)
#[utoipa::path(
    post,
    path = "/api/v1/brightness",
    tag = "clock",
    request_body = BrightnessRequest,
    responses(
        (status = 200, description = "Brightness updated"),
        (status = 400, description = "Brightness above 100")
    )
)]
async fn post_brightness(
    State(state): State<AppState>,
    Json(req): Json<BrightnessRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    if req.value > 100 {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Brightness must be 0-100, got {}", req.value),
        ));
    }
    send(&state, ControlCommand::SetBrightness(req.value))?;
    Ok(StatusCode::OK)
}

fn send(state: &AppState, command: ControlCommand) -> Result<(), (StatusCode, String)> {
    state.command_tx.send(command).map_err(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Control loop gone".to_string(),
        )
    })
}

// ── Tests ────────────────────────────────────────────────────────────
