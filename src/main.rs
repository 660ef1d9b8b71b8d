//! ==============================================================================
//! main.rs - webcam host entry point
//! ==============================================================================
//!
//! purpose:
//!     serves the data behind the static webcam/weather page. the page polls
//!     these endpoints; everything is read fresh from the tmpfs files that the
//!     433 MHz sniffer and the webcam capture job keep up to date.
//!
//! responsibilities:
//!     - load host.toml (or defaults) and set up logging
//!     - serve /sensors.json, /data.json, /image, /videos
//!     - offer `webcam-host summary <log>` for inspecting a log offline
//!
//! relationships:
//!     - uses: summary.rs (sensor log aggregation)
//!     - uses: snapshot.rs (header values), imaging.rs (jpeg passthrough)
//!     - uses: videos.rs (recording list and playback)
//!     - reads: config/host.toml (via config.rs)
//!
//! architecture:
//!
//!     ┌──────────────────────────────────────────────────────────────┐
//!     │                     rust host (this file)                     │
//!     │   axum router ──► spawn_blocking ──► file readers / builder   │
//!     └───────────────────────────┬──────────────────────────────────┘
//!                                 │ reads
//!            ┌────────────────────┼─────────────────────┐
//!            ▼                    ▼                     ▼
//!     /ram/433/433.json    /ram/433/<model>/<id>/   /ram/webcam, /ram/videos
//!     (json lines)         (one value per file)     (jpeg, mp4)
//!
//! absent sources:
//!     a missing file or directory answers 200 with an empty body. the page
//!     simply keeps what it already shows.
//!
//! ==============================================================================

mod config;
mod domain;
mod error;
mod imaging;
mod snapshot;
mod summary;
mod videos;

use anyhow::{Context, Result};
use axum::{
    extract::{Path as UrlPath, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Form, Router,
};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::{cors::CorsLayer, services::ServeFile};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::HostConfig;
use crate::error::HostError;
use crate::summary::SummaryBuilder;

// ==============================================================================
// cli
// ==============================================================================

#[derive(Parser)]
#[command(name = "webcam-host")]
#[command(about = "Serves sensor summaries, webcam images and recordings for the webcam page")]
struct Cli {
    /// config file (default: config/host.toml or ../config/host.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// listen address, overrides server.bind
    #[arg(long)]
    bind: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the summary of a sensor log as json and exit
    Summary {
        /// json-lines log (default: paths.sensor_log)
        log: Option<PathBuf>,
    },
}

// ==============================================================================
// shared state
// ==============================================================================
// read-only after startup; every request reads its files fresh.

pub struct AppState {
    pub config: HostConfig,
    pub builder: SummaryBuilder,
}

impl AppState {
    pub fn new(config: HostConfig) -> Self {
        let builder = SummaryBuilder::from_config(&config.summary);
        Self { config, builder }
    }
}

type SharedState = Arc<AppState>;

// ==============================================================================
// main entry point
// ==============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => HostConfig::load(path)?,
        None => HostConfig::load_or_default()?,
    };
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }

    init_logging(&config.logging.level);

    match cli.command {
        Some(Commands::Summary { log }) => print_summary(&config, log),
        None => {
            config.log_summary();
            run_server(Arc::new(AppState::new(config))).await
        }
    }
}

/// RUST_LOG wins over logging.level
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact())
        .init();
}

fn print_summary(config: &HostConfig, log: Option<PathBuf>) -> Result<()> {
    let path = log.unwrap_or_else(|| config.paths.sensor_log.clone());
    let report = SummaryBuilder::from_config(&config.summary)
        .load(&path)
        .with_context(|| format!("Failed to summarize {}", path.display()))?;

    println!("{}", serde_json::to_string_pretty(&report.summary)?);
    tracing::info!(
        lines = report.lines,
        records = report.records,
        malformed = report.skipped_malformed,
        excluded = report.skipped_excluded,
        incomplete = report.skipped_incomplete,
        "summary done"
    );
    Ok(())
}

// ==============================================================================
// web server
// ==============================================================================

fn app(state: SharedState) -> Router {
    Router::new()
        .route("/sensors.json", get(sensors_handler))
        .route("/data.json", get(data_handler))
        .route("/image", get(image_get_handler).post(image_post_handler))
        .route("/videos", get(videos_handler))
        .route("/videos/:file", get(video_file_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn run_server(state: SharedState) -> Result<()> {
    let bind = state.config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;

    tracing::info!("Serving on http://{}", bind);
    axum::serve(listener, app(state)).await?;
    Ok(())
}

/// run a blocking file job off the async workers
async fn blocking<T, F>(job: F) -> error::Result<T>
where
    F: FnOnce() -> error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .unwrap_or_else(|e| Err(HostError::Io(std::io::Error::other(e))))
}

/// empty 200 for absent sources, empty 500 for real failures
fn failure(route: &str, e: HostError) -> Response {
    if e.is_quiet() {
        tracing::debug!("{}: {}", route, e);
        StatusCode::OK.into_response()
    } else {
        tracing::warn!("{}: {}", route, e);
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

fn json_or_empty<T: Serialize>(route: &str, result: error::Result<T>) -> Response {
    match result {
        Ok(body) => Json(body).into_response(),
        Err(e) => failure(route, e),
    }
}

/// model -> id -> measurement -> readings
async fn sensors_handler(State(state): State<SharedState>) -> Response {
    let result = blocking(move || {
        state
            .builder
            .load(&state.config.paths.sensor_log)
            .map(|report| report.summary)
    })
    .await;
    json_or_empty("/sensors.json", result)
}

/// header values: image time, temperature, humidity (+ lumi, baro)
async fn data_handler(State(state): State<SharedState>) -> Response {
    let result = blocking(move || {
        let paths = &state.config.paths;
        snapshot::read_snapshot(&paths.webcam_dir, &paths.sensor_dir)
    })
    .await;
    json_or_empty("/data.json", result)
}

/// image params
#[derive(Deserialize)]
struct ImageParams {
    url: String,
    res: Option<String>,
}

/// GET /image?url=current.jpg&res=l
async fn image_get_handler(
    State(state): State<SharedState>,
    Query(params): Query<ImageParams>,
) -> Response {
    image_response(state, params).await
}

/// POST /image with url/res as form fields
async fn image_post_handler(
    State(state): State<SharedState>,
    Form(params): Form<ImageParams>,
) -> Response {
    image_response(state, params).await
}

async fn image_response(state: SharedState, params: ImageParams) -> Response {
    let resolution = imaging::Resolution::from_flag(params.res.as_deref());
    let result = blocking(move || {
        imaging::render(&state.config.paths.image_dir, &params.url, resolution)
    })
    .await;

    match result {
        Ok(jpeg) => ([(header::CONTENT_TYPE, "image/jpeg")], jpeg).into_response(),
        Err(e) => failure("/image", e),
    }
}

/// recordings, newest first
async fn videos_handler(State(state): State<SharedState>) -> Response {
    let result = blocking(move || videos::list_videos(&state.config.paths.video_dir)).await;
    json_or_empty("/videos", result)
}

/// one recording, streamed by ServeFile (range requests, content type)
async fn video_file_handler(
    State(state): State<SharedState>,
    UrlPath(file): UrlPath<String>,
    request: axum::extract::Request,
) -> Response {
    let path = match videos::open_video(&state.config.paths.video_dir, &file) {
        Ok(path) => path,
        Err(e) => return failure("/videos", e),
    };

    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}
