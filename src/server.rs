//! HTTP control surface.
//!
//! Accepts [`RemoteCommand`]s as JSON and answers with the same text reply a
//! chat client would show.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/commands` | Command list, with the current `tv` id range |
//! | `POST` | `/commands` | Run one command, body `{"command":"tv","channel":3}` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "channel not found: 42" } }
//! ```
//!
//! | Error | Status |
//! |-------|--------|
//! | `not_found` | 404 |
//! | `empty_directory` | 409 |
//! | `invalid_record`, `parse` | 400 |
//! | `cancelled`, `timeout` | 408 |
//! | `transport`, `io` | 502 |
//! | `configuration` | 500 |
//!
//! Each request gets its own deadline of `server.request_timeout_secs`. On
//! ctrl-c the server stops accepting connections and cancels commands that
//! are still waiting.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::bus::{self, CommandBus};
use crate::config::Config;
use crate::context::OpContext;
use crate::control::{CommandInfo, Controller, RemoteCommand, Reply};
use crate::directory::Directory;
use crate::error::Error;
use crate::ingest;
use crate::kv;
use crate::progress::NoProgress;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    controller: Arc<Controller>,
    request_timeout: Duration,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        controller: Arc<Controller>,
        request_timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            controller,
            request_timeout,
            shutdown,
        }
    }

    fn context(&self) -> OpContext {
        OpContext::with_timeout(self.request_timeout).with_cancel(self.shutdown.child_token())
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/commands", get(handle_list_commands).post(handle_command))
        .layer(cors)
        .with_state(state)
}

/// Start the control server for `server.catalog`.
///
/// Unless `skip_ingest` is set, every catalog with a playlist file is
/// reloaded before the listener is bound.
pub async fn run_server(config: &Config, skip_ingest: bool) -> anyhow::Result<()> {
    let store = kv::open(&config.store).await?;

    if skip_ingest {
        info!("skipping startup ingestion");
    } else {
        let reports =
            ingest::ingest_all(&OpContext::background(), config, store.clone(), &NoProgress)
                .await?;
        for report in &reports {
            info!(
                catalog = %report.catalog,
                saved = report.saved,
                skipped = report.skipped.len(),
                "startup ingestion finished"
            );
        }
    }

    let directory = Arc::new(Directory::for_catalog(
        store,
        config,
        &config.server.catalog,
    )?);
    let transport = bus::open_transport(&config.bus)?;
    let bus = CommandBus::new(directory, transport, &config.bus)
        .with_titles(bus::open_titles(&config.bus)?);
    let bus = Arc::new(bus);
    let controller = Arc::new(Controller::new(bus));

    let shutdown = CancellationToken::new();
    let state = AppState::new(
        controller,
        Duration::from_secs(config.server.request_timeout_secs),
        shutdown.clone(),
    );

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(
        bind = %config.server.bind,
        catalog = %config.server.catalog,
        transport = %config.bus.transport,
        "control server listening"
    );
    println!("tvr control server listening on http://{}", config.server.bind);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Error type that converts into an HTTP response.
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::EmptyDirectory => StatusCode::CONFLICT,
            Error::InvalidRecord(_) | Error::Parse(_) => StatusCode::BAD_REQUEST,
            Error::Cancelled | Error::DeadlineExceeded => StatusCode::REQUEST_TIMEOUT,
            Error::Transport(_) | Error::Io { .. } => StatusCode::BAD_GATEWAY,
            Error::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(code = err.code(), error = %err, "command failed");
        }
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /commands ============

#[derive(Serialize)]
struct CommandListResponse {
    commands: Vec<CommandInfo>,
}

async fn handle_list_commands(
    State(state): State<AppState>,
) -> Result<Json<CommandListResponse>, AppError> {
    let commands = state.controller.describe(&state.context()).await?;
    Ok(Json(CommandListResponse { commands }))
}

// ============ POST /commands ============

/// Parses the body itself so malformed commands get the JSON error contract
/// instead of the extractor's plain-text rejection.
async fn handle_command(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<Reply>, AppError> {
    let command: RemoteCommand = serde_json::from_str(&body).map_err(Error::from)?;
    let reply = state.controller.handle(&state.context(), command).await?;
    Ok(Json(reply))
}
