//! HTTP routes and the connection lifecycle for the Parlor server.

use crate::config::Config;
use crate::error::AppError;
use crate::metrics::{self, ConnectionMetricsGuard};
use crate::secrets::Secrets;
use crate::session;
use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        ConnectInfo, FromRef, State,
    },
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use axum_extra::extract::cookie::{Key, SignedCookieJar};
use parlor_core::{trace, Avatar, Client, Profile, Room, RoomHandle, TryAvatars};
use parlor_transport::{serve_client, EndReason, PumpConfig, WebSocketConnection};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// How often room stats are published as metrics.
const STATS_INTERVAL: Duration = Duration::from_secs(5);

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    /// The chat room.
    pub room: RoomHandle,
    /// Server configuration.
    pub config: Arc<Config>,
    /// Cookie signing key.
    pub key: Key,
    /// Avatar resolution for connecting clients.
    pub avatar: Arc<dyn Avatar>,
    pump: PumpConfig,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config, room: RoomHandle, key: Key, avatar: Arc<dyn Avatar>) -> Self {
        Self {
            pump: config.pump_config(),
            room,
            config: Arc::new(config),
            key,
            avatar,
        }
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.key.clone()
    }
}

/// Build the application routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/room", get(room_handler))
        .route("/me", get(me_handler))
        .route("/logout", get(logout_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Run the HTTP/WebSocket server until ctrl-c.
///
/// # Errors
///
/// Returns an error if the secrets cannot be loaded or the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let secrets = match &config.session.secrets_path {
        Some(path) => Some(Secrets::load(shellexpand::tilde(path).as_ref())?),
        None => None,
    };
    let key = session::signing_key(secrets.as_ref())?;

    let tracer = if config.trace.enabled {
        trace::new(std::io::stdout())
    } else {
        trace::off()
    };
    let (room, room_task) = Room::spawn(config.room_config(), tracer);

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
        tokio::spawn(metrics::watch_room(room.clone(), STATS_INTERVAL));
    }

    let addr = config.bind_addr()?;
    let state = AppState::new(config, room.clone(), key, Arc::new(TryAvatars::standard()));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Parlor server listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/room", addr);

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(room))
    .await?;

    let stats = room_task.await.context("Room task failed")?;
    info!(
        messages = stats.messages_forwarded,
        evicted = stats.evicted,
        dropped = stats.dropped,
        "Room closed"
    );

    Ok(())
}

/// Wait for ctrl-c, then close the room so every client is disconnected.
async fn shutdown_signal(room: RoomHandle) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutting down");
    if room.shutdown().await.is_err() {
        debug!("Room already closed");
    }
}

/// Health check handler.
async fn health_handler(State(state): State<AppState>) -> Response {
    match state.room.stats().await {
        Ok(stats) => Json(json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "room": state.room.name(),
            "members": stats.members,
        }))
        .into_response(),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "closed" })),
        )
            .into_response(),
    }
}

/// The signed-in user's profile and avatar.
async fn me_handler(State(state): State<AppState>, jar: SignedCookieJar) -> Response {
    match session::resolve_profile(&jar, &state.config.session.cookie_name) {
        Ok(profile) => {
            let avatar_url = state.avatar.avatar_url(&profile).ok();
            Json(json!({
                "name": profile.display_name(),
                "avatar_url": avatar_url,
                "profile": profile,
            }))
            .into_response()
        }
        Err(_) => Redirect::temporary("/login").into_response(),
    }
}

/// Expire the session cookie and go back to the start page.
async fn logout_handler(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> (SignedCookieJar, Redirect) {
    (
        session::logout(jar, &state.config.session.cookie_name),
        Redirect::temporary("/"),
    )
}

/// WebSocket upgrade handler. Identity is checked before upgrading.
async fn room_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    jar: SignedCookieJar,
) -> Result<Response, AppError> {
    let profile = session::resolve_profile(&jar, &state.config.session.cookie_name)?;
    if state.room.is_closed() {
        return Err(AppError::RoomClosed);
    }
    let remote = connect_info.map(|ConnectInfo(addr)| addr);

    Ok(ws
        .on_failed_upgrade(move |e| {
            warn!(remote = ?remote, error = %e, "WebSocket upgrade failed");
            metrics::record_error("upgrade");
        })
        .on_upgrade(move |socket| handle_websocket(socket, remote, profile, state)))
}

/// Handle an upgraded WebSocket connection.
async fn handle_websocket(
    socket: WebSocket,
    remote: Option<SocketAddr>,
    profile: Profile,
    state: AppState,
) {
    let _metrics_guard = ConnectionMetricsGuard::new();

    let client = Client::new(profile, state.config.room.queue_capacity.max(1));
    let connection = WebSocketConnection::new(socket, remote);

    match serve_client(
        connection,
        client,
        &state.room,
        state.avatar.as_ref(),
        state.pump.clone(),
    )
    .await
    {
        Ok(summary) => {
            if let EndReason::Transport(e) = &summary.reason {
                debug!(client = %summary.client, error = %e, "Transport error");
                metrics::record_error("transport");
            }
            metrics::record_session(&summary);
        }
        Err(e) => {
            warn!(remote = ?remote, error = %e, "Client could not join");
            metrics::record_error("join");
        }
    }
}
