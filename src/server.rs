//! REST + WebSocket surface for the chat widget.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::SessionError;
use crate::session::{ClientAction, Session, SessionEvent, SessionManager};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
}

/// Build the router with session REST and WebSocket routes.
pub fn routes(sessions: Arc<SessionManager>) -> Router {
    let state = AppState { sessions };

    Router::new()
        .route("/health", get(health))
        .route("/api/sessions", post(create_session))
        .route(
            "/api/sessions/{id}",
            get(get_session).delete(delete_session),
        )
        .route("/api/sessions/{id}/messages", post(send_message))
        .route("/api/sessions/{id}/options", post(select_option))
        .route("/api/sessions/{id}/reset", post(reset_session))
        .route("/ws/sessions/{id}", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "remit-onboard"
    }))
}

// ── REST Endpoints ──────────────────────────────────────────────────────

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// Parse the path id and find the session.
async fn lookup(state: &AppState, id: &str) -> Result<Arc<Session>, Response> {
    let session_id = Uuid::parse_str(id)
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, "Invalid session ID"))?;
    state.sessions.get(session_id).await.map_err(|e| match e {
        SessionError::NotFound(_) => error_response(StatusCode::NOT_FOUND, "Session not found"),
    })
}

async fn create_session(State(state): State<AppState>) -> Response {
    let session = state.sessions.create().await;
    (StatusCode::CREATED, Json(session.snapshot())).into_response()
}

async fn get_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match lookup(&state, &id).await {
        Ok(session) => Json(session.snapshot()).into_response(),
        Err(resp) => resp,
    }
}

async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let session = match lookup(&state, &id).await {
        Ok(session) => session,
        Err(resp) => return resp,
    };
    match state.sessions.remove(session.id()).await {
        Ok(()) => Json(serde_json::json!({ "status": "deleted" })).into_response(),
        Err(_) => error_response(StatusCode::NOT_FOUND, "Session not found"),
    }
}

#[derive(Deserialize)]
struct MessageRequest {
    text: String,
}

async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<MessageRequest>,
) -> Response {
    let session = match lookup(&state, &id).await {
        Ok(session) => session,
        Err(resp) => return resp,
    };
    if body.text.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Message text is empty");
    }
    session.send_user_message(&body.text).await;
    Json(session.snapshot()).into_response()
}

#[derive(Deserialize)]
struct OptionRequest {
    label: String,
}

async fn select_option(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<OptionRequest>,
) -> Response {
    let session = match lookup(&state, &id).await {
        Ok(session) => session,
        Err(resp) => return resp,
    };
    session.select_option(&body.label).await;
    Json(session.snapshot()).into_response()
}

async fn reset_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let session = match lookup(&state, &id).await {
        Ok(session) => session,
        Err(resp) => return resp,
    };
    session.reset();
    Json(session.snapshot()).into_response()
}

// ── WebSocket ───────────────────────────────────────────────────────────

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let session = match lookup(&state, &id).await {
        Ok(session) => session,
        Err(resp) => return resp,
    };
    info!(session_id = %session.id(), "WebSocket client connecting");
    ws.on_upgrade(move |socket| handle_socket(socket, session))
}

async fn send_event(socket: &mut WebSocket, event: &SessionEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to serialize session event");
            true
        }
    }
}

async fn handle_socket(mut socket: WebSocket, session: Arc<Session>) {
    // Subscribe before the snapshot so nothing falls between them.
    let mut rx = session.subscribe();

    let sync = SessionEvent::Sync {
        snapshot: session.snapshot(),
    };
    if !send_event(&mut socket, &sync).await {
        warn!("Failed to send initial sync, client disconnected");
        return;
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if !send_event(&mut socket, &event).await {
                            debug!("Client disconnected during send");
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(missed = n, "WS client lagged behind session events");
                        let sync = SessionEvent::Sync { snapshot: session.snapshot() };
                        if !send_event(&mut socket, &sync).await {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => {
                        debug!("Session event channel closed");
                        break;
                    }
                }
            }

            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Text(text))) => {
                        // Turns run in their own task so events keep flowing
                        // while a quote is in flight.
                        handle_client_message(text.as_str(), &session);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!(session_id = %session.id(), "WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!(session_id = %session.id(), "WebSocket connection closed");
}

fn handle_client_message(text: &str, session: &Arc<Session>) {
    match serde_json::from_str::<ClientAction>(text) {
        Ok(ClientAction::Message { text }) => {
            let session = session.clone();
            tokio::spawn(async move { session.send_user_message(&text).await });
        }
        Ok(ClientAction::SelectOption { label }) => {
            let session = session.clone();
            tokio::spawn(async move { session.select_option(&label).await });
        }
        Ok(ClientAction::Reset) => session.reset(),
        Err(e) => {
            debug!(error = %e, text = text, "Unrecognized WS message from client");
        }
    }
}
