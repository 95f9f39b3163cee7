//!
//! adminlink HTTP/WS server
//! ------------------------
//! Axum transport adapter. Decodes envelopes, finds the session and calls into it;
//! all protocol and authorization logic lives in `identity` and `resource`.
//!
//! Routes:
//! - `POST /session`               open a session; returns `{token, serverHello}`.
//! - `POST /session/authenticate`  complete the handshake (`x-session-token` header).
//! - `POST /session/logout`        close the session.
//! - `ANY  /api/{*path}`           resource request; verb is the HTTP method.
//! - `GET  /ws`                    one session per socket, `ClientMessage` in, push envelopes out.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use futures_util::{FutureExt, SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::AdminError;
use crate::identity::{Caller, ClientAuthenticationMessage};
use crate::identity::session::VerificationResponse;
use crate::protocol::{ClientMessage, PushMessage};
use crate::resource::{ActionResult, ResourceRequest, Verb};
use crate::services::Services;

pub const SESSION_HEADER: &str = "x-session-token";

const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
}

pub fn router(services: Arc<Services>) -> Router {
    Router::new()
        .route("/", get(|| async { "adminlink ok" }))
        .route("/session", post(open_session))
        .route("/session/authenticate", post(authenticate))
        .route("/session/logout", post(logout))
        .route("/api", any(api_root))
        .route("/api/{*path}", any(api_path))
        .route("/ws", get(ws_handler))
        .with_state(AppState { services })
}

/// Bind and serve until the listener fails.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let services = Arc::new(Services::open(&config)?);
    info!(
        target: "startup",
        "adminlink server identity '{}', data_dir={:?}",
        services.identity().certificate().id,
        config.data_dir
    );

    // Background sweeper for sessions closed by a failed handshake
    {
        let sweep = services.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(SWEEP_INTERVAL).await;
                let removed = sweep.sessions().sweep_closed();
                if removed > 0 {
                    debug!(removed = removed, "session_sweep");
                }
            }
        });
    }

    let app = router(services);
    let addr = config.socket_addr();
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn status_of(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn error_response(e: AdminError) -> Response {
    let e = e.client_facing();
    (status_of(e.http_status()), Json(json!({ "status": "error", "code": e.code_str(), "message": e.message() }))).into_response()
}

/// `Ok` without data is an empty 200; everything else carries the result as JSON.
fn result_response(result: ActionResult) -> Response {
    let status = status_of(result.http_status());
    if result.is_ok() && result.data.is_none() {
        return status.into_response();
    }
    (status, Json(result)).into_response()
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()).map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

async fn open_session(State(state): State<AppState>) -> Response {
    match state.services.sessions().open() {
        Ok((token, hello)) => (StatusCode::OK, Json(json!({ "token": token, "serverHello": hello }))).into_response(),
        Err(e) => {
            error!("open session failed: {}", e);
            error_response(e)
        }
    }
}

async fn authenticate(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let Some(token) = session_token(&headers) else {
        return error_response(AdminError::invalid_session());
    };
    let msg: ClientAuthenticationMessage = match serde_json::from_slice(&body) {
        Ok(m) => m,
        Err(e) => return error_response(AdminError::invalid_message("invalid_message", e.to_string().as_str())),
    };
    let sessions = state.services.sessions();
    let session = match sessions.get(&token) {
        Ok(s) => s,
        Err(e) => return error_response(e),
    };
    let outcome = session.lock().authenticate(&msg);
    match outcome {
        Ok(signature) => (StatusCode::OK, Json(VerificationResponse { signature })).into_response(),
        Err(e) => {
            if matches!(e, AdminError::Unauthorized { .. }) {
                sessions.close(&token);
            }
            error_response(e)
        }
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match session_token(&headers) {
        Some(token) if state.services.sessions().close(&token) => StatusCode::OK.into_response(),
        _ => error_response(AdminError::invalid_session()),
    }
}

async fn api_root(state: State<AppState>, method: Method, headers: HeaderMap, body: Bytes) -> Response {
    api_dispatch(state, method, headers, String::new(), body).await
}

async fn api_path(state: State<AppState>, method: Method, headers: HeaderMap, Path(path): Path<String>, body: Bytes) -> Response {
    api_dispatch(state, method, headers, path, body).await
}

async fn api_dispatch(State(state): State<AppState>, method: Method, headers: HeaderMap, path: String, body: Bytes) -> Response {
    let verb: Verb = match method.as_str().parse() {
        Ok(v) => v,
        Err(msg) => return result_response(ActionResult::not_allowed(msg)),
    };
    let data: Option<Value> = if body.iter().all(|b| b.is_ascii_whitespace()) {
        None
    } else {
        match serde_json::from_slice(&body) {
            Ok(v) => Some(v),
            Err(e) => return result_response(ActionResult::bad_request(format!("invalid JSON body: {}", e))),
        }
    };
    let request = ResourceRequest {
        verb,
        path: path.split('/').filter(|s| !s.is_empty()).map(str::to_string).collect(),
        data,
    };

    // No token: anonymous caller, only Public methods succeed.
    let services = state.services.clone();
    let exec = async move {
        match session_token(&headers) {
            None => Ok::<ActionResult, AdminError>(services.tree().handle(request, &Caller::anonymous())),
            Some(token) => {
                let session = services.sessions().get(&token)?;
                let result = session.lock().dispatch(request);
                Ok(result)
            }
        }
    };
    match AssertUnwindSafe(exec).catch_unwind().await {
        Ok(Ok(result)) => result_response(result),
        Ok(Err(e)) => error_response(e),
        Err(panic_payload) => {
            let msg = if let Some(s) = panic_payload.downcast_ref::<&str>() { *s }
                      else if let Some(s) = panic_payload.downcast_ref::<String>() { s.as_str() }
                      else { "panic" };
            error!(target: "panic", "HTTP resource handler panic: {}", msg);
            result_response(ActionResult::generic("internal server error"))
        }
    }
}

async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(state.services, socket))
}

async fn serve_socket(services: Arc<Services>, socket: WebSocket) {
    let (token, session) = match services.sessions().open_session() {
        Ok(s) => s,
        Err(e) => {
            error!("ws session open failed: {}", e);
            return;
        }
    };
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<PushMessage>();
    session.lock().attach_outbound(tx.clone());

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(Message::Text(msg.to_json().into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(Ok(frame)) = stream.next().await {
        let text = match frame {
            Message::Text(t) => t,
            Message::Close(_) => break,
            _ => continue,
        };
        let msg = match ClientMessage::parse(text.as_str()) {
            Ok(m) => m,
            Err(e) => {
                let _ = tx.send(PushMessage::action_result(&ActionResult::from(e)));
                continue;
            }
        };
        let handled = std::panic::catch_unwind(AssertUnwindSafe(|| session.lock().handle(msg)));
        match handled {
            Ok(outcome) => {
                let _ = tx.send(PushMessage::action_result(&outcome.result));
                if outcome.close {
                    break;
                }
            }
            Err(_) => {
                error!(target: "panic", "WS handler panic");
                let _ = tx.send(PushMessage::action_result(&ActionResult::generic("internal server error")));
            }
        }
    }

    services.sessions().close(&token);
    drop(tx);
    if let Err(e) = writer.await {
        warn!("ws writer task ended abnormally: {}", e);
    }
    debug!(target: "session", "websocket closed");
}
