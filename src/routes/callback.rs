// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! One-shot local listener for the Strava OAuth redirect.
//!
//! The `auth` command points Strava's redirect at
//! `http://localhost:{port}/callback`, waits for exactly one callback (or a
//! timeout), then shuts the listener down.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Html,
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;

use crate::error::{AppError, Result};

/// Path Strava redirects to.
pub const CALLBACK_PATH: &str = "/callback";

/// Default local port for the callback listener.
pub const DEFAULT_CALLBACK_PORT: u16 = 8000;

/// How long to wait for the athlete to finish authorizing.
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(120);

/// Grace period for the listener to flush its response before shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// What the OAuth redirect delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackResult {
    Code(String),
    Error(String),
}

/// Sender for the first callback; taken (and thus consumed) by that callback.
type ResultSlot = Arc<Mutex<Option<oneshot::Sender<CallbackResult>>>>;

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Router that reports the first `/callback` hit on `result_tx`.
pub fn callback_router(result_tx: oneshot::Sender<CallbackResult>) -> Router {
    let slot: ResultSlot = Arc::new(Mutex::new(Some(result_tx)));

    Router::new()
        .route(CALLBACK_PATH, get(handle_callback))
        .layer(TraceLayer::new_for_http())
        .with_state(slot)
}

async fn handle_callback(
    State(slot): State<ResultSlot>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, Html<String>) {
    let (result, status, page) = match (params.code, params.error) {
        (Some(code), _) => (
            CallbackResult::Code(code),
            StatusCode::OK,
            "<h1>Authorization successful!</h1><p>You can close this window.</p>".to_string(),
        ),
        (None, Some(error)) => {
            let message = params.error_description.unwrap_or(error);
            tracing::warn!(error = %message, "OAuth error from Strava");
            (
                CallbackResult::Error(message.clone()),
                StatusCode::BAD_REQUEST,
                format!("<h1>Error: {}</h1>", html_escape(&message)),
            )
        }
        (None, None) => (
            CallbackResult::Error("No authorization code received".to_string()),
            StatusCode::BAD_REQUEST,
            "<h1>No authorization code received</h1>".to_string(),
        ),
    };

    let sender = slot.lock().ok().and_then(|mut s| s.take());
    match sender {
        Some(tx) => {
            let _ = tx.send(result);
            (status, Html(page))
        }
        None => (
            StatusCode::GONE,
            Html("<h1>Authorization already handled</h1>".to_string()),
        ),
    }
}

/// Listen on `127.0.0.1:{port}` until one callback arrives or `timeout`
/// passes, and return the authorization code.
pub async fn wait_for_code(port: u16, timeout: Duration) -> Result<String> {
    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .map_err(|e| AppError::Auth(format!("Cannot listen on port {}: {}", port, e)))?;
    serve_until_callback(listener, timeout).await
}

/// Serve the callback router on an already-bound listener.
pub async fn serve_until_callback(listener: TcpListener, timeout: Duration) -> Result<String> {
    let (result_tx, result_rx) = oneshot::channel();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let app = callback_router(result_tx);
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    let outcome = tokio::time::timeout(timeout, result_rx).await;

    let _ = stop_tx.send(());
    if tokio::time::timeout(SHUTDOWN_GRACE, server).await.is_err() {
        tracing::debug!("Callback listener did not shut down in time");
    }

    match outcome {
        Err(_) => Err(AppError::Auth(
            "Timed out waiting for authorization callback".to_string(),
        )),
        Ok(Err(_)) => Err(AppError::Auth("Callback listener closed".to_string())),
        Ok(Ok(CallbackResult::Code(code))) => Ok(code),
        Ok(Ok(CallbackResult::Error(error))) => {
            Err(AppError::Auth(format!("Authorization failed: {}", error)))
        }
    }
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
