//! External-auth completion messages and the loopback callback listener
//!
//! The identity provider's completion page posts
//! `{type: "OAUTH_CALLBACK", status: "success"|"error", platform, message?}`.
//! In an in-page host that arrives as a window message; for system-browser
//! hosts the page POSTs it to `http://127.0.0.1:{port}/oauth/callback`.
//!
//! # Routes
//!
//! - `GET /health` - liveness
//! - `POST /oauth/callback` - deliver a completion message (origin checked)

use super::manager::ConnectionManager;
use crate::platform::PlatformId;
use crate::{CrosspostError, Result};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Message type accepted from the auth context
pub const OAUTH_CALLBACK_TYPE: &str = "OAUTH_CALLBACK";

/// Completion status reported by the identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackStatus {
    Success,
    Error,
}

/// A completion message from the auth context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthCallback {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: CallbackStatus,
    pub platform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Why a completion message was dropped
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallbackRejection {
    #[error("origin {actual:?} does not match {expected:?}")]
    OriginMismatch { expected: String, actual: String },

    #[error("unexpected message type {0:?}")]
    UnexpectedType(String),
}

impl OAuthCallback {
    pub fn success(platform: &str) -> Self {
        Self {
            kind: OAUTH_CALLBACK_TYPE.to_string(),
            status: CallbackStatus::Success,
            platform: platform.to_string(),
            message: None,
        }
    }

    pub fn error(platform: &str, message: impl Into<String>) -> Self {
        Self {
            kind: OAUTH_CALLBACK_TYPE.to_string(),
            status: CallbackStatus::Error,
            platform: platform.to_string(),
            message: Some(message.into()),
        }
    }

    /// Normalised platform id
    pub fn platform_id(&self) -> PlatformId {
        PlatformId::normalized(&self.platform)
    }

    /// Check the sender origin and message type
    pub fn verify(
        &self,
        expected_origin: &str,
        origin: &str,
    ) -> std::result::Result<(), CallbackRejection> {
        let expected = expected_origin.trim_end_matches('/');
        if origin.trim_end_matches('/') != expected {
            return Err(CallbackRejection::OriginMismatch {
                expected: expected.to_string(),
                actual: origin.to_string(),
            });
        }
        if self.kind != OAUTH_CALLBACK_TYPE {
            return Err(CallbackRejection::UnexpectedType(self.kind.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct CallbackResponse {
    resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn health() -> &'static str {
    "ok"
}

async fn receive_callback(
    State(manager): State<ConnectionManager>,
    headers: HeaderMap,
    Json(message): Json<OAuthCallback>,
) -> impl IntoResponse {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    match manager.handle_message(origin, &message).await {
        Ok(true) => (
            StatusCode::OK,
            Json(CallbackResponse {
                resolved: true,
                error: None,
            }),
        ),
        Ok(false) => (
            StatusCode::CONFLICT,
            Json(CallbackResponse {
                resolved: false,
                error: Some("No sign-in in progress for this platform".to_string()),
            }),
        ),
        Err(rejection) => {
            let status = match rejection {
                CallbackRejection::OriginMismatch { .. } => StatusCode::FORBIDDEN,
                CallbackRejection::UnexpectedType(_) => StatusCode::BAD_REQUEST,
            };
            (
                status,
                Json(CallbackResponse {
                    resolved: false,
                    error: Some(rejection.to_string()),
                }),
            )
        }
    }
}

/// Loopback listener forwarding completion messages to a manager
pub struct CallbackServer {
    manager: ConnectionManager,
}

impl CallbackServer {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    pub fn router(manager: ConnectionManager) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/oauth/callback", post(receive_callback))
            .with_state(manager)
    }

    /// Bind `127.0.0.1:{port}` (0 for any free port) and serve in the background
    pub async fn spawn(self, port: u16) -> Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| CrosspostError::Other(format!("Could not bind callback listener: {}", e)))?;
        let addr = listener.local_addr()?;

        tracing::info!(addr = %addr, "OAuth callback listener started");

        let app = Self::router(self.manager);
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "OAuth callback listener stopped");
            }
        });
        Ok((addr, handle))
    }
}
