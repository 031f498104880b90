// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! HTTP/SSE surface of the adapter: session routes, the event stream
//! responder, and YAML configuration.

pub mod config;
pub mod error;
pub mod router;

pub use config::{load, EngineConfig, EngineKind, HttpConfig, ServerConfig};
pub use error::ServerError;
pub use router::{router, AppState};

use std::sync::Arc;

use anyhow::Context;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::info;

use tether_session::SessionManager;

/// Bind and serve until the process is stopped.
pub async fn serve(config: ServerConfig, manager: Arc<SessionManager>) -> anyhow::Result<()> {
    let mut app = router(AppState { manager })
        .layer(RequestBodyLimitLayer::new(config.http.max_body_bytes));
    if config.http.cors_allow_any {
        // The chat UI is typically served from another dev server.
        app = app.layer(CorsLayer::permissive());
    }

    let listener = tokio::net::TcpListener::bind(&config.http.bind)
        .await
        .with_context(|| format!("binding {}", config.http.bind))?;
    info!(bind = %config.http.bind, "tether server listening");
    axum::serve(listener, app).await.map_err(Into::into)
}
