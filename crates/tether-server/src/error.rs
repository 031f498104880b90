// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Handler failures, all rendered as JSON error bodies. Nothing here ever
/// crashes the process — a failed handler is just a 4xx/5xx to one client.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("unknown session '{0}'")]
    UnknownSession(String),

    #[error("event stream for session '{0}' is already subscribed")]
    StreamTaken(Uuid),

    #[error("{0}")]
    BadRequest(String),

    #[error("engine start failed: {0}")]
    EngineStart(String),
}

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownSession(_) => StatusCode::NOT_FOUND,
            ServerError::StreamTaken(_) => StatusCode::CONFLICT,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::EngineStart(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
