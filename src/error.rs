//! Error types for the fill server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::document::FillError;
use crate::session::SessionError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Fill error: {0}")]
    Fill(#[from] FillError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

fn fill_error_parts(e: &FillError) -> (StatusCode, &'static str, String) {
    match e {
        FillError::Load(_) | FillError::UnsupportedFormat(_) | FillError::Transport(_) => {
            tracing::error!("Template load error: {}", e);
            (StatusCode::BAD_GATEWAY, "load_error", e.to_string())
        }
        FillError::Synthesis(_) => {
            tracing::error!("Synthesis error: {}", e);
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                "synthesis_error",
                e.to_string(),
            )
        }
        FillError::PageNotFound(_) => (StatusCode::NOT_FOUND, "not_found", e.to_string()),
        FillError::SurfaceUnavailable { .. } => (
            StatusCode::SERVICE_UNAVAILABLE,
            "surface_unavailable",
            e.to_string(),
        ),
        FillError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout", e.to_string()),
        _ => {
            tracing::error!("Engine error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "engine_error",
                "Document processing failed".to_string(),
            )
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Fill(e) => fill_error_parts(e),
            AppError::Session(e) => match e {
                SessionError::NotFound(_)
                | SessionError::UnknownField(_)
                | SessionError::UnknownGroup(_) => {
                    (StatusCode::NOT_FOUND, "not_found", e.to_string())
                }
                SessionError::UnknownOption { .. } => {
                    (StatusCode::BAD_REQUEST, "bad_request", e.to_string())
                }
                SessionError::Busy | SessionError::InvalidState { .. } => {
                    (StatusCode::CONFLICT, "conflict", e.to_string())
                }
                SessionError::CapacityExceeded(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "capacity_exceeded",
                    e.to_string(),
                ),
                SessionError::Fill(inner) => fill_error_parts(inner),
            },
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
        });

        (status, body).into_response()
    }
}
