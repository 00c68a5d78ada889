//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use claimflow_core::Error as EngineError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// The gateway identity headers were missing or malformed.
  #[error("unauthorized: {0}")]
  Unauthorized(String),

  #[error(transparent)]
  Engine(#[from] EngineError),
}

impl ApiError {
  fn status(&self) -> StatusCode {
    match self {
      ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      ApiError::Engine(e) => match e {
        EngineError::ClaimNotFound(_)
        | EngineError::DocumentNotFound(_)
        | EngineError::ActorNotFound(_)
        | EngineError::TargetNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::Forbidden(_) => StatusCode::FORBIDDEN,
        EngineError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        EngineError::InvalidTransition { .. }
        | EngineError::InvalidState(_)
        | EngineError::Conflict(_)
        | EngineError::OwnershipConflict { .. }
        | EngineError::ConcurrentModification(_) => StatusCode::CONFLICT,
        EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
      },
    }
  }

  fn kind(&self) -> &'static str {
    match self {
      ApiError::Unauthorized(_) => "unauthorized",
      ApiError::Engine(e) => e.kind(),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    let body = json!({ "error": self.to_string(), "kind": self.kind() });
    (status, Json(body)).into_response()
  }
}
