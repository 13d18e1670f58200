//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every failure is rendered as `{"success": false, "message": …}`. Internal
//! errors are logged and replaced by a fixed message.

use axum::{
  Json,
  extract::rejection::{JsonRejection, PathRejection, QueryRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Core(#[from] rakshak_core::Error),

  /// Login failed. Does not say which half was wrong.
  #[error("invalid email or password")]
  InvalidCredentials,

  /// Malformed request body, path or query string.
  #[error("{0}")]
  BadRequest(String),

  #[error("internal error: {0}")]
  Internal(String),
}

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

impl ApiError {
  pub fn internal(e: impl std::fmt::Display) -> Self { Self::Internal(e.to_string()) }

  pub fn status(&self) -> StatusCode {
    use rakshak_core::Error as E;
    match self {
      ApiError::Core(e) => match e {
        E::Unauthenticated => StatusCode::UNAUTHORIZED,
        E::InactiveAccount | E::Forbidden(_) => StatusCode::FORBIDDEN,
        E::Validation(_) => StatusCode::BAD_REQUEST,
        E::NotFound(_) => StatusCode::NOT_FOUND,
        E::InvalidTransition { .. } | E::Conflict(_) => StatusCode::CONFLICT,
        E::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
      },
      ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let message = if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
      "internal server error".to_owned()
    } else {
      self.to_string()
    };
    (status, Json(json!({ "success": false, "message": message }))).into_response()
  }
}

impl From<JsonRejection> for ApiError {
  fn from(r: JsonRejection) -> Self { Self::BadRequest(r.body_text()) }
}

impl From<PathRejection> for ApiError {
  fn from(r: PathRejection) -> Self { Self::BadRequest(r.body_text()) }
}

impl From<QueryRejection> for ApiError {
  fn from(r: QueryRejection) -> Self { Self::BadRequest(r.body_text()) }
}
