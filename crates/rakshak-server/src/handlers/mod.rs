//! HTTP handlers, grouped by resource, plus the response envelope and the
//! extractors that turn rejections into envelope errors.

pub mod cases;
#[cfg(feature = "diagnostics")]
pub mod diagnostics;
pub mod session;
pub mod volunteers;

use axum::{
  Json,
  extract::{FromRequest, FromRequestParts, Path, Query},
};
use chrono::Utc;
use rakshak_core::Error;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::ApiError;

// ─── Envelope ────────────────────────────────────────────────────────────────

/// `{"success": true, "data": …}` with optional message and list metadata.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
  pub success: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub count:   Option<usize>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub page:    Option<usize>,
  pub data:    T,
}

impl<T> Envelope<T> {
  pub fn ok(data: T) -> Json<Self> {
    Json(Self { success: true, message: None, count: None, page: None, data })
  }

  pub fn with_message(message: impl Into<String>, data: T) -> Json<Self> {
    Json(Self {
      success: true,
      message: Some(message.into()),
      count: None,
      page: None,
      data,
    })
  }
}

impl<T> Envelope<Vec<T>> {
  pub fn list(data: Vec<T>, page: Option<usize>) -> Json<Self> {
    Json(Self {
      success: true,
      message: None,
      count: Some(data.len()),
      page,
      data,
    })
  }
}

// ─── Extractors ──────────────────────────────────────────────────────────────

/// `Json<T>` whose rejection is rendered as an envelope error.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// `Query<T>` whose rejection is rendered as an envelope error.
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct QueryParams<T>(pub T);

/// A single `{id}` path segment parsed as a UUID.
#[derive(FromRequestParts, Deserialize)]
#[from_request(via(Path), rejection(ApiError))]
pub struct IdPath(pub Uuid);

// ─── Misc ────────────────────────────────────────────────────────────────────

/// `GET /`
pub async fn health() -> Json<Value> {
  Json(json!({
    "success": true,
    "message": "Rakshak API is running",
    "timestamp": Utc::now(),
  }))
}

/// Any unmatched route.
pub async fn not_found() -> ApiError { Error::NotFound("route").into() }
