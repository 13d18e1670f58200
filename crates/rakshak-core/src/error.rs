//! Error types for `rakshak-core`.

use thiserror::Error;

use crate::case::CaseStatus;

#[derive(Debug, Error)]
pub enum Error {
  /// Missing, malformed or expired credential, or a principal that no store
  /// knows about.
  #[error("not authenticated")]
  Unauthenticated,

  #[error("account is inactive")]
  InactiveAccount,

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("validation failed: {0}")]
  Validation(String),

  #[error("cannot move case from {from} to {to}")]
  InvalidTransition { from: CaseStatus, to: CaseStatus },

  /// Absent, or invisible to the caller. The two are never distinguished.
  #[error("{0} not found")]
  NotFound(&'static str),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn validation(msg: impl Into<String>) -> Self { Self::Validation(msg.into()) }

  pub fn forbidden(msg: impl Into<String>) -> Self { Self::Forbidden(msg.into()) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
