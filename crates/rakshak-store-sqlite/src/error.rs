//! Error type for `rakshak-store-sqlite`.

use rakshak_core::store::StoreError;
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored label that no longer maps to a domain enum variant.
  #[error("unknown {kind} label: {value:?}")]
  UnknownLabel { kind: &'static str, value: String },
}

impl Error {
  fn sqlite_code(&self) -> Option<ErrorCode> {
    match self {
      Error::Database(tokio_rusqlite::Error::Rusqlite(
        rusqlite::Error::SqliteFailure(e, _),
      )) => Some(e.code),
      _ => None,
    }
  }
}

impl StoreError for Error {
  fn is_transient(&self) -> bool {
    matches!(
      self.sqlite_code(),
      Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
  }

  fn is_conflict(&self) -> bool {
    self.sqlite_code() == Some(ErrorCode::ConstraintViolation)
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
