//! Error type for `vigil-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] vigil_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored column held a value outside its closed set.
  #[error("decode error: {0}")]
  Decode(String),

  /// The plugin name cannot be used as a table suffix.
  #[error("invalid plugin namespace: {0:?}")]
  InvalidNamespace(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
