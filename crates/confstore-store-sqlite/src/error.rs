//! Error type for `confstore-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("decode error: {0}")]
  Decode(String),

  /// `(name, version)` already taken, or the Latest row moved underneath
  /// the writer.
  #[error("version conflict for {name:?}: {reason}")]
  Conflict { name: String, reason: String },

  #[error("configuration record not found: {0}")]
  NotFound(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for confstore_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Conflict { .. } => Self::Conflict(e.to_string()),
      Error::NotFound(_) => Self::NotFound(e.to_string()),
      other => Self::Storage(Box::new(other)),
    }
  }
}
