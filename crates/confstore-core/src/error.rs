//! Error taxonomy for `confstore-core`.
//!
//! Every variant survives unchanged up to the transport layer, which maps it
//! to its own status codes.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The input does not satisfy its schema, or the schema document itself is
  /// malformed.
  #[error("validation failed: {0}")]
  Validation(String),

  /// An update tried to change the shape of an existing configuration.
  #[error("schema of configuration {name:?} cannot change via update")]
  SchemaConflict { name: String },

  #[error("not found: {0}")]
  NotFound(String),

  /// Missing or insufficient role, or missing caller identity.
  #[error("unauthorized: {0}")]
  Unauthorized(String),

  /// A write lost the version-allocation race, or the name already exists.
  #[error("conflict: {0}")]
  Conflict(String),

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Stable snake_case label for the error kind.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Validation(_) => "validation",
      Self::SchemaConflict { .. } => "schema_conflict",
      Self::NotFound(_) => "not_found",
      Self::Unauthorized(_) => "unauthorized",
      Self::Conflict(_) => "conflict",
      Self::Storage(_) => "storage",
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
