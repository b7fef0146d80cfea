//! The `VersionStore` trait: durable History and Latest tables.
//!
//! The trait is implemented by storage backends (e.g. `confstore-store-sqlite`).
//! The [`VersioningService`](crate::service::VersioningService) depends on
//! this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::record::{ConfigurationRecord, LatestConfiguration};

/// Abstraction over a transactional configuration store.
///
/// History rows are append-only except for [`update_in_place`], which may
/// only touch the current version. Every write updates History and Latest
/// atomically; readers never observe one without the other.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
///
/// [`update_in_place`]: VersionStore::update_in_place
pub trait VersionStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static + Into<crate::Error>;

  /// Append `record` to History and make it the Latest row for its name.
  ///
  /// Fails with a conflict if `(name, version)` already exists, or if the
  /// current Latest version is not exactly `record.version - 1` (no Latest
  /// row at all when `record.version == 1`). Nothing is written on failure.
  fn create_version(
    &self,
    record: ConfigurationRecord,
  ) -> impl Future<Output = Result<ConfigurationRecord, Self::Error>> + Send + '_;

  /// Overwrite the schema, input and `updated_at` of the current version of
  /// `record.name`, in both History and Latest, and return the committed
  /// Latest row.
  ///
  /// This is a compare-and-swap: Latest must still be `record.id` at
  /// `record.version`, last updated at `expected_updated_at`. Otherwise it
  /// fails with a conflict and writes nothing. Fails with not-found if the
  /// name has no Latest row.
  fn update_in_place(
    &self,
    record: ConfigurationRecord,
    expected_updated_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<LatestConfiguration, Self::Error>> + Send + '_;

  /// The Latest row for `name`, or `None`.
  fn get_latest<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Option<LatestConfiguration>, Self::Error>> + Send + 'a;

  /// A single History row, or `None`.
  fn get_by_version<'a>(
    &'a self,
    name: &'a str,
    version: u32,
  ) -> impl Future<Output = Result<Option<ConfigurationRecord>, Self::Error>> + Send + 'a;

  /// All History rows for `name`, version ascending. Empty for an unknown name.
  fn list_versions<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Vec<ConfigurationRecord>, Self::Error>> + Send + 'a;
}
