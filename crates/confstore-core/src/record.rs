//! Configuration records: the rows of the History and Latest tables.
//!
//! A [`ConfigurationRecord`] is written once per version and never deleted.
//! The only in-place revision is the content update performed by
//! [`VersioningService::update`](crate::service::VersioningService::update).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};
use uuid::Uuid;

/// The shape of a configuration's `input` document.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConfigKind {
  Object,
  Standard,
}

/// One immutable version of a named configuration (a History row).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationRecord {
  pub id:         Uuid,
  pub client_id:  String,
  pub name:       String,
  pub kind:       ConfigKind,
  /// JSON Schema document, stored verbatim.
  pub schema:     String,
  /// JSON document satisfying `schema`, stored verbatim.
  pub input:      String,
  /// Allocated by the service; contiguous from 1 per name.
  pub version:    u32,
  pub created_at: DateTime<Utc>,
  pub created_by: String,
  pub updated_at: DateTime<Utc>,
  /// `true` iff this row is the one the Latest table points at. Computed on
  /// read; never written to History.
  pub is_active:  bool,
}

/// The materialised "current" row for a name.
///
/// Always field-for-field equal to the highest-versioned
/// [`ConfigurationRecord`] of the same name, including its `id`.
pub type LatestConfiguration = ConfigurationRecord;

/// Caller-supplied payload for the first write of a configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConfiguration {
  pub client_id: String,
  pub name:      String,
  pub kind:      ConfigKind,
  pub schema:    String,
  pub input:     String,
}

impl ConfigurationRecord {
  /// Build a fresh, active record at `version` stamped with the current time.
  pub fn new_version(
    client_id:  String,
    name:       String,
    kind:       ConfigKind,
    schema:     String,
    input:      String,
    version:    u32,
    created_by: String,
  ) -> Self {
    let now = Utc::now();
    Self {
      id: Uuid::new_v4(),
      client_id,
      name,
      kind,
      schema,
      input,
      version,
      created_at: now,
      created_by,
      updated_at: now,
      is_active: true,
    }
  }
}
