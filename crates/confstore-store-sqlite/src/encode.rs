//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, UUIDs hyphenated lowercase, and
//! [`ConfigKind`] its lowercase name.

use std::str::FromStr as _;

use chrono::{DateTime, Utc};
use confstore_core::record::{ConfigKind, ConfigurationRecord};
use uuid::Uuid;

use crate::{Error, Result};

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_kind(s: &str) -> Result<ConfigKind> {
  ConfigKind::from_str(s)
    .map_err(|_| Error::Decode(format!("unknown configuration kind: {s:?}")))
}

/// Column list shared by every SELECT against either table, in
/// [`RawRecord`] field order.
pub const RECORD_COLUMNS: &str =
  "id, client_id, name, kind, schema_json, input_json, version, \
   created_at, created_by, updated_at";

/// A record flattened into column values, ready to bind.
pub struct EncodedRecord {
  pub id:          String,
  pub client_id:   String,
  pub name:        String,
  pub kind:        &'static str,
  pub schema_json: String,
  pub input_json:  String,
  pub version:     u32,
  pub created_at:  String,
  pub created_by:  String,
  pub updated_at:  String,
}

impl EncodedRecord {
  pub fn new(r: &ConfigurationRecord) -> Self {
    Self {
      id:          encode_uuid(r.id),
      client_id:   r.client_id.clone(),
      name:        r.name.clone(),
      kind:        r.kind.into(),
      schema_json: r.schema.clone(),
      input_json:  r.input.clone(),
      version:     r.version,
      created_at:  encode_dt(r.created_at),
      created_by:  r.created_by.clone(),
      updated_at:  encode_dt(r.updated_at),
    }
  }
}

/// Raw column values read from `configurations` or `latest_configurations`.
pub struct RawRecord {
  pub id:          String,
  pub client_id:   String,
  pub name:        String,
  pub kind:        String,
  pub schema_json: String,
  pub input_json:  String,
  pub version:     u32,
  pub created_at:  String,
  pub created_by:  String,
  pub updated_at:  String,
  pub is_active:   bool,
}

impl RawRecord {
  /// Map a row selected with [`RECORD_COLUMNS`] followed by an `is_active`
  /// column.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      client_id:   row.get(1)?,
      name:        row.get(2)?,
      kind:        row.get(3)?,
      schema_json: row.get(4)?,
      input_json:  row.get(5)?,
      version:     row.get(6)?,
      created_at:  row.get(7)?,
      created_by:  row.get(8)?,
      updated_at:  row.get(9)?,
      is_active:   row.get(10)?,
    })
  }

  pub fn into_record(self) -> Result<ConfigurationRecord> {
    Ok(ConfigurationRecord {
      id:         decode_uuid(&self.id)?,
      client_id:  self.client_id,
      name:       self.name,
      kind:       decode_kind(&self.kind)?,
      schema:     self.schema_json,
      input:      self.input_json,
      version:    self.version,
      created_at: decode_dt(&self.created_at)?,
      created_by: self.created_by,
      updated_at: decode_dt(&self.updated_at)?,
      is_active:  self.is_active,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn datetime_roundtrip_keeps_subsecond_precision() {
    let now = Utc::now();
    assert_eq!(decode_dt(&encode_dt(now)).unwrap(), now);
  }

  #[test]
  fn unknown_kind_is_rejected() {
    assert!(matches!(decode_kind("blob"), Err(Error::Decode(_))));
    assert_eq!(decode_kind("object").unwrap(), ConfigKind::Object);
  }
}
