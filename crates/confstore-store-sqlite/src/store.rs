//! [`SqliteStore`], the SQLite implementation of [`VersionStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};

use confstore_core::{
  record::{ConfigurationRecord, LatestConfiguration},
  store::VersionStore,
};

use crate::{
  Error, Result,
  encode::{EncodedRecord, RECORD_COLUMNS, RawRecord, encode_dt},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A configuration store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All calls
/// are executed in order on the connection's background thread.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// What happened inside an in-place update transaction.
enum UpdateOutcome {
  Committed,
  /// Latest no longer matches the revision's base; carries the reason.
  Superseded(String),
  /// No Latest row for the name.
  Missing,
}

/// `true` for PRIMARY KEY / UNIQUE violations. Other constraint failures
/// (e.g. the `json_valid` checks) are ordinary database errors.
fn is_uniqueness_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(f, _)
      if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        || f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
  )
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Select History rows matching `filter`, with `is_active` resolved by
  /// joining against Latest.
  async fn query_history(
    &self,
    filter: &'static str,
    name: String,
    version: Option<u32>,
  ) -> Result<Vec<ConfigurationRecord>> {
    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {cols}, (l.id IS NOT NULL) AS is_active
           FROM configurations c
           LEFT JOIN latest_configurations l ON l.id = c.id
           WHERE {filter}
           ORDER BY c.version ASC",
          cols = prefixed_columns("c"),
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = match version {
          Some(v) => stmt
            .query_map(rusqlite::params![name, v], RawRecord::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
          None => stmt
            .query_map(rusqlite::params![name], RawRecord::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }
}

/// [`RECORD_COLUMNS`] qualified with a table alias.
fn prefixed_columns(alias: &str) -> String {
  RECORD_COLUMNS
    .split(',')
    .map(|c| format!("{alias}.{}", c.trim()))
    .collect::<Vec<_>>()
    .join(", ")
}

// ─── VersionStore impl ───────────────────────────────────────────────────────

impl VersionStore for SqliteStore {
  type Error = Error;

  async fn create_version(&self, record: ConfigurationRecord) -> Result<ConfigurationRecord> {
    let enc = EncodedRecord::new(&record);
    let expected_previous = record.version.checked_sub(1).filter(|v| *v > 0);

    let conflict: Option<String> = self
      .conn
      .call(move |conn| {
        // IMMEDIATE takes the write lock up front so the version check and
        // both writes see one consistent snapshot.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current: Option<u32> = tx
          .query_row(
            "SELECT version FROM latest_configurations WHERE name = ?1",
            rusqlite::params![enc.name],
            |r| r.get(0),
          )
          .optional()?;

        if current != expected_previous {
          return Ok(Some(format!(
            "expected latest version {expected_previous:?}, found {current:?}"
          )));
        }

        let inserted = tx.execute(
          "INSERT INTO configurations (
             id, client_id, name, kind, schema_json, input_json, version,
             created_at, created_by, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          rusqlite::params![
            enc.id,
            enc.client_id,
            enc.name,
            enc.kind,
            enc.schema_json,
            enc.input_json,
            enc.version,
            enc.created_at,
            enc.created_by,
            enc.updated_at,
          ],
        );
        match inserted {
          Ok(_) => {}
          Err(e) if is_uniqueness_violation(&e) => return Ok(Some(e.to_string())),
          Err(e) => return Err(e.into()),
        }

        tx.execute(
          "INSERT INTO latest_configurations (
             name, id, client_id, kind, schema_json, input_json, version,
             created_at, created_by, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
           ON CONFLICT (name) DO UPDATE SET
             id          = excluded.id,
             client_id   = excluded.client_id,
             kind        = excluded.kind,
             schema_json = excluded.schema_json,
             input_json  = excluded.input_json,
             version     = excluded.version,
             created_at  = excluded.created_at,
             created_by  = excluded.created_by,
             updated_at  = excluded.updated_at",
          rusqlite::params![
            enc.name,
            enc.id,
            enc.client_id,
            enc.kind,
            enc.schema_json,
            enc.input_json,
            enc.version,
            enc.created_at,
            enc.created_by,
            enc.updated_at,
          ],
        )?;

        tx.commit()?;
        Ok(None)
      })
      .await?;

    if let Some(reason) = conflict {
      return Err(Error::Conflict { name: record.name, reason });
    }
    tracing::debug!(name = %record.name, version = record.version, "version committed");
    Ok(ConfigurationRecord { is_active: true, ..record })
  }

  async fn update_in_place(
    &self,
    record: ConfigurationRecord,
    expected_updated_at: DateTime<Utc>,
  ) -> Result<LatestConfiguration> {
    let enc = EncodedRecord::new(&record);
    let expected_updated_at = encode_dt(expected_updated_at);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current: Option<(String, u32, String)> = tx
          .query_row(
            "SELECT id, version, updated_at FROM latest_configurations WHERE name = ?1",
            rusqlite::params![enc.name],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
          )
          .optional()?;

        // Timestamps are compared in their stored encoding, which
        // `encode_dt` produces deterministically.
        match current {
          None => return Ok(UpdateOutcome::Missing),
          Some((id, version, updated_at))
            if id != enc.id
              || version != enc.version
              || updated_at != expected_updated_at =>
          {
            return Ok(UpdateOutcome::Superseded(format!(
              "expected latest version {} last updated {expected_updated_at}, \
               found version {version} last updated {updated_at}",
              enc.version
            )));
          }
          Some(_) => {}
        }

        tx.execute(
          "UPDATE configurations
           SET schema_json = ?2, input_json = ?3, updated_at = ?4
           WHERE id = ?1",
          rusqlite::params![enc.id, enc.schema_json, enc.input_json, enc.updated_at],
        )?;
        tx.execute(
          "UPDATE latest_configurations
           SET schema_json = ?2, input_json = ?3, updated_at = ?4
           WHERE id = ?1",
          rusqlite::params![enc.id, enc.schema_json, enc.input_json, enc.updated_at],
        )?;

        tx.commit()?;
        Ok(UpdateOutcome::Committed)
      })
      .await?;

    match outcome {
      UpdateOutcome::Committed => {
        tracing::debug!(name = %record.name, version = record.version, "version revised");
        Ok(ConfigurationRecord { is_active: true, ..record })
      }
      UpdateOutcome::Superseded(reason) => Err(Error::Conflict { name: record.name, reason }),
      UpdateOutcome::Missing => Err(Error::NotFound(record.id)),
    }
  }

  async fn get_latest(&self, name: &str) -> Result<Option<LatestConfiguration>> {
    let name = name.to_owned();

    let raw: Option<RawRecord> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {RECORD_COLUMNS}, 1 AS is_active
                 FROM latest_configurations WHERE name = ?1"
              ),
              rusqlite::params![name],
              RawRecord::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRecord::into_record).transpose()
  }

  async fn get_by_version(
    &self,
    name: &str,
    version: u32,
  ) -> Result<Option<ConfigurationRecord>> {
    let rows = self
      .query_history("c.name = ?1 AND c.version = ?2", name.to_owned(), Some(version))
      .await?;
    Ok(rows.into_iter().next())
  }

  async fn list_versions(&self, name: &str) -> Result<Vec<ConfigurationRecord>> {
    self.query_history("c.name = ?1", name.to_owned(), None).await
  }
}
