//! [`VersioningService`] handles version allocation, schema-gated mutation and the
//! cache-aside read path over a [`VersionStore`].

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};

use crate::{
  Error, Result,
  auth::AuthContext,
  cache::LatestCache,
  record::{ConfigurationRecord, LatestConfiguration, NewConfiguration},
  schema,
  store::VersionStore,
};

/// Orchestrates writes and reads of named, versioned configurations.
///
/// Only callers holding the admin role may mutate. Create and Rollback
/// allocate a new version; Update revises the current version in place.
pub struct VersioningService<S> {
  store: Arc<S>,
  cache: Arc<LatestCache>,
}

impl<S> Clone for VersioningService<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), cache: Arc::clone(&self.cache) }
  }
}

impl<S: VersionStore> VersioningService<S> {
  pub fn new(store: Arc<S>, cache: Arc<LatestCache>) -> Self {
    Self { store, cache }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn cache(&self) -> &Arc<LatestCache> { &self.cache }

  // ── Writes ─────────────────────────────────────────────────────────────

  /// First write of a configuration name. Allocates version 1.
  pub async fn create(
    &self,
    auth: &AuthContext,
    input: NewConfiguration,
  ) -> Result<ConfigurationRecord> {
    let caller = authorize(auth, "create")?;

    ensure_valid(&input.schema, &input.input)?;

    if self.latest(&input.name).await?.is_some() {
      warn!(name = %input.name, "create rejected: configuration already exists");
      return Err(Error::Conflict(format!(
        "configuration {:?} already exists",
        input.name
      )));
    }

    let record = ConfigurationRecord::new_version(
      input.client_id,
      input.name,
      input.kind,
      input.schema,
      input.input,
      1,
      caller.to_owned(),
    );

    let written = self.store.create_version(record).await.map_err(Into::into)?;
    self.cache.put(&written.name, written.clone());

    info!(name = %written.name, version = written.version, caller, "configuration created");
    Ok(written)
  }

  /// Replace the input of the current version. The schema must be
  /// semantically equal to the stored one.
  ///
  /// Fails with [`Error::Conflict`] if another write committed since the
  /// current version was read.
  pub async fn update(
    &self,
    auth: &AuthContext,
    name: &str,
    schema: String,
    input: String,
  ) -> Result<LatestConfiguration> {
    let caller = authorize(auth, "update")?;

    let current = self
      .latest(name)
      .await?
      .ok_or_else(|| Error::NotFound(format!("configuration {name:?}")))?;

    ensure_valid(&schema, &input)?;

    if !schema::schemas_equal(&schema, &current.schema) {
      warn!(name, "update rejected: schema changed");
      return Err(Error::SchemaConflict { name: name.to_owned() });
    }

    // The stored schema text is kept; only the input is revised.
    let expected_updated_at = current.updated_at;
    let revised = ConfigurationRecord {
      input,
      updated_at: revision_time(expected_updated_at),
      ..current
    };
    let version = revised.version;

    let committed = match self.store.update_in_place(revised, expected_updated_at).await {
      Ok(r) => r,
      Err(e) => return Err(self.resync_on_conflict(name, "update", e).await),
    };
    self.cache.put(name, committed.clone());

    info!(name, version, caller, "configuration updated in place");
    Ok(committed)
  }

  /// Re-adopt the payload of `target_version` as a brand-new latest version.
  /// History is never rewritten.
  pub async fn rollback(
    &self,
    auth: &AuthContext,
    name: &str,
    target_version: u32,
  ) -> Result<ConfigurationRecord> {
    let caller = authorize(auth, "rollback")?;

    let target = self
      .store
      .get_by_version(name, target_version)
      .await
      .map_err(Into::into)?
      .ok_or_else(|| {
        Error::NotFound(format!("configuration {name:?} version {target_version}"))
      })?;

    let current = self
      .latest(name)
      .await?
      .ok_or_else(|| Error::NotFound(format!("configuration {name:?}")))?;

    let record = ConfigurationRecord::new_version(
      target.client_id,
      target.name,
      target.kind,
      target.schema,
      target.input,
      current.version + 1,
      caller.to_owned(),
    );

    let written = match self.store.create_version(record).await {
      Ok(r) => r,
      Err(e) => return Err(self.resync_on_conflict(name, "rollback", e).await),
    };
    self.cache.put(name, written.clone());

    info!(
      name,
      from = target_version,
      version = written.version,
      caller,
      "configuration rolled back"
    );
    Ok(written)
  }

  // ── Reads ──────────────────────────────────────────────────────────────

  /// Latest row for `name`; `None` if the name is unknown.
  pub async fn get_latest(&self, name: &str) -> Result<Option<LatestConfiguration>> {
    self.latest(name).await
  }

  pub async fn get_by_version(
    &self,
    name: &str,
    version: u32,
  ) -> Result<Option<ConfigurationRecord>> {
    self.store.get_by_version(name, version).await.map_err(Into::into)
  }

  /// Every version of `name`, ascending. Empty if the name is unknown.
  pub async fn list_versions(&self, name: &str) -> Result<Vec<ConfigurationRecord>> {
    self.store.list_versions(name).await.map_err(Into::into)
  }

  /// Convert a store error. On a conflict the cached Latest was stale, so it
  /// is resynced before the conflict is returned; a retry then starts from
  /// the committed state.
  async fn resync_on_conflict(&self, name: &str, operation: &str, e: S::Error) -> Error {
    let e: Error = e.into();
    if matches!(e, Error::Conflict(_)) {
      warn!(name, operation, "lost the version race");
      if let Err(refresh_err) = self.refresh(name).await {
        return refresh_err;
      }
    }
    e
  }

  /// Re-read the Latest row from the store and repopulate the cache.
  async fn refresh(&self, name: &str) -> Result<()> {
    match self.store.get_latest(name).await.map_err(Into::into)? {
      Some(latest) => self.cache.put(name, latest),
      None => self.cache.invalidate(name),
    }
    Ok(())
  }

  /// Cache-aside lookup: cache first, then the store, populating on hit.
  async fn latest(&self, name: &str) -> Result<Option<LatestConfiguration>> {
    if let Some(hit) = self.cache.get(name) {
      debug!(name, version = hit.version, "latest cache hit");
      return Ok(Some(hit));
    }
    debug!(name, "latest cache miss");

    let stored = self.store.get_latest(name).await.map_err(Into::into)?;
    if let Some(latest) = &stored {
      self.cache.put(name, latest.clone());
    }
    Ok(stored)
  }
}

fn authorize<'a>(auth: &'a AuthContext, operation: &str) -> Result<&'a str> {
  auth.require_admin().inspect_err(|e| {
    warn!(operation, caller = %auth.caller_id, "{e}");
  })
}

/// `updated_at` for a revision of a row last updated at `previous`. Strictly
/// later than `previous`, so revisions of one version are totally ordered.
fn revision_time(previous: DateTime<Utc>) -> DateTime<Utc> {
  Utc::now().max(previous + TimeDelta::microseconds(1))
}

fn ensure_valid(schema: &str, input: &str) -> Result<()> {
  if schema::validate(schema, input)? {
    Ok(())
  } else {
    Err(Error::Validation("input does not satisfy schema".into()))
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
  };

  use super::*;
  use crate::{auth::Role, record::ConfigKind};

  const FLAG_SCHEMA: &str = r#"{"type":"object","properties":{"enabled":{"type":"boolean"}},"required":["enabled"]}"#;
  const LIMIT_SCHEMA: &str = r#"{"type":"object","properties":{"max_limit":{"type":"integer"}},"required":["max_limit"]}"#;

  /// In-memory store that counts every call touching it.
  #[derive(Default)]
  struct MemoryStore {
    history: Mutex<Vec<ConfigurationRecord>>,
    writes:  AtomicUsize,
    reads:   AtomicUsize,
  }

  impl MemoryStore {
    fn touched(&self) -> usize {
      self.writes.load(Ordering::SeqCst) + self.reads.load(Ordering::SeqCst)
    }

    fn latest_of(history: &[ConfigurationRecord], name: &str) -> Option<ConfigurationRecord> {
      history
        .iter()
        .filter(|r| r.name == name)
        .max_by_key(|r| r.version)
        .cloned()
    }
  }

  impl VersionStore for MemoryStore {
    type Error = Error;

    async fn create_version(&self, record: ConfigurationRecord) -> Result<ConfigurationRecord> {
      self.writes.fetch_add(1, Ordering::SeqCst);
      let mut history = self.history.lock().unwrap();
      let current = Self::latest_of(&history, &record.name).map(|r| r.version);
      if current != record.version.checked_sub(1).filter(|v| *v > 0) {
        return Err(Error::Conflict("stale version".into()));
      }
      history.push(record.clone());
      Ok(record)
    }

    async fn update_in_place(
      &self,
      record: ConfigurationRecord,
      expected_updated_at: DateTime<Utc>,
    ) -> Result<LatestConfiguration> {
      self.writes.fetch_add(1, Ordering::SeqCst);
      let mut history = self.history.lock().unwrap();
      let current = Self::latest_of(&history, &record.name)
        .ok_or_else(|| Error::NotFound(record.name.clone()))?;
      if current.id != record.id || current.updated_at != expected_updated_at {
        return Err(Error::Conflict("stale revision".into()));
      }
      let row = history.iter_mut().find(|r| r.id == record.id).unwrap();
      *row = record.clone();
      Ok(record)
    }

    async fn get_latest(&self, name: &str) -> Result<Option<LatestConfiguration>> {
      self.reads.fetch_add(1, Ordering::SeqCst);
      Ok(Self::latest_of(&self.history.lock().unwrap(), name))
    }

    async fn get_by_version(&self, name: &str, version: u32) -> Result<Option<ConfigurationRecord>> {
      self.reads.fetch_add(1, Ordering::SeqCst);
      Ok(
        self
          .history
          .lock()
          .unwrap()
          .iter()
          .find(|r| r.name == name && r.version == version)
          .cloned(),
      )
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<ConfigurationRecord>> {
      self.reads.fetch_add(1, Ordering::SeqCst);
      let mut rows: Vec<_> = self
        .history
        .lock()
        .unwrap()
        .iter()
        .filter(|r| r.name == name)
        .cloned()
        .collect();
      rows.sort_by_key(|r| r.version);
      Ok(rows)
    }
  }

  fn service() -> VersioningService<MemoryStore> {
    VersioningService::new(Arc::new(MemoryStore::default()), Arc::new(LatestCache::new()))
  }

  fn flag(input: &str) -> NewConfiguration {
    NewConfiguration {
      client_id: "bca-pusat".into(),
      name:      "feature_flag".into(),
      kind:      ConfigKind::Object,
      schema:    FLAG_SCHEMA.into(),
      input:     input.into(),
    }
  }

  fn admin() -> AuthContext { AuthContext::admin("tester") }

  #[tokio::test]
  async fn create_allocates_version_one_and_caches() {
    let svc = service();
    let rec = svc.create(&admin(), flag(r#"{"enabled":true}"#)).await.unwrap();
    assert_eq!(rec.version, 1);
    assert_eq!(rec.created_by, "tester");
    assert_eq!(svc.cache().get("feature_flag").unwrap(), rec);
  }

  #[tokio::test]
  async fn create_rejects_invalid_input_before_store() {
    let svc = service();
    let err = svc.create(&admin(), flag(r#"{"enabled":"yes"}"#)).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(svc.store().touched(), 0);
  }

  #[tokio::test]
  async fn create_with_malformed_schema_is_validation_error() {
    let svc = service();
    let mut input = flag(r#"{"enabled":true}"#);
    input.schema = r#"{"type":"#.into();
    let err = svc.create(&admin(), input).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
  }

  #[tokio::test]
  async fn create_twice_conflicts() {
    let svc = service();
    svc.create(&admin(), flag(r#"{"enabled":true}"#)).await.unwrap();
    let err = svc.create(&admin(), flag(r#"{"enabled":false}"#)).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    assert_eq!(svc.list_versions("feature_flag").await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn non_admin_mutations_touch_nothing() {
    let svc = service();
    let user = AuthContext::new("u-2", Role::User);
    let anonymous = AuthContext::from_parts(None, None);

    for ctx in [&user, &anonymous] {
      let err = svc.create(ctx, flag(r#"{"enabled":true}"#)).await.unwrap_err();
      assert!(matches!(err, Error::Unauthorized(_)));
      let err = svc
        .update(ctx, "feature_flag", FLAG_SCHEMA.into(), r#"{"enabled":true}"#.into())
        .await
        .unwrap_err();
      assert!(matches!(err, Error::Unauthorized(_)));
      let err = svc.rollback(ctx, "feature_flag", 1).await.unwrap_err();
      assert!(matches!(err, Error::Unauthorized(_)));
    }

    assert_eq!(svc.store().touched(), 0);
    assert!(svc.cache().is_empty());
  }

  #[tokio::test]
  async fn update_revises_current_version() {
    let svc = service();
    svc.create(&admin(), flag(r#"{"enabled":true}"#)).await.unwrap();
    let latest = svc
      .update(&admin(), "feature_flag", FLAG_SCHEMA.into(), r#"{"enabled":false}"#.into())
      .await
      .unwrap();
    assert_eq!(latest.version, 1);
    assert_eq!(latest.input, r#"{"enabled":false}"#);
    assert_eq!(svc.cache().get("feature_flag").unwrap().input, latest.input);
  }

  #[tokio::test]
  async fn update_with_different_schema_conflicts_and_leaves_state() {
    let svc = service();
    let created = svc.create(&admin(), flag(r#"{"enabled":true}"#)).await.unwrap();
    let err = svc
      .update(&admin(), "feature_flag", LIMIT_SCHEMA.into(), r#"{"max_limit":1000}"#.into())
      .await
      .unwrap_err();
    assert!(matches!(err, Error::SchemaConflict { .. }));
    assert_eq!(svc.get_latest("feature_flag").await.unwrap().unwrap(), created);
    assert_eq!(svc.list_versions("feature_flag").await.unwrap(), vec![created]);
  }

  #[tokio::test]
  async fn update_with_invalid_input_leaves_state() {
    let svc = service();
    let created = svc.create(&admin(), flag(r#"{"enabled":true}"#)).await.unwrap();
    let err = svc
      .update(&admin(), "feature_flag", FLAG_SCHEMA.into(), r#"{"enabled":"no"}"#.into())
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(svc.cache().get("feature_flag").unwrap(), created);
    assert_eq!(svc.list_versions("feature_flag").await.unwrap(), vec![created]);
  }

  #[tokio::test]
  async fn update_accepts_reformatted_schema() {
    let svc = service();
    let created = svc.create(&admin(), flag(r#"{"enabled":true}"#)).await.unwrap();
    let reformatted = r#"{
      "required": ["enabled"],
      "type": "object",
      "properties": { "enabled": { "type": "boolean" } }
    }"#;
    let latest = svc
      .update(&admin(), "feature_flag", reformatted.into(), r#"{"enabled":false}"#.into())
      .await
      .unwrap();
    assert_eq!(latest.version, 1);
    assert_eq!(latest.schema, created.schema);
    assert_eq!(latest.input, r#"{"enabled":false}"#);
  }

  #[tokio::test]
  async fn update_after_concurrent_rollback_conflicts() {
    let svc = service();
    let v1 = svc.create(&admin(), flag(r#"{"enabled":true}"#)).await.unwrap();

    // A rollback commits v2 between the cached read and the write.
    let mut v2 = v1.clone();
    v2.id = uuid::Uuid::new_v4();
    v2.version = 2;
    svc.store().create_version(v2.clone()).await.unwrap();

    let err = svc
      .update(&admin(), "feature_flag", FLAG_SCHEMA.into(), r#"{"enabled":false}"#.into())
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    let history = svc.list_versions("feature_flag").await.unwrap();
    assert_eq!(history, vec![v1, v2.clone()]);
    assert_eq!(svc.cache().get("feature_flag").unwrap(), v2);
  }

  #[tokio::test]
  async fn consecutive_updates_advance_updated_at() {
    let svc = service();
    let created = svc.create(&admin(), flag(r#"{"enabled":true}"#)).await.unwrap();
    let first = svc
      .update(&admin(), "feature_flag", FLAG_SCHEMA.into(), r#"{"enabled":false}"#.into())
      .await
      .unwrap();
    let second = svc
      .update(&admin(), "feature_flag", FLAG_SCHEMA.into(), r#"{"enabled":true}"#.into())
      .await
      .unwrap();
    assert!(created.updated_at < first.updated_at);
    assert!(first.updated_at < second.updated_at);
    assert_eq!(svc.cache().get("feature_flag").unwrap(), second);
  }

  #[tokio::test]
  async fn update_unknown_name_is_not_found() {
    let svc = service();
    let err = svc
      .update(&admin(), "missing", FLAG_SCHEMA.into(), r#"{"enabled":true}"#.into())
      .await
      .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
  }

  #[tokio::test]
  async fn rollback_appends_new_version() {
    let svc = service();
    let v1 = svc.create(&admin(), flag(r#"{"enabled":true}"#)).await.unwrap();
    let v2 = svc.rollback(&AuthContext::admin("ops"), "feature_flag", 1).await.unwrap();
    assert_eq!(v2.version, 2);
    assert_ne!(v2.id, v1.id);
    assert_eq!(v2.input, v1.input);
    assert_eq!(v2.created_by, "ops");
    assert_eq!(svc.get_latest("feature_flag").await.unwrap().unwrap().version, 2);
  }

  #[tokio::test]
  async fn rollback_to_missing_version_is_not_found() {
    let svc = service();
    svc.create(&admin(), flag(r#"{"enabled":true}"#)).await.unwrap();
    let err = svc.rollback(&admin(), "feature_flag", 7).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
  }

  #[tokio::test]
  async fn stale_cache_surfaces_conflict_and_is_resynced() {
    let svc = service();
    let v1 = svc.create(&admin(), flag(r#"{"enabled":true}"#)).await.unwrap();

    // Another writer appends v2 behind the cache's back.
    let mut v2 = v1.clone();
    v2.id = uuid::Uuid::new_v4();
    v2.version = 2;
    svc.store().create_version(v2).await.unwrap();

    let err = svc.rollback(&admin(), "feature_flag", 1).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    assert_eq!(svc.cache().get("feature_flag").unwrap().version, 2);

    let v3 = svc.rollback(&admin(), "feature_flag", 1).await.unwrap();
    assert_eq!(v3.version, 3);
  }

  #[tokio::test]
  async fn reads_of_unknown_names_are_empty() {
    let svc = service();
    assert!(svc.get_latest("unknown_name").await.unwrap().is_none());
    assert!(svc.get_by_version("unknown_name", 1).await.unwrap().is_none());
    assert!(svc.list_versions("unknown_name").await.unwrap().is_empty());
    assert!(svc.cache().is_empty());
  }

  #[tokio::test]
  async fn read_miss_populates_cache() {
    let svc = service();
    svc.create(&admin(), flag(r#"{"enabled":true}"#)).await.unwrap();
    svc.cache().clear();

    let latest = svc.get_latest("feature_flag").await.unwrap().unwrap();
    assert_eq!(svc.cache().get("feature_flag").unwrap(), latest);
  }
}
