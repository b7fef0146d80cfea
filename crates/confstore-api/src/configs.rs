//! Handlers for `/configs` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/configs` | Body: [`CreateBody`]; returns 201 + stored record |
//! | `PUT`  | `/configs/{name}` | Body: [`UpdateBody`]; revises the current version |
//! | `POST` | `/configs/{name}/rollback` | Body: `{"version": n}`; returns 201 + new version |
//! | `GET`  | `/configs/{name}` | Latest version; 404 if unknown |
//! | `GET`  | `/configs/{name}/versions` | All versions ascending; `[]` if unknown |
//! | `GET`  | `/configs/{name}/versions/{version}` | One version; 404 if unknown |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use confstore_core::{
  record::{ConfigKind, ConfigurationRecord, LatestConfiguration, NewConfiguration},
  service::VersioningService,
  store::VersionStore,
};
use serde::Deserialize;

use crate::{caller::Caller, error::ApiError};

type Service<S> = State<Arc<VersioningService<S>>>;

// ─── Create ───────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /configs`. `schema` and `input` are JSON
/// documents encoded as strings.
#[derive(Debug, Deserialize)]
pub struct CreateBody {
  #[serde(default)]
  pub client_id: String,
  pub name:      String,
  pub kind:      ConfigKind,
  pub schema:    String,
  pub input:     String,
}

/// `POST /configs`
pub async fn create<S: VersionStore>(
  State(service): Service<S>,
  Caller(auth): Caller,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  if body.name.trim().is_empty() {
    return Err(ApiError::BadRequest("name must not be empty".into()));
  }
  let record = service
    .create(&auth, NewConfiguration {
      client_id: body.client_id,
      name:      body.name,
      kind:      body.kind,
      schema:    body.schema,
      input:     body.input,
    })
    .await?;
  Ok((StatusCode::CREATED, Json(record)))
}

// ─── Update ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  pub schema: String,
  pub input:  String,
}

/// `PUT /configs/{name}`
pub async fn update<S: VersionStore>(
  State(service): Service<S>,
  Caller(auth): Caller,
  Path(name): Path<String>,
  Json(body): Json<UpdateBody>,
) -> Result<Json<LatestConfiguration>, ApiError> {
  let latest = service.update(&auth, &name, body.schema, body.input).await?;
  Ok(Json(latest))
}

// ─── Rollback ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RollbackBody {
  pub version: u32,
}

/// `POST /configs/{name}/rollback`
pub async fn rollback<S: VersionStore>(
  State(service): Service<S>,
  Caller(auth): Caller,
  Path(name): Path<String>,
  Json(body): Json<RollbackBody>,
) -> Result<impl IntoResponse, ApiError> {
  let record = service.rollback(&auth, &name, body.version).await?;
  Ok((StatusCode::CREATED, Json(record)))
}

// ─── Reads ────────────────────────────────────────────────────────────────────

/// `GET /configs/{name}`
pub async fn get_latest<S: VersionStore>(
  State(service): Service<S>,
  Path(name): Path<String>,
) -> Result<Json<LatestConfiguration>, ApiError> {
  let latest = service
    .get_latest(&name)
    .await?
    .ok_or_else(|| confstore_core::Error::NotFound(format!("configuration {name:?}")))?;
  Ok(Json(latest))
}

/// `GET /configs/{name}/versions`
pub async fn list_versions<S: VersionStore>(
  State(service): Service<S>,
  Path(name): Path<String>,
) -> Result<Json<Vec<ConfigurationRecord>>, ApiError> {
  Ok(Json(service.list_versions(&name).await?))
}

/// `GET /configs/{name}/versions/{version}`
pub async fn get_by_version<S: VersionStore>(
  State(service): Service<S>,
  Path((name, version)): Path<(String, u32)>,
) -> Result<Json<ConfigurationRecord>, ApiError> {
  let record = service
    .get_by_version(&name, version)
    .await?
    .ok_or_else(|| {
      confstore_core::Error::NotFound(format!("configuration {name:?} version {version}"))
    })?;
  Ok(Json(record))
}
