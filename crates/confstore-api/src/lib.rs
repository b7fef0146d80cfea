//! JSON REST API for confstore.
//!
//! Exposes an axum [`Router`] backed by a [`VersioningService`]. Credential
//! checks happen upstream: the auth layer must set the `x-caller-id` and
//! `x-caller-role` headers before requests reach this router.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", confstore_api::api_router(service.clone()))
//! ```

pub mod caller;
pub mod configs;
pub mod error;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use confstore_core::{service::VersioningService, store::VersionStore};

pub use caller::{CALLER_ID_HEADER, CALLER_ROLE_HEADER, Caller};
pub use error::ApiError;

/// Build the API router for `service`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(service: Arc<VersioningService<S>>) -> Router<()>
where
  S: VersionStore + 'static,
{
  Router::new()
    .route("/configs", post(configs::create::<S>))
    .route(
      "/configs/{name}",
      get(configs::get_latest::<S>).put(configs::update::<S>),
    )
    .route("/configs/{name}/rollback", post(configs::rollback::<S>))
    .route("/configs/{name}/versions", get(configs::list_versions::<S>))
    .route(
      "/configs/{name}/versions/{version}",
      get(configs::get_by_version::<S>),
    )
    .with_state(service)
}

// ─── Integration tests ────────────────────────────────────────────────────────
