//! Extractor for the authorization context set by the upstream auth layer.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use confstore_core::auth::AuthContext;

/// Header carrying the authenticated principal's id.
pub const CALLER_ID_HEADER: &str = "x-caller-id";
/// Header carrying the authenticated principal's role (`admin` / `user`).
pub const CALLER_ROLE_HEADER: &str = "x-caller-role";

/// The caller's [`AuthContext`]. Never rejects: absent or unreadable headers
/// yield an empty context, which the service refuses for mutations.
pub struct Caller(pub AuthContext);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
  type Rejection = Infallible;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    let headers = &parts.headers;
    let caller_id = headers.get(CALLER_ID_HEADER).and_then(|v| v.to_str().ok());
    let role = headers.get(CALLER_ROLE_HEADER).and_then(|v| v.to_str().ok());
    Ok(Caller(AuthContext::from_parts(caller_id, role)))
  }
}
