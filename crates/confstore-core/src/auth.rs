//! Typed authorization context for mutating operations.
//!
//! Credential checks happen upstream; the core only sees who the caller is
//! and which role they hold.

use std::str::FromStr as _;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result};

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
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  Admin,
  User,
}

/// Who is calling, as established by the authentication collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
  pub caller_id: String,
  /// `None` when the role was absent or not a recognised value.
  pub role:      Option<Role>,
}

impl AuthContext {
  pub fn new(caller_id: impl Into<String>, role: Role) -> Self {
    Self { caller_id: caller_id.into(), role: Some(role) }
  }

  pub fn admin(caller_id: impl Into<String>) -> Self {
    Self::new(caller_id, Role::Admin)
  }

  /// Build a context from raw, untyped values. Unknown roles collapse to
  /// `None` and a missing caller id to the empty string; both are rejected by
  /// [`require_admin`](Self::require_admin).
  pub fn from_parts(caller_id: Option<&str>, role: Option<&str>) -> Self {
    Self {
      caller_id: caller_id.unwrap_or_default().trim().to_owned(),
      role:      role.and_then(|r| Role::from_str(r.trim()).ok()),
    }
  }

  /// Gate for Create/Update/Rollback. Returns the caller id on success.
  pub fn require_admin(&self) -> Result<&str> {
    if self.caller_id.is_empty() {
      return Err(Error::Unauthorized("missing caller identity".into()));
    }
    match self.role {
      Some(Role::Admin) => Ok(&self.caller_id),
      Some(role) => Err(Error::Unauthorized(format!(
        "role {role} may not modify configurations"
      ))),
      None => Err(Error::Unauthorized("missing or unknown role".into())),
    }
  }
}
