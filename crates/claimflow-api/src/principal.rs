//! Caller identity, as forwarded by the authenticating gateway.
//!
//! | Header | Required | Value |
//! |--------|----------|-------|
//! | `x-user-id` | yes | UUID |
//! | `x-user-role` | yes | `admin` or `user` |
//! | `x-user-name` | no | display name |
//! | `x-user-email` | no | email address |

use std::str::FromStr;

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, request::Parts},
};
use claimflow_core::{
  ClaimService,
  store::ClaimStore,
  user::{Role, User},
};
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;

pub const USER_ID: &str = "x-user-id";
pub const USER_ROLE: &str = "x-user-role";
pub const USER_NAME: &str = "x-user-name";
pub const USER_EMAIL: &str = "x-user-email";

/// The authenticated caller. Present in a handler means the identity headers
/// parsed and the user record was refreshed.
#[derive(Debug, Clone)]
pub struct Principal(pub User);

impl Principal {
  pub fn id(&self) -> Uuid { self.0.user_id }

  pub fn is_admin(&self) -> bool { self.0.is_admin() }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
  headers
    .get(name)
    .and_then(|v| v.to_str().ok())
    .map(str::trim)
    .filter(|v| !v.is_empty())
}

/// Read a [`User`] from the gateway headers.
pub fn user_from_headers(headers: &HeaderMap) -> Result<User, ApiError> {
  let user_id = header(headers, USER_ID)
    .ok_or_else(|| ApiError::Unauthorized(format!("missing {USER_ID}")))?;
  let user_id = Uuid::parse_str(user_id)
    .map_err(|_| ApiError::Unauthorized(format!("malformed {USER_ID}")))?;

  let role = header(headers, USER_ROLE)
    .ok_or_else(|| ApiError::Unauthorized(format!("missing {USER_ROLE}")))?;
  let role = Role::from_str(role)
    .map_err(|_| ApiError::Unauthorized(format!("unknown role {role:?}")))?;

  let email = header(headers, USER_EMAIL).map(str::to_owned);
  let display_name = header(headers, USER_NAME)
    .map(str::to_owned)
    .or_else(|| email.clone())
    .unwrap_or_else(|| user_id.to_string());

  Ok(User { user_id, display_name, email, role })
}

impl<S> FromRequestParts<ClaimService<S>> for Principal
where
  S: ClaimStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    service: &ClaimService<S>,
  ) -> Result<Self, Self::Rejection> {
    let user = user_from_headers(&parts.headers)?;

    // Best effort: a stale user row only affects display names in the audit
    // log, so the request goes ahead.
    if let Err(e) = service.sync_user(user.clone()).await {
      warn!(user_id = %user.user_id, error = %e, "failed to sync user");
    }
    Ok(Principal(user))
  }
}
