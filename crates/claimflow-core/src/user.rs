//! The engine's view of an authenticated principal.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

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

/// A user as last reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub user_id:      Uuid,
  pub display_name: String,
  pub email:        Option<String>,
  pub role:         Role,
}

impl User {
  pub fn is_admin(&self) -> bool { self.role == Role::Admin }
}
