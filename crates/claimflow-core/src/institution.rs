//! Claimable records: institutions and institution groups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Whether a record is a single institution or a group of them.
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
pub enum InstitutionKind {
  Institution,
  Group,
}

/// Set once a claim on the record reaches `VERIFIED`. Never cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownership {
  pub claimed_by: Uuid,
  pub claimed_at: DateTime<Utc>,
  /// The claim whose verification granted ownership.
  pub claim_id:   Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Institution {
  pub institution_id: Uuid,
  pub kind:           InstitutionKind,
  pub name:           String,
  pub created_at:     DateTime<Utc>,
  pub ownership:      Option<Ownership>,
}

/// Input to [`crate::store::ClaimStore::add_institution`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewInstitution {
  pub kind: InstitutionKind,
  pub name: String,
}
