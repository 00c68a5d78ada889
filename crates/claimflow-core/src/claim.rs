//! A claim: one assertion that a user represents an institution or group.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  audit::AuditLog,
  institution::InstitutionKind,
  status::ClaimStatus,
};

/// How long a claim stays open before it is considered stale.
pub const CLAIM_TTL_DAYS: i64 = 30;

pub fn expiry_from(created_at: DateTime<Utc>) -> DateTime<Utc> {
  created_at + Duration::days(CLAIM_TTL_DAYS)
}

// ─── Target ──────────────────────────────────────────────────────────────────

/// The record being claimed. Exactly one of the two kinds, for the lifetime
/// of the claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ClaimTarget {
  Institution(Uuid),
  Group(Uuid),
}

impl ClaimTarget {
  /// Build a target from the two optional ids a form submits.
  pub fn from_ids(
    institution_id: Option<Uuid>,
    group_id: Option<Uuid>,
  ) -> Result<Self> {
    match (institution_id, group_id) {
      (Some(id), None) => Ok(Self::Institution(id)),
      (None, Some(id)) => Ok(Self::Group(id)),
      (Some(_), Some(_)) => Err(Error::InvalidRequest(
        "a claim targets an institution or a group, not both".into(),
      )),
      (None, None) => Err(Error::InvalidRequest(
        "a claim must target an institution or a group".into(),
      )),
    }
  }

  pub fn id(self) -> Uuid {
    match self {
      Self::Institution(id) | Self::Group(id) => id,
    }
  }

  pub fn kind(self) -> InstitutionKind {
    match self {
      Self::Institution(_) => InstitutionKind::Institution,
      Self::Group(_) => InstitutionKind::Group,
    }
  }
}

// ─── Details ─────────────────────────────────────────────────────────────────

/// The requester-supplied part of a claim; editable only while `PENDING`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimDetails {
  pub requester_email:     String,
  pub institutional_email: Option<String>,
  /// The role or position the requester holds at the institution.
  pub position:            String,
  pub comments:            Option<String>,
  /// URLs of uploaded evidence documents.
  #[serde(default)]
  pub evidence:            Vec<String>,
}

impl ClaimDetails {
  pub fn validate(&self) -> Result<()> {
    if self.position.trim().is_empty() {
      return Err(Error::InvalidRequest("position must not be empty".into()));
    }
    if self.requester_email.trim().is_empty() {
      return Err(Error::InvalidRequest(
        "requester email must not be empty".into(),
      ));
    }
    if self.evidence.iter().any(|u| u.trim().is_empty()) {
      return Err(Error::InvalidRequest(
        "evidence URLs must not be empty".into(),
      ));
    }
    Ok(())
  }
}

// ─── Claim ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
  pub claim_id:       Uuid,
  pub target:         ClaimTarget,
  pub requester_id:   Uuid,
  pub requester_name: String,
  #[serde(flatten)]
  pub details:        ClaimDetails,
  pub status:         ClaimStatus,
  /// Internal reviewer notes; never shown to the requester.
  pub admin_notes:    Option<String>,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
  pub expires_at:     DateTime<Utc>,
  pub reviewed_by:    Option<Uuid>,
  pub reviewed_at:    Option<DateTime<Utc>>,
  pub audit_log:      AuditLog,
}

impl Claim {
  pub fn is_owned_by(&self, user_id: Uuid) -> bool {
    self.requester_id == user_id
  }

  /// The claim as the requester may see it.
  pub fn redacted(mut self) -> Self {
    self.admin_notes = None;
    self
  }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input to [`crate::service::ClaimService::create_claim`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewClaim {
  pub target_institution_id: Option<Uuid>,
  pub target_group_id:       Option<Uuid>,
  #[serde(flatten)]
  pub details:               ClaimDetails,
}

impl NewClaim {
  pub fn target(&self) -> Result<ClaimTarget> {
    ClaimTarget::from_ids(self.target_institution_id, self.target_group_id)
  }
}

/// Partial update applied by the requester while the claim is `PENDING`.
/// The target cannot be changed.
///
/// The optional fields take a nested option: absent leaves the field alone,
/// `null` (or a blank string) clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClaimPatch {
  pub requester_email:     Option<String>,
  #[serde(default, deserialize_with = "present")]
  pub institutional_email: Option<Option<String>>,
  pub position:            Option<String>,
  #[serde(default, deserialize_with = "present")]
  pub comments:            Option<Option<String>>,
  pub evidence:            Option<Vec<String>>,
}

/// Marks a field as present, so an explicit `null` is kept apart from a
/// missing key.
fn present<'de, D, T>(de: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  Option::<T>::deserialize(de).map(Some)
}

fn non_blank(value: Option<String>) -> Option<String> {
  value.filter(|v| !v.trim().is_empty())
}

impl ClaimPatch {
  pub fn is_empty(&self) -> bool {
    self.requester_email.is_none()
      && self.institutional_email.is_none()
      && self.position.is_none()
      && self.comments.is_none()
      && self.evidence.is_none()
  }

  pub fn apply(self, details: &mut ClaimDetails) {
    if let Some(v) = self.requester_email {
      details.requester_email = v;
    }
    if let Some(v) = self.institutional_email {
      details.institutional_email = non_blank(v);
    }
    if let Some(v) = self.position {
      details.position = v;
    }
    if let Some(v) = self.comments {
      details.comments = non_blank(v);
    }
    if let Some(v) = self.evidence {
      details.evidence = v;
    }
  }
}

/// Parameters for [`crate::store::ClaimStore::list_claims`].
#[derive(Debug, Clone, Default)]
pub struct ClaimQuery {
  pub status:       Option<ClaimStatus>,
  pub requester_id: Option<Uuid>,
  pub target:       Option<ClaimTarget>,
  pub limit:        Option<usize>,
  pub offset:       Option<usize>,
}
