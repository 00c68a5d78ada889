//! Audit trail attached to every claim.
//!
//! Entries are immutable and the log is append-only: [`AuditLog`] exposes a
//! read-only slice and nothing outside this crate can push to it. Storage
//! backends persist entries with `INSERT` only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{status::ClaimStatus, user::User};

/// One timestamped record of a status change or significant action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
  pub entry_id:    Uuid,
  pub at:          DateTime<Utc>,
  pub actor_id:    Uuid,
  pub actor_name:  String,
  /// Short description, e.g. "status changed".
  pub action:      String,
  pub from_status: Option<ClaimStatus>,
  pub to_status:   Option<ClaimStatus>,
  pub note:        Option<String>,
}

impl AuditEntry {
  /// An entry that is not a status change.
  pub fn action(actor: &User, action: impl Into<String>) -> Self {
    Self {
      entry_id:    Uuid::new_v4(),
      at:          Utc::now(),
      actor_id:    actor.user_id,
      actor_name:  actor.display_name.clone(),
      action:      action.into(),
      from_status: None,
      to_status:   None,
      note:        None,
    }
  }

  /// The single entry recorded for a status transition.
  pub fn transition(
    actor: &User,
    from: ClaimStatus,
    to: ClaimStatus,
    note: impl Into<String>,
  ) -> Self {
    Self {
      from_status: Some(from),
      to_status: Some(to),
      note: Some(note.into()),
      ..Self::action(actor, "status changed")
    }
  }
}

/// Ordered, append-only sequence of [`AuditEntry`] values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditLog(Vec<AuditEntry>);

impl AuditLog {
  /// Rebuild a log from persisted entries. Callers pass them in append order.
  pub fn from_entries(entries: Vec<AuditEntry>) -> Self { Self(entries) }

  pub fn entries(&self) -> &[AuditEntry] { &self.0 }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn last(&self) -> Option<&AuditEntry> { self.0.last() }

  pub(crate) fn append(&mut self, entry: AuditEntry) { self.0.push(entry); }
}
