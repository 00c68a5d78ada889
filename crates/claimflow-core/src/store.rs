//! The `ClaimStore` trait and the write bundles it commits.
//!
//! The trait is implemented by storage backends (e.g.
//! `claimflow-store-sqlite`). [`crate::service::ClaimService`] holds all
//! workflow rules; a store only persists what it is handed, atomically.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  audit::AuditEntry,
  claim::{Claim, ClaimDetails, ClaimQuery, ClaimTarget},
  document::DocumentApproval,
  institution::{Institution, NewInstitution, Ownership},
  message::ClaimMessage,
  status::ClaimStatus,
  user::User,
};

// ─── Write bundles ───────────────────────────────────────────────────────────

/// Ownership to record on the claim's target as part of a transition.
#[derive(Debug, Clone)]
pub struct OwnershipGrant {
  pub target:    ClaimTarget,
  pub ownership: Ownership,
}

/// One status change on one claim.
#[derive(Debug, Clone)]
pub struct StatusChange {
  /// The status the claim must still be in; guards against lost updates.
  pub from:        ClaimStatus,
  pub to:          ClaimStatus,
  /// Exactly one audit entry per transition.
  pub entry:       AuditEntry,
  /// Reviewing administrator and time, for admin-driven changes.
  pub review:      Option<(Uuid, DateTime<Utc>)>,
  /// Replaces the internal notes when set.
  pub admin_notes: Option<String>,
  /// Present only when `to` is `VERIFIED`.
  pub grant:       Option<OwnershipGrant>,
}

/// Everything one engine operation writes for a claim. A store commits the
/// whole bundle in a single transaction or nothing at all.
#[derive(Debug, Clone)]
pub struct ClaimWrite {
  pub claim_id:           Uuid,
  pub message:            Option<ClaimMessage>,
  /// URLs appended to the claim's evidence list.
  pub new_evidence:       Vec<String>,
  pub new_documents:      Vec<DocumentApproval>,
  pub reviewed_document:  Option<DocumentApproval>,
  pub replaced_documents: Vec<Uuid>,
  pub transition:         Option<StatusChange>,
}

impl ClaimWrite {
  pub fn new(claim_id: Uuid) -> Self {
    Self {
      claim_id,
      message: None,
      new_evidence: Vec::new(),
      new_documents: Vec::new(),
      reviewed_document: None,
      replaced_documents: Vec::new(),
      transition: None,
    }
  }
}

/// A requester's edit of a `PENDING` claim. When the evidence list changes
/// after the ledger exists, the ledger changes ride along in the same
/// transaction.
#[derive(Debug, Clone)]
pub struct DetailsEdit {
  pub claim_id:           Uuid,
  pub details:            ClaimDetails,
  pub entry:              AuditEntry,
  pub new_documents:      Vec<DocumentApproval>,
  pub replaced_documents: Vec<Uuid>,
}

/// Result of [`ClaimStore::commit`]. Anything but `Applied` means the store
/// rolled the whole bundle back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
  Applied,
  ClaimMissing,
  /// The granted institution or group does not exist.
  TargetMissing,
  /// The claim was no longer in `StatusChange::from`.
  StatusChanged { current: ClaimStatus },
  /// The reviewed document was no longer `PENDING`.
  DocumentChanged { document_id: Uuid },
  /// The target is already owned by a different user.
  OwnershipConflict { claimed_by: Uuid },
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a claim store backend.
///
/// Audit entries are append-only: no method updates or removes one, except
/// that [`ClaimStore::delete_claim`] drops a claim together with its history.
pub trait ClaimStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Insert or refresh a user from the identity provider.
  fn upsert_user(
    &self,
    user: User,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  // ── Institutions ──────────────────────────────────────────────────────

  fn add_institution(
    &self,
    input: NewInstitution,
  ) -> impl Future<Output = Result<Institution, Self::Error>> + Send + '_;

  fn get_institution(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Institution>, Self::Error>> + Send + '_;

  // ── Claims ────────────────────────────────────────────────────────────

  /// Persist a new claim together with its seeded audit log.
  fn insert_claim<'a>(
    &'a self,
    claim: &'a Claim,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Retrieve a claim with its full audit log. `None` if not found.
  fn get_claim(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Claim>, Self::Error>> + Send + '_;

  /// Claims matching `query`, newest first.
  fn list_claims<'a>(
    &'a self,
    query: &'a ClaimQuery,
  ) -> impl Future<Output = Result<Vec<Claim>, Self::Error>> + Send + 'a;

  /// Overwrite the requester-editable fields, append the edit's audit entry
  /// and apply its ledger changes.
  fn update_claim_details(
    &self,
    edit: DetailsEdit,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Remove a claim with its messages, documents and audit log. Returns
  /// `false` if it did not exist.
  fn delete_claim(
    &self,
    claim_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Commit a [`ClaimWrite`] atomically.
  fn commit(
    &self,
    write: ClaimWrite,
  ) -> impl Future<Output = Result<CommitOutcome, Self::Error>> + Send + '_;

  // ── Messages ──────────────────────────────────────────────────────────

  /// All messages on a claim, oldest first.
  fn list_messages(
    &self,
    claim_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ClaimMessage>, Self::Error>> + Send + '_;

  // ── Documents ─────────────────────────────────────────────────────────

  /// All review records for a claim, in creation order.
  fn list_documents(
    &self,
    claim_id: Uuid,
  ) -> impl Future<Output = Result<Vec<DocumentApproval>, Self::Error>> + Send + '_;

  fn get_document(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<DocumentApproval>, Self::Error>> + Send + '_;
}
