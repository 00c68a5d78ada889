//! [`ClaimService`]: the claim lifecycle engine.
//!
//! Every operation takes the claim's lock, reads the current record, checks
//! the workflow rules, and hands the store one [`ClaimWrite`] to commit.
//! Side effects on other entities (status changes triggered by messages or
//! document reviews, ownership grants) are explicit calls into
//! [`ClaimService::plan_transition`], so the whole effect of an operation is
//! visible in its own call chain.
//!
//! Split by concern:
//! - `transition`: the state machine and ownership grant
//! - `messaging`: threads, document requests and data submissions
//! - `ledger`: per-document approvals and their aggregate
//! - `records`: claim create / read / edit / delete

mod ledger;
mod messaging;
mod records;
mod transition;

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::{
  Error, Result,
  claim::{Claim, ClaimTarget},
  institution::{Institution, NewInstitution},
  locks::KeyedLocks,
  status::ClaimStatus,
  store::{ClaimStore, ClaimWrite, CommitOutcome},
  user::User,
};

/// The claim lifecycle engine over a storage backend `S`.
///
/// Cloning is cheap; clones share the store and the per-claim locks.
pub struct ClaimService<S> {
  store: Arc<S>,
  locks: Arc<KeyedLocks>,
}

impl<S> Clone for ClaimService<S> {
  fn clone(&self) -> Self {
    Self {
      store: self.store.clone(),
      locks: self.locks.clone(),
    }
  }
}

impl<S: ClaimStore> ClaimService<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self {
      store,
      locks: Arc::new(KeyedLocks::default()),
    }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  // ── Users and institutions ────────────────────────────────────────────

  /// Record the latest identity-provider view of a user.
  pub async fn sync_user(&self, user: User) -> Result<User> {
    self.store.upsert_user(user).await.map_err(Error::store)
  }

  /// Register a claimable institution or group. Administrators only.
  pub async fn register_institution(
    &self,
    admin_id: Uuid,
    input: NewInstitution,
  ) -> Result<Institution> {
    let admin = self.actor(admin_id).await?;
    if !admin.is_admin() {
      return Err(Error::Forbidden(
        "only administrators may register institutions".into(),
      ));
    }
    if input.name.trim().is_empty() {
      return Err(Error::InvalidRequest("name must not be empty".into()));
    }
    let institution = self
      .store
      .add_institution(input)
      .await
      .map_err(Error::store)?;
    info!(
      institution_id = %institution.institution_id,
      kind = %institution.kind,
      "institution registered"
    );
    Ok(institution)
  }

  pub async fn get_institution(&self, id: Uuid) -> Result<Institution> {
    self
      .store
      .get_institution(id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::TargetNotFound(id))
  }

  // ── Shared helpers ────────────────────────────────────────────────────

  async fn actor(&self, user_id: Uuid) -> Result<User> {
    self
      .store
      .get_user(user_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ActorNotFound(user_id))
  }

  async fn load_claim(&self, claim_id: Uuid) -> Result<Claim> {
    self
      .store
      .get_claim(claim_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ClaimNotFound(claim_id))
  }

  /// Commit `write`, turning a rolled-back outcome into the matching error.
  async fn commit(&self, write: ClaimWrite) -> Result<()> {
    let claim_id = write.claim_id;
    let change = write
      .transition
      .as_ref()
      .map(|c| (c.from, c.to, c.grant.as_ref().map(|g| g.target)));

    match self.store.commit(write).await.map_err(Error::store)? {
      CommitOutcome::Applied => {}
      CommitOutcome::ClaimMissing => return Err(Error::ClaimNotFound(claim_id)),
      CommitOutcome::StatusChanged { .. } | CommitOutcome::DocumentChanged { .. } => {
        return Err(Error::ConcurrentModification(claim_id));
      }
      CommitOutcome::TargetMissing => {
        let target = target_id(change).unwrap_or(claim_id);
        return Err(Error::TargetNotFound(target));
      }
      CommitOutcome::OwnershipConflict { claimed_by } => {
        let target = target_id(change).unwrap_or(claim_id);
        return Err(Error::OwnershipConflict { target, claimed_by });
      }
    }

    if let Some((from, to, target)) = change {
      info!(claim_id = %claim_id, %from, %to, "claim status changed");
      if let Some(target) = target {
        info!(claim_id = %claim_id, target = %target.id(), "ownership granted");
      }
    }
    Ok(())
  }
}

type ChangeSummary = (ClaimStatus, ClaimStatus, Option<ClaimTarget>);

fn target_id(change: Option<ChangeSummary>) -> Option<Uuid> {
  change.and_then(|(.., target)| target).map(ClaimTarget::id)
}
