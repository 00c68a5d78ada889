//! The claim state machine and the ownership grant.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::ClaimService;
use crate::{
  Error, Result,
  audit::AuditEntry,
  claim::Claim,
  institution::Ownership,
  status::ClaimStatus,
  store::{ClaimStore, ClaimWrite, OwnershipGrant, StatusChange},
  user::User,
};

impl<S: ClaimStore> ClaimService<S> {
  /// Move a claim to `status` on behalf of an administrator.
  ///
  /// `audit_note` is mandatory. When `status` is `VERIFIED` the claim's
  /// target is granted to the requester in the same commit.
  pub async fn update_status(
    &self,
    claim_id: Uuid,
    status: ClaimStatus,
    admin_id: Uuid,
    audit_note: &str,
    admin_notes: Option<String>,
  ) -> Result<Claim> {
    let _guard = self.locks.lock(claim_id).await;

    let claim = self.load_claim(claim_id).await?;
    let admin = self.actor(admin_id).await?;
    if !admin.is_admin() {
      return Err(Error::Forbidden(
        "only administrators may change a claim's status".into(),
      ));
    }
    if audit_note.trim().is_empty() {
      return Err(Error::InvalidRequest("an audit note is required".into()));
    }

    let mut write = ClaimWrite::new(claim_id);
    write.transition = Some(
      self
        .plan_transition(&claim, status, &admin, audit_note, admin_notes)
        .await?,
    );
    self.commit(write).await?;

    self.load_claim(claim_id).await
  }

  /// Validate a transition against the table and build its write.
  ///
  /// Every status change, whether an administrator asked for it or a
  /// message or document review triggered it, is planned here. Nothing is
  /// persisted; an invalid edge fails before any write is assembled.
  pub(super) async fn plan_transition(
    &self,
    claim: &Claim,
    to: ClaimStatus,
    actor: &User,
    note: &str,
    admin_notes: Option<String>,
  ) -> Result<StatusChange> {
    let from = claim.status;
    if !from.can_transition_to(to) {
      return Err(Error::InvalidTransition { from, to });
    }

    let now = Utc::now();
    let grant = if to == ClaimStatus::Verified {
      self.plan_grant(claim, now).await?
    } else {
      None
    };

    Ok(StatusChange {
      from,
      to,
      entry: AuditEntry::transition(actor, from, to, note),
      review: actor.is_admin().then_some((actor.user_id, now)),
      admin_notes,
      grant,
    })
  }

  /// Decide what verifying `claim` does to its target's ownership.
  ///
  /// Unowned targets are granted. A target the requester already owns is
  /// left alone, keeping the original grant time. A target owned by someone
  /// else is an [`Error::OwnershipConflict`].
  async fn plan_grant(
    &self,
    claim: &Claim,
    at: DateTime<Utc>,
  ) -> Result<Option<OwnershipGrant>> {
    let target = claim.target;
    let institution = self
      .store
      .get_institution(target.id())
      .await
      .map_err(Error::store)?
      .filter(|i| i.kind == target.kind())
      .ok_or(Error::TargetNotFound(target.id()))?;

    match institution.ownership {
      None => Ok(Some(OwnershipGrant {
        target,
        ownership: Ownership {
          claimed_by: claim.requester_id,
          claimed_at: at,
          claim_id:   claim.claim_id,
        },
      })),
      Some(existing) if existing.claimed_by == claim.requester_id => Ok(None),
      Some(existing) => Err(Error::OwnershipConflict {
        target:     target.id(),
        claimed_by: existing.claimed_by,
      }),
    }
  }
}
