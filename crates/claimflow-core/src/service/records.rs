//! Entry and exit points around the state machine: creating, reading,
//! editing and withdrawing claims.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::ClaimService;
use crate::{
  Error, Result,
  audit::{AuditEntry, AuditLog},
  claim::{Claim, ClaimPatch, ClaimQuery, NewClaim, expiry_from},
  document::realign,
  status::ClaimStatus,
  store::{ClaimStore, DetailsEdit},
};

impl<S: ClaimStore> ClaimService<S> {
  pub async fn create_claim(&self, user_id: Uuid, input: NewClaim) -> Result<Claim> {
    let user = self.actor(user_id).await?;
    let target = input.target()?;
    input.details.validate()?;

    // Serialize creates per target so two racing duplicates cannot both pass
    // the check below.
    let _guard = self.locks.lock(target.id()).await;

    let institution = self
      .store
      .get_institution(target.id())
      .await
      .map_err(Error::store)?
      .filter(|i| i.kind == target.kind())
      .ok_or(Error::TargetNotFound(target.id()))?;

    let query = ClaimQuery {
      requester_id: Some(user_id),
      target: Some(target),
      ..Default::default()
    };
    let existing = self.store.list_claims(&query).await.map_err(Error::store)?;
    if let Some(active) = existing.iter().find(|c| c.status.blocks_duplicate()) {
      return Err(Error::Conflict(format!(
        "claim {} on this {} is still {}",
        active.claim_id,
        target.kind(),
        active.status
      )));
    }

    let now = Utc::now();
    let mut audit_log = AuditLog::default();
    audit_log.append(AuditEntry {
      to_status: Some(ClaimStatus::Pending),
      ..AuditEntry::action(&user, "claim created")
    });

    let claim = Claim {
      claim_id: Uuid::new_v4(),
      target,
      requester_id: user_id,
      requester_name: user.display_name.clone(),
      details: input.details,
      status: ClaimStatus::Pending,
      admin_notes: None,
      created_at: now,
      updated_at: now,
      expires_at: expiry_from(now),
      reviewed_by: None,
      reviewed_at: None,
      audit_log,
    };
    self.store.insert_claim(&claim).await.map_err(Error::store)?;

    info!(
      claim_id = %claim.claim_id,
      user_id = %user_id,
      target = %institution.name,
      "claim created"
    );
    Ok(claim)
  }

  pub async fn get_user_claims(&self, user_id: Uuid) -> Result<Vec<Claim>> {
    let query = ClaimQuery {
      requester_id: Some(user_id),
      ..Default::default()
    };
    self.list_claims(&query).await
  }

  pub async fn get_claim_details(&self, claim_id: Uuid) -> Result<Claim> {
    self.load_claim(claim_id).await
  }

  /// The review queue, filtered by `query`.
  pub async fn list_claims(&self, query: &ClaimQuery) -> Result<Vec<Claim>> {
    self.store.list_claims(query).await.map_err(Error::store)
  }

  /// Edit a claim. Only its requester, and only while it is `PENDING`.
  pub async fn update_claim(
    &self,
    claim_id: Uuid,
    user_id: Uuid,
    patch: ClaimPatch,
  ) -> Result<Claim> {
    let _guard = self.locks.lock(claim_id).await;

    let claim = self.load_claim(claim_id).await?;
    ensure_editable(&claim, user_id)?;
    if patch.is_empty() {
      return Err(Error::InvalidRequest("nothing to update".into()));
    }
    let user = self.actor(user_id).await?;

    let mut details = claim.details.clone();
    patch.apply(&mut details);
    details.validate()?;

    // A ledger created before the edit must track the new evidence list.
    let (new_documents, replaced_documents) =
      if details.evidence != claim.details.evidence {
        let ledger = self
          .store
          .list_documents(claim_id)
          .await
          .map_err(Error::store)?;
        if ledger.is_empty() {
          (Vec::new(), Vec::new())
        } else {
          realign(claim_id, &ledger, &details.evidence)
        }
      } else {
        (Vec::new(), Vec::new())
      };

    self
      .store
      .update_claim_details(DetailsEdit {
        claim_id,
        details,
        entry: AuditEntry::action(&user, "claim updated by requester"),
        new_documents,
        replaced_documents,
      })
      .await
      .map_err(Error::store)?;

    self.load_claim(claim_id).await
  }

  /// Withdraw a claim. Only its requester, and only while it is `PENDING`.
  pub async fn delete_claim(&self, claim_id: Uuid, user_id: Uuid) -> Result<()> {
    let _guard = self.locks.lock(claim_id).await;

    let claim = self.load_claim(claim_id).await?;
    ensure_editable(&claim, user_id)?;

    if !self
      .store
      .delete_claim(claim_id)
      .await
      .map_err(Error::store)?
    {
      return Err(Error::ClaimNotFound(claim_id));
    }
    info!(claim_id = %claim_id, user_id = %user_id, "claim withdrawn");
    Ok(())
  }
}

/// Status first: once review has begun nobody may edit, whoever asks.
fn ensure_editable(claim: &Claim, user_id: Uuid) -> Result<()> {
  if claim.status != ClaimStatus::Pending {
    return Err(Error::InvalidState(format!(
      "claim is {}; only pending claims can be changed",
      claim.status
    )));
  }
  if !claim.is_owned_by(user_id) {
    return Err(Error::Forbidden(
      "only the requester may change this claim".into(),
    ));
  }
  Ok(())
}
