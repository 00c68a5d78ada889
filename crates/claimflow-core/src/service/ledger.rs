//! Document approval ledger.

use tracing::debug;
use uuid::Uuid;

use super::ClaimService;
use crate::{
  Error, Result,
  document::{DocumentApproval, DocumentStatus, Verdict},
  store::{ClaimStore, ClaimWrite},
};

impl<S: ClaimStore> ClaimService<S> {
  /// Review records for a claim, created from its evidence list on first
  /// access.
  pub async fn get_claim_documents(
    &self,
    claim_id: Uuid,
  ) -> Result<Vec<DocumentApproval>> {
    let _guard = self.locks.lock(claim_id).await;

    let claim = self.load_claim(claim_id).await?;
    let existing = self
      .store
      .list_documents(claim_id)
      .await
      .map_err(Error::store)?;
    if !existing.is_empty() || claim.details.evidence.is_empty() {
      return Ok(existing);
    }

    let documents: Vec<DocumentApproval> = claim
      .details
      .evidence
      .iter()
      .map(|url| DocumentApproval::pending(claim_id, url))
      .collect();

    let mut write = ClaimWrite::new(claim_id);
    write.new_documents = documents.clone();
    self.commit(write).await?;

    debug!(claim_id = %claim_id, count = documents.len(), "document ledger created");
    Ok(documents)
  }

  /// Approve or reject one document, then re-derive the claim's status from
  /// the whole ledger.
  ///
  /// The aggregate transition goes through the state machine like any other.
  /// If it is not a legal edge the review is refused and nothing is stored.
  pub async fn review_document(
    &self,
    document_id: Uuid,
    status: DocumentStatus,
    admin_id: Uuid,
    admin_notes: Option<String>,
  ) -> Result<DocumentApproval> {
    let claim_id = self.load_document(document_id).await?.claim_id;
    let _guard = self.locks.lock(claim_id).await;

    let mut document = self.load_document(document_id).await?;
    let admin = self.actor(admin_id).await?;
    if !admin.is_admin() {
      return Err(Error::Forbidden(
        "only administrators may review documents".into(),
      ));
    }
    if !matches!(status, DocumentStatus::Approved | DocumentStatus::Rejected) {
      return Err(Error::InvalidRequest(format!(
        "a review must approve or reject, not {status}"
      )));
    }
    if document.status != DocumentStatus::Pending {
      return Err(Error::InvalidState(format!(
        "document {document_id} is already {}",
        document.status
      )));
    }

    let claim = self.load_claim(claim_id).await?;
    let ledger = self
      .store
      .list_documents(claim_id)
      .await
      .map_err(Error::store)?;

    document.record_review(status, admin_id, admin_notes);

    let verdict = Verdict::of(ledger.iter().map(|d| {
      if d.document_id == document_id { &document } else { d }
    }));

    let mut write = ClaimWrite::new(claim_id);
    if let Some((to, note)) = verdict.target()
      && to != claim.status
    {
      write.transition =
        Some(self.plan_transition(&claim, to, &admin, note, None).await?);
    }
    write.reviewed_document = Some(document.clone());
    self.commit(write).await?;

    Ok(document)
  }

  async fn load_document(&self, document_id: Uuid) -> Result<DocumentApproval> {
    self
      .store
      .get_document(document_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::DocumentNotFound(document_id))
  }
}
