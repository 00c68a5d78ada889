//! Claim threads: chat, internal notes, document requests and the
//! requester's answers.
//!
//! Sending a document request always parks the claim in `ACTION_REQUIRED`.
//! Only a data submission from the requester brings it back to
//! `UNDER_REVIEW`; ordinary chat never moves the status.

use std::collections::HashSet;

use chrono::Utc;
use uuid::Uuid;

use super::ClaimService;
use crate::{
  Error, Result,
  document::{DocumentApproval, superseded_by},
  message::{ClaimMessage, MessageKind, NewMessage, Submission},
  status::ClaimStatus,
  store::{ClaimStore, ClaimWrite},
};

const DOCUMENT_REQUEST_NOTE: &str = "document request sent to user";
const SUBMISSION_NOTE: &str = "user submitted requested data";
const DEFAULT_SUBMISSION_BODY: &str = "Submitted requested information";

impl<S: ClaimStore> ClaimService<S> {
  pub async fn post_message(
    &self,
    claim_id: Uuid,
    sender_id: Uuid,
    input: NewMessage,
  ) -> Result<ClaimMessage> {
    let _guard = self.locks.lock(claim_id).await;

    let claim = self.load_claim(claim_id).await?;
    let sender = self.actor(sender_id).await?;

    if !sender.is_admin() {
      if !claim.is_owned_by(sender_id) {
        return Err(Error::Forbidden(
          "only the requester or an administrator may post on this claim".into(),
        ));
      }
      if input.kind != MessageKind::Chat {
        return Err(Error::Forbidden(
          "only administrators may send document requests or internal notes"
            .into(),
        ));
      }
    }

    match &input.kind {
      MessageKind::DocumentRequest { schema } => schema.validate()?,
      _ if input.body.trim().is_empty() => {
        return Err(Error::InvalidRequest("message must not be empty".into()));
      }
      _ => {}
    }

    let transition = match input.kind {
      MessageKind::DocumentRequest { .. }
        if claim.status != ClaimStatus::ActionRequired =>
      {
        Some(
          self
            .plan_transition(
              &claim,
              ClaimStatus::ActionRequired,
              &sender,
              DOCUMENT_REQUEST_NOTE,
              None,
            )
            .await?,
        )
      }
      _ => None,
    };

    let message = ClaimMessage {
      message_id:     Uuid::new_v4(),
      claim_id,
      sender_id,
      sender_role:    sender.role,
      body:           input.body,
      attachments:    input.attachments,
      kind:           input.kind,
      submitted_data: None,
      documents:      Vec::new(),
      created_at:     Utc::now(),
    };

    let mut write = ClaimWrite::new(claim_id);
    write.message = Some(message.clone());
    write.transition = transition;
    self.commit(write).await?;

    Ok(message)
  }

  /// The requester answers a document request.
  ///
  /// New documents join the claim's evidence. If the ledger already exists
  /// they get `PENDING` records, and each one replaces one resubmittable
  /// rejected record, oldest first. Rejections nobody re-uploaded stay
  /// `REJECTED`. Any submission on an `ACTION_REQUIRED` claim returns it to
  /// `UNDER_REVIEW`; checking the answers against the request's form is the
  /// caller's job.
  pub async fn submit_data(
    &self,
    claim_id: Uuid,
    user_id: Uuid,
    submission: Submission,
  ) -> Result<ClaimMessage> {
    let _guard = self.locks.lock(claim_id).await;

    let claim = self.load_claim(claim_id).await?;
    if !claim.is_owned_by(user_id) {
      return Err(Error::Forbidden(
        "only the requester may submit data for this claim".into(),
      ));
    }
    let user = self.actor(user_id).await?;

    if claim.status.is_closed() {
      return Err(Error::InvalidState(format!(
        "claim is {}; submissions are closed",
        claim.status
      )));
    }

    let mut write = ClaimWrite::new(claim_id);

    let new_urls: Vec<String> = {
      let mut seen = HashSet::new();
      submission
        .documents
        .iter()
        .filter(|u| !u.trim().is_empty() && !claim.details.evidence.contains(u))
        .filter(|u| seen.insert(*u))
        .cloned()
        .collect()
    };
    if !new_urls.is_empty() {
      let ledger = self
        .store
        .list_documents(claim_id)
        .await
        .map_err(Error::store)?;
      if !ledger.is_empty() {
        write.new_documents = new_urls
          .iter()
          .map(|u| DocumentApproval::pending(claim_id, u))
          .collect();
        write.replaced_documents = superseded_by(&ledger, new_urls.len());
      }
      write.new_evidence = new_urls;
    }

    if claim.status == ClaimStatus::ActionRequired {
      write.transition = Some(
        self
          .plan_transition(
            &claim,
            ClaimStatus::UnderReview,
            &user,
            SUBMISSION_NOTE,
            None,
          )
          .await?,
      );
    }

    let message = ClaimMessage {
      message_id:     Uuid::new_v4(),
      claim_id,
      sender_id:      user_id,
      sender_role:    user.role,
      body:           submission
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SUBMISSION_BODY.to_owned()),
      attachments:    Vec::new(),
      kind:           MessageKind::Chat,
      submitted_data: (!submission.submitted_data.is_empty())
        .then_some(submission.submitted_data),
      documents:      submission.documents,
      created_at:     Utc::now(),
    };
    write.message = Some(message.clone());
    self.commit(write).await?;

    Ok(message)
  }

  /// The claim's thread as `viewer_id` may see it. Internal notes are
  /// withheld from non-administrators.
  pub async fn get_messages(
    &self,
    claim_id: Uuid,
    viewer_id: Uuid,
  ) -> Result<Vec<ClaimMessage>> {
    let claim = self.load_claim(claim_id).await?;
    let viewer = self.actor(viewer_id).await?;
    if !viewer.is_admin() && !claim.is_owned_by(viewer_id) {
      return Err(Error::Forbidden(
        "only the requester or an administrator may read this thread".into(),
      ));
    }

    let mut messages = self
      .store
      .list_messages(claim_id)
      .await
      .map_err(Error::store)?;
    if !viewer.is_admin() {
      messages.retain(|m| m.kind != MessageKind::InternalNote);
    }
    Ok(messages)
  }
}
