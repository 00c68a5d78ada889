//! Handlers for a claim's thread.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/claims/:id/messages` | Internal notes are omitted for requesters |
//! | `POST` | `/claims/:id/messages` | Body: [`NewMessage`]; returns 201 |
//! | `POST` | `/claims/:id/submissions` | Body: [`Submission`]; answers checked against the open request's form; returns 201 |
//!
//! A message body looks like `{"type":"CHAT","message":"..."}`. Document
//! requests carry their form: `{"type":"DOCUMENT_REQUEST","message":"...",
//! "schema":{"title":"...","fields":[...]}}`.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use claimflow_core::{
  ClaimService, Error,
  message::{ClaimMessage, NewMessage, Submission},
  status::ClaimStatus,
  store::ClaimStore,
};
use uuid::Uuid;

use crate::{error::ApiError, principal::Principal};

/// `GET /claims/:id/messages`
pub async fn list<S>(
  State(service): State<ClaimService<S>>,
  principal: Principal,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<ClaimMessage>>, ApiError>
where
  S: ClaimStore + 'static,
{
  Ok(Json(service.get_messages(id, principal.id()).await?))
}

/// `POST /claims/:id/messages`
pub async fn post<S>(
  State(service): State<ClaimService<S>>,
  principal: Principal,
  Path(id): Path<Uuid>,
  Json(body): Json<NewMessage>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ClaimStore + 'static,
{
  let message = service.post_message(id, principal.id(), body).await?;
  Ok((StatusCode::CREATED, Json(message)))
}

/// `POST /claims/:id/submissions`
pub async fn submit<S>(
  State(service): State<ClaimService<S>>,
  principal: Principal,
  Path(id): Path<Uuid>,
  Json(body): Json<Submission>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ClaimStore + 'static,
{
  check_answers(&service, id, &principal, &body).await?;
  let message = service.submit_data(id, principal.id(), body).await?;
  Ok((StatusCode::CREATED, Json(message)))
}

/// While a claim awaits action, its requester's answers must fill in the
/// required fields of the latest document request. A `file` field is
/// satisfied by any uploaded document.
async fn check_answers<S>(
  service: &ClaimService<S>,
  claim_id: Uuid,
  principal: &Principal,
  submission: &Submission,
) -> Result<(), ApiError>
where
  S: ClaimStore + 'static,
{
  let claim = service.get_claim_details(claim_id).await?;
  if claim.status != ClaimStatus::ActionRequired
    || !claim.is_owned_by(principal.id())
  {
    return Ok(());
  }

  let thread = service.get_messages(claim_id, principal.id()).await?;
  let Some(schema) = thread.iter().rev().find_map(|m| m.kind.schema()) else {
    return Ok(());
  };
  let missing = schema.missing_required(
    &submission.submitted_data,
    !submission.documents.is_empty(),
  );
  if missing.is_empty() {
    Ok(())
  } else {
    Err(
      Error::InvalidRequest(format!(
        "missing required fields: {}",
        missing.join(", ")
      ))
      .into(),
    )
  }
}
