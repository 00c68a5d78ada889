//! Handlers for the document approval ledger.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/claims/:id/documents` | Requester or admin; creates the ledger on first call |
//! | `POST` | `/documents/:id/review` | Body: [`ReviewBody`]; admin only |

use axum::{
  Json,
  extract::{Path, State},
};
use claimflow_core::{
  ClaimService, Error,
  document::{DocumentApproval, DocumentStatus},
  store::ClaimStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::ApiError, principal::Principal};

/// `GET /claims/:id/documents`
pub async fn list<S>(
  State(service): State<ClaimService<S>>,
  principal: Principal,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<DocumentApproval>>, ApiError>
where
  S: ClaimStore + 'static,
{
  if !principal.is_admin() {
    let claim = service.get_claim_details(id).await?;
    if !claim.is_owned_by(principal.id()) {
      return Err(
        Error::Forbidden("only the requester or an administrator may view documents".into())
          .into(),
      );
    }
  }
  Ok(Json(service.get_claim_documents(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct ReviewBody {
  /// `APPROVED` or `REJECTED`.
  pub status:      DocumentStatus,
  pub admin_notes: Option<String>,
}

/// `POST /documents/:id/review`
pub async fn review<S>(
  State(service): State<ClaimService<S>>,
  principal: Principal,
  Path(id): Path<Uuid>,
  Json(body): Json<ReviewBody>,
) -> Result<Json<DocumentApproval>, ApiError>
where
  S: ClaimStore + 'static,
{
  let document = service
    .review_document(id, body.status, principal.id(), body.admin_notes)
    .await?;
  Ok(Json(document))
}
