//! Handlers for `/claims` and `/admin/claims` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST`   | `/claims` | Body: [`NewClaim`]; returns 201 + claim |
//! | `GET`    | `/claims` | The caller's own claims |
//! | `GET`    | `/claims/:id` | Requester or admin; admin notes hidden from requesters |
//! | `PATCH`  | `/claims/:id` | Body: [`ClaimPatch`]; requester only, while `PENDING` |
//! | `DELETE` | `/claims/:id` | Requester only, while `PENDING`; returns 204 |
//! | `POST`   | `/claims/:id/status` | Body: [`StatusBody`]; admin only |
//! | `GET`    | `/admin/claims` | Review queue; optional `status`, `requester_id`, target and paging |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use claimflow_core::{
  ClaimService, Error,
  claim::{Claim, ClaimPatch, ClaimQuery, ClaimTarget, NewClaim},
  status::ClaimStatus,
  store::ClaimStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::ApiError, principal::Principal};

/// Requesters never see internal notes.
fn visible_to(claim: Claim, principal: &Principal) -> Claim {
  if principal.is_admin() { claim } else { claim.redacted() }
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /claims`
pub async fn create<S>(
  State(service): State<ClaimService<S>>,
  principal: Principal,
  Json(body): Json<NewClaim>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ClaimStore + 'static,
{
  let claim = service.create_claim(principal.id(), body).await?;
  Ok((StatusCode::CREATED, Json(visible_to(claim, &principal))))
}

// ─── Read ─────────────────────────────────────────────────────────────────────

/// `GET /claims`
pub async fn list_mine<S>(
  State(service): State<ClaimService<S>>,
  principal: Principal,
) -> Result<Json<Vec<Claim>>, ApiError>
where
  S: ClaimStore + 'static,
{
  let claims = service.get_user_claims(principal.id()).await?;
  Ok(Json(
    claims.into_iter().map(|c| visible_to(c, &principal)).collect(),
  ))
}

/// `GET /claims/:id`
pub async fn get_one<S>(
  State(service): State<ClaimService<S>>,
  principal: Principal,
  Path(id): Path<Uuid>,
) -> Result<Json<Claim>, ApiError>
where
  S: ClaimStore + 'static,
{
  let claim = service.get_claim_details(id).await?;
  if !principal.is_admin() && !claim.is_owned_by(principal.id()) {
    return Err(
      Error::Forbidden("only the requester or an administrator may view this claim".into())
        .into(),
    );
  }
  Ok(Json(visible_to(claim, &principal)))
}

// ─── Edit / withdraw ──────────────────────────────────────────────────────────

/// `PATCH /claims/:id`
pub async fn update<S>(
  State(service): State<ClaimService<S>>,
  principal: Principal,
  Path(id): Path<Uuid>,
  Json(patch): Json<ClaimPatch>,
) -> Result<Json<Claim>, ApiError>
where
  S: ClaimStore + 'static,
{
  let claim = service.update_claim(id, principal.id(), patch).await?;
  Ok(Json(visible_to(claim, &principal)))
}

/// `DELETE /claims/:id`
pub async fn withdraw<S>(
  State(service): State<ClaimService<S>>,
  principal: Principal,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: ClaimStore + 'static,
{
  service.delete_claim(id, principal.id()).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Status ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status:      ClaimStatus,
  /// Recorded in the audit entry. Required.
  pub audit_note:  String,
  /// Replaces the claim's internal notes when present.
  pub admin_notes: Option<String>,
}

/// `POST /claims/:id/status`
pub async fn update_status<S>(
  State(service): State<ClaimService<S>>,
  principal: Principal,
  Path(id): Path<Uuid>,
  Json(body): Json<StatusBody>,
) -> Result<Json<Claim>, ApiError>
where
  S: ClaimStore + 'static,
{
  let claim = service
    .update_status(id, body.status, principal.id(), &body.audit_note, body.admin_notes)
    .await?;
  Ok(Json(claim))
}

// ─── Review queue ─────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct QueueParams {
  pub status:         Option<ClaimStatus>,
  pub requester_id:   Option<Uuid>,
  pub institution_id: Option<Uuid>,
  pub group_id:       Option<Uuid>,
  pub limit:          Option<usize>,
  pub offset:         Option<usize>,
}

/// `GET /admin/claims[?status=..][&requester_id=..][&institution_id=..|&group_id=..][&limit=..][&offset=..]`
pub async fn queue<S>(
  State(service): State<ClaimService<S>>,
  principal: Principal,
  Query(params): Query<QueueParams>,
) -> Result<Json<Vec<Claim>>, ApiError>
where
  S: ClaimStore + 'static,
{
  if !principal.is_admin() {
    return Err(Error::Forbidden("the review queue is for administrators".into()).into());
  }

  let target = match (params.institution_id, params.group_id) {
    (None, None) => None,
    (i, g) => Some(ClaimTarget::from_ids(i, g)?),
  };
  let query = ClaimQuery {
    status: params.status,
    requester_id: params.requester_id,
    target,
    limit: params.limit,
    offset: params.offset,
  };
  Ok(Json(service.list_claims(&query).await?))
}
