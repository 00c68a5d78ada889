//! Handlers for `/institutions` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/institutions` | Body: `{"kind":"institution","name":"..."}`; admin only |
//! | `GET`  | `/institutions/:id` | 404 if not found; includes current ownership |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use claimflow_core::{
  ClaimService,
  institution::{Institution, NewInstitution},
  store::ClaimStore,
};
use uuid::Uuid;

use crate::{error::ApiError, principal::Principal};

/// `POST /institutions`
pub async fn create<S>(
  State(service): State<ClaimService<S>>,
  principal: Principal,
  Json(body): Json<NewInstitution>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ClaimStore + 'static,
{
  let institution = service.register_institution(principal.id(), body).await?;
  Ok((StatusCode::CREATED, Json(institution)))
}

/// `GET /institutions/:id`
pub async fn get_one<S>(
  State(service): State<ClaimService<S>>,
  _principal: Principal,
  Path(id): Path<Uuid>,
) -> Result<Json<Institution>, ApiError>
where
  S: ClaimStore + 'static,
{
  Ok(Json(service.get_institution(id).await?))
}
