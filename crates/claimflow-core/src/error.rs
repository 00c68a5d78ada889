//! Error types for `claimflow-core`.
//!
//! Every variant is a business-rule violation raised at the point of
//! detection. Nothing in the engine retries or masks these.

use thiserror::Error;
use uuid::Uuid;

use crate::status::ClaimStatus;

#[derive(Debug, Error)]
pub enum Error {
  #[error("claim not found: {0}")]
  ClaimNotFound(Uuid),

  #[error("document not found: {0}")]
  DocumentNotFound(Uuid),

  #[error("user not found: {0}")]
  ActorNotFound(Uuid),

  #[error("claim target not found: {0}")]
  TargetNotFound(Uuid),

  #[error("cannot transition claim from {from} to {to}")]
  InvalidTransition { from: ClaimStatus, to: ClaimStatus },

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("operation not permitted: {0}")]
  InvalidState(String),

  #[error("invalid request: {0}")]
  InvalidRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("target {target} is already claimed by user {claimed_by}")]
  OwnershipConflict { target: Uuid, claimed_by: Uuid },

  #[error("claim {0} was modified concurrently")]
  ConcurrentModification(Uuid),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Stable taxonomy name, used by the HTTP layer in error bodies.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::ClaimNotFound(_)
      | Self::DocumentNotFound(_)
      | Self::ActorNotFound(_)
      | Self::TargetNotFound(_) => "not_found",
      Self::InvalidTransition { .. } => "invalid_transition",
      Self::Forbidden(_) => "forbidden",
      Self::InvalidState(_) => "invalid_state",
      Self::InvalidRequest(_) => "invalid_request",
      Self::Conflict(_)
      | Self::OwnershipConflict { .. }
      | Self::ConcurrentModification(_) => "conflict",
      Self::Store(_) => "store",
    }
  }

  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
