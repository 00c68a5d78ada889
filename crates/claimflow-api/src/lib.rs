//! JSON REST API for claimflow.
//!
//! Exposes an axum [`Router`] over a [`ClaimService`] backed by any
//! [`claimflow_core::store::ClaimStore`]. Authentication happens upstream;
//! the gateway forwards the caller's identity in `x-user-*` headers (see
//! [`principal`]). TLS and transport are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", claimflow_api::api_router(service.clone()))
//! ```

pub mod claims;
pub mod documents;
pub mod error;
pub mod institutions;
pub mod messages;
pub mod principal;

use axum::{
  Router,
  routing::{get, post},
};
use claimflow_core::{ClaimService, store::ClaimStore};

pub use error::ApiError;
pub use principal::Principal;

/// Build a fully-materialised API router for `service`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(service: ClaimService<S>) -> Router<()>
where
  S: ClaimStore + 'static,
{
  Router::new()
    // Claims
    .route("/claims", get(claims::list_mine::<S>).post(claims::create::<S>))
    .route(
      "/claims/{id}",
      get(claims::get_one::<S>)
        .patch(claims::update::<S>)
        .delete(claims::withdraw::<S>),
    )
    .route("/claims/{id}/status", post(claims::update_status::<S>))
    // Threads
    .route(
      "/claims/{id}/messages",
      get(messages::list::<S>).post(messages::post::<S>),
    )
    .route("/claims/{id}/submissions", post(messages::submit::<S>))
    // Document ledger
    .route("/claims/{id}/documents", get(documents::list::<S>))
    .route("/documents/{id}/review", post(documents::review::<S>))
    // Administration
    .route("/admin/claims", get(claims::queue::<S>))
    .route("/institutions", post(institutions::create::<S>))
    .route("/institutions/{id}", get(institutions::get_one::<S>))
    .with_state(service)
}

#[cfg(test)]
mod tests;
