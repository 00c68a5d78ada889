//! Core types, the storage trait and the lifecycle engine for claimflow.
//!
//! No HTTP or database code lives here; the other crates build on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod audit;
pub mod claim;
pub mod document;
pub mod error;
pub mod institution;
pub mod message;
pub mod service;
pub mod status;
pub mod store;
pub mod user;

mod locks;

pub use error::{Error, Result};
pub use service::ClaimService;
