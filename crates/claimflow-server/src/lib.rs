//! HTTP server wiring for claimflow: configuration and the top-level router.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use axum::Router;
use claimflow_core::{ClaimService, store::ClaimStore};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `CLAIMFLOW_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
}

/// Load configuration from `path` (optional) layered under the environment.
pub fn load_config(path: &Path) -> anyhow::Result<ServerConfig> {
  let settings = config::Config::builder()
    .set_default("host", "127.0.0.1")?
    .set_default("port", 8080)?
    .set_default("store_path", "~/.local/share/claimflow/claims.db")?
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix("CLAIMFLOW"))
    .build()
    .context("failed to read config file")?;

  let mut cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  cfg.store_path = expand_tilde(&cfg.store_path);
  Ok(cfg)
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The API router with request tracing.
pub fn app<S>(service: ClaimService<S>) -> Router
where
  S: ClaimStore + 'static,
{
  claimflow_api::api_router(service).layer(TraceLayer::new_for_http())
}
