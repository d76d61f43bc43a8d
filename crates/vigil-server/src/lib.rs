//! Vigil server wiring: configuration, registry bootstrap and HTTP routing.

pub mod dispatcher;
pub mod plugins;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::Router;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use vigil_api::{ApiState, api_router};
use vigil_core::{
  plugin::Plugin,
  registry::PluginRegistry,
  store::{CredentialStore, IntelStore},
};

use dispatcher::LocalDispatcher;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` overlaid
/// with `VIGIL_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:          String,
  pub port:          u16,
  pub store_path:    PathBuf,
  /// Default cap on rendered history; unbounded when absent.
  #[serde(default)]
  pub history_limit: Option<usize>,
}

impl ServerConfig {
  /// Read `path` (optional) and the environment on top of built-in
  /// defaults.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .set_default("host", "127.0.0.1")?
      .set_default("port", 8420)?
      .set_default("store_path", "~/.local/share/vigil/vigil.sqlite")?
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("VIGIL"))
      .build()?
      .try_deserialize()
  }
}

// ─── Bootstrap ───────────────────────────────────────────────────────────────

/// Build the registry from `plugins`, persist it, and assemble the API state
/// around an in-process dispatcher.
pub async fn bootstrap<S>(
  store: Arc<S>,
  plugins: Vec<Arc<dyn Plugin>>,
  config: &ServerConfig,
) -> vigil_core::Result<ApiState<S>>
where
  S: IntelStore + CredentialStore + 'static,
{
  let (registry, report) = PluginRegistry::build(plugins);
  for skipped in &report.skipped {
    tracing::warn!(plugin = %skipped.name, reason = %skipped.reason, "plugin not registered");
  }
  registry.publish(store.as_ref()).await?;

  let unset = registry.unset_api_keys(store.as_ref()).await?;
  if !unset.is_empty() {
    tracing::warn!(keys = ?unset, "api keys required by registered plugins are not set");
  }

  let registry = Arc::new(registry);
  let dispatcher = Arc::new(LocalDispatcher::new(Arc::clone(&store), Arc::clone(&registry)));

  Ok(ApiState::new(store, registry, dispatcher).with_history_limit(config.history_limit))
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// The full application router: the JSON API under `/api`, traced.
pub fn router<S>(state: ApiState<S>) -> Router
where
  S: IntelStore + CredentialStore + 'static,
{
  Router::new()
    .nest("/api", api_router(state))
    .layer(TraceLayer::new_for_http())
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
