//! JSON REST API for Vigil.
//!
//! Exposes an axum [`Router`] backed by any store implementing both
//! [`IntelStore`] and [`CredentialStore`]. Auth, TLS, and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", vigil_api::api_router(state))
//! ```

pub mod api_keys;
pub mod error;
pub mod plugins;
pub mod resources;
pub mod updates;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, post},
};
use vigil_core::{
  dispatch::Dispatcher,
  registry::PluginRegistry,
  resources::Resources,
  store::{CredentialStore, IntelStore},
  updates::UpdateLog,
  view::ResourceView,
};

pub use error::ApiError;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct ApiState<S> {
  pub store:         Arc<S>,
  pub registry:      Arc<PluginRegistry>,
  pub dispatcher:    Arc<dyn Dispatcher>,
  pub resources:     Resources<S>,
  pub updates:       UpdateLog<S>,
  pub view:          ResourceView<S>,
  /// History cap applied when a render request does not pass its own.
  pub history_limit: Option<usize>,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      store:         Arc::clone(&self.store),
      registry:      Arc::clone(&self.registry),
      dispatcher:    Arc::clone(&self.dispatcher),
      resources:     self.resources.clone(),
      updates:       self.updates.clone(),
      view:          self.view.clone(),
      history_limit: self.history_limit,
    }
  }
}

impl<S: IntelStore> ApiState<S> {
  pub fn new(
    store: Arc<S>,
    registry: Arc<PluginRegistry>,
    dispatcher: Arc<dyn Dispatcher>,
  ) -> Self {
    Self {
      resources: Resources::new(Arc::clone(&store)),
      updates: UpdateLog::new(Arc::clone(&store)),
      view: ResourceView::new(Arc::clone(&store), Arc::clone(&registry)),
      store,
      registry,
      dispatcher,
      history_limit: None,
    }
  }

  pub fn with_history_limit(mut self, limit: Option<usize>) -> Self {
    self.history_limit = limit;
    self
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: IntelStore + CredentialStore + 'static,
{
  Router::new()
    // Resources
    .route("/resources", post(resources::create::<S>))
    .route("/resources/search", get(resources::search::<S>))
    .route("/resources/{id}", get(resources::get_one::<S>))
    .route("/resources/{id}/tags", post(resources::toggle_tag::<S>))
    .route(
      "/resources/{id}/plugins/{plugin}/launch",
      post(resources::launch_plugin::<S>),
    )
    .route(
      "/resources/{id}/plugins/{plugin}/diff",
      get(resources::diff::<S>),
    )
    // Plugins
    .route("/plugins", get(plugins::list::<S>))
    .route("/plugins/unset-api-keys", get(plugins::unset_api_keys::<S>))
    // Credentials
    .route("/api-keys", get(api_keys::list::<S>).put(api_keys::upsert::<S>))
    .route("/api-keys/{name}", delete(api_keys::remove::<S>))
    // Updates
    .route("/projects/{id}/updates", get(updates::poll::<S>))
    .route("/health", get(updates::health::<S>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
