//! Error types for `vigil-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  /// Malformed input to resource creation or another core operation.
  #[error("validation error: {0}")]
  Validation(String),

  #[error("unknown resource type: {0:?}")]
  UnknownResourceType(String),

  #[error("resource not found: {0}")]
  ResourceNotFound(Uuid),

  #[error("plugin not found: {0}")]
  PluginNotFound(String),

  #[error("no result record for plugin {plugin} at history index {index}")]
  RecordNotFound { plugin: String, index: usize },

  #[error("plugin {plugin} does not apply to {resource_type} resources")]
  PluginNotApplicable {
    plugin:        String,
    resource_type: String,
  },

  #[error("invalid plugin name: {0:?}")]
  InvalidPluginName(String),

  #[error("dispatch error: {0}")]
  Dispatch(String),

  /// The underlying store is unreachable or rejected a write.
  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Wrap a backend error as [`Error::Storage`].
  pub fn storage<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Storage(Box::new(err))
  }

  /// `true` for the "no such entity" family of errors.
  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::ResourceNotFound(_)
        | Self::PluginNotFound(_)
        | Self::RecordNotFound { .. }
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
