//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// Anything the client cannot fix. Details are logged, never returned.
  #[error("internal error: {0}")]
  Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Internal(Box::new(err))
  }
}

impl From<vigil_core::Error> for ApiError {
  fn from(err: vigil_core::Error) -> Self {
    use vigil_core::Error as E;
    match err {
      e if e.is_not_found() => Self::NotFound(e.to_string()),
      e @ (E::Validation(_)
      | E::UnknownResourceType(_)
      | E::PluginNotApplicable { .. }
      | E::InvalidPluginName(_)) => Self::BadRequest(e.to_string()),
      e => Self::Internal(Box::new(e)),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Internal(e) => {
        tracing::error!(error = %e, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_owned())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use uuid::Uuid;

  use super::*;

  #[test]
  fn core_errors_map_to_client_classes() {
    let not_found: ApiError = vigil_core::Error::ResourceNotFound(Uuid::nil()).into();
    assert!(matches!(not_found, ApiError::NotFound(_)));

    let bad: ApiError = vigil_core::Error::UnknownResourceType("mac".into()).into();
    assert!(matches!(bad, ApiError::BadRequest(_)));

    let internal: ApiError = vigil_core::Error::Dispatch("queue closed".into()).into();
    assert_eq!(
      internal.into_response().status(),
      StatusCode::INTERNAL_SERVER_ERROR
    );
  }
}
