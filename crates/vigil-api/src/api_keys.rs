//! Handlers for `/api-keys`. Secrets go in, only names come out.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use serde::Deserialize;
use vigil_core::store::{CredentialStore, IntelStore};

use crate::{ApiState, error::ApiError};

/// `GET /api-keys`
pub async fn list<S>(State(state): State<ApiState<S>>) -> Result<Json<Vec<String>>, ApiError>
where
  S: IntelStore + CredentialStore + 'static,
{
  let names = state
    .store
    .api_key_names()
    .await
    .map_err(ApiError::store)?;
  Ok(Json(names))
}

#[derive(Debug, Deserialize)]
pub struct UpsertBody {
  pub name:   String,
  pub secret: String,
}

/// `PUT /api-keys`: body: `{"name":"shodan","secret":"..."}`
pub async fn upsert<S>(
  State(state): State<ApiState<S>>,
  Json(body): Json<UpsertBody>,
) -> Result<StatusCode, ApiError>
where
  S: IntelStore + CredentialStore + 'static,
{
  let name = body.name.trim();
  if name.is_empty() || body.secret.is_empty() {
    return Err(ApiError::BadRequest("name and secret are required".into()));
  }
  state
    .store
    .set_api_key(name.to_owned(), body.secret)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(key = name, "api key stored");
  Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api-keys/{name}`
pub async fn remove<S>(
  State(state): State<ApiState<S>>,
  Path(name): Path<String>,
) -> Result<StatusCode, ApiError>
where
  S: IntelStore + CredentialStore + 'static,
{
  let removed = state
    .store
    .remove_api_key(name.clone())
    .await
    .map_err(ApiError::store)?;
  if removed {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(ApiError::NotFound(format!("api key {name} not found")))
  }
}
