//! Handlers for `/plugins` endpoints.

use axum::{
  Json,
  extract::{Query, State},
};
use serde::Deserialize;
use vigil_core::{
  plugin::PluginDescriptor,
  resource::ResourceType,
  store::{CredentialStore, IntelStore},
};

use crate::{ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(rename = "type")]
  pub resource_type: Option<String>,
}

/// `GET /plugins[?type=<resource type>]`: sorted by name.
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<PluginDescriptor>>, ApiError>
where
  S: IntelStore + CredentialStore + 'static,
{
  let descriptors = match params.resource_type {
    Some(t) => state.registry.descriptors_for_type(ResourceType::parse(&t)?),
    None => state.registry.all(),
  };
  Ok(Json(descriptors))
}

/// `GET /plugins/unset-api-keys`: key names required but not stored.
pub async fn unset_api_keys<S>(
  State(state): State<ApiState<S>>,
) -> Result<Json<Vec<String>>, ApiError>
where
  S: IntelStore + CredentialStore + 'static,
{
  let unset = state.registry.unset_api_keys(state.store.as_ref()).await?;
  Ok(Json(unset.into_iter().collect()))
}
