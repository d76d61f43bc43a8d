//! Handlers for `/resources` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/resources` | Body: `{"name","resource_type","project_id"}`; autostarts on create |
//! | `GET`  | `/resources/search` | `?q=<text>[&limit=<n>]` |
//! | `GET`  | `/resources/{id}` | `?history_index=<i>&history_limit=<n>` |
//! | `POST` | `/resources/{id}/tags` | Body: a tag; toggles membership |
//! | `POST` | `/resources/{id}/plugins/{plugin}/launch` | Body: `{"project_id"}`; 202 |
//! | `GET`  | `/resources/{id}/plugins/{plugin}/diff` | `?index=<i>`, default 1 |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vigil_core::{
  dispatch::{launch, launch_autostart},
  plugin::ResultStatus,
  resource::{Resource, ResourceType, Tag},
  store::{CredentialStore, IntelStore},
  view::{PayloadDiff, RenderOptions, ResourceDocument},
};

use crate::{ApiState, error::ApiError};

const DEFAULT_SEARCH_LIMIT: usize = 50;

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name:          String,
  pub resource_type: String,
  pub project_id:    Uuid,
}

#[derive(Debug, Serialize)]
pub struct Created {
  pub resource: Resource,
  pub created:  bool,
  /// Autostart plugins accepted by the dispatcher.
  pub launched: Vec<String>,
}

/// `POST /resources`: 201 when created, 200 when it already existed.
pub async fn create<S>(
  State(state): State<ApiState<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: IntelStore + CredentialStore + 'static,
{
  let resource_type = ResourceType::parse(&body.resource_type)?;
  let (resource, created) = state
    .resources
    .get_or_create(&body.name, resource_type)
    .await?;

  let launched = if created {
    launch_autostart(
      &state.registry,
      state.dispatcher.as_ref(),
      &resource,
      body.project_id,
    )
    .await
  } else {
    Vec::new()
  };

  let status = if created { StatusCode::CREATED } else { StatusCode::OK };
  Ok((status, Json(Created {
    resource,
    created,
    launched,
  })))
}

// ─── Search ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SearchParams {
  pub q:     String,
  pub limit: Option<usize>,
}

/// `GET /resources/search?q=<text>`
pub async fn search<S>(
  State(state): State<ApiState<S>>,
  Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Resource>>, ApiError>
where
  S: IntelStore + CredentialStore + 'static,
{
  let hits = state
    .resources
    .search(&params.q, params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT))
    .await?;
  Ok(Json(hits))
}

// ─── Render ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct RenderParams {
  pub history_index: Option<i64>,
  pub history_limit: Option<usize>,
}

/// `GET /resources/{id}`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Query(params): Query<RenderParams>,
) -> Result<Json<ResourceDocument>, ApiError>
where
  S: IntelStore + CredentialStore + 'static,
{
  let options = RenderOptions {
    history_index: params.history_index.unwrap_or(0),
    history_limit: params.history_limit.or(state.history_limit),
  };
  Ok(Json(state.view.render_by_id(id, options).await?))
}

// ─── Tags ────────────────────────────────────────────────────────────────────

/// `POST /resources/{id}/tags`: body: `{"name":"phishing","color":"#f00"}`
pub async fn toggle_tag<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Json(tag): Json<Tag>,
) -> Result<Json<Resource>, ApiError>
where
  S: IntelStore + CredentialStore + 'static,
{
  Ok(Json(state.resources.toggle_tag(id, &tag).await?))
}

// ─── Plugins ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LaunchBody {
  pub project_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct Launched {
  pub status: ResultStatus,
}

/// `POST /resources/{id}/plugins/{plugin}/launch`
pub async fn launch_plugin<S>(
  State(state): State<ApiState<S>>,
  Path((id, plugin)): Path<(Uuid, String)>,
  Json(body): Json<LaunchBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: IntelStore + CredentialStore + 'static,
{
  let resource = state.resources.get(id).await?;
  let status = launch(
    &state.registry,
    state.dispatcher.as_ref(),
    &resource,
    body.project_id,
    &plugin,
  )
  .await?;
  Ok((StatusCode::ACCEPTED, Json(Launched { status })))
}

#[derive(Debug, Deserialize)]
pub struct DiffParams {
  pub index: Option<usize>,
}

/// `GET /resources/{id}/plugins/{plugin}/diff`
pub async fn diff<S>(
  State(state): State<ApiState<S>>,
  Path((id, plugin)): Path<(Uuid, String)>,
  Query(params): Query<DiffParams>,
) -> Result<Json<PayloadDiff>, ApiError>
where
  S: IntelStore + CredentialStore + 'static,
{
  let diff = state
    .view
    .diff(id, &plugin, params.index.unwrap_or(1))
    .await?;
  Ok(Json(diff))
}
