//! Pending-update polling and the health probe.

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vigil_core::{
  record::UpdateNotice,
  store::{CredentialStore, IntelStore},
};

use crate::{ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct PollParams {
  /// The client's clock reading; defaults to the server's.
  pub until: Option<DateTime<Utc>>,
}

/// `GET /projects/{id}/updates[?until=<rfc3339>]`: oldest first.
pub async fn poll<S>(
  State(state): State<ApiState<S>>,
  Path(project_id): Path<Uuid>,
  Query(params): Query<PollParams>,
) -> Result<Json<Vec<UpdateNotice>>, ApiError>
where
  S: IntelStore + CredentialStore + 'static,
{
  let cutoff = params.until.unwrap_or_else(Utc::now);
  Ok(Json(state.updates.poll(project_id, cutoff).await?))
}

#[derive(Debug, Serialize)]
pub struct Health {
  pub status:      &'static str,
  pub last_update: Option<DateTime<Utc>>,
}

/// `GET /health`
pub async fn health<S>(State(state): State<ApiState<S>>) -> Result<Json<Health>, ApiError>
where
  S: IntelStore + CredentialStore + 'static,
{
  let last_update = state.updates.last_update_timestamp().await?;
  Ok(Json(Health {
    status: "ok",
    last_update,
  }))
}
