//! The pending-update log.
//!
//! Clients poll with their own clock reading as a cutoff and receive every
//! entry recorded up to that instant. Each poll first purges entries older
//! than [`RETENTION_SECS`] relative to the cutoff; nothing purges the log if
//! nobody polls.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
  Error, Result,
  plugin::ResultStatus,
  record::{PendingUpdate, UpdateNotice},
  store::IntelStore,
};

/// How long an entry survives, measured against poll cutoffs.
pub const RETENTION_SECS: i64 = 24 * 60 * 60;

pub struct UpdateLog<S> {
  store: Arc<S>,
}

impl<S> Clone for UpdateLog<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
    }
  }
}

impl<S: IntelStore> UpdateLog<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub async fn append(
    &self,
    project_id: Uuid,
    resource_id: Uuid,
    plugin: &str,
    status: ResultStatus,
  ) -> Result<()> {
    self
      .append_at(project_id, resource_id, plugin, status, Utc::now())
      .await
  }

  pub async fn append_at(
    &self,
    project_id: Uuid,
    resource_id: Uuid,
    plugin: &str,
    status: ResultStatus,
    at: DateTime<Utc>,
  ) -> Result<()> {
    let entry = PendingUpdate::for_status(project_id, resource_id, plugin, status, at);
    tracing::debug!(
      project = %project_id,
      plugin,
      severity = entry.severity.as_str(),
      message = %entry.message,
      "pending update"
    );
    self.store.append_update(entry).await.map_err(Error::storage)
  }

  /// Every unexpired entry for `project_id` with `timestamp <= cutoff`,
  /// oldest first.
  ///
  /// The purge relative to `cutoff` runs first, so an entry older than the
  /// retention window is never delivered, even to a client that has not
  /// polled for a day.
  pub async fn poll(
    &self,
    project_id: Uuid,
    cutoff: DateTime<Utc>,
  ) -> Result<Vec<UpdateNotice>> {
    // Best effort: a failed purge must not cost the client its updates.
    if let Err(e) = self.purge(cutoff).await {
      tracing::warn!(error = %e, "pending update purge failed");
    }

    let entries = self
      .store
      .updates_until(project_id, cutoff)
      .await
      .map_err(Error::storage)?;

    Ok(entries.into_iter().map(UpdateNotice::from).collect())
  }

  /// Delete every entry with `timestamp <= ts - 24h`.
  pub async fn purge(&self, ts: DateTime<Utc>) -> Result<u64> {
    let purged = self
      .store
      .purge_updates_until(ts - Duration::seconds(RETENTION_SECS))
      .await
      .map_err(Error::storage)?;
    if purged > 0 {
      tracing::debug!(purged, "purged expired pending updates");
    }
    Ok(purged)
  }

  /// Most recent entry timestamp across all projects.
  pub async fn last_update_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
    self.store.last_update_at().await.map_err(Error::storage)
  }
}
