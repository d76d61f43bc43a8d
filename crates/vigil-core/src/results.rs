//! The result store: dedup-by-hash versioning of plugin results.
//!
//! For every run the newest stored record for `(resource, plugin)` is
//! compared with the incoming payload by canonical content hash:
//!
//! - no record yet: insert, keep the caller's status;
//! - same hash: refresh the newest record's timestamp only, status becomes
//!   [`ResultStatus::JustUpdated`];
//! - different hash: insert a new record, older ones stay as history.
//!
//! Every branch appends exactly one pending update. The fetch-compare-write
//! sequence holds no lock; two overlapping runs with identical payloads may
//! both insert, which the next run heals.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Error, Result,
  canonical::content_hash,
  plugin::{PluginOutcome, ResultStatus, is_valid_plugin_name},
  record::PluginResultRecord,
  store::IntelStore,
  updates::UpdateLog,
};

pub struct ResultStore<S> {
  store:   Arc<S>,
  updates: UpdateLog<S>,
}

impl<S> Clone for ResultStore<S> {
  fn clone(&self) -> Self {
    Self {
      store:   Arc::clone(&self.store),
      updates: self.updates.clone(),
    }
  }
}

impl<S: IntelStore> ResultStore<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self {
      updates: UpdateLog::new(Arc::clone(&store)),
      store,
    }
  }

  pub fn update_log(&self) -> &UpdateLog<S> { &self.updates }

  /// Record one plugin run and return the effective status.
  pub async fn record(
    &self,
    project_id: Uuid,
    resource_id: Uuid,
    plugin: &str,
    payload: serde_json::Value,
    status: ResultStatus,
  ) -> Result<ResultStatus> {
    self
      .record_at(project_id, resource_id, plugin, payload, status, Utc::now())
      .await
  }

  /// Record a [`PluginOutcome`] as returned by a plugin body.
  pub async fn record_outcome(
    &self,
    project_id: Uuid,
    resource_id: Uuid,
    plugin: &str,
    outcome: PluginOutcome,
  ) -> Result<ResultStatus> {
    self
      .record(project_id, resource_id, plugin, outcome.payload, outcome.status)
      .await
  }

  /// [`Self::record`] with an explicit write time.
  pub async fn record_at(
    &self,
    project_id: Uuid,
    resource_id: Uuid,
    plugin: &str,
    payload: serde_json::Value,
    status: ResultStatus,
    now: DateTime<Utc>,
  ) -> Result<ResultStatus> {
    if !is_valid_plugin_name(plugin) {
      return Err(Error::InvalidPluginName(plugin.to_owned()));
    }

    let hash = content_hash(&payload);
    let latest = self
      .store
      .latest_fingerprint(resource_id, plugin.to_owned())
      .await
      .map_err(Error::storage)?;

    let touched = match latest {
      Some(prev) if prev.content_hash.as_deref() == Some(hash.as_str()) => {
        self
          .store
          .touch_result(plugin.to_owned(), prev.record_id, now)
          .await
          .map_err(Error::storage)?
      }
      Some(prev) => {
        if prev.content_hash.is_none() {
          tracing::warn!(
            plugin,
            record = %prev.record_id,
            "stored result has no usable content hash, treating as changed"
          );
        }
        false
      }
      None => false,
    };

    let effective = if touched {
      ResultStatus::JustUpdated
    } else {
      self
        .store
        .insert_result(PluginResultRecord {
          record_id: Uuid::new_v4(),
          resource_id,
          plugin_name: plugin.to_owned(),
          payload,
          result_status: status,
          recorded_at: now,
          timestamp: now,
          content_hash: hash,
        })
        .await
        .map_err(Error::storage)?;
      status
    };

    tracing::debug!(
      plugin,
      resource = %resource_id,
      status = effective.as_str(),
      "recorded plugin result"
    );

    self
      .updates
      .append_at(project_id, resource_id, plugin, effective, now)
      .await?;

    Ok(effective)
  }

  /// All records for `(resource, plugin)`, newest first.
  pub async fn history(
    &self,
    resource_id: Uuid,
    plugin: &str,
  ) -> Result<Vec<PluginResultRecord>> {
    if !is_valid_plugin_name(plugin) {
      return Err(Error::InvalidPluginName(plugin.to_owned()));
    }
    self
      .store
      .list_results(resource_id, plugin.to_owned())
      .await
      .map_err(Error::storage)
  }
}
