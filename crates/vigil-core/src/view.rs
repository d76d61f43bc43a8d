//! The resource view: the computed read model presented to clients.
//!
//! Never stored, always assembled on demand from the registry and the
//! per-plugin result namespaces.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
  Error, Result,
  diff::{PayloadChange, diff_payloads},
  plugin::{ResultStatus, is_valid_plugin_name},
  record::{HistoryEntry, PluginResultRecord},
  registry::PluginRegistry,
  resource::Resource,
  store::IntelStore,
};

/// Key of an indirect reference inside a list payload:
/// `{"$ref": "<uuid>"}` points into the plugin's sub-result namespace.
pub const REFERENCE_KEY: &str = "$ref";

// ─── Documents ───────────────────────────────────────────────────────────────

/// The selected result of one plugin plus its time machine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginSection {
  pub name:          String,
  pub record_id:     Uuid,
  pub result_status: ResultStatus,
  pub timestamp:     DateTime<Utc>,
  pub recorded_at:   DateTime<Utc>,
  pub payload:       Value,
  /// Index into `history` of the record shown above.
  pub history_index: usize,
  /// Every stored run, newest first.
  pub history:       Vec<HistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceDocument {
  pub resource: Resource,
  pub plugins:  Vec<PluginSection>,
}

/// Rendering knobs. The defaults show the newest result and the whole
/// history.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
  /// Which version to show per plugin, 0 being the newest. Out-of-range
  /// values fall back to 0.
  pub history_index: i64,
  /// Display cap on `history`; `None` means unbounded.
  pub history_limit: Option<usize>,
}

/// Comparison of two stored versions of one plugin's result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayloadDiff {
  pub plugin:  String,
  pub base:    HistoryEntry,
  pub current: HistoryEntry,
  pub changes: Vec<PayloadChange>,
}

// ─── View ────────────────────────────────────────────────────────────────────

pub struct ResourceView<S> {
  store:    Arc<S>,
  registry: Arc<PluginRegistry>,
}

impl<S> Clone for ResourceView<S> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      registry: Arc::clone(&self.registry),
    }
  }
}

impl<S: IntelStore> ResourceView<S> {
  pub fn new(store: Arc<S>, registry: Arc<PluginRegistry>) -> Self {
    Self { store, registry }
  }

  /// Assemble the document for `resource`. Plugins without any stored
  /// result are left out.
  pub async fn render(
    &self,
    resource: &Resource,
    options: RenderOptions,
  ) -> Result<ResourceDocument> {
    let mut plugins = Vec::new();

    for descriptor in self.registry.descriptors_for_type(resource.resource_type) {
      let records = self
        .store
        .list_results(resource.resource_id, descriptor.name.clone())
        .await
        .map_err(Error::storage)?;
      if records.is_empty() {
        continue;
      }

      let index = select_index(options.history_index, records.len());
      let mut history: Vec<HistoryEntry> = records.iter().map(history_entry).collect();
      if let Some(limit) = options.history_limit {
        history.truncate(limit);
      }

      let selected = records.into_iter().nth(index).ok_or_else(|| {
        Error::RecordNotFound {
          plugin: descriptor.name.clone(),
          index,
        }
      })?;
      let payload = self.resolve_references(&descriptor.name, selected.payload).await;

      plugins.push(PluginSection {
        name: descriptor.name,
        record_id: selected.record_id,
        result_status: selected.result_status,
        timestamp: selected.timestamp,
        recorded_at: selected.recorded_at,
        payload,
        history_index: index,
        history,
      });
    }

    Ok(ResourceDocument {
      resource: resource.clone(),
      plugins,
    })
  }

  /// Load the resource by id and render it.
  pub async fn render_by_id(
    &self,
    resource_id: Uuid,
    options: RenderOptions,
  ) -> Result<ResourceDocument> {
    let resource = self
      .store
      .get_resource(resource_id)
      .await
      .map_err(Error::storage)?
      .ok_or(Error::ResourceNotFound(resource_id))?;
    self.render(&resource, options).await
  }

  /// Compare the newest result of `plugin` with the one `index` versions
  /// back.
  pub async fn diff(
    &self,
    resource_id: Uuid,
    plugin: &str,
    index: usize,
  ) -> Result<PayloadDiff> {
    if !is_valid_plugin_name(plugin) {
      return Err(Error::InvalidPluginName(plugin.to_owned()));
    }

    let records = self
      .store
      .list_results(resource_id, plugin.to_owned())
      .await
      .map_err(Error::storage)?;

    let not_found = || Error::RecordNotFound {
      plugin: plugin.to_owned(),
      index,
    };
    let current = records.first().ok_or_else(not_found)?;
    let base = records.get(index).ok_or_else(not_found)?;

    Ok(PayloadDiff {
      plugin:  plugin.to_owned(),
      base:    history_entry(base),
      current: history_entry(current),
      changes: diff_payloads(&base.payload, &current.payload),
    })
  }

  /// Replace `{"$ref": id}` entries of a list payload with the referenced
  /// sub-results. Anything that cannot be resolved is passed through.
  async fn resolve_references(&self, plugin: &str, payload: Value) -> Value {
    let Value::Array(entries) = payload else {
      return payload;
    };

    let mut resolved = Vec::with_capacity(entries.len());
    for entry in entries {
      let Some(id) = reference_id(&entry) else {
        resolved.push(entry);
        continue;
      };
      match self.store.get_sub_result(plugin.to_owned(), id).await {
        Ok(Some(value)) => resolved.push(value),
        Ok(None) => resolved.push(entry),
        Err(e) => {
          tracing::warn!(plugin, reference = %id, error = %e, "could not resolve sub-result");
          resolved.push(entry);
        }
      }
    }
    Value::Array(resolved)
  }
}

fn select_index(requested: i64, count: usize) -> usize {
  usize::try_from(requested)
    .ok()
    .filter(|&i| i < count)
    .unwrap_or(0)
}

fn history_entry(record: &PluginResultRecord) -> HistoryEntry {
  HistoryEntry {
    timestamp:     record.timestamp,
    result_status: record.result_status,
  }
}

/// The referenced id if `entry` is exactly `{"$ref": "<uuid>"}`.
pub fn reference_id(entry: &Value) -> Option<Uuid> {
  let obj = entry.as_object()?;
  if obj.len() != 1 {
    return None;
  }
  obj
    .get(REFERENCE_KEY)?
    .as_str()
    .and_then(|s| Uuid::parse_str(s).ok())
}

/// Build a reference entry for `id`.
pub fn reference_to(id: Uuid) -> Value {
  serde_json::json!({ REFERENCE_KEY: id.to_string() })
}
