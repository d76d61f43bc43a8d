//! The dispatch contract between the core and whatever runs plugin bodies.
//!
//! The core only decides *which* plugin runs against *which* resource. How
//! the job is executed (in-process task, remote queue) is up to the
//! [`Dispatcher`] implementation, which reports back through
//! [`crate::results::ResultStore::record`].

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::{
  Error, Result,
  plugin::ResultStatus,
  registry::PluginRegistry,
  resource::Resource,
};

/// One plugin run to be executed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginJob {
  pub plugin_name: String,
  pub resource:    Resource,
  pub project_id:  Uuid,
}

#[async_trait]
pub trait Dispatcher: Send + Sync {
  /// Hand the job off. Returning `Ok` means accepted, not finished.
  async fn submit(&self, job: PluginJob) -> Result<()>;
}

/// Launch `plugin` against `resource`.
///
/// The returned [`ResultStatus::Started`] is optimistic: the job has been
/// accepted and the real outcome arrives later as a pending update.
pub async fn launch<D>(
  registry: &PluginRegistry,
  dispatcher: &D,
  resource: &Resource,
  project_id: Uuid,
  plugin: &str,
) -> Result<ResultStatus>
where
  D: Dispatcher + ?Sized,
{
  let descriptor = registry
    .get(plugin)
    .ok_or_else(|| Error::PluginNotFound(plugin.to_owned()))?;

  if !descriptor.applies_to(resource.resource_type) {
    return Err(Error::PluginNotApplicable {
      plugin:        plugin.to_owned(),
      resource_type: resource.resource_type.to_string(),
    });
  }

  dispatcher
    .submit(PluginJob {
      plugin_name: descriptor.name,
      resource: resource.clone(),
      project_id,
    })
    .await?;

  tracing::info!(plugin, resource = %resource.resource_id, "plugin launched");
  Ok(ResultStatus::Started)
}

/// Launch every autostart plugin applicable to `resource`. Returns the names
/// that were accepted; rejected submissions are logged and skipped.
pub async fn launch_autostart<D>(
  registry: &PluginRegistry,
  dispatcher: &D,
  resource: &Resource,
  project_id: Uuid,
) -> Vec<String>
where
  D: Dispatcher + ?Sized,
{
  let mut launched = Vec::new();
  for descriptor in registry.autostart_descriptors_for_type(resource.resource_type) {
    match launch(registry, dispatcher, resource, project_id, &descriptor.name).await {
      Ok(_) => launched.push(descriptor.name),
      Err(e) => tracing::warn!(
        plugin = %descriptor.name,
        resource = %resource.resource_id,
        error = %e,
        "autostart launch failed"
      ),
    }
  }
  launched
}
