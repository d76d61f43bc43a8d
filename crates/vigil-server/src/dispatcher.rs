//! In-process [`Dispatcher`]: every job runs on its own tokio task.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use vigil_core::{
  Error, Result,
  dispatch::{Dispatcher, PluginJob},
  plugin::{PluginContext, PluginOutcome, ResultStatus},
  registry::{PluginRegistry, RegisteredPlugin},
  results::ResultStore,
  store::{CredentialStore, IntelStore},
};

pub struct LocalDispatcher<S> {
  registry:    Arc<PluginRegistry>,
  credentials: Arc<S>,
  results:     ResultStore<S>,
}

impl<S> Clone for LocalDispatcher<S> {
  fn clone(&self) -> Self {
    Self {
      registry:    Arc::clone(&self.registry),
      credentials: Arc::clone(&self.credentials),
      results:     self.results.clone(),
    }
  }
}

impl<S> LocalDispatcher<S>
where
  S: IntelStore + CredentialStore + 'static,
{
  pub fn new(store: Arc<S>, registry: Arc<PluginRegistry>) -> Self {
    Self {
      results: ResultStore::new(Arc::clone(&store)),
      credentials: store,
      registry,
    }
  }

  /// Execute `job` to completion and record its outcome.
  ///
  /// A plugin that needs keys runs only when every named key is stored;
  /// otherwise `NO_API_KEY` is recorded and the body never executes.
  pub async fn run(&self, job: PluginJob) -> Result<ResultStatus> {
    let handle = self
      .registry
      .plugin(&job.plugin_name)
      .ok_or_else(|| Error::PluginNotFound(job.plugin_name.clone()))?;

    let outcome = self.execute(&handle, &job).await;
    self
      .results
      .record_outcome(job.project_id, job.resource.resource_id, &job.plugin_name, outcome)
      .await
  }

  async fn execute(&self, handle: &RegisteredPlugin, job: &PluginJob) -> PluginOutcome {
    let descriptor = &handle.descriptor;

    let mut api_keys = HashMap::new();
    for name in &descriptor.api_key_names {
      match self.credentials.get_api_key(name.clone()).await {
        Ok(Some(secret)) => {
          api_keys.insert(name.clone(), secret);
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(key = %name, error = %e, "could not read api key"),
      }
    }

    if descriptor.needs_api_key
      && descriptor
        .api_key_names
        .iter()
        .any(|n| !api_keys.contains_key(n))
    {
      tracing::info!(plugin = %descriptor.name, "api key missing, not executing");
      return PluginOutcome::no_api_key();
    }

    let context = PluginContext {
      project_id: job.project_id,
      api_keys,
    };
    handle.plugin.execute(&job.resource, &context).await
  }
}

#[async_trait]
impl<S> Dispatcher for LocalDispatcher<S>
where
  S: IntelStore + CredentialStore + 'static,
{
  async fn submit(&self, job: PluginJob) -> Result<()> {
    if self.registry.get(&job.plugin_name).is_none() {
      return Err(Error::PluginNotFound(job.plugin_name));
    }

    let this = self.clone();
    tokio::spawn(async move {
      let plugin = job.plugin_name.clone();
      let resource = job.resource.resource_id;
      match this.run(job).await {
        Ok(status) => {
          tracing::info!(%plugin, %resource, status = status.as_str(), "plugin finished")
        }
        Err(e) => tracing::error!(%plugin, %resource, error = %e, "plugin run not recorded"),
      }
    });
    Ok(())
  }
}
