//! The plugin registry.
//!
//! The registry is an immutable snapshot behind an [`ArcSwap`]. A rebuild
//! validates the compiled-in plugin list, assembles a fresh snapshot and
//! swaps it in with a single pointer store, so readers see either the old
//! registry or the new one and never a mix. Nothing is mutated in place.

use std::{
  collections::{BTreeMap, BTreeSet},
  sync::Arc,
};

use arc_swap::ArcSwap;
use serde::Serialize;

use crate::{
  Error, Result,
  plugin::{Plugin, PluginDescriptor, is_valid_plugin_name},
  resource::ResourceType,
  store::{CredentialStore, IntelStore},
};

/// A validated plugin together with its executable body.
#[derive(Clone)]
pub struct RegisteredPlugin {
  pub descriptor: PluginDescriptor,
  pub plugin:     Arc<dyn Plugin>,
}

#[derive(Default)]
struct Snapshot {
  /// Keyed (and therefore ordered) by plugin name.
  plugins: BTreeMap<String, RegisteredPlugin>,
}

/// A plugin definition that was left out of a rebuild, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPlugin {
  pub name:   String,
  pub reason: String,
}

/// Summary of one [`PluginRegistry::rebuild`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
  pub registered: Vec<String>,
  pub skipped:    Vec<SkippedPlugin>,
}

pub struct PluginRegistry {
  snapshot: ArcSwap<Snapshot>,
}

impl Default for PluginRegistry {
  fn default() -> Self { Self::new() }
}

impl PluginRegistry {
  /// An empty registry.
  pub fn new() -> Self {
    Self {
      snapshot: ArcSwap::from_pointee(Snapshot::default()),
    }
  }

  /// Build a registry from `plugins` in one go.
  pub fn build(
    plugins: impl IntoIterator<Item = Arc<dyn Plugin>>,
  ) -> (Self, RebuildReport) {
    let registry = Self::new();
    let report = registry.rebuild(plugins);
    (registry, report)
  }

  /// Replace the registry contents with the valid subset of `plugins`.
  ///
  /// Malformed or disabled definitions are logged and skipped; they never
  /// abort the rebuild. Entries from the previous snapshot do not survive.
  pub fn rebuild(
    &self,
    plugins: impl IntoIterator<Item = Arc<dyn Plugin>>,
  ) -> RebuildReport {
    let mut next = Snapshot::default();
    let mut report = RebuildReport::default();

    for plugin in plugins {
      let mut descriptor = plugin.descriptor();
      descriptor.targets = dedup_targets(plugin.target_types());

      if descriptor.disabled {
        tracing::info!(plugin = %descriptor.name, "plugin disabled, not registering");
        report.skipped.push(SkippedPlugin {
          name:   descriptor.name,
          reason: "disabled".into(),
        });
        continue;
      }

      let verdict = validate(&descriptor).and_then(|()| {
        if next.plugins.contains_key(&descriptor.name) {
          Err(format!("duplicate plugin name {:?}", descriptor.name))
        } else {
          Ok(())
        }
      });

      match verdict {
        Ok(()) => {
          tracing::debug!(plugin = %descriptor.name, "registering plugin");
          report.registered.push(descriptor.name.clone());
          next.plugins.insert(descriptor.name.clone(), RegisteredPlugin {
            descriptor,
            plugin,
          });
        }
        Err(reason) => {
          tracing::warn!(plugin = %descriptor.name, %reason, "skipping malformed plugin definition");
          report.skipped.push(SkippedPlugin {
            name: descriptor.name,
            reason,
          });
        }
      }
    }

    self.snapshot.store(Arc::new(next));
    tracing::info!(
      registered = report.registered.len(),
      skipped = report.skipped.len(),
      "plugin registry rebuilt"
    );
    report
  }

  // ── Lookups ─────────────────────────────────────────────────────────────

  pub fn get(&self, name: &str) -> Option<PluginDescriptor> {
    self
      .snapshot
      .load()
      .plugins
      .get(name)
      .map(|p| p.descriptor.clone())
  }

  /// The executable handle for `name`.
  pub fn plugin(&self, name: &str) -> Option<RegisteredPlugin> {
    self.snapshot.load().plugins.get(name).cloned()
  }

  /// Every registered descriptor, sorted by name.
  pub fn all(&self) -> Vec<PluginDescriptor> {
    self
      .snapshot
      .load()
      .plugins
      .values()
      .map(|p| p.descriptor.clone())
      .collect()
  }

  /// Descriptors applicable to `resource_type`, sorted by name.
  pub fn descriptors_for_type(
    &self,
    resource_type: ResourceType,
  ) -> Vec<PluginDescriptor> {
    self
      .snapshot
      .load()
      .plugins
      .values()
      .filter(|p| p.descriptor.applies_to(resource_type))
      .map(|p| p.descriptor.clone())
      .collect()
  }

  /// Applicable descriptors with `autostart` set, sorted by name.
  pub fn autostart_descriptors_for_type(
    &self,
    resource_type: ResourceType,
  ) -> Vec<PluginDescriptor> {
    self
      .descriptors_for_type(resource_type)
      .into_iter()
      .filter(|d| d.autostart)
      .collect()
  }

  // ── API keys ────────────────────────────────────────────────────────────

  /// Key names required by any registered plugin that needs a key.
  pub fn required_api_keys(&self) -> BTreeSet<String> {
    self
      .snapshot
      .load()
      .plugins
      .values()
      .filter(|p| p.descriptor.needs_api_key)
      .flat_map(|p| p.descriptor.api_key_names.iter().cloned())
      .collect()
  }

  /// Required key names missing from `present`.
  pub fn unset_api_keys_given<I>(&self, present: I) -> BTreeSet<String>
  where
    I: IntoIterator,
    I::Item: AsRef<str>,
  {
    let present: BTreeSet<String> =
      present.into_iter().map(|s| s.as_ref().to_owned()).collect();
    self
      .required_api_keys()
      .difference(&present)
      .cloned()
      .collect()
  }

  /// Required key names absent from the credential store.
  pub async fn unset_api_keys<C: CredentialStore>(
    &self,
    credentials: &C,
  ) -> Result<BTreeSet<String>> {
    let present = credentials.api_key_names().await.map_err(Error::storage)?;
    Ok(self.unset_api_keys_given(present))
  }

  /// Persist the current snapshot to the store's registry namespace.
  pub async fn publish<S: IntelStore>(&self, store: &S) -> Result<()> {
    store.replace_plugins(self.all()).await.map_err(Error::storage)
  }
}

fn dedup_targets(targets: Vec<ResourceType>) -> Vec<ResourceType> {
  let set: BTreeSet<ResourceType> = targets.into_iter().collect();
  set.into_iter().collect()
}

fn validate(d: &PluginDescriptor) -> Result<(), String> {
  if !is_valid_plugin_name(&d.name) {
    return Err(format!("invalid plugin name {:?}", d.name));
  }
  if d.targets.is_empty() {
    return Err("plugin declares no target resource types".into());
  }
  if d.needs_api_key && d.api_key_names.is_empty() {
    return Err("plugin needs an API key but names none".into());
  }
  if d.api_key_names.iter().any(|n| n.trim().is_empty()) {
    return Err("blank API key name".into());
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use async_trait::async_trait;

  use super::*;
  use crate::{
    plugin::{PluginContext, PluginOutcome},
    resource::Resource,
  };

  struct Fake(PluginDescriptor);

  #[async_trait]
  impl Plugin for Fake {
    fn descriptor(&self) -> PluginDescriptor { self.0.clone() }

    async fn execute(&self, _: &Resource, _: &PluginContext) -> PluginOutcome {
      PluginOutcome::no_results()
    }
  }

  fn descriptor(name: &str, targets: &[ResourceType]) -> PluginDescriptor {
    PluginDescriptor {
      name:          name.into(),
      description:   format!("{name} probe"),
      is_active:     false,
      autostart:     false,
      disabled:      false,
      targets:       targets.to_vec(),
      needs_api_key: false,
      api_key_doc:   None,
      api_key_names: vec![],
    }
  }

  fn fake(d: PluginDescriptor) -> Arc<dyn Plugin> { Arc::new(Fake(d)) }

  #[test]
  fn descriptors_are_sorted_and_filtered_by_type() {
    let (registry, _) = PluginRegistry::build([
      fake(descriptor("whois", &[ResourceType::Domain])),
      fake(descriptor("dns", &[ResourceType::Domain, ResourceType::Ipv4])),
      fake(descriptor("hashdd", &[ResourceType::Hash])),
    ]);

    let names: Vec<String> = registry
      .descriptors_for_type(ResourceType::Domain)
      .into_iter()
      .map(|d| d.name)
      .collect();
    assert_eq!(names, ["dns", "whois"]);
    assert!(registry.descriptors_for_type(ResourceType::File).is_empty());
  }

  #[test]
  fn autostart_filter() {
    let mut auto = descriptor("dns", &[ResourceType::Domain]);
    auto.autostart = true;
    let (registry, _) = PluginRegistry::build([
      fake(auto),
      fake(descriptor("whois", &[ResourceType::Domain])),
    ]);
    let names: Vec<String> = registry
      .autostart_descriptors_for_type(ResourceType::Domain)
      .into_iter()
      .map(|d| d.name)
      .collect();
    assert_eq!(names, ["dns"]);
  }

  #[test]
  fn malformed_definitions_are_skipped_not_fatal() {
    let mut keyless = descriptor("shodan", &[ResourceType::Ipv4]);
    keyless.needs_api_key = true;
    let mut disabled = descriptor("pastebin", &[ResourceType::Email]);
    disabled.disabled = true;

    let (registry, report) = PluginRegistry::build([
      fake(descriptor("Bad Name", &[ResourceType::Domain])),
      fake(descriptor("notargets", &[])),
      fake(keyless),
      fake(disabled),
      fake(descriptor("dns", &[ResourceType::Domain])),
      fake(descriptor("dns", &[ResourceType::Url])),
    ]);

    assert_eq!(report.registered, ["dns"]);
    assert_eq!(report.skipped.len(), 5);
    assert_eq!(registry.all().len(), 1);
    assert_eq!(
      registry.get("dns").unwrap().targets,
      vec![ResourceType::Domain]
    );
  }

  #[test]
  fn rebuild_drops_stale_entries() {
    let (registry, _) =
      PluginRegistry::build([fake(descriptor("old", &[ResourceType::Domain]))]);
    assert!(registry.get("old").is_some());

    registry.rebuild([fake(descriptor("new", &[ResourceType::Domain]))]);
    assert!(registry.get("old").is_none());
    assert!(registry.get("new").is_some());
  }

  #[test]
  fn unset_api_keys_is_a_set_difference() {
    let mut vt = descriptor("virustotal", &[ResourceType::Hash]);
    vt.needs_api_key = true;
    vt.api_key_names = vec!["virustotal".into()];
    let mut otx = descriptor("otx", &[ResourceType::Domain]);
    otx.needs_api_key = true;
    otx.api_key_names = vec!["otx_key".into(), "otx_secret".into()];
    let mut optional = descriptor("robtex", &[ResourceType::Ipv4]);
    optional.api_key_names = vec!["robtex".into()];

    let (registry, _) =
      PluginRegistry::build([fake(vt), fake(otx), fake(optional)]);

    let unset = registry.unset_api_keys_given(["otx_key", "unrelated"]);
    let unset: Vec<String> = unset.into_iter().collect();
    assert_eq!(unset, ["otx_secret", "virustotal"]);
  }
}
