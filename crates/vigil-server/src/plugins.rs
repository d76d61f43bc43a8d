//! Plugins compiled into the server.

use std::{collections::BTreeSet, sync::Arc};

use async_trait::async_trait;
use serde_json::json;
use vigil_core::{
  plugin::{Plugin, PluginContext, PluginDescriptor, PluginOutcome},
  resource::{Resource, ResourceType},
};

/// Every plugin the server registers at startup.
pub fn builtin() -> Vec<Arc<dyn Plugin>> { vec![Arc::new(DnsResolve)] }

/// Resolves a domain to its addresses through the system resolver.
pub struct DnsResolve;

#[async_trait]
impl Plugin for DnsResolve {
  fn descriptor(&self) -> PluginDescriptor {
    PluginDescriptor {
      name:          "dns_resolve".into(),
      description:   "Resolve the A and AAAA records of a domain".into(),
      is_active:     false,
      autostart:     true,
      disabled:      false,
      targets:       vec![ResourceType::Domain],
      needs_api_key: false,
      api_key_doc:   None,
      api_key_names: vec![],
    }
  }

  async fn execute(&self, resource: &Resource, _: &PluginContext) -> PluginOutcome {
    match tokio::net::lookup_host((resource.target(), 0)).await {
      Ok(addrs) => {
        // Sorted and deduplicated so identical answers hash identically.
        let addresses: BTreeSet<String> = addrs.map(|a| a.ip().to_string()).collect();
        if addresses.is_empty() {
          PluginOutcome::no_results()
        } else {
          PluginOutcome::completed(json!({ "addresses": addresses }))
        }
      }
      Err(e) => {
        tracing::debug!(domain = resource.target(), error = %e, "lookup failed");
        PluginOutcome::failed(e.to_string())
      }
    }
  }
}
