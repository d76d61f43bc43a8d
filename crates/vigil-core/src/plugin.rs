//! Plugin metadata, the [`Plugin`] capability and run outcomes.
//!
//! Plugins are compiled in. Each one implements [`Plugin`] and is handed to
//! [`crate::registry::PluginRegistry::rebuild`] at startup; nothing is
//! discovered from the filesystem.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::resource::{Resource, ResourceType};

// ─── Status ──────────────────────────────────────────────────────────────────

/// Outcome of one plugin run. `Started` is optimistic and set before
/// dispatch; every other variant is terminal.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResultStatus {
  Started,
  Completed,
  Failed,
  ReturnNone,
  NoApiKey,
  JustUpdated,
}

/// Severity class of a pending-update notification.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
  Success,
  Info,
  Error,
}

impl ResultStatus {
  /// The stored and wire form, e.g. `just_updated`.
  pub fn as_str(self) -> &'static str { self.into() }

  /// The fixed notification text and severity for this status.
  pub fn notification(self) -> (&'static str, Severity) {
    match self {
      Self::NoApiKey => ("there is a problem with the API KEY", Severity::Error),
      Self::ReturnNone => ("received no results", Severity::Info),
      Self::Failed => ("plugin failed to run", Severity::Error),
      Self::Completed => ("successfully completed", Severity::Success),
      Self::JustUpdated => ("same result, just updating timestamp", Severity::Info),
      Self::Started => ("plugin started", Severity::Info),
    }
  }
}

impl Severity {
  pub fn as_str(self) -> &'static str { self.into() }
}

// ─── Descriptor ──────────────────────────────────────────────────────────────

/// Registry entry for one plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
  /// Unique key; also names the plugin's storage namespace.
  pub name:          String,
  pub description:   String,
  /// The probe touches the target directly ("noisy").
  pub is_active:     bool,
  /// Run automatically when a resource of a target type is created.
  pub autostart:     bool,
  /// Disabled plugins are compiled in but never registered.
  #[serde(default)]
  pub disabled:      bool,
  pub targets:       Vec<ResourceType>,
  pub needs_api_key: bool,
  /// Where to read about obtaining a key.
  pub api_key_doc:   Option<String>,
  pub api_key_names: Vec<String>,
}

impl PluginDescriptor {
  pub fn applies_to(&self, resource_type: ResourceType) -> bool {
    self.targets.contains(&resource_type)
  }
}

/// Plugin names double as table-name suffixes, so they are restricted to
/// lowercase ASCII letters, digits and `_`, at most 64 characters.
pub fn is_valid_plugin_name(name: &str) -> bool {
  !name.is_empty()
    && name.len() <= 64
    && name
      .bytes()
      .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

// ─── Execution ───────────────────────────────────────────────────────────────

/// Everything a plugin body receives besides the resource.
#[derive(Debug, Clone, Default)]
pub struct PluginContext {
  pub project_id: Uuid,
  /// Secrets for the descriptor's `api_key_names` that were present in the
  /// credential store.
  pub api_keys:   HashMap<String, String>,
}

/// What a plugin run produced, ready for [`crate::results::ResultStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct PluginOutcome {
  pub status:  ResultStatus,
  pub payload: serde_json::Value,
}

impl PluginOutcome {
  pub fn completed(payload: serde_json::Value) -> Self {
    Self { status: ResultStatus::Completed, payload }
  }

  pub fn no_results() -> Self {
    Self {
      status:  ResultStatus::ReturnNone,
      payload: serde_json::Value::Null,
    }
  }

  pub fn no_api_key() -> Self {
    Self {
      status:  ResultStatus::NoApiKey,
      payload: serde_json::Value::Null,
    }
  }

  pub fn failed(reason: impl Into<String>) -> Self {
    Self {
      status:  ResultStatus::Failed,
      payload: serde_json::json!({ "error": reason.into() }),
    }
  }
}

/// A compiled-in probe.
#[async_trait]
pub trait Plugin: Send + Sync {
  fn descriptor(&self) -> PluginDescriptor;

  /// Resource types this plugin accepts. Defaults to the descriptor's
  /// `targets`.
  fn target_types(&self) -> Vec<ResourceType> { self.descriptor().targets }

  /// Run the probe. Failures are reported through the outcome's status.
  async fn execute(
    &self,
    resource: &Resource,
    context: &PluginContext,
  ) -> PluginOutcome;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn notification_table() {
    assert_eq!(
      ResultStatus::NoApiKey.notification(),
      ("there is a problem with the API KEY", Severity::Error)
    );
    assert_eq!(
      ResultStatus::ReturnNone.notification(),
      ("received no results", Severity::Info)
    );
    assert_eq!(
      ResultStatus::Failed.notification(),
      ("plugin failed to run", Severity::Error)
    );
    assert_eq!(
      ResultStatus::Completed.notification(),
      ("successfully completed", Severity::Success)
    );
    assert_eq!(
      ResultStatus::JustUpdated.notification(),
      ("same result, just updating timestamp", Severity::Info)
    );
  }

  #[test]
  fn status_strings_match_serde() {
    for status in [
      ResultStatus::Started,
      ResultStatus::Completed,
      ResultStatus::Failed,
      ResultStatus::ReturnNone,
      ResultStatus::NoApiKey,
      ResultStatus::JustUpdated,
    ] {
      let json = serde_json::to_string(&status).unwrap();
      assert_eq!(json, format!("\"{}\"", status.as_str()));
      assert_eq!(status.as_str().parse::<ResultStatus>().unwrap(), status);
      assert_eq!(status.to_string(), status.as_str());
    }
  }

  #[test]
  fn severity_strings_match_serde() {
    for severity in [Severity::Success, Severity::Info, Severity::Error] {
      let json = serde_json::to_string(&severity).unwrap();
      assert_eq!(json, format!("\"{severity}\""));
      assert_eq!(severity.as_str().parse::<Severity>().unwrap(), severity);
    }
    assert!("warning".parse::<Severity>().is_err());
  }

  #[test]
  fn plugin_names_are_namespace_safe() {
    assert!(is_valid_plugin_name("virustotal"));
    assert!(is_valid_plugin_name("dns_resolve2"));
    assert!(!is_valid_plugin_name(""));
    assert!(!is_valid_plugin_name("Robtex"));
    assert!(!is_valid_plugin_name("drop table;"));
    assert!(!is_valid_plugin_name(&"a".repeat(65)));
  }
}
